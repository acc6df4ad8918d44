// Topolab: Materializing declarative AS-level topologies into emulated networks
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Rendering the resolved graph into per-router FRR configurations. One
//! file per router, sections in a fixed order (hostname, interfaces,
//! IS-IS, OSPF, OSPFv3, BGP, static routes, route maps, RPKI), separated
//! by `!` lines. Neighbor maps and AS maps are iterated in key order, so
//! the output is byte-identical across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;
use thiserror::Error;

use crate::addressing::add_offset;
use crate::policy;
use crate::project::asys::{AutonomousSystem, ISIS_DEFAULT_PROCESS};
use crate::project::vpn::{VpnCustomer, VRF_DOWN_SUFFIX};
use crate::project::{IgpIfConfig, Ixp, Project, Router};
use crate::types::IgpKind;

pub mod generators;

use generators::{
    iso_net, AfBlock, AfNeighbor, BgpNeighbor, BgpVrf, Interface, RouteMapItem, RouterBgp,
    RouterIsis, RouterOspf, RouterOspf6, RpkiBlock, StaticRoute,
};

/// Offset added to the route-distinguisher index of downstream VRFs.
const RD_DOWN_OFFSET: u32 = 100;

/// Error thrown while writing configurations to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A file or directory operation failed.
    #[error("cannot write {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Generate the configuration of every router of the project, keyed by
/// file name.
pub fn generate(project: &Project) -> BTreeMap<String, String> {
    let mut configs = BTreeMap::new();
    for (asn, asys) in &project.ases {
        for router in &asys.routers {
            configs.insert(
                format!("conf_{}_{}", asn.0, router.hostname),
                router_cfg(project, asys, router),
            );
        }
        for vpn in &asys.vpns {
            for cust in &vpn.customers {
                configs.insert(
                    format!("conf_cust_{}", cust.router.hostname),
                    customer_cfg(cust),
                );
            }
        }
    }
    for ixp in &project.ixps {
        configs.insert(
            format!("conf_{}_{}", ixp.asn.0, ixp.route_server.hostname),
            route_server_cfg(ixp),
        );
    }
    configs
}

/// Write all generated configurations into the project config directory.
pub fn write_all(
    project: &Project,
    configs: &BTreeMap<String, String>,
) -> Result<(), ExportError> {
    let dir = project.config_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|source| ExportError::Io { path: dir.display().to_string(), source })?;
    for (name, content) in configs {
        let path = dir.join(name);
        log::debug!("writing {}", path.display());
        std::fs::write(&path, content)
            .map_err(|source| ExportError::Io { path: path.display().to_string(), source })?;
    }
    Ok(())
}

/// Join non-empty sections with `!` separator lines.
fn assemble(sections: Vec<String>) -> String {
    sections
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("!\n")
}

/// Configuration of an internal router.
fn router_cfg(project: &Project, asys: &AutonomousSystem, router: &Router) -> String {
    let mut sections = vec![format!("hostname {}\n", router.hostname)];

    sections.extend(iface_sections(asys, router));

    if asys.igp == IgpKind::Isis {
        if let Some(membership) = router.isis {
            let mut isis = RouterIsis::new(ISIS_DEFAULT_PROCESS);
            isis.net(iso_net(asys.asn, membership.area, router.id))
                .is_type(membership.level);
            sections.push(isis.build());
        }
    }

    if asys.igp == IgpKind::Ospf {
        let mut ospf = RouterOspf::new();
        ospf.router_id(router_id_of(router));
        for net in &router.ospf_networks {
            ospf.network(net.prefix, net.area);
        }
        for area in &asys.ospf_stubs {
            ospf.stub(*area);
        }
        ospf.redistribute("connected");
        sections.push(ospf.build());

        if router.ifaces.iter().any(|i| i.has_v6()) {
            let mut ospf6 = RouterOspf6::new();
            ospf6.router_id(router_id_of(router));
            for iface in &router.ifaces {
                for igp in &iface.igp {
                    if let IgpIfConfig::Ospf { v6: true, area, .. } = igp {
                        ospf6.interface(&iface.name, *area);
                    }
                }
            }
            ospf6.redistribute("connected");
            sections.push(ospf6.build());
        }
    }

    if !asys.bgp_disabled {
        sections.push(bgp_section(asys, router));
        sections.extend(vrf_sections(asys, router));
    }

    sections.extend(static_route_section(asys, router));
    sections.push(route_map_section(router));
    sections.push(rpki_section(project, asys));

    assemble(sections)
}

/// Configuration of a VPN customer-edge router: interfaces and a default
/// route towards the provider edge.
fn customer_cfg(cust: &VpnCustomer) -> String {
    let router = &cust.router;
    let mut sections = vec![format!("hostname {}\n", router.hostname)];

    for iface in &router.ifaces {
        let mut builder = Interface::new(&iface.name);
        builder.description(&iface.description);
        for addr in &iface.addrs {
            builder.ip_address(*addr);
        }
        sections.push(builder.build());
    }
    if !router.loopback.is_empty() {
        let mut lo = Interface::new("lo");
        for addr in &router.loopback {
            lo.ip_address(*addr);
        }
        sections.push(lo.build());
    }

    // reach the backbone through the provider edge
    if let Some(first) = router.ifaces.first().and_then(|i| i.addrs.first()) {
        let pe_addr = add_offset(first.network(), 1);
        let default: IpNet = match first {
            IpNet::V4(_) => "0.0.0.0/0".parse().unwrap(),
            IpNet::V6(_) => "::/0".parse().unwrap(),
        };
        sections.push(StaticRoute::new(default).via(pe_addr).build());
    }

    sections.push(route_map_section(router));
    assemble(sections)
}

/// Configuration of an IXP route server.
fn route_server_cfg(ixp: &Ixp) -> String {
    let router = &ixp.route_server;
    let mut sections = vec![format!("hostname {}\n", router.hostname)];

    for iface in &router.ifaces {
        let mut builder = Interface::new(&iface.name);
        builder.description(&iface.description);
        for addr in &iface.addrs {
            builder.ip_address(*addr);
        }
        sections.push(builder.build());
    }
    let mut lo = Interface::new("lo");
    for addr in &router.loopback {
        lo.ip_address(*addr);
    }
    sections.push(lo.build());

    let mut bgp = RouterBgp::new(ixp.asn);
    bgp.router_id(router_id_of(router));
    let mut af4 = AfBlock::new("ipv4 unicast");
    let mut af6 = AfBlock::new("ipv6 unicast");
    for (addr, nbr) in &router.neighbors {
        let mut session = BgpNeighbor::new(*addr, nbr.remote_as);
        session.update_source(&nbr.update_source);
        if !nbr.conn_check {
            session.disable_connected_check();
        }
        bgp.neighbor(session);
        if nbr.af.ipv4 {
            af4.neighbor(af_neighbor(*addr, nbr));
        }
        if nbr.af.ipv6 {
            af6.neighbor(af_neighbor(*addr, nbr));
        }
    }
    bgp.af(af4).af(af6);
    sections.push(bgp.build());

    sections.push(route_map_section(router));
    assemble(sections)
}

/// The interface blocks of a router, including the loopback.
fn iface_sections(asys: &AutonomousSystem, router: &Router) -> Vec<String> {
    let mut sections = Vec::with_capacity(router.ifaces.len() + 1);

    for iface in &router.ifaces {
        let mut builder = Interface::new(&iface.name);
        if let Some(vrf) = &iface.vrf {
            builder.vrf(vrf);
        }
        builder.description(&iface.description);
        for addr in &iface.addrs {
            builder.ip_address(*addr);
        }
        apply_igp_profiles(&mut builder, &iface.igp);
        if asys.mpls && !iface.external {
            builder.mpls_enable();
        }
        sections.push(builder.build());
    }

    let mut lo = Interface::new("lo");
    for addr in &router.loopback {
        lo.ip_address(*addr);
    }
    if asys.igp == IgpKind::Isis && router.isis.is_some() {
        lo.isis_v4(ISIS_DEFAULT_PROCESS);
        if router.loopback.iter().any(|a| matches!(a, IpNet::V6(_))) {
            lo.isis_v6(ISIS_DEFAULT_PROCESS);
        }
        lo.isis_passive();
    }
    sections.push(lo.build());

    sections
}

/// Translate the IGP profiles of an interface into builder calls. The
/// circuit type and metric of an IS-IS circuit are emitted once, even when
/// both topologies are configured.
fn apply_igp_profiles(builder: &mut Interface, profiles: &[IgpIfConfig]) {
    let mut isis_attrs_done = false;
    for profile in profiles {
        match profile {
            IgpIfConfig::Isis { v6, process, circuit_type, cost } => {
                if *v6 {
                    builder.isis_v6(process);
                } else {
                    builder.isis_v4(process);
                }
                if !isis_attrs_done {
                    builder.isis_circuit_type(*circuit_type);
                    if let Some(cost) = cost {
                        builder.isis_metric(*cost);
                    }
                    isis_attrs_done = true;
                }
            }
            IgpIfConfig::Ospf { v6, cost, .. } => {
                if let Some(cost) = cost {
                    if *v6 {
                        builder.ospf6_cost(*cost);
                    } else {
                        builder.ospf_cost(*cost);
                    }
                }
            }
        }
    }
}

/// The BGP router ID: the IPv4 loopback when present, the first IPv4
/// interface address otherwise, the router ID as a last resort.
fn router_id_of(router: &Router) -> IpAddr {
    if let Some(IpAddr::V4(lo)) = router.lo_addr() {
        return IpAddr::V4(lo);
    }
    router
        .ifaces
        .iter()
        .flat_map(|i| i.addrs.iter())
        .find_map(|a| match a {
            IpNet::V4(n) => Some(IpAddr::V4(n.addr())),
            IpNet::V6(_) => None,
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::from(router.id as u32)))
}

/// The main BGP block of an internal router.
fn bgp_section(asys: &AutonomousSystem, router: &Router) -> String {
    let mut bgp = RouterBgp::new(asys.asn);
    bgp.router_id(router_id_of(router));

    let mut af4 = AfBlock::new("ipv4 unicast");
    let mut af6 = AfBlock::new("ipv6 unicast");
    let mut vpn4 = AfBlock::new("ipv4 vpn");
    let mut vpn6 = AfBlock::new("ipv6 vpn");

    if let Some(pool) = &asys.network {
        if pool.is4() {
            af4.network(pool.parent());
        } else {
            af6.network(pool.parent());
        }
    }
    if asys.redistribute_igp {
        let proto = match asys.igp {
            IgpKind::Ospf => Some("ospf"),
            IgpKind::Isis => Some("isis"),
            IgpKind::None => None,
        };
        if let Some(proto) = proto {
            af4.redistribute(proto);
        }
    }

    for (addr, nbr) in &router.neighbors {
        let mut session = BgpNeighbor::new(*addr, nbr.remote_as);
        session.update_source(&nbr.update_source);
        if !nbr.conn_check {
            session.disable_connected_check();
        }
        bgp.neighbor(session);

        if nbr.af.ipv4 {
            af4.neighbor(af_neighbor(*addr, nbr));
        }
        if nbr.af.ipv6 {
            af6.neighbor(af_neighbor(*addr, nbr));
        }
        if nbr.af.vpnv4 {
            vpn4.neighbor(AfNeighbor::new(*addr));
        }
        if nbr.af.vpnv6 {
            vpn6.neighbor(AfNeighbor::new(*addr));
        }
    }

    bgp.af(af4).af(af6).af(vpn4).af(vpn6);
    bgp.build()
}

/// The per-AF lines of a neighbor.
fn af_neighbor(addr: IpAddr, nbr: &crate::project::BgpNbr) -> AfNeighbor {
    let mut n = AfNeighbor::new(addr);
    if nbr.next_hop_self {
        n.next_hop_self();
    }
    if nbr.rr_client {
        n.route_reflector_client();
    }
    if nbr.rs_client {
        n.route_server_client();
    }
    for map in &nbr.route_maps_in {
        n.route_map(map, "in");
    }
    for map in &nbr.route_maps_out {
        n.route_map(map, "out");
    }
    n
}

/// The VRF-scoped BGP blocks of the VPNs this router is a provider edge
/// for.
fn vrf_sections(asys: &AutonomousSystem, router: &Router) -> Vec<String> {
    let mut sections = Vec::new();
    let idx = router.id - 1;
    for (vpn_idx, vpn) in asys.vpns.iter().enumerate() {
        if !vpn.customers.iter().any(|c| c.parent == idx) {
            continue;
        }
        let v6 = vpn
            .customers
            .first()
            .and_then(|c| c.router.ifaces.first())
            .and_then(|i| i.addrs.first())
            .map(|a| matches!(a, IpNet::V6(_)))
            .unwrap_or(false);
        let mut vrf = BgpVrf::new(asys.asn, &vpn.vrf, vpn_idx as u32 + 1);
        if v6 {
            vrf.v6();
        }
        vrf.redistribute("connected");
        sections.push(vrf.build());

        let hub_here = vpn
            .customers
            .iter()
            .any(|c| c.hub && c.parent == idx);
        if vpn.hub_mode && hub_here {
            let mut down = BgpVrf::new(
                asys.asn,
                format!("{}{}", vpn.vrf, VRF_DOWN_SUFFIX),
                RD_DOWN_OFFSET + vpn_idx as u32 + 1,
            );
            if v6 {
                down.v6();
            }
            down.redistribute("connected").redistribute("static");
            sections.push(down.build());
        }
    }
    sections
}

/// The static routes of a router: in hub mode, the provider edge of the
/// hub reaches every spoke subnet through the hub site on the downstream
/// VRF.
fn static_route_section(asys: &AutonomousSystem, router: &Router) -> Vec<String> {
    let mut routes = Vec::new();
    let idx = router.id - 1;
    for vpn in &asys.vpns {
        if !vpn.hub_mode {
            continue;
        }
        if !vpn.customers.iter().any(|c| c.hub && c.parent == idx) {
            continue;
        }
        let Some(gateway) = vpn.hub_gateway else { continue };
        for subnet in &vpn.spoke_subnets {
            routes.push(
                StaticRoute::new(*subnet)
                    .via(gateway)
                    .vrf(format!("{}{}", vpn.vrf, VRF_DOWN_SUFFIX))
                    .build(),
            );
        }
    }
    routes
}

/// The route-map definitions: the full standard set (carrying the
/// local-preference scheme), followed by any custom maps referenced by the
/// neighbors of this router.
fn route_map_section(router: &Router) -> String {
    let mut section = String::new();
    for name in policy::STANDARD_MAPS {
        let mut item = RouteMapItem::new(name, 10, true);
        if let Some(pref) = policy::local_pref(name) {
            item.set_local_pref(pref);
        }
        section.push_str(&item.build());
    }

    let customs: BTreeSet<&String> = router
        .neighbors
        .values()
        .flat_map(|n| n.route_maps_in.iter().chain(n.route_maps_out.iter()))
        .filter(|m| !policy::STANDARD_MAPS.contains(&m.as_str()))
        .collect();
    for name in customs {
        section.push_str(&RouteMapItem::new(name, 10, true).build());
    }
    section
}

/// The RPKI client block of an AS.
fn rpki_section(project: &Project, asys: &AutonomousSystem) -> String {
    let mut block = RpkiBlock::new();
    for name in &asys.rpki_servers {
        // unknown names are rejected at load time
        if let Some(server) = project.rpki.get(name) {
            block.cache(server.ip, server.port);
        }
    }
    block.build()
}
