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

//! Builder for a single autonomous system: routers, loopbacks, IGP
//! membership, intra-AS links, reserved subnets, the IBGP mesh, VPN
//! customers and hosts, in deterministic declaration order.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::addressing::{add_offset, AddrPool};
use crate::config::{AsConfig, BgpConfig};
use crate::types::{AddressFamily, AsId, IgpKind, RouterRef};

use super::router::{
    link_iface, BgpNbr, IgpIfConfig, IsisMembership, Link, LinkItem, NetInterface, OspfNet,
    Router, DEFAULT_SPEED,
};
use super::vpn::{self, Vpn};
use super::CompileError;

/// Default IS-IS process name.
pub const ISIS_DEFAULT_PROCESS: &str = "1";
/// Default OSPF process ID.
pub const OSPF_DEFAULT_PROCESS: u32 = 1;

/// A host container attached to a router of the AS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Short hostname.
    pub hostname: String,
    /// Container name (`AS<ASN>-<hostname>`).
    pub container_name: String,
    /// Docker image overriding the default host image.
    pub image: Option<String>,
    /// The single interface of the host.
    pub iface: NetInterface,
    /// Default gateway (the router-side address).
    pub gateway: IpAddr,
}

/// A link between a router and a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostLink {
    /// Router side of the link.
    pub router: LinkItem,
    /// Index of the host in [`AutonomousSystem::hosts`].
    pub host: usize,
}

/// A fully materialized autonomous system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomousSystem {
    /// The AS number.
    pub asn: AsId,
    /// The IGP run inside the AS.
    pub igp: IgpKind,
    /// MPLS label switching on internal interfaces.
    pub mpls: bool,
    /// Docker image used for all routers of the AS.
    pub image: Option<String>,
    /// The internal address pool, if configured.
    pub network: Option<AddrPool>,
    /// The routers, indexed by `id - 1`.
    pub routers: Vec<Router>,
    /// Intra-AS links (including PE-CE links of the VPNs).
    pub links: Vec<Link>,
    /// Hosts of the AS.
    pub hosts: Vec<Host>,
    /// Router-host links.
    pub host_links: Vec<HostLink>,
    /// L3 VPNs terminated in the AS.
    pub vpns: Vec<Vpn>,
    /// Redistribute the IGP into BGP.
    pub redistribute_igp: bool,
    /// BGP is disabled for the whole AS.
    pub bgp_disabled: bool,
    /// OSPF stub areas.
    pub ospf_stubs: Vec<u32>,
    /// Names of RPKI servers this AS is a client of.
    pub rpki_servers: Vec<String>,
}

impl AutonomousSystem {
    /// `true` iff the internal network of the AS is IPv4 (defaults to
    /// `true` when no pool is configured).
    pub fn is4(&self) -> bool {
        self.network.as_ref().map(|p| p.is4()).unwrap_or(true)
    }

    /// Number of containers of this AS (routers plus VPN customers).
    pub fn total_containers(&self) -> usize {
        self.routers.len() + self.vpns.iter().map(|v| v.customers.len()).sum::<usize>()
    }

    /// The router with the given 1-based ID.
    pub fn router(&self, id: usize) -> &Router {
        &self.routers[id - 1]
    }
}

/// Materialize one AS from its declaration. `bgp` is the effective BGP
/// profile (global defaults already merged).
pub fn build(cfg: &AsConfig, bgp: &BgpConfig) -> Result<AutonomousSystem, CompileError> {
    let asn = AsId(cfg.asn);
    log::debug!("generating {} routers for {}", cfg.num_routers, asn);

    let mut asys = AutonomousSystem {
        asn,
        igp: cfg.igp,
        mpls: cfg.mpls,
        image: cfg.image.clone(),
        network: cfg
            .prefix
            .map(|p| {
                AddrPool::new(
                    p,
                    (cfg.subnet_length >= 0).then_some(cfg.subnet_length as u8),
                )
            })
            .transpose()?,
        routers: Vec::with_capacity(cfg.num_routers),
        links: Vec::new(),
        hosts: Vec::new(),
        host_links: Vec::new(),
        vpns: Vec::new(),
        redistribute_igp: bgp.redistribute_igp,
        bgp_disabled: bgp.disabled,
        ospf_stubs: cfg.ospf.stubs.clone(),
        rpki_servers: cfg.rpki.servers.clone(),
    };

    build_routers(&mut asys, cfg);
    build_links(&mut asys, cfg)?;

    for reserved in &cfg.reserved_subnets {
        if let Some(pool) = asys.network.as_mut() {
            pool.reserve(*reserved)?;
        }
    }

    if !asys.bgp_disabled {
        if cfg.bgp.ibgp.manual {
            build_ibgp_reflection(&mut asys, &cfg.bgp.ibgp.reflectors);
        } else {
            build_ibgp_full_mesh(&mut asys);
        }
    }

    vpn::build(&mut asys, &cfg.vpn)?;
    vpn::activate_vpn_afs(&mut asys);
    build_hosts(&mut asys, cfg)?;

    Ok(asys)
}

/// Create the routers with their loopbacks and IGP membership.
fn build_routers(asys: &mut AutonomousSystem, cfg: &AsConfig) {
    let mut lo_pool = cfg.lo_range.map(AddrPool::hosts);
    for i in 0..cfg.num_routers {
        let id = i + 1;
        let hostname = format!("R{id}");
        let container_name = format!("{}-{}", asys.asn, hostname);
        let mut router = Router::new(id, hostname, container_name);
        router.custom_image = cfg.image.clone();

        if let Some(pool) = lo_pool.as_mut() {
            router.loopback.push(pool.next_ip());
        }

        if cfg.igp == IgpKind::Isis {
            router.isis = Some(IsisMembership {
                level: cfg.isis.level_of(id),
                area: cfg.isis.area_of(id),
            });
        }

        asys.routers.push(router);
    }

    if cfg.igp == IgpKind::Ospf {
        for net in &cfg.ospf.networks {
            for id in &net.routers {
                asys.routers[id - 1]
                    .ospf_networks
                    .push(OspfNet { prefix: net.prefix, area: net.area });
            }
        }
    }
}

/// Allocate a subnet per declared intra-AS link and wire the interfaces.
fn build_links(asys: &mut AutonomousSystem, cfg: &AsConfig) -> Result<(), CompileError> {
    for lnk in &cfg.links {
        let pool = asys
            .network
            .as_mut()
            .ok_or(CompileError::MissingPool { asn: cfg.asn })?;
        let (addr_a, addr_b) = pool.next_link_ips()?;

        let (host_a, host_b) =
            (asys.routers[lnk.first - 1].hostname.clone(), asys.routers[lnk.second - 1].hostname.clone());

        let idx_a = push_internal_iface(asys, lnk.first, &host_b, addr_a, lnk, cfg);
        let idx_b = push_internal_iface(asys, lnk.second, &host_a, addr_b, lnk, cfg);

        asys.links.push(Link {
            first: LinkItem { router: RouterRef::Internal(asys.asn, lnk.first - 1), iface: idx_a },
            second: LinkItem { router: RouterRef::Internal(asys.asn, lnk.second - 1), iface: idx_b },
        });
    }
    Ok(())
}

fn push_internal_iface(
    asys: &mut AutonomousSystem,
    id: usize,
    peer_hostname: &str,
    addr: IpNet,
    lnk: &crate::config::InternalLinkConfig,
    cfg: &AsConfig,
) -> usize {
    let igp = igp_profiles(&asys.routers[id - 1], cfg.igp, addr, lnk.cost);
    let description = lnk
        .description
        .clone()
        .unwrap_or_else(|| format!("linked to {peer_hostname}"));
    let mut iface = link_iface(description, addr, lnk.speed);
    iface.igp = igp;
    asys.routers[id - 1].push_iface(iface)
}

/// The IGP profiles of an internal interface: the v4 profile of the AS IGP,
/// plus a v6 profile when the link subnet is IPv6.
fn igp_profiles(
    router: &Router,
    igp: IgpKind,
    addr: IpNet,
    cost: Option<u32>,
) -> Vec<IgpIfConfig> {
    let v6 = matches!(addr, IpNet::V6(_));
    match igp {
        IgpKind::None => Vec::new(),
        IgpKind::Isis => {
            let circuit_type = router.isis.map(|m| m.level).unwrap_or(1);
            let mut profiles = vec![IgpIfConfig::Isis {
                v6: false,
                process: ISIS_DEFAULT_PROCESS.to_string(),
                circuit_type,
                cost,
            }];
            if v6 {
                profiles.push(IgpIfConfig::Isis {
                    v6: true,
                    process: ISIS_DEFAULT_PROCESS.to_string(),
                    circuit_type,
                    cost,
                });
            }
            profiles
        }
        IgpKind::Ospf => {
            let area = router
                .ospf_networks
                .iter()
                .find(|n| n.prefix.contains(&addr.addr()))
                .map(|n| n.area)
                .unwrap_or(0);
            vec![IgpIfConfig::Ospf { v6, process_id: OSPF_DEFAULT_PROCESS, area, cost }]
        }
    }
}

/// Synthesize the automatic IBGP full mesh: every ordered pair of routers
/// peers over the loopbacks.
fn build_ibgp_full_mesh(asys: &mut AutonomousSystem) {
    let loopbacks: Vec<Option<IpNet>> =
        asys.routers.iter().map(|r| r.loopback.first().copied()).collect();
    for i in 0..asys.routers.len() {
        for (j, lo) in loopbacks.iter().enumerate() {
            if i == j {
                continue;
            }
            let Some(lo) = lo else { continue };
            let (key, nbr) = ibgp_neighbor(asys.asn, *lo, false);
            asys.routers[i].neighbors.insert(key, nbr);
        }
    }
}

/// Synthesize the route-reflected IBGP mesh: every non-reflector peers with
/// every reflector (marked as client on the reflector side), and the
/// reflectors mesh among themselves.
fn build_ibgp_reflection(asys: &mut AutonomousSystem, reflectors: &[usize]) {
    let loopbacks: Vec<Option<IpNet>> =
        asys.routers.iter().map(|r| r.loopback.first().copied()).collect();
    for rr in reflectors {
        let rr_idx = rr - 1;
        for j in 0..asys.routers.len() {
            if j == rr_idx {
                continue;
            }
            let is_rr_peer = reflectors.contains(&(j + 1));
            if let Some(lo) = loopbacks[j] {
                let (key, nbr) = ibgp_neighbor(asys.asn, lo, !is_rr_peer);
                asys.routers[rr_idx].neighbors.insert(key, nbr);
            }
            if let Some(lo) = loopbacks[rr_idx] {
                let (key, nbr) = ibgp_neighbor(asys.asn, lo, false);
                asys.routers[j].neighbors.insert(key, nbr);
            }
        }
    }
}

/// The neighbor record of an IBGP session towards the given loopback.
fn ibgp_neighbor(asn: AsId, lo: IpNet, rr_client: bool) -> (IpAddr, BgpNbr) {
    let af = match lo {
        IpNet::V4(_) => AddressFamily { ipv4: true, ..Default::default() },
        IpNet::V6(_) => AddressFamily { ipv6: true, ..Default::default() },
    };
    (
        lo.addr(),
        BgpNbr {
            remote_as: asn,
            update_source: "lo".to_string(),
            conn_check: true,
            next_hop_self: false,
            if_name: "lo".to_string(),
            route_maps_in: Vec::new(),
            route_maps_out: Vec::new(),
            af,
            rr_client,
            rs_client: false,
            peer_prefix_len: lo.prefix_len(),
        },
    )
}

/// Attach the declared hosts to their routers.
fn build_hosts(asys: &mut AutonomousSystem, cfg: &AsConfig) -> Result<(), CompileError> {
    for host_cfg in &cfg.hosts {
        let (router_addr, host_addr) = match host_cfg.subnet {
            Some(subnet) => {
                let len = subnet.prefix_len();
                (
                    IpNet::new(add_offset(subnet.network(), 1), len).unwrap(),
                    IpNet::new(add_offset(subnet.network(), 2), len).unwrap(),
                )
            }
            None => asys
                .network
                .as_mut()
                .ok_or(CompileError::MissingPool { asn: cfg.asn })?
                .next_link_ips()?,
        };

        let router_idx = host_cfg.router - 1;
        let iface_idx = asys.routers[router_idx].push_iface(link_iface(
            format!("linked to host {}", host_cfg.hostname),
            router_addr,
            None,
        ));

        let host_idx = asys.hosts.len();
        asys.hosts.push(Host {
            hostname: host_cfg.hostname.clone(),
            container_name: format!("{}-{}", asys.asn, host_cfg.hostname),
            image: host_cfg.image.clone(),
            iface: NetInterface {
                name: "eth0".to_string(),
                description: format!("linked to {}", asys.routers[router_idx].hostname),
                addrs: vec![host_addr],
                igp: Vec::new(),
                speed: DEFAULT_SPEED,
                external: false,
                vrf: None,
            },
            gateway: router_addr.addr(),
        });
        asys.host_links.push(HostLink {
            router: LinkItem {
                router: RouterRef::Internal(asys.asn, router_idx),
                iface: iface_idx,
            },
            host: host_idx,
        });
    }
    Ok(())
}
