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

//! The external fabric: inter-AS links with policy derived from the
//! declared commercial relationships, and IXP peering LANs where every
//! member peers with the route server only.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::addressing::{add_offset, AddrPool};
use crate::config::{ExternalEndpointConfig, ExternalLinkConfig, IxpConfig};
use crate::policy;
use crate::types::{AddressFamily, AsId, Relation, RouterRef};

use super::router::{link_iface, BgpNbr, Link, LinkItem, Router};
use super::{CompileError, Project};

/// One endpoint of a materialized inter-AS link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtEndpoint {
    /// The AS of the endpoint.
    pub asn: AsId,
    /// The endpoint router.
    pub router: RouterRef,
    /// Index of the interface facing the link.
    pub iface: usize,
    /// Relation towards the remote AS, from this endpoint's viewpoint.
    pub relation: Option<Relation>,
}

/// A link between two routers of different ASes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    /// The endpoint holding the `.1` address.
    pub from: ExtEndpoint,
    /// The endpoint holding the `.2` address.
    pub to: ExtEndpoint,
}

/// A materialized internet exchange point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ixp {
    /// The AS of the exchange.
    pub asn: AsId,
    /// The shared LAN prefix.
    pub prefix: IpNet,
    /// The route server.
    pub route_server: Router,
    /// The member routers.
    pub members: Vec<RouterRef>,
    /// Member-to-route-server links of the shared LAN.
    pub links: Vec<Link>,
}

/// Build all declared inter-AS links. Links without a declared subnet draw
/// from the shared external pool.
pub fn build_external(
    project: &mut Project,
    cfgs: &[ExternalLinkConfig],
    shared_pool: &mut AddrPool,
) -> Result<(), CompileError> {
    for cfg in cfgs {
        let (addr_from, addr_to) = match cfg.subnet {
            Some(subnet) => {
                let len = subnet.prefix_len();
                (
                    IpNet::new(add_offset(subnet.network(), 1), len).unwrap(),
                    IpNet::new(add_offset(subnet.network(), 2), len).unwrap(),
                )
            }
            None => shared_pool.next_link_ips()?,
        };

        let from_ref = RouterRef::Internal(AsId(cfg.from.asn), cfg.from.router_id - 1);
        let to_ref = RouterRef::Internal(AsId(cfg.to.asn), cfg.to.router_id - 1);

        // the session is v6 as soon as one of the two internal networks is
        let link_is4 = matches!(addr_from, IpNet::V4(_));
        let both_as4 = project.ases[&AsId(cfg.from.asn)].is4()
            && project.ases[&AsId(cfg.to.asn)].is4();
        let af = AddressFamily {
            ipv4: link_is4 || both_as4,
            ipv6: !link_is4 || !both_as4,
            ..Default::default()
        };

        let iface_from = attach_endpoint(project, from_ref, to_ref, addr_from, cfg.speed)?;
        let iface_to = attach_endpoint(project, to_ref, from_ref, addr_to, cfg.speed)?;

        insert_neighbor(project, &cfg.from, from_ref, to_ref, addr_to, af, iface_from);
        insert_neighbor(project, &cfg.to, to_ref, from_ref, addr_from, af, iface_to);

        project.external.push(ExternalLink {
            from: ExtEndpoint {
                asn: AsId(cfg.from.asn),
                router: from_ref,
                iface: iface_from,
                relation: cfg.from.relation,
            },
            to: ExtEndpoint {
                asn: AsId(cfg.to.asn),
                router: to_ref,
                iface: iface_to,
                relation: cfg.to.relation,
            },
        });
    }
    Ok(())
}

/// Create the boundary interface of one endpoint and return its index.
fn attach_endpoint(
    project: &mut Project,
    local: RouterRef,
    remote: RouterRef,
    addr: IpNet,
    speed: Option<u32>,
) -> Result<usize, CompileError> {
    let remote_hostname = project.router(remote).hostname.clone();
    let mut iface = link_iface(
        format!("linked to {} ({remote_hostname})", remote_as_of(remote)),
        addr,
        speed,
    );
    iface.external = true;
    Ok(project.router_mut(local).push_iface(iface))
}

fn remote_as_of(r: RouterRef) -> AsId {
    match r {
        RouterRef::Internal(asn, _) | RouterRef::Customer(asn, _, _) => asn,
        RouterRef::RouteServer(_) => unreachable!("external links never end at a route server"),
    }
}

/// Insert the BGP neighbor record of one endpoint. The peer is keyed by its
/// loopback when it has one, by the link address otherwise; the update
/// source is the loopback when the local side has one.
fn insert_neighbor(
    project: &mut Project,
    end: &ExternalEndpointConfig,
    local: RouterRef,
    remote: RouterRef,
    remote_link_addr: IpNet,
    af: AddressFamily,
    iface_idx: usize,
) {
    let (peer_addr, peer_len) = match project.router(remote).lo_info() {
        Some((addr, len)) => (addr, len),
        None => (remote_link_addr.addr(), remote_link_addr.prefix_len()),
    };
    let remote_as = remote_as_of(remote);
    let (maps_in, maps_out) =
        policy::route_maps(end.relation, &end.route_maps_in, &end.route_maps_out);

    let local_router = project.router_mut(local);
    let if_name = local_router.ifaces[iface_idx].name.clone();
    let update_source = if local_router.loopback.is_empty() {
        if_name.clone()
    } else {
        "lo".to_string()
    };
    local_router.neighbors.insert(
        peer_addr,
        BgpNbr {
            remote_as,
            update_source,
            conn_check: false,
            next_hop_self: false,
            if_name,
            route_maps_in: maps_in,
            route_maps_out: maps_out,
            af,
            rr_client: false,
            rs_client: false,
            peer_prefix_len: peer_len,
        },
    );
}

/// Build all IXPs: one route server per exchange, one shared LAN, and one
/// session per member towards the route server.
pub fn build_ixps(project: &mut Project, cfgs: &[IxpConfig]) -> Result<(), CompileError> {
    for (ixp_idx, cfg) in cfgs.iter().enumerate() {
        let asn = AsId(cfg.asn);
        let lan_len = cfg.prefix.prefix_len();
        let mut pool = AddrPool::hosts(cfg.prefix);

        let rs_addr = IpNet::new(pool.next_ip().addr(), lan_len).unwrap();
        let mut route_server = Router::new(1, "RS", format!("{asn}-RS"));
        route_server
            .loopback
            .push(IpNet::new(rs_addr.addr(), cfg.prefix.max_prefix_len()).unwrap());
        let mut rs_iface = link_iface("IXP fabric".to_string(), rs_addr, None);
        rs_iface.external = true;
        route_server.push_iface(rs_iface);

        let af = match cfg.prefix {
            IpNet::V4(_) => AddressFamily { ipv4: true, ..Default::default() },
            IpNet::V6(_) => AddressFamily { ipv6: true, ..Default::default() },
        };
        let (allow_in, allow_out) = policy::route_maps(None, &[], &[]);

        let mut members = Vec::with_capacity(cfg.members.len());
        let mut links = Vec::with_capacity(cfg.members.len());
        for member in &cfg.members {
            let member_ref = RouterRef::Internal(AsId(member.asn), member.router_id - 1);
            let member_addr = IpNet::new(pool.next_ip().addr(), lan_len).unwrap();

            let member_router = project.router_mut(member_ref);
            let mut iface = link_iface(format!("linked to {asn} (RS)"), member_addr, None);
            iface.external = true;
            let iface_idx = member_router.push_iface(iface);
            let if_name = member_router.ifaces[iface_idx].name.clone();
            let update_source = if member_router.loopback.is_empty() {
                if_name.clone()
            } else {
                "lo".to_string()
            };
            member_router.neighbors.insert(
                rs_addr.addr(),
                BgpNbr {
                    remote_as: asn,
                    update_source,
                    conn_check: false,
                    next_hop_self: false,
                    if_name,
                    route_maps_in: allow_in.clone(),
                    route_maps_out: allow_out.clone(),
                    af,
                    rr_client: false,
                    rs_client: false,
                    peer_prefix_len: lan_len,
                },
            );

            route_server.neighbors.insert(
                member_addr.addr(),
                BgpNbr {
                    remote_as: AsId(member.asn),
                    update_source: "lo".to_string(),
                    conn_check: false,
                    next_hop_self: false,
                    if_name: "eth0".to_string(),
                    route_maps_in: allow_in.clone(),
                    route_maps_out: allow_out.clone(),
                    af,
                    rr_client: false,
                    rs_client: true,
                    peer_prefix_len: lan_len,
                },
            );

            links.push(Link {
                first: LinkItem { router: RouterRef::RouteServer(ixp_idx), iface: 0 },
                second: LinkItem { router: member_ref, iface: iface_idx },
            });
            members.push(member_ref);
        }

        project.ixps.push(Ixp {
            asn,
            prefix: cfg.prefix,
            route_server,
            members,
            links,
        });
    }
    Ok(())
}
