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

//! L3 VPN customer attachment: one customer-edge router per site, a
//! point-to-point link into the parent provider-edge router tagged with the
//! VRF, and in hub mode a second downstream link on the hub carrying the
//! hairpinned spoke traffic.

use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::addressing::add_offset;
use crate::config::VpnConfig;
use crate::types::RouterRef;

use super::asys::AutonomousSystem;
use super::router::{link_iface, Link, LinkItem, Router};
use super::CompileError;

/// Suffix of the VRF holding the hub's downstream direction.
pub const VRF_DOWN_SUFFIX: &str = "_down";

/// One customer site of a VPN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnCustomer {
    /// The customer-edge router.
    pub router: Router,
    /// Index of the parent (provider-edge) router in the AS.
    pub parent: usize,
    /// This site is the hub.
    pub hub: bool,
}

/// A materialized L3 VPN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpn {
    /// VRF name on the provider-edge routers.
    pub vrf: String,
    /// Hub-and-spoke mode.
    pub hub_mode: bool,
    /// The customer sites.
    pub customers: Vec<VpnCustomer>,
    /// Loopbacks of the provider-edge routers carrying this VPN; these
    /// sessions get the VPN address family activated.
    pub neighbors: BTreeSet<IpAddr>,
    /// Hub mode: the remote subnets behind the spokes.
    pub spoke_subnets: Vec<IpNet>,
    /// Hub mode: the customer-edge address of the downstream link, next hop
    /// of the spoke subnets.
    pub hub_gateway: Option<IpAddr>,
}

/// First and second host of a declared point-to-point subnet, carrying the
/// declared prefix length.
fn p2p_addrs(subnet: IpNet) -> (IpNet, IpNet) {
    let len = subnet.prefix_len();
    (
        IpNet::new(add_offset(subnet.network(), 1), len).unwrap(),
        IpNet::new(add_offset(subnet.network(), 2), len).unwrap(),
    )
}

/// Materialize the VPNs of an AS. The provider-edge interface takes the
/// first host of the declared customer subnet, the customer edge the
/// second; PE-CE links ride the internal bridge of the AS.
pub fn build(asys: &mut AutonomousSystem, cfgs: &[VpnConfig]) -> Result<(), CompileError> {
    for (vpn_idx, cfg) in cfgs.iter().enumerate() {
        let mut vpn = Vpn {
            vrf: cfg.vrf.clone(),
            hub_mode: cfg.hub_mode,
            customers: Vec::with_capacity(cfg.customers.len()),
            neighbors: BTreeSet::new(),
            spoke_subnets: Vec::new(),
            hub_gateway: None,
        };

        for (cust_idx, cust) in cfg.customers.iter().enumerate() {
            let parent_idx = cust.parent - 1;
            let mut ce = Router::new(
                cust_idx + 1,
                cust.hostname.clone(),
                format!("{}-Cust-{}", asys.asn, cust.hostname),
            );
            if let Some(lo) = cust.loopback {
                ce.loopback.push(lo);
            }

            let (pe_addr, ce_addr) = p2p_addrs(cust.subnet);
            let mut pe_iface = link_iface(
                format!("linked to customer {}", cust.hostname),
                pe_addr,
                None,
            );
            pe_iface.external = true; // not exactly part of the AS
            pe_iface.vrf = Some(cfg.vrf.clone());
            let pe_idx = asys.routers[parent_idx].push_iface(pe_iface);
            let ce_idx = ce.push_iface(link_iface(
                format!("linked to {}", asys.routers[parent_idx].hostname),
                ce_addr,
                None,
            ));
            asys.links.push(Link {
                first: LinkItem {
                    router: RouterRef::Internal(asys.asn, parent_idx),
                    iface: pe_idx,
                },
                second: LinkItem {
                    router: RouterRef::Customer(asys.asn, vpn_idx, cust_idx),
                    iface: ce_idx,
                },
            });

            if cfg.hub_mode && !cust.hub {
                // declared remote subnet of the spoke, validated at load time
                if let Some(remote) = cust.remote_subnet {
                    vpn.spoke_subnets.push(remote);
                }
            }

            if cfg.hub_mode && cust.hub {
                if let Some(down) = cust.subnet_down {
                    let (pe_down, ce_down) = p2p_addrs(down);
                    let mut pe_iface = link_iface(
                        format!("linked to customer {} (downstream)", cust.hostname),
                        pe_down,
                        None,
                    );
                    pe_iface.external = true;
                    pe_iface.vrf = Some(format!("{}{}", cfg.vrf, VRF_DOWN_SUFFIX));
                    let pe_idx = asys.routers[parent_idx].push_iface(pe_iface);
                    let ce_idx = ce.push_iface(link_iface(
                        format!(
                            "linked to {} (downstream)",
                            asys.routers[parent_idx].hostname
                        ),
                        ce_down,
                        None,
                    ));
                    asys.links.push(Link {
                        first: LinkItem {
                            router: RouterRef::Internal(asys.asn, parent_idx),
                            iface: pe_idx,
                        },
                        second: LinkItem {
                            router: RouterRef::Customer(asys.asn, vpn_idx, cust_idx),
                            iface: ce_idx,
                        },
                    });
                    vpn.hub_gateway = Some(ce_down.addr());
                }
            }

            if let Some(lo) = asys.routers[parent_idx].lo_addr() {
                vpn.neighbors.insert(lo);
            }

            vpn.customers.push(VpnCustomer { router: ce, parent: parent_idx, hub: cust.hub });
        }

        asys.vpns.push(vpn);
    }
    Ok(())
}

/// Activate the VPN address family on every IBGP session between two
/// provider-edge routers that carry a VPN.
pub fn activate_vpn_afs(asys: &mut AutonomousSystem) {
    let sessions: Vec<(usize, IpAddr, bool)> = asys
        .vpns
        .iter()
        .flat_map(|vpn| {
            vpn.neighbors.iter().flat_map(move |a| {
                vpn.neighbors
                    .iter()
                    .filter(move |b| *b != a)
                    .map(move |b| (*a, *b))
            })
        })
        .flat_map(|(a, b)| {
            asys.routers
                .iter()
                .enumerate()
                .filter(move |(_, r)| r.lo_addr() == Some(a))
                .map(move |(i, _)| (i, b, b.is_ipv6()))
        })
        .collect();

    for (router_idx, peer, v6) in sessions {
        if let Some(nbr) = asys.routers[router_idx].neighbors.get_mut(&peer) {
            if v6 {
                nbr.af.vpnv6 = true;
            } else {
                nbr.af.vpnv4 = true;
            }
        }
    }
}
