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

//! The bridge plan: deterministic bridge names and OpenFlow port numbers
//! for every link of the resolved graph, grouped by container. The plan is
//! built fully before handoff to the switch driver; the driver fills in
//! the host-side interface names while attaching ports.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use ipnet::IpNet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::project::{Link, Project};
use crate::types::AsId;

/// The kind of fabric a bridge carries, deciding its application order and
/// the `--links` filter it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeKind {
    /// Intra-AS fabric (`int-<ASN>`); applied first.
    Internal,
    /// Router-host fabric (`AS<ASN>-<router>-<host>`).
    Host,
    /// Inter-AS fabric (`ext-...`).
    External,
    /// IXP shared LAN (`ixp-<ASN>`).
    Ixp,
}

/// A static route installed in a container next to a port (host default
/// gateways).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRoute {
    /// The routed prefix.
    pub prefix: IpNet,
    /// The next hop.
    pub via: IpAddr,
    /// The interface the route points out of.
    pub ifname: String,
}

/// One container-to-bridge attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRecord {
    /// The bridge the port attaches to.
    pub bridge: String,
    /// The fabric kind of the bridge.
    pub kind: BridgeKind,
    /// Interface name inside the container.
    pub ifname: String,
    /// Host-side interface name; filled in by the switch driver.
    pub host_ifname: Option<String>,
    /// The OpenFlow port number on the bridge.
    pub of_port: u32,
    /// Nominal speed in Mb/s.
    pub speed: u32,
    /// VRF the interface is bound to.
    pub vrf: Option<String>,
    /// Address to configure on the interface (host endpoints; router
    /// addresses come from the FRR configuration).
    pub ip: Option<IpNet>,
    /// Static routes to install (host default gateways).
    pub routes: Vec<PortRoute>,
}

/// The full bridge plan, mapping container names to their ordered port
/// records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgePlan(pub BTreeMap<String, Vec<PortRecord>>);

impl BridgePlan {
    /// Build the plan for a compiled project. Ports are numbered
    /// monotonically from 1 per bridge, in link iteration order.
    pub fn build(project: &Project) -> Self {
        let mut plan = Self::default();

        for (asn, asys) in &project.ases {
            let bridge = internal_bridge(*asn);
            let mut of_port = 1;
            for link in &asys.links {
                for item in [&link.first, &link.second] {
                    plan.record_link_item(project, &bridge, BridgeKind::Internal, item, of_port);
                    of_port += 1;
                }
            }
        }

        for (asn, asys) in &project.ases {
            for hl in &asys.host_links {
                let host = &asys.hosts[hl.host];
                let router = project.router(hl.router.router);
                let bridge = host_bridge(*asn, &router.hostname, &host.hostname);
                plan.record_link_item(project, &bridge, BridgeKind::Host, &hl.router, 1);
                plan.push(
                    host.container_name.clone(),
                    PortRecord {
                        bridge,
                        kind: BridgeKind::Host,
                        ifname: host.iface.name.clone(),
                        host_ifname: None,
                        of_port: 2,
                        speed: host.iface.speed,
                        vrf: None,
                        ip: host.iface.addrs.first().copied(),
                        routes: vec![PortRoute {
                            prefix: default_route_of(&host.iface.addrs[0]),
                            via: host.gateway,
                            ifname: host.iface.name.clone(),
                        }],
                    },
                );
            }
        }

        for ext in &project.external {
            let bridge = external_bridge(
                ext.from.asn,
                &project.router(ext.from.router).hostname,
                ext.to.asn,
                &project.router(ext.to.router).hostname,
            );
            for (of_port, (router, iface)) in
                [(ext.from.router, ext.from.iface), (ext.to.router, ext.to.iface)]
                    .into_iter()
                    .enumerate()
            {
                let r = project.router(router);
                let iface = &r.ifaces[iface];
                plan.push(
                    r.container_name.clone(),
                    PortRecord {
                        bridge: bridge.clone(),
                        kind: BridgeKind::External,
                        ifname: iface.name.clone(),
                        host_ifname: None,
                        of_port: of_port as u32 + 1,
                        speed: iface.speed,
                        vrf: iface.vrf.clone(),
                        ip: None,
                        routes: Vec::new(),
                    },
                );
            }
        }

        for ixp in &project.ixps {
            let bridge = ixp_bridge(ixp.asn);
            let mut of_port = 1;
            // the route server is on the fabric once, members once each
            plan.push(
                ixp.route_server.container_name.clone(),
                PortRecord {
                    bridge: bridge.clone(),
                    kind: BridgeKind::Ixp,
                    ifname: ixp.route_server.ifaces[0].name.clone(),
                    host_ifname: None,
                    of_port,
                    speed: ixp.route_server.ifaces[0].speed,
                    vrf: None,
                    ip: None,
                    routes: Vec::new(),
                },
            );
            for link in &ixp.links {
                of_port += 1;
                plan.record_link_item(project, &bridge, BridgeKind::Ixp, &link.second, of_port);
            }
        }

        plan
    }

    fn record_link_item(
        &mut self,
        project: &Project,
        bridge: &str,
        kind: BridgeKind,
        item: &crate::project::LinkItem,
        of_port: u32,
    ) {
        let router = project.router(item.router);
        let iface = &router.ifaces[item.iface];
        self.push(
            router.container_name.clone(),
            PortRecord {
                bridge: bridge.to_string(),
                kind,
                ifname: iface.name.clone(),
                host_ifname: None,
                of_port,
                speed: iface.speed,
                vrf: iface.vrf.clone(),
                ip: None,
                routes: Vec::new(),
            },
        );
    }

    fn push(&mut self, container: String, record: PortRecord) {
        self.0.entry(container).or_default().push(record);
    }

    /// Iterate over all records of a given fabric kind, with their
    /// container names.
    pub fn records_of(&self, kind: BridgeKind) -> impl Iterator<Item = (&String, &PortRecord)> {
        self.0
            .iter()
            .flat_map(move |(c, records)| records.iter().map(move |r| (c, r)))
            .filter(move |(_, r)| r.kind == kind)
    }

    /// All bridge names of a given fabric kind, deduplicated, in plan
    /// order.
    pub fn bridges_of(&self, kind: BridgeKind) -> Vec<String> {
        self.records_of(kind)
            .map(|(_, r)| r.bridge.clone())
            .unique()
            .collect()
    }

    /// Mutable access to a record, addressed by container and inner
    /// interface name.
    pub fn record_mut(&mut self, container: &str, ifname: &str) -> Option<&mut PortRecord> {
        self.0
            .get_mut(container)?
            .iter_mut()
            .find(|r| r.ifname == ifname)
    }

    /// Serialize the plan to JSON.
    pub fn to_json(&self) -> String {
        // the plan always serializes; it contains no non-string keys
        serde_json::to_string_pretty(self).unwrap()
    }

    /// Write the plan to `links.json` in the given directory.
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("links.json"), self.to_json())
    }

    /// Load a plan back from `links.json` in the given directory.
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(dir.join("links.json"))?;
        serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// The bridge carrying all intra-AS links of an AS.
pub fn internal_bridge(asn: AsId) -> String {
    format!("int-{}", asn.0)
}

/// The bridge of one inter-AS link.
pub fn external_bridge(from: AsId, from_host: &str, to: AsId, to_host: &str) -> String {
    format!("ext-{}{}-{}{}", from.0, from_host, to.0, to_host)
}

/// The bridge of an IXP shared LAN.
pub fn ixp_bridge(asn: AsId) -> String {
    format!("ixp-{}", asn.0)
}

/// The bridge of a router-host link.
pub fn host_bridge(asn: AsId, router_host: &str, host_host: &str) -> String {
    format!("{}-{}-{}", asn, router_host, host_host)
}

fn default_route_of(addr: &IpNet) -> IpNet {
    match addr {
        IpNet::V4(_) => "0.0.0.0/0".parse().unwrap(),
        IpNet::V6(_) => "::/0".parse().unwrap(),
    }
}

/// The flow pairs to install on a bridge: one cross-connect per link.
pub fn flows_of(project: &Project, links: &[Link], plan: &BridgePlan) -> Vec<(u32, u32)> {
    links
        .iter()
        .filter_map(|link| {
            let a = project.router(link.first.router);
            let b = project.router(link.second.router);
            let pa = lookup_port(plan, &a.container_name, &a.ifaces[link.first.iface].name)?;
            let pb = lookup_port(plan, &b.container_name, &b.ifaces[link.second.iface].name)?;
            Some((pa, pb))
        })
        .collect()
}

fn lookup_port(plan: &BridgePlan, container: &str, ifname: &str) -> Option<u32> {
    plan.0
        .get(container)?
        .iter()
        .find(|r| r.ifname == ifname)
        .map(|r| r.of_port)
}
