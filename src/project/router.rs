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

//! The resolved per-router state: interfaces, loopbacks, IGP membership and
//! BGP neighbor records. Everything here is materialized by the builders
//! and read-only once emission begins.

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::types::{AddressFamily, AsId, RouterRef};

/// Default nominal interface speed in Mb/s.
pub const DEFAULT_SPEED: u32 = 10000;

/// A BGP neighbor record, keyed in [`Router::neighbors`] by the textual
/// peer address (loopback when the peer has one, link address otherwise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpNbr {
    /// The remote AS number.
    pub remote_as: AsId,
    /// The update source (`lo` or an interface name).
    pub update_source: String,
    /// Whether the connected check stays enabled. Sessions established over
    /// loopbacks disable it.
    pub conn_check: bool,
    /// Set next-hop-self on routes advertised to this neighbor.
    pub next_hop_self: bool,
    /// The local interface facing the neighbor.
    pub if_name: String,
    /// Inbound route maps, applied in order.
    pub route_maps_in: Vec<String>,
    /// Outbound route maps, applied in order.
    pub route_maps_out: Vec<String>,
    /// Address families of the session.
    pub af: AddressFamily,
    /// The neighbor is a route-reflector client of this router.
    pub rr_client: bool,
    /// The neighbor is a route-server client of this router.
    pub rs_client: bool,
    /// Prefix length of the peer address.
    pub peer_prefix_len: u8,
}

/// Per-interface IGP configuration, dispatched on by the emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgpIfConfig {
    /// IS-IS circuit configuration.
    Isis {
        /// Configure the IPv6 topology on this circuit.
        v6: bool,
        /// The IS-IS process name.
        process: String,
        /// Circuit type (1, 2, or 3 for level-1-2).
        circuit_type: u8,
        /// Interface metric.
        cost: Option<u32>,
    },
    /// OSPF interface configuration.
    Ospf {
        /// OSPFv3 instead of OSPFv2.
        v6: bool,
        /// The OSPF process ID.
        process_id: u32,
        /// The interface area.
        area: u32,
        /// Interface cost.
        cost: Option<u32>,
    },
}

/// A network interface of a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetInterface {
    /// Deterministic name, `eth<n>` in allocation order.
    pub name: String,
    /// Human description (shows the far end).
    pub description: String,
    /// Addresses with prefix lengths.
    pub addrs: Vec<IpNet>,
    /// IGP profiles attached to the interface.
    pub igp: Vec<IgpIfConfig>,
    /// Nominal speed in Mb/s.
    pub speed: u32,
    /// The interface crosses the AS boundary.
    pub external: bool,
    /// VRF the interface is bound to.
    pub vrf: Option<String>,
}

impl NetInterface {
    /// `true` iff any address on the interface is IPv6.
    pub fn has_v6(&self) -> bool {
        self.addrs.iter().any(|a| matches!(a, IpNet::V6(_)))
    }
}

/// One side of a link: a router handle together with the index of the
/// interface facing the link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinkItem {
    /// The router.
    pub router: RouterRef,
    /// Index into the router's interface list.
    pub iface: usize,
}

/// An unordered pair of connected interfaces sharing a subnet. The first
/// endpoint holds the `.1` address, the second the `.2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// The `.1` endpoint.
    pub first: LinkItem,
    /// The `.2` endpoint.
    pub second: LinkItem,
}

/// IS-IS membership of a router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IsisMembership {
    /// Level (1, 2, or 3 for level-1-2).
    pub level: u8,
    /// Area number.
    pub area: u32,
}

/// One OSPF network statement attached to a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OspfNet {
    /// The advertised prefix.
    pub prefix: IpNet,
    /// The area.
    pub area: u32,
}

/// A materialized router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Router {
    /// 1-based ID, dense within the AS.
    pub id: usize,
    /// Short hostname (`R<id>` for AS routers).
    pub hostname: String,
    /// Container name (`AS<ASN>-<hostname>`).
    pub container_name: String,
    /// Docker image overriding the default router image.
    pub custom_image: Option<String>,
    /// Loopback prefixes (/32 or /128).
    pub loopback: Vec<IpNet>,
    /// Interfaces in allocation order.
    pub ifaces: Vec<NetInterface>,
    /// BGP neighbors keyed by peer address.
    pub neighbors: BTreeMap<IpAddr, BgpNbr>,
    /// IS-IS membership, if the AS runs IS-IS.
    pub isis: Option<IsisMembership>,
    /// OSPF network statements, if the AS runs OSPF.
    pub ospf_networks: Vec<OspfNet>,
}

impl Router {
    /// Create an empty router.
    pub fn new(id: usize, hostname: impl Into<String>, container_name: String) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            container_name,
            custom_image: None,
            loopback: Vec::new(),
            ifaces: Vec::new(),
            neighbors: BTreeMap::new(),
            isis: None,
            ospf_networks: Vec::new(),
        }
    }

    /// The first loopback address, used as router ID and IBGP session key.
    pub fn lo_addr(&self) -> Option<IpAddr> {
        self.loopback.first().map(|n| n.addr())
    }

    /// The first loopback together with its prefix length.
    pub fn lo_info(&self) -> Option<(IpAddr, u8)> {
        self.loopback.first().map(|n| (n.addr(), n.prefix_len()))
    }

    /// Append an interface named after the allocation counter and return
    /// its index.
    pub fn push_iface(&mut self, mut iface: NetInterface) -> usize {
        let idx = self.ifaces.len();
        iface.name = format!("eth{idx}");
        self.ifaces.push(iface);
        idx
    }

    /// The union of the address families over all neighbor sessions.
    pub fn neighbors_af(&self) -> AddressFamily {
        let mut af = AddressFamily::default();
        for nbr in self.neighbors.values() {
            af.ipv4 |= nbr.af.ipv4;
            af.ipv6 |= nbr.af.ipv6;
            af.vpnv4 |= nbr.af.vpnv4;
            af.vpnv6 |= nbr.af.vpnv6;
        }
        af
    }
}

/// Build an interface pointing at a link peer. The name is assigned by
/// [`Router::push_iface`].
pub fn link_iface(description: String, addr: IpNet, speed: Option<u32>) -> NetInterface {
    NetInterface {
        name: String::new(),
        description,
        addrs: vec![addr],
        igp: Vec::new(),
        speed: speed.unwrap_or(DEFAULT_SPEED),
        external: false,
        vrf: None,
    }
}
