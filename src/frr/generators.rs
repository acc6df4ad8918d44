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

//! Module that contains convenience builders to generate configuration
//! fragments in the style of FRRouting. Every builder produces a block of
//! newline-terminated lines, indented by two spaces per nesting level.

use std::fmt::Write;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::types::AsId;

/// Interface configuration builder.
///
/// ```
/// # use topolab::frr::generators::Interface;
/// let addr: ipnet::IpNet = "10.0.0.1/30".parse().unwrap();
/// assert_eq!(
///     Interface::new("eth0").description("linked to R2").ip_address(addr).build(),
///     "\
/// interface eth0
///   description linked to R2
///   ip address 10.0.0.1/30
/// exit
/// "
/// );
/// ```
#[derive(Debug)]
pub struct Interface {
    name: String,
    vrf: Option<String>,
    lines: Vec<String>,
}

impl Interface {
    /// Create a new interface builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), vrf: None, lines: Vec::new() }
    }

    /// Bind the interface to a VRF.
    pub fn vrf(&mut self, vrf: impl Into<String>) -> &mut Self {
        self.vrf = Some(vrf.into());
        self
    }

    /// Set the interface description.
    pub fn description(&mut self, d: impl AsRef<str>) -> &mut Self {
        self.lines.push(format!("description {}", d.as_ref()));
        self
    }

    /// Add an address. The keyword follows the address family.
    pub fn ip_address(&mut self, addr: IpNet) -> &mut Self {
        match addr {
            IpNet::V4(a) => self.lines.push(format!("ip address {a}")),
            IpNet::V6(a) => self.lines.push(format!("ipv6 address {a}")),
        }
        self
    }

    /// Put the interface into an IS-IS process (IPv4 topology).
    pub fn isis_v4(&mut self, process: impl AsRef<str>) -> &mut Self {
        self.lines.push(format!("ip router isis {}", process.as_ref()));
        self
    }

    /// Put the interface into an IS-IS process (IPv6 topology).
    pub fn isis_v6(&mut self, process: impl AsRef<str>) -> &mut Self {
        self.lines.push(format!("ipv6 router isis {}", process.as_ref()));
        self
    }

    /// Set the IS-IS circuit type (1, 2, or anything else for level-1-2).
    pub fn isis_circuit_type(&mut self, level: u8) -> &mut Self {
        self.lines.push(format!("isis circuit-type {}", level_str(level)));
        self
    }

    /// Set the IS-IS metric.
    pub fn isis_metric(&mut self, metric: u32) -> &mut Self {
        self.lines.push(format!("isis metric {metric}"));
        self
    }

    /// Mark the IS-IS circuit passive (loopbacks).
    pub fn isis_passive(&mut self) -> &mut Self {
        self.lines.push("isis passive".to_string());
        self
    }

    /// Set the OSPF cost.
    pub fn ospf_cost(&mut self, cost: u32) -> &mut Self {
        self.lines.push(format!("ip ospf cost {cost}"));
        self
    }

    /// Set the OSPFv3 cost.
    pub fn ospf6_cost(&mut self, cost: u32) -> &mut Self {
        self.lines.push(format!("ipv6 ospf6 cost {cost}"));
        self
    }

    /// Enable MPLS label switching on the interface.
    pub fn mpls_enable(&mut self) -> &mut Self {
        self.lines.push("mpls enable".to_string());
        self
    }

    /// Render the interface block.
    pub fn build(&self) -> String {
        let mut cfg = match &self.vrf {
            Some(vrf) => format!("interface {} vrf {}\n", self.name, vrf),
            None => format!("interface {}\n", self.name),
        };
        for line in &self.lines {
            writeln!(cfg, "  {line}").unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

/// Session-level lines of a BGP neighbor (outside the address families).
#[derive(Debug)]
pub struct BgpNeighbor {
    addr: IpAddr,
    lines: Vec<String>,
}

impl BgpNeighbor {
    /// Create the builder for the neighbor with the given peer address.
    pub fn new(addr: IpAddr, remote_as: AsId) -> Self {
        Self { addr, lines: vec![format!("remote-as {}", remote_as.0)] }
    }

    /// Set the update source.
    pub fn update_source(&mut self, source: impl AsRef<str>) -> &mut Self {
        self.lines.push(format!("update-source {}", source.as_ref()));
        self
    }

    /// Disable the connected check (sessions established over loopbacks).
    pub fn disable_connected_check(&mut self) -> &mut Self {
        self.lines.push("disable-connected-check".to_string());
        self
    }

    fn render(&self, cfg: &mut String) {
        for line in &self.lines {
            writeln!(cfg, "  neighbor {} {line}", self.addr).unwrap();
        }
    }
}

/// Per-address-family lines of a BGP neighbor.
#[derive(Debug)]
pub struct AfNeighbor {
    addr: IpAddr,
    lines: Vec<String>,
}

impl AfNeighbor {
    /// Create the builder; the neighbor is activated in the family.
    pub fn new(addr: IpAddr) -> Self {
        Self { addr, lines: vec!["activate".to_string()] }
    }

    /// Set next-hop-self on advertised routes.
    pub fn next_hop_self(&mut self) -> &mut Self {
        self.lines.push("next-hop-self".to_string());
        self
    }

    /// Mark the neighbor as a route-reflector client.
    pub fn route_reflector_client(&mut self) -> &mut Self {
        self.lines.push("route-reflector-client".to_string());
        self
    }

    /// Mark the neighbor as a route-server client.
    pub fn route_server_client(&mut self) -> &mut Self {
        self.lines.push("route-server-client".to_string());
        self
    }

    /// Apply a route map in the given direction (`in` or `out`).
    pub fn route_map(&mut self, name: impl AsRef<str>, direction: &str) -> &mut Self {
        self.lines.push(format!("route-map {} {direction}", name.as_ref()));
        self
    }

    fn render(&self, cfg: &mut String) {
        for line in &self.lines {
            writeln!(cfg, "    neighbor {} {line}", self.addr).unwrap();
        }
    }
}

/// One `address-family` block of a BGP process.
#[derive(Debug)]
pub struct AfBlock {
    family: String,
    networks: Vec<IpNet>,
    redistribute: Vec<String>,
    neighbors: Vec<AfNeighbor>,
}

impl AfBlock {
    /// Create an address-family block (e.g. `ipv4 unicast`, `ipv4 vpn`).
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            networks: Vec::new(),
            redistribute: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    /// Announce a network in this family.
    pub fn network(&mut self, net: IpNet) -> &mut Self {
        self.networks.push(net);
        self
    }

    /// Redistribute a protocol into BGP.
    pub fn redistribute(&mut self, proto: impl Into<String>) -> &mut Self {
        self.redistribute.push(proto.into());
        self
    }

    /// Add a neighbor to the family.
    pub fn neighbor(&mut self, n: AfNeighbor) -> &mut Self {
        self.neighbors.push(n);
        self
    }

    /// `true` iff the block would render nothing.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.redistribute.is_empty() && self.neighbors.is_empty()
    }

    fn render(&self, cfg: &mut String) {
        writeln!(cfg, "  address-family {}", self.family).unwrap();
        for net in &self.networks {
            writeln!(cfg, "    network {net}").unwrap();
        }
        for proto in &self.redistribute {
            writeln!(cfg, "    redistribute {proto}").unwrap();
        }
        for n in &self.neighbors {
            n.render(cfg);
        }
        cfg.push_str("  exit-address-family\n");
    }
}

/// BGP process builder.
///
/// ```
/// # use topolab::frr::generators::{AfBlock, AfNeighbor, BgpNeighbor, RouterBgp};
/// # use topolab::types::AsId;
/// let peer = "10.100.0.2".parse().unwrap();
/// let mut af = AfBlock::new("ipv4 unicast");
/// af.neighbor(AfNeighbor::new(peer));
/// let mut bgp = RouterBgp::new(AsId(100));
/// bgp.router_id("10.100.0.1".parse().unwrap());
/// let mut nbr = BgpNeighbor::new(peer, AsId(100));
/// nbr.update_source("lo");
/// bgp.neighbor(nbr).af(af);
/// assert_eq!(
///     bgp.build(),
///     "\
/// router bgp 100
///   bgp router-id 10.100.0.1
///   neighbor 10.100.0.2 remote-as 100
///   neighbor 10.100.0.2 update-source lo
///   address-family ipv4 unicast
///     neighbor 10.100.0.2 activate
///   exit-address-family
/// exit
/// "
/// );
/// ```
#[derive(Debug)]
pub struct RouterBgp {
    asn: AsId,
    router_id: Option<IpAddr>,
    neighbors: Vec<BgpNeighbor>,
    afs: Vec<AfBlock>,
}

impl RouterBgp {
    /// Create the builder for the BGP process of the given AS.
    pub fn new(asn: AsId) -> Self {
        Self { asn, router_id: None, neighbors: Vec::new(), afs: Vec::new() }
    }

    /// Set the BGP router ID.
    pub fn router_id(&mut self, id: IpAddr) -> &mut Self {
        self.router_id = Some(id);
        self
    }

    /// Add a neighbor session.
    pub fn neighbor(&mut self, n: BgpNeighbor) -> &mut Self {
        self.neighbors.push(n);
        self
    }

    /// Add an address-family block; empty blocks are dropped.
    pub fn af(&mut self, block: AfBlock) -> &mut Self {
        if !block.is_empty() {
            self.afs.push(block);
        }
        self
    }

    /// Render the process block.
    pub fn build(&self) -> String {
        let mut cfg = format!("router bgp {}\n", self.asn.0);
        if let Some(id) = self.router_id {
            writeln!(cfg, "  bgp router-id {id}").unwrap();
        }
        for n in &self.neighbors {
            n.render(&mut cfg);
        }
        for af in &self.afs {
            af.render(&mut cfg);
        }
        cfg.push_str("exit\n");
        cfg
    }
}

/// VRF-scoped BGP sub-block of an L3 VPN.
#[derive(Debug)]
pub struct BgpVrf {
    asn: AsId,
    vrf: String,
    rd: u32,
    redistribute: Vec<String>,
    v6: bool,
}

impl BgpVrf {
    /// Create the builder for the given VRF with its route distinguisher
    /// index.
    pub fn new(asn: AsId, vrf: impl Into<String>, rd: u32) -> Self {
        Self { asn, vrf: vrf.into(), rd, redistribute: Vec::new(), v6: false }
    }

    /// Redistribute a protocol into the VRF table.
    pub fn redistribute(&mut self, proto: impl Into<String>) -> &mut Self {
        self.redistribute.push(proto.into());
        self
    }

    /// Use the IPv6 VPN family.
    pub fn v6(&mut self) -> &mut Self {
        self.v6 = true;
        self
    }

    /// Render the VRF sub-block.
    pub fn build(&self) -> String {
        let family = if self.v6 { "ipv6 unicast" } else { "ipv4 unicast" };
        let mut cfg = format!("router bgp {} vrf {}\n", self.asn.0, self.vrf);
        writeln!(cfg, "  address-family {family}").unwrap();
        for proto in &self.redistribute {
            writeln!(cfg, "    redistribute {proto}").unwrap();
        }
        writeln!(cfg, "    rd vpn export {}:{}", self.asn.0, self.rd).unwrap();
        writeln!(cfg, "    rt vpn both {}:{}", self.asn.0, self.rd).unwrap();
        cfg.push_str("    export vpn\n");
        cfg.push_str("    import vpn\n");
        cfg.push_str("    label vpn export auto\n");
        cfg.push_str("  exit-address-family\n");
        cfg.push_str("exit\n");
        cfg
    }
}

/// OSPF process builder.
#[derive(Debug)]
pub struct RouterOspf {
    lines: Vec<String>,
}

impl RouterOspf {
    /// Create the builder.
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Set the OSPF router ID.
    pub fn router_id(&mut self, id: IpAddr) -> &mut Self {
        self.lines.push(format!("ospf router-id {id}"));
        self
    }

    /// Add a network statement.
    pub fn network(&mut self, net: IpNet, area: u32) -> &mut Self {
        self.lines.push(format!("network {net} area {area}"));
        self
    }

    /// Declare a stub area.
    pub fn stub(&mut self, area: u32) -> &mut Self {
        self.lines.push(format!("area {area} stub"));
        self
    }

    /// Redistribute a protocol into OSPF.
    pub fn redistribute(&mut self, proto: impl Into<String>) -> &mut Self {
        self.lines.push(format!("redistribute {}", proto.into()));
        self
    }

    /// Render the process block.
    pub fn build(&self) -> String {
        let mut cfg = String::from("router ospf\n");
        for line in &self.lines {
            writeln!(cfg, "  {line}").unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

impl Default for RouterOspf {
    fn default() -> Self {
        Self::new()
    }
}

/// OSPFv3 process builder.
#[derive(Debug)]
pub struct RouterOspf6 {
    lines: Vec<String>,
}

impl RouterOspf6 {
    /// Create the builder.
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Set the OSPFv3 router ID (a 32-bit dotted quad).
    pub fn router_id(&mut self, id: IpAddr) -> &mut Self {
        self.lines.push(format!("ospf6 router-id {id}"));
        self
    }

    /// Put an interface into an area.
    pub fn interface(&mut self, name: impl AsRef<str>, area: u32) -> &mut Self {
        self.lines.push(format!("interface {} area {area}", name.as_ref()));
        self
    }

    /// Redistribute a protocol into OSPFv3.
    pub fn redistribute(&mut self, proto: impl Into<String>) -> &mut Self {
        self.lines.push(format!("redistribute {}", proto.into()));
        self
    }

    /// Render the process block.
    pub fn build(&self) -> String {
        let mut cfg = String::from("router ospf6\n");
        for line in &self.lines {
            writeln!(cfg, "  {line}").unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

impl Default for RouterOspf6 {
    fn default() -> Self {
        Self::new()
    }
}

/// IS-IS process builder.
///
/// ```
/// # use topolab::frr::generators::RouterIsis;
/// assert_eq!(
///     RouterIsis::new("1").net("49.0001.0100.0000.0001.00").is_type(1).build(),
///     "\
/// router isis 1
///   net 49.0001.0100.0000.0001.00
///   is-type level-1
/// exit
/// "
/// );
/// ```
#[derive(Debug)]
pub struct RouterIsis {
    process: String,
    lines: Vec<String>,
}

impl RouterIsis {
    /// Create the builder for the given process name.
    pub fn new(process: impl Into<String>) -> Self {
        Self { process: process.into(), lines: Vec::new() }
    }

    /// Set the ISO network entity title.
    pub fn net(&mut self, iso: impl AsRef<str>) -> &mut Self {
        self.lines.push(format!("net {}", iso.as_ref()));
        self
    }

    /// Set the IS type from the level number.
    pub fn is_type(&mut self, level: u8) -> &mut Self {
        self.lines.push(format!("is-type {}", level_str(level)));
        self
    }

    /// Render the process block.
    pub fn build(&self) -> String {
        let mut cfg = format!("router isis {}\n", self.process);
        for line in &self.lines {
            writeln!(cfg, "  {line}").unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

/// One item of a route map.
///
/// ```
/// # use topolab::frr::generators::RouteMapItem;
/// assert_eq!(
///     RouteMapItem::new("PROVIDER_IN", 10, true).set_local_pref(20).build(),
///     "\
/// route-map PROVIDER_IN permit 10
///   set local-preference 20
/// exit
/// "
/// );
/// ```
#[derive(Debug)]
pub struct RouteMapItem {
    name: String,
    order: u16,
    permit: bool,
    lines: Vec<String>,
}

impl RouteMapItem {
    /// Create the item with its sequence number and state.
    pub fn new(name: impl Into<String>, order: u16, permit: bool) -> Self {
        Self { name: name.into(), order, permit, lines: Vec::new() }
    }

    /// Set the local preference on matching routes.
    pub fn set_local_pref(&mut self, pref: u32) -> &mut Self {
        self.lines.push(format!("set local-preference {pref}"));
        self
    }

    /// Render the item.
    pub fn build(&self) -> String {
        let state = if self.permit { "permit" } else { "deny" };
        let mut cfg = format!("route-map {} {state} {}\n", self.name, self.order);
        for line in &self.lines {
            writeln!(cfg, "  {line}").unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

/// A static route line, optionally VRF-scoped.
#[derive(Debug)]
pub struct StaticRoute {
    prefix: IpNet,
    via: Option<IpAddr>,
    vrf: Option<String>,
}

impl StaticRoute {
    /// Create a static route towards the prefix.
    pub fn new(prefix: IpNet) -> Self {
        Self { prefix, via: None, vrf: None }
    }

    /// Route via the given next hop.
    pub fn via(&mut self, addr: IpAddr) -> &mut Self {
        self.via = Some(addr);
        self
    }

    /// Install the route in a VRF table.
    pub fn vrf(&mut self, vrf: impl Into<String>) -> &mut Self {
        self.vrf = Some(vrf.into());
        self
    }

    /// Render the route line.
    pub fn build(&self) -> String {
        let keyword = match self.prefix {
            IpNet::V4(_) => "ip",
            IpNet::V6(_) => "ipv6",
        };
        let mut cfg = format!("{keyword} route {}", self.prefix);
        match self.via {
            Some(via) => write!(cfg, " {via}").unwrap(),
            None => cfg.push_str(" Null0"),
        }
        if let Some(vrf) = &self.vrf {
            write!(cfg, " vrf {vrf}").unwrap();
        }
        cfg.push('\n');
        cfg
    }
}

/// The RPKI client block listing the configured cache servers.
#[derive(Debug, Default)]
pub struct RpkiBlock {
    caches: Vec<(IpAddr, u16)>,
}

impl RpkiBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cache server.
    pub fn cache(&mut self, ip: IpAddr, port: u16) -> &mut Self {
        self.caches.push((ip, port));
        self
    }

    /// Render the block; empty blocks render nothing.
    pub fn build(&self) -> String {
        if self.caches.is_empty() {
            return String::new();
        }
        let mut cfg = String::from("rpki\n");
        for (i, (ip, port)) in self.caches.iter().enumerate() {
            writeln!(cfg, "  rpki cache {ip} {port} preference {}", i + 1).unwrap();
        }
        cfg.push_str("exit\n");
        cfg
    }
}

/// The ISO network entity title of a router, derived from its area, ASN and
/// router ID.
pub fn iso_net(asn: AsId, area: u32, id: usize) -> String {
    format!(
        "49.{:04x}.{:04}.{:04}.{:04}.00",
        area,
        asn.0 % 10000,
        id / 10000,
        id % 10000
    )
}

fn level_str(level: u8) -> &'static str {
    match level {
        1 => "level-1",
        2 => "level-2",
        _ => "level-1-2",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iso_net_encodes_asn_and_id() {
        pretty_assertions::assert_eq!(iso_net(AsId(100), 1, 1), "49.0001.0100.0000.0001.00");
        pretty_assertions::assert_eq!(iso_net(AsId(65000), 2, 12), "49.0002.5000.0000.0012.00");
    }

    #[test]
    fn static_route_variants() {
        let p: IpNet = "10.2.0.0/24".parse().unwrap();
        let mut r = StaticRoute::new(p);
        r.via("10.1.3.2".parse().unwrap()).vrf("VPN_A_down");
        pretty_assertions::assert_eq!(r.build(), "ip route 10.2.0.0/24 10.1.3.2 vrf VPN_A_down\n");
        pretty_assertions::assert_eq!(
            StaticRoute::new(p).build(),
            "ip route 10.2.0.0/24 Null0\n"
        );
    }

    #[test]
    fn vrf_block() {
        let mut vrf = BgpVrf::new(AsId(100), "VPN_A", 1);
        vrf.redistribute("connected");
        pretty_assertions::assert_eq!(
            vrf.build(),
            "\
router bgp 100 vrf VPN_A
  address-family ipv4 unicast
    redistribute connected
    rd vpn export 100:1
    rt vpn both 100:1
    export vpn
    import vpn
    label vpn export auto
  exit-address-family
exit
"
        );
    }
}
