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

use super::{compile, HUB_VPN, IXP, SINGLE_AS, TWO_AS_EXTERNAL};
use crate::frr;

/// The positions of the section anchors must be increasing.
fn assert_ordered(config: &str, anchors: &[&str]) {
    let mut last = 0;
    for anchor in anchors {
        let pos = config
            .find(anchor)
            .unwrap_or_else(|| panic!("`{anchor}` missing from:\n{config}"));
        assert!(
            pos >= last,
            "`{anchor}` out of order (at {pos}, expected after {last}):\n{config}"
        );
        last = pos;
    }
}

#[test]
fn section_order() {
    let project = compile(SINGLE_AS);
    let configs = frr::generate(&project);
    let config = &configs["conf_100_R1"];

    assert_ordered(
        config,
        &[
            "hostname R1",
            "interface eth0",
            "interface lo",
            "router ospf",
            "router bgp 100",
            "route-map PROVIDER_IN permit 10",
            "route-map ALLOW_ALL permit 10",
        ],
    );
}

#[test]
fn ospf_router_id_is_the_loopback() {
    let project = compile(SINGLE_AS);
    let configs = frr::generate(&project);

    for (id, lo) in [(1, "10.100.0.1"), (2, "10.100.0.2"), (3, "10.100.0.3")] {
        let config = &configs[&format!("conf_100_R{id}")];
        assert!(config.contains(&format!("ospf router-id {lo}")));
        assert!(config.contains(&format!("bgp router-id {lo}")));
        assert!(config.contains("network 10.0.0.0/24 area 0"));
    }
}

#[test]
fn ibgp_neighbor_statements() {
    let project = compile(SINGLE_AS);
    let configs = frr::generate(&project);
    let config = &configs["conf_100_R1"];

    assert!(config.contains("neighbor 10.100.0.2 remote-as 100"));
    assert!(config.contains("neighbor 10.100.0.2 update-source lo"));
    assert!(config.contains("neighbor 10.100.0.2 activate"));
    assert!(config.contains("neighbor 10.100.0.3 remote-as 100"));
    // internal sessions keep the connected check
    assert!(!config.contains("disable-connected-check"));
}

#[test]
fn external_neighbor_route_maps() {
    let project = compile(TWO_AS_EXTERNAL);
    let configs = frr::generate(&project);

    let config = &configs["conf_100_R1"];
    assert!(config.contains("neighbor 172.16.0.2 remote-as 200"));
    assert!(config.contains("neighbor 172.16.0.2 route-map PROVIDER_IN in"));
    assert!(config.contains("neighbor 172.16.0.2 route-map PROVIDER_OUT out"));
    assert!(config.contains("network 10.1.0.0/24"));

    let config = &configs["conf_200_R1"];
    assert!(config.contains("neighbor 172.16.0.1 route-map CUSTOMER_IN in"));
    assert!(config.contains("neighbor 172.16.0.1 route-map CUSTOMER_OUT out"));
}

#[test]
fn local_preference_scheme() {
    let project = compile(TWO_AS_EXTERNAL);
    let configs = frr::generate(&project);

    for config in configs.values() {
        assert_ordered(
            config,
            &["route-map PROVIDER_IN permit 10", "set local-preference 20"],
        );
        assert_ordered(
            config,
            &["route-map PEER_IN permit 10", "set local-preference 30"],
        );
        assert_ordered(
            config,
            &["route-map CUSTOMER_IN permit 10", "set local-preference 10"],
        );
    }
}

#[test]
fn route_server_clients() {
    let project = compile(IXP);
    let configs = frr::generate(&project);
    let config = &configs["conf_65000_RS"];

    assert_ordered(config, &["hostname RS", "interface eth0", "router bgp 65000"]);
    for member in ["192.0.2.2", "192.0.2.3", "192.0.2.4"] {
        assert!(config.contains(&format!("neighbor {member} route-server-client")));
    }

    // members do not mark the route server
    let config = &configs["conf_100_R1"];
    assert!(!config.contains("route-server-client"));
    assert!(config.contains("neighbor 192.0.2.1 remote-as 65000"));
}

#[test]
fn vpn_blocks() {
    let project = compile(HUB_VPN);
    let configs = frr::generate(&project);
    let config = &configs["conf_100_R1"];

    // the PE interface is bound to the VRF and label-switching is enabled
    // on internal interfaces
    assert!(config.contains("interface eth1 vrf VPN_A"));
    assert!(config.contains("interface eth2 vrf VPN_A_down"));
    assert_ordered(config, &["interface eth0", "mpls enable"]);

    // VRF sub-blocks with distinct route distinguishers
    assert!(config.contains("router bgp 100 vrf VPN_A"));
    assert!(config.contains("rd vpn export 100:1"));
    assert!(config.contains("router bgp 100 vrf VPN_A_down"));
    assert!(config.contains("rd vpn export 100:101"));

    // the VPN address family activates the other provider edge
    let vpn_af = config.find("address-family ipv4 vpn").unwrap();
    assert!(config[vpn_af..].contains("neighbor 10.100.0.2 activate"));

    // the hub parent routes the spoke subnets through the hub site
    assert!(config.contains("ip route 10.2.0.0/24 10.1.3.2 vrf VPN_A_down"));

    // the spoke parent has no downstream state
    let config = &configs["conf_100_R2"];
    assert!(!config.contains("VPN_A_down"));
}

#[test]
fn customer_edge_configs() {
    let project = compile(HUB_VPN);
    let configs = frr::generate(&project);

    let config = &configs["conf_cust_CE1"];
    assert_ordered(config, &["hostname CE1", "interface eth0", "interface eth1"]);
    assert!(config.contains("ip address 10.1.1.2/30"));
    assert!(config.contains("ip address 10.1.3.2/30"));
    assert!(config.contains("ip route 0.0.0.0/0 10.1.1.1"));
    assert!(!config.contains("router bgp"));

    let config = &configs["conf_cust_CE2"];
    assert!(config.contains("ip address 10.1.2.2/30"));
    assert!(config.contains("ip route 0.0.0.0/0 10.1.2.1"));
}

#[test]
fn rpki_clients() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 1
    prefix: 10.0.0.0/24
    rpki:
      servers: [validator]
rpki:
  validator: { ip: 192.0.2.10, port: 3323 }
"#;
    let project = compile(yaml);
    let configs = frr::generate(&project);
    let config = &configs["conf_100_R1"];
    assert!(config.contains("rpki cache 192.0.2.10 3323 preference 1"));
}

#[test]
fn isis_process_block() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 2
    prefix: 10.0.0.0/24
    lo_range: 10.100.0.0/24
    igp: isis
    isis:
      levels:
        2: [2]
    links:
      - { first: 1, second: 2 }
"#;
    let project = compile(yaml);
    let configs = frr::generate(&project);

    let config = &configs["conf_100_R1"];
    assert_ordered(
        config,
        &[
            "interface eth0",
            "ip router isis 1",
            "isis circuit-type level-1",
            "router isis 1",
            "net 49.0001.0100.0000.0001.00",
            "is-type level-1",
        ],
    );

    let config = &configs["conf_100_R2"];
    assert!(config.contains("net 49.0001.0100.0000.0002.00"));
    assert!(config.contains("is-type level-2"));
}

#[test]
fn indentation_and_termination() {
    let project = compile(SINGLE_AS);
    let configs = frr::generate(&project);
    for config in configs.values() {
        assert!(config.ends_with('\n'));
        // two spaces per nesting level, never tabs
        assert!(!config.contains('\t'));
        assert!(config.contains("\n  ip address"));
    }
}
