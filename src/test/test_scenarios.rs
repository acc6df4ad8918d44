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

use std::net::IpAddr;

use ipnet::IpNet;
use pretty_assertions::assert_eq;

use super::{compile, try_compile, HUB_VPN, IXP, SINGLE_AS, TWO_AS_EXTERNAL};
use crate::addressing::AddressingError;
use crate::project::CompileError;
use crate::types::AsId;

macro_rules! net {
    ($s:expr) => {
        $s.parse::<IpNet>().unwrap()
    };
}

macro_rules! addr {
    ($s:expr) => {
        $s.parse::<IpAddr>().unwrap()
    };
}

#[test]
fn single_as_routers_and_loopbacks() {
    let project = compile(SINGLE_AS);
    let asys = &project.ases[&AsId(100)];

    assert_eq!(
        asys.routers.iter().map(|r| r.hostname.as_str()).collect::<Vec<_>>(),
        vec!["R1", "R2", "R3"]
    );
    assert_eq!(
        asys.routers.iter().map(|r| r.container_name.as_str()).collect::<Vec<_>>(),
        vec!["AS100-R1", "AS100-R2", "AS100-R3"]
    );
    assert_eq!(
        asys.routers.iter().map(|r| r.loopback[0]).collect::<Vec<_>>(),
        vec![net!("10.100.0.1/32"), net!("10.100.0.2/32"), net!("10.100.0.3/32")]
    );
}

#[test]
fn single_as_link_subnets() {
    let project = compile(SINGLE_AS);
    let asys = &project.ases[&AsId(100)];

    // three /30 subnets, walked in ascending order
    let first_addrs: Vec<IpNet> = asys
        .links
        .iter()
        .map(|l| {
            let r = project.router(l.first.router);
            r.ifaces[l.first.iface].addrs[0]
        })
        .collect();
    assert_eq!(
        first_addrs,
        vec![net!("10.0.0.1/30"), net!("10.0.0.5/30"), net!("10.0.0.9/30")]
    );

    let second_addrs: Vec<IpNet> = asys
        .links
        .iter()
        .map(|l| {
            let r = project.router(l.second.router);
            r.ifaces[l.second.iface].addrs[0]
        })
        .collect();
    assert_eq!(
        second_addrs,
        vec![net!("10.0.0.2/30"), net!("10.0.0.6/30"), net!("10.0.0.10/30")]
    );
}

#[test]
fn single_as_full_mesh() {
    let project = compile(SINGLE_AS);
    let asys = &project.ases[&AsId(100)];

    let total: usize = asys.routers.iter().map(|r| r.neighbors.len()).sum();
    assert_eq!(total, 6);

    for router in &asys.routers {
        assert_eq!(router.neighbors.len(), 2);
        for (addr, nbr) in &router.neighbors {
            assert_eq!(nbr.remote_as, AsId(100));
            assert_eq!(nbr.update_source, "lo");
            assert!(!nbr.next_hop_self);
            assert!(nbr.af.ipv4);
            // keyed by the loopbacks of the two other routers
            assert!(asys.routers.iter().any(|r| r.lo_addr() == Some(*addr)));
            assert_ne!(Some(*addr), router.lo_addr());
        }
    }
}

#[test]
fn external_link_policy() {
    let project = compile(TWO_AS_EXTERNAL);

    let r100 = project.ases[&AsId(100)].router(1);
    let nbr = &r100.neighbors[&addr!("172.16.0.2")];
    assert_eq!(nbr.remote_as, AsId(200));
    assert_eq!(nbr.route_maps_in, vec!["PROVIDER_IN"]);
    assert_eq!(nbr.route_maps_out, vec!["PROVIDER_OUT"]);

    let r200 = project.ases[&AsId(200)].router(1);
    let nbr = &r200.neighbors[&addr!("172.16.0.1")];
    assert_eq!(nbr.remote_as, AsId(100));
    assert_eq!(nbr.route_maps_in, vec!["CUSTOMER_IN"]);
    assert_eq!(nbr.route_maps_out, vec!["CUSTOMER_OUT"]);
}

#[test]
fn external_link_interfaces_are_external() {
    let project = compile(TWO_AS_EXTERNAL);
    let r100 = project.ases[&AsId(100)].router(1);
    let iface = &r100.ifaces[0];
    assert!(iface.external);
    assert_eq!(iface.addrs, vec![net!("172.16.0.1/30")]);
    assert_eq!(iface.name, "eth0");
}

#[test]
fn ixp_route_server_sessions() {
    let project = compile(IXP);
    let ixp = &project.ixps[0];

    assert_eq!(ixp.route_server.container_name, "AS65000-RS");
    assert_eq!(ixp.route_server.neighbors.len(), 3);
    for nbr in ixp.route_server.neighbors.values() {
        assert!(nbr.rs_client);
    }
    assert_eq!(
        ixp.route_server.neighbors.keys().copied().collect::<Vec<_>>(),
        vec![addr!("192.0.2.2"), addr!("192.0.2.3"), addr!("192.0.2.4")]
    );

    // each member peers with the route server only
    for asn in [100, 200, 300] {
        let member = project.ases[&AsId(asn)].router(1);
        assert_eq!(
            member.neighbors.keys().copied().collect::<Vec<_>>(),
            vec![addr!("192.0.2.1")]
        );
        let nbr = &member.neighbors[&addr!("192.0.2.1")];
        assert_eq!(nbr.remote_as, AsId(65000));
        assert!(!nbr.rs_client);
    }
}

#[test]
fn hub_vpn_attachment() {
    let project = compile(HUB_VPN);
    let asys = &project.ases[&AsId(100)];
    let vpn = &asys.vpns[0];

    // PE interfaces of the hub parent: VRF and downstream VRF
    let r1 = asys.router(1);
    let vrfs: Vec<Option<&str>> =
        r1.ifaces.iter().map(|i| i.vrf.as_deref()).collect();
    assert!(vrfs.contains(&Some("VPN_A")));
    assert!(vrfs.contains(&Some("VPN_A_down")));

    // the spoke parent carries the plain VRF only
    let r2 = asys.router(2);
    assert!(r2.ifaces.iter().any(|i| i.vrf.as_deref() == Some("VPN_A")));
    assert!(!r2.ifaces.iter().any(|i| i.vrf.as_deref() == Some("VPN_A_down")));

    assert_eq!(vpn.spoke_subnets, vec![net!("10.2.0.0/24")]);
    assert_eq!(vpn.hub_gateway, Some(addr!("10.1.3.2")));
    assert_eq!(
        vpn.customers.iter().map(|c| c.router.container_name.as_str()).collect::<Vec<_>>(),
        vec!["AS100-Cust-CE1", "AS100-Cust-CE2"]
    );

    // the PE loopbacks are recorded for the VPN address family
    assert_eq!(
        vpn.neighbors.iter().copied().collect::<Vec<_>>(),
        vec![addr!("10.100.0.1"), addr!("10.100.0.2")]
    );
    let nbr = &r1.neighbors[&addr!("10.100.0.2")];
    assert!(nbr.af.vpnv4);
}

#[test]
fn pool_exhaustion_names_the_parent() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 2
    prefix: 10.0.0.0/30
    subnet_length: 30
    links:
      - { first: 1, second: 2 }
      - { first: 1, second: 2 }
"#;
    match try_compile(yaml) {
        Err(CompileError::Addressing(AddressingError::PoolExhausted { parent, .. })) => {
            assert_eq!(parent, net!("10.0.0.0/30"));
        }
        other => panic!("expected pool exhaustion, got {other:?}"),
    }
}

#[test]
fn route_reflection_reduces_the_mesh() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 4
    prefix: 10.0.0.0/24
    lo_range: 10.100.0.0/24
    bgp:
      ibgp:
        manual: true
        reflectors: [1, 2]
"#;
    let project = compile(yaml);
    let asys = &project.ases[&AsId(100)];

    // reflectors peer with everyone
    for rr in [1, 2] {
        let router = asys.router(rr);
        assert_eq!(router.neighbors.len(), 3);
        for (addr, nbr) in &router.neighbors {
            let peer_is_rr = [1, 2]
                .iter()
                .any(|id| asys.router(*id).lo_addr() == Some(*addr));
            assert_eq!(nbr.rr_client, !peer_is_rr);
        }
    }

    // clients peer with the reflectors only
    for client in [3, 4] {
        let router = asys.router(client);
        assert_eq!(
            router.neighbors.keys().copied().collect::<Vec<_>>(),
            vec![addr!("10.100.0.1"), addr!("10.100.0.2")]
        );
        assert!(router.neighbors.values().all(|n| !n.rr_client));
    }
}

#[test]
fn multi_af_external_link() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 1
    prefix: 10.1.0.0/24
  - asn: 200
    num_routers: 1
    prefix: 2001:db8:200::/48
external:
  - from: { asn: 100, router_id: 1, relation: peer }
    to: { asn: 200, router_id: 1, relation: peer }
    subnet: 172.16.0.0/30
"#;
    let project = compile(yaml);
    let nbr = &project.ases[&AsId(100)].router(1).neighbors[&addr!("172.16.0.2")];
    assert!(nbr.af.ipv4);
    assert!(nbr.af.ipv6);
}

#[test]
fn shared_external_pool() {
    let yaml = r#"
name: test
as:
  - { asn: 100, num_routers: 1, prefix: 10.1.0.0/24 }
  - { asn: 200, num_routers: 1, prefix: 10.2.0.0/24 }
external:
  - from: { asn: 100, router_id: 1, relation: peer }
    to: { asn: 200, router_id: 1, relation: peer }
"#;
    let project = compile(yaml);
    let iface = &project.ases[&AsId(100)].router(1).ifaces[0];
    assert_eq!(iface.addrs, vec![net!("172.31.0.1/30")]);
}

#[test]
fn isis_membership_tables() {
    let yaml = r#"
name: test
as:
  - asn: 100
    num_routers: 3
    prefix: 10.0.0.0/24
    lo_range: 10.100.0.0/24
    igp: isis
    isis:
      areas:
        2: [3]
      levels:
        2: [1, 3]
    links:
      - { first: 1, second: 2, cost: 15 }
"#;
    let project = compile(yaml);
    let asys = &project.ases[&AsId(100)];
    let memberships: Vec<(u8, u32)> = asys
        .routers
        .iter()
        .map(|r| {
            let m = r.isis.unwrap();
            (m.level, m.area)
        })
        .collect();
    assert_eq!(memberships, vec![(2, 1), (1, 1), (2, 2)]);

    // the link interface carries an IS-IS profile with the declared cost
    let r1 = asys.router(1);
    assert_eq!(
        r1.ifaces[0].igp,
        vec![crate::project::IgpIfConfig::Isis {
            v6: false,
            process: "1".to_string(),
            circuit_type: 2,
            cost: Some(15),
        }]
    );
}
