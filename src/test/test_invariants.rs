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

use std::collections::BTreeSet;
use std::net::IpAddr;

use pretty_assertions::assert_eq;

use super::{compile, HUB_VPN, IXP, SINGLE_AS, TWO_AS_EXTERNAL};
use crate::bridge::{BridgeKind, BridgePlan};
use crate::frr;
use crate::types::AsId;

#[test]
fn determinism() {
    for yaml in [SINGLE_AS, TWO_AS_EXTERNAL, IXP, HUB_VPN] {
        let (a, b) = (compile(yaml), compile(yaml));
        assert_eq!(frr::generate(&a), frr::generate(&b));
        assert_eq!(
            BridgePlan::build(&a).to_json(),
            BridgePlan::build(&b).to_json()
        );
    }
}

#[test]
fn address_uniqueness() {
    for yaml in [SINGLE_AS, TWO_AS_EXTERNAL, IXP, HUB_VPN] {
        let project = compile(yaml);
        for asys in project.ases.values() {
            let mut seen: BTreeSet<IpAddr> = BTreeSet::new();
            let customer_routers = asys
                .vpns
                .iter()
                .flat_map(|v| v.customers.iter().map(|c| &c.router));
            for router in asys.routers.iter().chain(customer_routers) {
                for addr in router
                    .ifaces
                    .iter()
                    .flat_map(|i| i.addrs.iter())
                    .chain(router.loopback.iter())
                {
                    assert!(
                        seen.insert(addr.addr()),
                        "duplicate address {} in {}",
                        addr.addr(),
                        asys.asn,
                    );
                }
            }
        }
    }
}

#[test]
fn subnet_containment() {
    let project = compile(SINGLE_AS);
    let asys = &project.ases[&AsId(100)];
    let parent = asys.network.as_ref().unwrap().parent();

    let mut subnets = Vec::new();
    for link in &asys.links {
        let addr = project.router(link.first.router).ifaces[link.first.iface].addrs[0];
        subnets.push(addr.trunc());
    }
    for (i, subnet) in subnets.iter().enumerate() {
        assert!(parent.contains(subnet), "{subnet} outside of {parent}");
        for other in &subnets[i + 1..] {
            assert!(
                !subnet.contains(other) && !other.contains(subnet),
                "overlapping subnets {subnet} and {other}"
            );
        }
    }
}

#[test]
fn bridge_plan_covers_every_link() {
    for yaml in [SINGLE_AS, TWO_AS_EXTERNAL, IXP, HUB_VPN] {
        let project = compile(yaml);
        let plan = BridgePlan::build(&project);

        for asys in project.ases.values() {
            for link in &asys.links {
                for item in [&link.first, &link.second] {
                    let router = project.router(item.router);
                    let ifname = &router.ifaces[item.iface].name;
                    let records = &plan.0[&router.container_name];
                    assert_eq!(
                        records.iter().filter(|r| &r.ifname == ifname).count(),
                        1,
                        "link endpoint {}/{} missing from the plan",
                        router.container_name,
                        ifname,
                    );
                }
            }
        }
    }
}

#[test]
fn bridge_names() {
    let project = compile(TWO_AS_EXTERNAL);
    let plan = BridgePlan::build(&project);
    assert_eq!(
        plan.bridges_of(BridgeKind::External),
        vec!["ext-100R1-200R1".to_string()]
    );

    let project = compile(SINGLE_AS);
    let plan = BridgePlan::build(&project);
    assert_eq!(plan.bridges_of(BridgeKind::Internal), vec!["int-100".to_string()]);
    assert!(plan.bridges_of(BridgeKind::External).is_empty());

    let project = compile(IXP);
    let plan = BridgePlan::build(&project);
    assert_eq!(plan.bridges_of(BridgeKind::Ixp), vec!["ixp-65000".to_string()]);
}

#[test]
fn openflow_ports_start_at_one_per_bridge() {
    let project = compile(SINGLE_AS);
    let plan = BridgePlan::build(&project);

    let mut ports: Vec<u32> = plan
        .records_of(BridgeKind::Internal)
        .map(|(_, r)| r.of_port)
        .collect();
    ports.sort_unstable();
    assert_eq!(ports, (1..=6).collect::<Vec<u32>>());
}

#[test]
fn plan_round_trips_through_json() {
    let project = compile(HUB_VPN);
    let plan = BridgePlan::build(&project);
    let json = plan.to_json();
    let loaded: BridgePlan = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.to_json(), json);
}

#[test]
fn config_file_names() {
    let project = compile(HUB_VPN);
    let configs = frr::generate(&project);
    let names: Vec<&String> = configs.keys().collect();
    assert_eq!(
        names,
        vec!["conf_100_R1", "conf_100_R2", "conf_cust_CE1", "conf_cust_CE2"]
    );

    let project = compile(IXP);
    let configs = frr::generate(&project);
    assert!(configs.contains_key("conf_65000_RS"));
}
