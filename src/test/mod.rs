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

//! End-to-end tests over complete topology descriptions.

use crate::config::TopologyConfig;
use crate::project::{CompileError, Project};

mod test_frr;
mod test_invariants;
mod test_scenarios;

/// Compile a YAML description, panicking on any error.
fn compile(yaml: &str) -> Project {
    try_compile(yaml).unwrap()
}

/// Compile a YAML description.
fn try_compile(yaml: &str) -> Result<Project, CompileError> {
    let conf = TopologyConfig::parse(yaml, "test").unwrap();
    Project::compile(&conf)
}

/// The scenario of a single OSPF AS with three routers in a triangle.
const SINGLE_AS: &str = r#"
name: test
as:
  - asn: 100
    num_routers: 3
    prefix: 10.0.0.0/24
    lo_range: 10.100.0.0/24
    igp: ospf
    ospf:
      networks:
        - { prefix: 10.0.0.0/24, area: 0, routers: [1, 2, 3] }
    links:
      - { first: 1, second: 2 }
      - { first: 2, second: 3 }
      - { first: 1, second: 3 }
"#;

/// Two ASes joined by one provider-customer link.
const TWO_AS_EXTERNAL: &str = r#"
name: test
as:
  - asn: 100
    num_routers: 1
    prefix: 10.1.0.0/24
  - asn: 200
    num_routers: 1
    prefix: 10.2.0.0/24
external:
  - from: { asn: 100, router_id: 1, relation: provider }
    to: { asn: 200, router_id: 1, relation: customer }
    subnet: 172.16.0.0/30
"#;

/// Three member ASes peering at one route server.
const IXP: &str = r#"
name: test
as:
  - { asn: 100, num_routers: 1, prefix: 10.1.0.0/24 }
  - { asn: 200, num_routers: 1, prefix: 10.2.0.0/24 }
  - { asn: 300, num_routers: 1, prefix: 10.3.0.0/24 }
ixps:
  - asn: 65000
    prefix: 192.0.2.0/24
    members:
      - { asn: 100, router_id: 1 }
      - { asn: 200, router_id: 1 }
      - { asn: 300, router_id: 1 }
"#;

/// A hub-and-spoke VPN with two customer sites.
const HUB_VPN: &str = r#"
name: test
as:
  - asn: 100
    num_routers: 2
    prefix: 10.0.0.0/24
    lo_range: 10.100.0.0/24
    igp: ospf
    mpls: true
    ospf:
      networks:
        - { prefix: 10.0.0.0/24, area: 0, routers: [1, 2] }
    links:
      - { first: 1, second: 2 }
    vpn:
      - vrf: VPN_A
        hub_mode: true
        customers:
          - hostname: CE1
            parent: 1
            subnet: 10.1.1.0/30
            subnet_down: 10.1.3.0/30
            hub: true
          - hostname: CE2
            parent: 2
            subnet: 10.1.2.0/30
            remote_subnet: 10.2.0.0/24
"#;
