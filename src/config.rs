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

//! This module contains the code for reading the declarative topology
//! description. Loading normalizes defaults (BGP enabled, automatic IBGP
//! full mesh, default subnet lengths) and validates every structural
//! constraint before the compiler runs, so that compilation only ever deals
//! with resolvable references.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ipnet::IpNet;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{IgpKind, Relation};

/// Project name that is reserved for configurations without an explicit
/// name (they share the default on-disk directory).
pub const GENERATED_NAME: &str = "generated";

/// Error thrown while loading or validating a topology description. The
/// validation variants name the offending path in the document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the document failed.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document is not valid YAML (or does not match the schema).
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Path of the file.
        path: String,
        /// Underlying error.
        source: serde_yaml::Error,
    },
    /// The reserved project name was used.
    #[error("name: \"{GENERATED_NAME}\" is not allowed (used by default)")]
    ReservedName,
    /// Both `external` and `external_file` were given.
    #[error("external: inline links conflict with external_file")]
    ConflictingExternal,
    /// An AS number appears twice.
    #[error("{path}: AS{asn} is declared more than once")]
    DuplicateAs {
        /// Path in the document.
        path: String,
        /// The duplicated AS number.
        asn: u32,
    },
    /// An AS is declared without routers.
    #[error("{path}: cannot generate an AS without routers")]
    NoRouters {
        /// Path in the document.
        path: String,
    },
    /// A declared subnet length does not fit the AS prefix.
    #[error("{path}: subnet length /{len} does not fit {prefix}")]
    BadSubnetLength {
        /// Path in the document.
        path: String,
        /// The AS prefix.
        prefix: IpNet,
        /// The offending length.
        len: i16,
    },
    /// A router ID is referenced but not defined.
    #[error("{path}: router {id} is not defined (AS has {max} routers)")]
    UnknownRouter {
        /// Path in the document.
        path: String,
        /// The referenced router ID.
        id: usize,
        /// Number of routers in the AS.
        max: usize,
    },
    /// An AS number is referenced but not defined.
    #[error("{path}: AS{asn} is not defined")]
    UnknownAs {
        /// Path in the document.
        path: String,
        /// The referenced AS number.
        asn: u32,
    },
    /// An RPKI server name is referenced but not defined.
    #[error("{path}: RPKI server \"{name}\" is not defined")]
    UnknownRpkiServer {
        /// Path in the document.
        path: String,
        /// The referenced server name.
        name: String,
    },
    /// The two relations of an external link are not inverses of each other.
    #[error("{path}: relation {from} and {to} are not inverses")]
    RelationMismatch {
        /// Path in the document.
        path: String,
        /// Relation declared on the `from` endpoint.
        from: Relation,
        /// Relation declared on the `to` endpoint.
        to: Relation,
    },
    /// A VPN hub-mode field is missing or misused.
    #[error("{path}: {reason}")]
    BadVpn {
        /// Path in the document.
        path: String,
        /// What is wrong.
        reason: String,
    },
    /// An AS declares links or loopbacks but no address pool to draw from.
    #[error("{path}: links require a prefix to allocate subnets from")]
    MissingPrefix {
        /// Path in the document.
        path: String,
    },
}

/// The root of the declarative document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    /// Project name; determines the on-disk configuration directory.
    #[serde(default)]
    pub name: String,
    /// The autonomous systems of the project.
    #[serde(rename = "as")]
    pub ases: Vec<AsConfig>,
    /// Inline inter-AS links.
    #[serde(default)]
    pub external: Option<Vec<ExternalLinkConfig>>,
    /// Path of a document holding the inter-AS links (same schema as the
    /// `external` value). Mutually exclusive with `external`.
    #[serde(default)]
    pub external_file: Option<String>,
    /// Internet exchange points.
    #[serde(default)]
    pub ixps: Vec<IxpConfig>,
    /// Named RPKI servers, referenced from the per-AS client lists.
    #[serde(default)]
    pub rpki: BTreeMap<String, RpkiServerConfig>,
    /// Project-wide defaults.
    #[serde(default)]
    pub global: GlobalConfig,
}

/// Project-wide defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalConfig {
    /// Default BGP profile applied to every AS that does not override it.
    pub bgp: GlobalBgpConfig,
    /// Pool used for external links that do not declare a subnet.
    pub external_prefix: IpNet,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bgp: Default::default(),
            external_prefix: "172.31.0.0/16".parse().unwrap(),
        }
    }
}

/// Project-wide BGP defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalBgpConfig {
    /// Redistribute the IGP into BGP unless the AS overrides it.
    pub redistribute_igp: Option<bool>,
    /// Disable BGP unless the AS overrides it.
    pub disabled: Option<bool>,
}

/// One autonomous system.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsConfig {
    /// The AS number.
    pub asn: u32,
    /// Number of routers to generate (IDs 1..=n).
    pub num_routers: usize,
    /// Internal address pool.
    #[serde(default)]
    pub prefix: Option<IpNet>,
    /// Sub-prefix length for link subnets; -1 selects the family default
    /// (/30 or /126).
    #[serde(default = "default_subnet_length")]
    pub subnet_length: i16,
    /// Loopback range; router `i` receives the `i`-th host address.
    #[serde(default)]
    pub lo_range: Option<IpNet>,
    /// The IGP to run inside the AS.
    #[serde(default)]
    pub igp: IgpKind,
    /// Enable MPLS label switching on internal interfaces.
    #[serde(default)]
    pub mpls: bool,
    /// Docker image used for the routers of this AS.
    #[serde(default)]
    pub image: Option<String>,
    /// Intra-AS links.
    #[serde(default)]
    pub links: Vec<InternalLinkConfig>,
    /// Subnets of the pool that must not be allocated automatically.
    #[serde(default)]
    pub reserved_subnets: Vec<IpNet>,
    /// BGP profile.
    #[serde(default)]
    pub bgp: BgpConfig,
    /// OSPF profile.
    #[serde(default)]
    pub ospf: OspfConfig,
    /// IS-IS profile.
    #[serde(default)]
    pub isis: IsisConfig,
    /// L3 VPNs terminated in this AS.
    #[serde(default)]
    pub vpn: Vec<VpnConfig>,
    /// Hosts attached to routers of this AS.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    /// RPKI client configuration.
    #[serde(default)]
    pub rpki: AsRpkiConfig,
}

fn default_subnet_length() -> i16 {
    -1
}

/// An intra-AS link between two router IDs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InternalLinkConfig {
    /// First endpoint (router ID).
    pub first: usize,
    /// Second endpoint (router ID).
    pub second: usize,
    /// Interface description.
    #[serde(default)]
    pub description: Option<String>,
    /// IGP cost of the link.
    #[serde(default)]
    pub cost: Option<u32>,
    /// Nominal speed in Mb/s.
    #[serde(default)]
    pub speed: Option<u32>,
}

/// Per-AS BGP profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BgpConfig {
    /// Redistribute the IGP into BGP.
    pub redistribute_igp: bool,
    /// Disable BGP entirely for this AS.
    pub disabled: bool,
    /// IBGP mesh control.
    pub ibgp: IbgpConfig,
}

/// IBGP mesh control: automatic full mesh, or manual route reflection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IbgpConfig {
    /// Disable the automatic full mesh.
    pub manual: bool,
    /// Router IDs acting as route reflectors (manual mode).
    pub reflectors: Vec<usize>,
}

/// Per-AS OSPF profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OspfConfig {
    /// Network statements, attached to the named routers.
    pub networks: Vec<OspfNetworkConfig>,
    /// Stub areas.
    pub stubs: Vec<u32>,
}

/// One OSPF network statement.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OspfNetworkConfig {
    /// The advertised prefix.
    pub prefix: IpNet,
    /// The OSPF area.
    #[serde(default)]
    pub area: u32,
    /// Router IDs this statement applies to.
    pub routers: Vec<usize>,
}

/// Per-AS IS-IS profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IsisConfig {
    /// Area number to router IDs. Routers not listed are in area 1.
    pub areas: BTreeMap<u32, Vec<usize>>,
    /// Level (1 or 2) to router IDs. Routers not listed run level 1.
    pub levels: BTreeMap<u8, Vec<usize>>,
}

impl IsisConfig {
    /// The IS-IS area of the given router ID (default 1).
    pub fn area_of(&self, id: usize) -> u32 {
        self.areas
            .iter()
            .find(|(_, routers)| routers.contains(&id))
            .map(|(area, _)| *area)
            .unwrap_or(1)
    }

    /// The IS-IS level of the given router ID (default 1).
    pub fn level_of(&self, id: usize) -> u8 {
        self.levels
            .iter()
            .find(|(_, routers)| routers.contains(&id))
            .map(|(level, _)| *level)
            .unwrap_or(1)
    }
}

/// One L3 VPN.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VpnConfig {
    /// VRF name on the provider-edge routers.
    pub vrf: String,
    /// Hub-and-spoke mode: one customer is the hub, all spoke traffic is
    /// hairpinned through it.
    #[serde(default)]
    pub hub_mode: bool,
    /// The customer sites.
    pub customers: Vec<VpnCustomerConfig>,
}

/// One VPN customer site.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VpnCustomerConfig {
    /// Hostname of the customer edge router.
    pub hostname: String,
    /// Router ID of the parent (provider edge) router.
    pub parent: usize,
    /// Point-to-point subnet between PE and CE.
    pub subnet: IpNet,
    /// Loopback of the CE router.
    #[serde(default)]
    pub loopback: Option<IpNet>,
    /// Hub only: point-to-point subnet of the downstream link.
    #[serde(default)]
    pub subnet_down: Option<IpNet>,
    /// Spokes only: the subnet reachable behind this site.
    #[serde(default)]
    pub remote_subnet: Option<IpNet>,
    /// This customer is the hub.
    #[serde(default)]
    pub hub: bool,
}

/// A host attached to a router.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Hostname of the container.
    pub hostname: String,
    /// Router ID the host is attached to.
    pub router: usize,
    /// Point-to-point subnet between router and host. If absent, a subnet
    /// is allocated from the AS pool.
    #[serde(default)]
    pub subnet: Option<IpNet>,
    /// Docker image for the host container.
    #[serde(default)]
    pub image: Option<String>,
}

/// Per-AS RPKI client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AsRpkiConfig {
    /// Names of servers from the project-level `rpki` mapping.
    pub servers: Vec<String>,
}

/// A named RPKI server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct RpkiServerConfig {
    /// Address of the server.
    pub ip: std::net::IpAddr,
    /// RTR port.
    pub port: u16,
}

/// One endpoint of an external link.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalEndpointConfig {
    /// The AS number of the endpoint.
    pub asn: u32,
    /// The router ID within the AS.
    pub router_id: usize,
    /// Commercial relationship towards the remote AS, from this endpoint's
    /// viewpoint.
    pub relation: Option<Relation>,
    /// Extra route maps applied inbound, after the derived ones.
    #[serde(default)]
    pub route_maps_in: Vec<String>,
    /// Extra route maps applied outbound, after the derived ones.
    #[serde(default)]
    pub route_maps_out: Vec<String>,
}

/// One inter-AS link.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalLinkConfig {
    /// The endpoint declaring the link.
    pub from: ExternalEndpointConfig,
    /// The remote endpoint.
    pub to: ExternalEndpointConfig,
    /// The link subnet. If absent, one is allocated from
    /// `global.external_prefix`.
    #[serde(default)]
    pub subnet: Option<IpNet>,
    /// Nominal speed in Mb/s.
    #[serde(default)]
    pub speed: Option<u32>,
}

/// One internet exchange point.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IxpConfig {
    /// The AS number of the exchange (route server).
    pub asn: u32,
    /// The shared LAN prefix.
    pub prefix: IpNet,
    /// The member routers peering at the exchange.
    pub members: Vec<IxpMemberConfig>,
}

/// One IXP member.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IxpMemberConfig {
    /// The member AS number.
    pub asn: u32,
    /// The router ID within the member AS.
    pub router_id: usize,
}

impl TopologyConfig {
    /// Read and validate a topology description. If the document references
    /// an `external_file`, that file is loaded (relative paths are resolved
    /// against the directory of `path`) and merged.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("reading configuration file {}", path.display());
        let mut conf = Self::parse_file(path)?;
        if let Some(ext) = conf.external_file.clone() {
            if conf.external.is_some() {
                return Err(ConfigError::ConflictingExternal);
            }
            let ext_path = resolve_relative(path, &ext);
            let raw = std::fs::read_to_string(&ext_path).map_err(|source| {
                ConfigError::Read { path: ext_path.display().to_string(), source }
            })?;
            let links: Vec<ExternalLinkConfig> =
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: ext_path.display().to_string(),
                    source,
                })?;
            conf.external = Some(links);
            conf.external_file = None;
        }
        conf.validate()?;
        Ok(conf)
    }

    /// Parse a topology description from a string. Used by the test suite;
    /// `load` goes through this as well.
    pub fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let conf: Self = serde_yaml::from_str(raw)
            .map_err(|source| ConfigError::Parse { path: origin.to_string(), source })?;
        conf.validate()?;
        Ok(conf)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        serde_yaml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    /// The project name, falling back to the reserved default.
    pub fn project_name(&self) -> &str {
        if self.name.is_empty() {
            GENERATED_NAME
        } else {
            &self.name
        }
    }

    /// The effective BGP profile of an AS, with the global defaults merged.
    pub fn effective_bgp(&self, asys: &AsConfig) -> BgpConfig {
        let mut bgp = asys.bgp.clone();
        if let Some(r) = self.global.bgp.redistribute_igp {
            bgp.redistribute_igp = bgp.redistribute_igp || r;
        }
        if let Some(d) = self.global.bgp.disabled {
            bgp.disabled = bgp.disabled || d;
        }
        bgp
    }

    /// Check every structural constraint of the document.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name == GENERATED_NAME {
            return Err(ConfigError::ReservedName);
        }
        if self.external.is_some() && self.external_file.is_some() {
            return Err(ConfigError::ConflictingExternal);
        }

        let mut seen: BTreeSet<u32> = BTreeSet::new();
        for (i, asys) in self.ases.iter().enumerate() {
            let path = format!("as[{i}]");
            if !seen.insert(asys.asn) {
                return Err(ConfigError::DuplicateAs { path, asn: asys.asn });
            }
            asys.validate(&path, &self.rpki)?;
        }

        let num_routers = |asn: u32| {
            self.ases
                .iter()
                .find(|a| a.asn == asn)
                .map(|a| a.num_routers)
        };

        for (i, lnk) in self.external.iter().flatten().enumerate() {
            for (end, side) in [(&lnk.from, "from"), (&lnk.to, "to")] {
                let path = format!("external[{i}].{side}");
                match num_routers(end.asn) {
                    None => return Err(ConfigError::UnknownAs { path, asn: end.asn }),
                    Some(n) if end.router_id < 1 || end.router_id > n => {
                        return Err(ConfigError::UnknownRouter {
                            path: format!("{path}.router_id"),
                            id: end.router_id,
                            max: n,
                        })
                    }
                    Some(_) => {}
                }
            }
            if let (Some(from), Some(to)) = (lnk.from.relation, lnk.to.relation) {
                if from.inverse() != to {
                    return Err(ConfigError::RelationMismatch {
                        path: format!("external[{i}]"),
                        from,
                        to,
                    });
                }
            }
        }

        for (i, ixp) in self.ixps.iter().enumerate() {
            for (j, member) in ixp.members.iter().enumerate() {
                let path = format!("ixps[{i}].members[{j}]");
                match num_routers(member.asn) {
                    None => return Err(ConfigError::UnknownAs { path, asn: member.asn }),
                    Some(n) if member.router_id < 1 || member.router_id > n => {
                        return Err(ConfigError::UnknownRouter {
                            path: format!("{path}.router_id"),
                            id: member.router_id,
                            max: n,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }
}

impl AsConfig {
    fn validate(
        &self,
        path: &str,
        rpki: &BTreeMap<String, RpkiServerConfig>,
    ) -> Result<(), ConfigError> {
        if self.num_routers < 1 {
            return Err(ConfigError::NoRouters { path: format!("{path}.num_routers") });
        }
        if let Some(prefix) = self.prefix {
            if self.subnet_length >= 0
                && !((prefix.prefix_len() as i16..=prefix.max_prefix_len() as i16)
                    .contains(&self.subnet_length))
            {
                return Err(ConfigError::BadSubnetLength {
                    path: format!("{path}.subnet_length"),
                    prefix,
                    len: self.subnet_length,
                });
            }
        } else if !self.links.is_empty() {
            return Err(ConfigError::MissingPrefix { path: format!("{path}.links") });
        }

        let check_router = |id: usize, p: String| {
            if id < 1 || id > self.num_routers {
                Err(ConfigError::UnknownRouter { path: p, id, max: self.num_routers })
            } else {
                Ok(())
            }
        };

        for (i, lnk) in self.links.iter().enumerate() {
            check_router(lnk.first, format!("{path}.links[{i}].first"))?;
            check_router(lnk.second, format!("{path}.links[{i}].second"))?;
        }
        for (i, r) in self.bgp.ibgp.reflectors.iter().enumerate() {
            check_router(*r, format!("{path}.bgp.ibgp.reflectors[{i}]"))?;
        }
        for (i, n) in self.ospf.networks.iter().enumerate() {
            for (j, r) in n.routers.iter().enumerate() {
                check_router(*r, format!("{path}.ospf.networks[{i}].routers[{j}]"))?;
            }
        }
        for (area, routers) in &self.isis.areas {
            for (j, r) in routers.iter().enumerate() {
                check_router(*r, format!("{path}.isis.areas.{area}[{j}]"))?;
            }
        }
        for (level, routers) in &self.isis.levels {
            for (j, r) in routers.iter().enumerate() {
                check_router(*r, format!("{path}.isis.levels.{level}[{j}]"))?;
            }
        }
        for (i, host) in self.hosts.iter().enumerate() {
            check_router(host.router, format!("{path}.hosts[{i}].router"))?;
            if host.subnet.is_none() && self.prefix.is_none() {
                return Err(ConfigError::MissingPrefix {
                    path: format!("{path}.hosts[{i}].subnet"),
                });
            }
        }
        for (i, vpn) in self.vpn.iter().enumerate() {
            let vpath = format!("{path}.vpn[{i}]");
            let hubs = vpn.customers.iter().filter(|c| c.hub).count();
            if vpn.hub_mode && hubs != 1 {
                return Err(ConfigError::BadVpn {
                    path: vpath,
                    reason: format!("hub mode requires exactly one hub, found {hubs}"),
                });
            }
            for (j, cust) in vpn.customers.iter().enumerate() {
                let cpath = format!("{vpath}.customers[{j}]");
                check_router(cust.parent, format!("{cpath}.parent"))?;
                if vpn.hub_mode && cust.hub && cust.subnet_down.is_none() {
                    return Err(ConfigError::BadVpn {
                        path: cpath,
                        reason: "the hub requires subnet_down".to_string(),
                    });
                }
                if vpn.hub_mode && !cust.hub && cust.remote_subnet.is_none() {
                    return Err(ConfigError::BadVpn {
                        path: cpath,
                        reason: "spokes require remote_subnet".to_string(),
                    });
                }
            }
        }
        for (i, name) in self.rpki.servers.iter().enumerate() {
            if !rpki.contains_key(name) {
                return Err(ConfigError::UnknownRpkiServer {
                    path: format!("{path}.rpki.servers[{i}]"),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn resolve_relative(base: &Path, child: &str) -> PathBuf {
    let child_path = Path::new(child);
    if child_path.is_absolute() {
        child_path.to_path_buf()
    } else {
        base.parent().unwrap_or_else(|| Path::new(".")).join(child_path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"
name: test
as:
  - asn: 100
    num_routers: 2
    prefix: 10.0.0.0/24
    links:
      - { first: 1, second: 2 }
"#;

    #[test]
    fn minimal_document() {
        let conf = TopologyConfig::parse(MINIMAL, "test").unwrap();
        assert_eq!(conf.project_name(), "test");
        assert_eq!(conf.ases.len(), 1);
        assert_eq!(conf.ases[0].subnet_length, -1);
        assert!(!conf.effective_bgp(&conf.ases[0]).disabled);
        assert!(!conf.ases[0].bgp.ibgp.manual);
    }

    #[test]
    fn reserved_name_is_rejected() {
        let raw = MINIMAL.replace("name: test", "name: generated");
        assert!(matches!(
            TopologyConfig::parse(&raw, "test"),
            Err(ConfigError::ReservedName)
        ));
    }

    #[test]
    fn unknown_router_names_the_path() {
        let raw = MINIMAL.replace("second: 2", "second: 5");
        match TopologyConfig::parse(&raw, "test") {
            Err(ConfigError::UnknownRouter { path, id: 5, max: 2 }) => {
                assert_eq!(path, "as[0].links[0].second")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn inverse_relations_are_enforced() {
        let raw = r#"
name: test
as:
  - { asn: 100, num_routers: 1 }
  - { asn: 200, num_routers: 1 }
external:
  - from: { asn: 100, router_id: 1, relation: provider }
    to: { asn: 200, router_id: 1, relation: peer }
"#;
        assert!(matches!(
            TopologyConfig::parse(raw, "test"),
            Err(ConfigError::RelationMismatch { .. })
        ));
    }

    #[test]
    fn isis_membership_defaults() {
        let isis = IsisConfig {
            areas: BTreeMap::from([(2, vec![1, 3])]),
            levels: BTreeMap::from([(2, vec![3])]),
        };
        assert_eq!(isis.area_of(1), 2);
        assert_eq!(isis.area_of(2), 1);
        assert_eq!(isis.level_of(3), 2);
        assert_eq!(isis.level_of(1), 1);
    }
}
