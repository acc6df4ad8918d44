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

//! The resolved topology. [`Project::compile`] turns a validated
//! declaration into the fully materialized graph: every router, interface,
//! address, BGP session, VPN attachment and IXP fabric. Compilation is
//! single-threaded and deterministic; ASes are built in ascending ASN
//! order, everything else in declaration order. Once compiled, the project
//! is read-only for the emitter, the bridge planner and the runtime.

use std::collections::BTreeMap;
use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::addressing::{AddrPool, AddressingError};
use crate::config::{RpkiServerConfig, TopologyConfig};
use crate::types::{AsId, RouterRef};

pub mod asys;
pub mod external;
pub mod router;
pub mod vpn;

pub use asys::{AutonomousSystem, Host, HostLink};
pub use external::{ExtEndpoint, ExternalLink, Ixp};
pub use router::{BgpNbr, IgpIfConfig, Link, LinkItem, NetInterface, Router};
pub use vpn::{Vpn, VpnCustomer};

/// Error thrown during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An address pool ran dry or was misused.
    #[error("{0}")]
    Addressing(#[from] AddressingError),
    /// An AS declares links but no address pool to allocate from.
    #[error("AS{asn}: no address pool to allocate link subnets from")]
    MissingPool {
        /// The AS missing a prefix.
        asn: u32,
    },
}

/// The root container of a materialization.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project name; determines the configuration directory.
    pub name: String,
    /// The autonomous systems, keyed (and iterated) by ASN.
    pub ases: BTreeMap<AsId, AutonomousSystem>,
    /// The inter-AS links.
    pub external: Vec<ExternalLink>,
    /// The internet exchange points.
    pub ixps: Vec<Ixp>,
    /// Named RPKI servers.
    pub rpki: BTreeMap<String, RpkiServerConfig>,
}

impl Project {
    /// Compile a validated declaration into the resolved graph. The same
    /// input always yields the same output.
    pub fn compile(conf: &TopologyConfig) -> Result<Self, CompileError> {
        let mut ases = BTreeMap::new();
        for cfg in conf.ases.iter().sorted_by_key(|a| a.asn) {
            let bgp = conf.effective_bgp(cfg);
            ases.insert(AsId(cfg.asn), asys::build(cfg, &bgp)?);
        }

        let mut project = Self {
            name: conf.project_name().to_string(),
            ases,
            external: Vec::new(),
            ixps: Vec::new(),
            rpki: conf.rpki.clone(),
        };

        let mut shared_pool = AddrPool::new(conf.global.external_prefix, None)?;
        external::build_external(
            &mut project,
            conf.external.as_deref().unwrap_or(&[]),
            &mut shared_pool,
        )?;
        external::build_ixps(&mut project, &conf.ixps)?;

        Ok(project)
    }

    /// Resolve a router handle.
    ///
    /// Handles are only ever produced by the compiler, so an invalid one is
    /// a bug in the builders and panics.
    pub fn router(&self, r: RouterRef) -> &Router {
        match r {
            RouterRef::Internal(asn, idx) => &self.ases[&asn].routers[idx],
            RouterRef::Customer(asn, vpn, cust) => {
                &self.ases[&asn].vpns[vpn].customers[cust].router
            }
            RouterRef::RouteServer(idx) => &self.ixps[idx].route_server,
        }
    }

    /// Resolve a router handle mutably. See [`Project::router`].
    pub fn router_mut(&mut self, r: RouterRef) -> &mut Router {
        match r {
            RouterRef::Internal(asn, idx) => {
                &mut self.ases.get_mut(&asn).unwrap().routers[idx]
            }
            RouterRef::Customer(asn, vpn, cust) => {
                &mut self.ases.get_mut(&asn).unwrap().vpns[vpn].customers[cust].router
            }
            RouterRef::RouteServer(idx) => &mut self.ixps[idx].route_server,
        }
    }

    /// The root directory of the tool (`$TOPOLAB_HOME`, or
    /// `$HOME/topolab`).
    pub fn main_dir() -> PathBuf {
        main_dir()
    }

    /// The configuration directory of this project.
    pub fn config_dir(&self) -> PathBuf {
        main_dir().join(&self.name)
    }

    /// The configuration file of a regular router.
    pub fn router_config_path(&self, asn: AsId, hostname: &str) -> PathBuf {
        self.config_dir().join(format!("conf_{}_{}", asn.0, hostname))
    }

    /// The configuration file of a VPN customer router.
    pub fn customer_config_path(&self, hostname: &str) -> PathBuf {
        self.config_dir().join(format!("conf_cust_{hostname}"))
    }
}

/// The root directory of the tool on disk.
pub fn main_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TOPOLAB_HOME") {
        PathBuf::from(dir)
    } else {
        let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
        PathBuf::from(home).join("topolab")
    }
}
