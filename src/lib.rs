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

#![deny(missing_docs, missing_debug_implementations)]

//! # Topolab
//!
//! Topolab materializes a declarative description of interconnected
//! autonomous systems into a running, emulated network: every router is a
//! Docker container running FRRouting, and every link is a virtual
//! Ethernet segment carried by an Open vSwitch bridge.
//!
//! The heart of the crate is the *topology compiler*: a pure,
//! deterministic transformation from the declaration to a fully resolved
//! graph in which every router, interface, address, BGP session, IGP
//! membership, VPN attachment and bridge assignment is materialized.
//! The same input always produces byte-identical router configurations
//! and the same bridge plan.
//!
//! ## Pipeline
//!
//! 1. [`config::TopologyConfig::load`] parses and validates the YAML
//!    description.
//! 2. [`project::Project::compile`] materializes the graph: routers,
//!    loopbacks, subnet allocation from the per-AS [`addressing::AddrPool`],
//!    IBGP meshes (full or route-reflected), inter-AS sessions with policy
//!    derived by [`policy::route_maps`], IXP fabrics and L3 VPNs.
//! 3. [`frr::generate`] renders one FRR configuration per router, and
//!    [`bridge::BridgePlan::build`] names every bridge and OpenFlow port.
//! 4. [`runtime::start_all`] creates the containers in parallel, applies
//!    the bridges (intra-AS first), and releases every container to start
//!    its routing daemon through a one-shot "links-ready" gate.
//!
//! ## Example
//!
//! ```no_run
//! use topolab::config::TopologyConfig;
//! use topolab::project::Project;
//!
//! # fn main() -> Result<(), topolab::TopoError> {
//! let conf = TopologyConfig::load("topo.yml")?;
//! let project = Project::compile(&conf)?;
//! let configs = topolab::frr::generate(&project);
//! topolab::frr::write_all(&project, &configs)?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod addressing;
pub mod bridge;
pub mod config;
pub mod frr;
pub mod policy;
pub mod project;
pub mod runtime;
pub mod types;

#[cfg(test)]
mod test;

/// Error type thrown while materializing a topology.
#[derive(Debug, Error)]
pub enum TopoError {
    /// The declarative description is malformed.
    #[error("{0}")]
    Config(#[from] config::ConfigError),
    /// Compilation of the resolved graph failed.
    #[error("{0}")]
    Compile(#[from] project::CompileError),
    /// Writing the configurations failed.
    #[error("{0}")]
    Export(#[from] frr::ExportError),
    /// The container runtime or the switch driver failed.
    #[error("{0}")]
    Runtime(#[from] runtime::RuntimeError),
    /// I/O Error
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
