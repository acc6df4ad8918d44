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

//! Module containing the identifiers and small value types shared by the
//! compiler, the emitter and the runtime.

use serde::{Deserialize, Serialize};

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AsId(pub u32);

impl std::fmt::Display for AsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for AsId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<usize> for AsId {
    fn from(x: usize) -> Self {
        Self(x as u32)
    }
}

/// Commercial relationship of an external link, as seen from the endpoint
/// that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// The remote AS is a transit provider of the local one.
    Provider,
    /// The remote AS is a customer of the local one.
    Customer,
    /// Settlement-free peering.
    Peer,
}

impl Relation {
    /// The relation the *other* endpoint of the link must declare for the
    /// pair to be consistent.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Provider => Self::Customer,
            Self::Customer => Self::Provider,
            Self::Peer => Self::Peer,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider => f.write_str("provider"),
            Self::Customer => f.write_str("customer"),
            Self::Peer => f.write_str("peer"),
        }
    }
}

/// Address families over which a BGP session is activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFamily {
    /// `address-family ipv4 unicast`
    pub ipv4: bool,
    /// `address-family ipv6 unicast`
    pub ipv6: bool,
    /// `address-family ipv4 vpn`
    pub vpnv4: bool,
    /// `address-family ipv6 vpn`
    pub vpnv6: bool,
}

/// The interior gateway protocol an AS runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgpKind {
    /// No IGP is configured.
    #[default]
    None,
    /// OSPFv2 (and OSPFv3 for IPv6 segments).
    Ospf,
    /// IS-IS.
    Isis,
}

/// Stable handle to a router in the resolved graph.
///
/// Routers are owned by their AS (or by a VPN definition, or by an IXP), and
/// everything else refers to them through these handles, resolved via
/// [`crate::project::Project::router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouterRef {
    /// Router `idx` of the AS with the given number.
    Internal(AsId, usize),
    /// Customer edge router `cust` of VPN `vpn` in the given AS.
    Customer(AsId, usize, usize),
    /// The route server of IXP `idx`.
    RouteServer(usize),
}
