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

//! Derivation of per-neighbor policy from commercial relationships. The
//! mapping is pure: a relation yields the named inbound and outbound
//! route-map lists, and the emitter writes the definitions of those maps
//! (carrying the local-preference scheme) into every configuration.

use crate::types::Relation;

/// Local preference assigned to routes learned from customers.
pub const LOCAL_PREF_CUSTOMER: u32 = 10;
/// Local preference assigned to routes learned from providers.
pub const LOCAL_PREF_PROVIDER: u32 = 20;
/// Local preference assigned to routes learned from peers.
pub const LOCAL_PREF_PEER: u32 = 30;

/// Inbound route map applied on sessions towards a provider.
pub const PROVIDER_IN: &str = "PROVIDER_IN";
/// Outbound route map applied on sessions towards a provider.
pub const PROVIDER_OUT: &str = "PROVIDER_OUT";
/// Inbound route map applied on sessions towards a peer.
pub const PEER_IN: &str = "PEER_IN";
/// Outbound route map applied on sessions towards a peer.
pub const PEER_OUT: &str = "PEER_OUT";
/// Inbound route map applied on sessions towards a customer.
pub const CUSTOMER_IN: &str = "CUSTOMER_IN";
/// Outbound route map applied on sessions towards a customer.
pub const CUSTOMER_OUT: &str = "CUSTOMER_OUT";
/// Route map applied when no relation is declared.
pub const ALLOW_ALL: &str = "ALLOW_ALL";

/// Map a relation to its inbound and outbound route-map lists. The derived
/// map comes first; `extra_in` and `extra_out` are appended in order.
pub fn route_maps(
    relation: Option<Relation>,
    extra_in: &[String],
    extra_out: &[String],
) -> (Vec<String>, Vec<String>) {
    let (first_in, first_out) = match relation {
        Some(Relation::Provider) => (PROVIDER_IN, PROVIDER_OUT),
        Some(Relation::Peer) => (PEER_IN, PEER_OUT),
        Some(Relation::Customer) => (CUSTOMER_IN, CUSTOMER_OUT),
        None => (ALLOW_ALL, ALLOW_ALL),
    };
    let mut maps_in = Vec::with_capacity(1 + extra_in.len());
    let mut maps_out = Vec::with_capacity(1 + extra_out.len());
    maps_in.push(first_in.to_string());
    maps_out.push(first_out.to_string());
    maps_in.extend(extra_in.iter().cloned());
    maps_out.extend(extra_out.iter().cloned());
    (maps_in, maps_out)
}

/// The local preference a relation's inbound map applies, if any.
pub fn local_pref(map: &str) -> Option<u32> {
    match map {
        CUSTOMER_IN => Some(LOCAL_PREF_CUSTOMER),
        PROVIDER_IN => Some(LOCAL_PREF_PROVIDER),
        PEER_IN => Some(LOCAL_PREF_PEER),
        _ => None,
    }
}

/// The standard route maps, in emission order.
pub const STANDARD_MAPS: [&str; 7] = [
    PROVIDER_IN,
    PROVIDER_OUT,
    PEER_IN,
    PEER_OUT,
    CUSTOMER_IN,
    CUSTOMER_OUT,
    ALLOW_ALL,
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derived_maps_come_first() {
        let extra = vec!["FILTER_BOGONS".to_string()];
        let (maps_in, maps_out) = route_maps(Some(Relation::Peer), &extra, &[]);
        assert_eq!(maps_in, vec!["PEER_IN", "FILTER_BOGONS"]);
        assert_eq!(maps_out, vec!["PEER_OUT"]);
    }

    #[test]
    fn no_relation_allows_all() {
        let (maps_in, maps_out) = route_maps(None, &[], &[]);
        assert_eq!(maps_in, vec![ALLOW_ALL]);
        assert_eq!(maps_out, vec![ALLOW_ALL]);
    }

    #[test]
    fn local_pref_scheme() {
        assert_eq!(local_pref(CUSTOMER_IN), Some(10));
        assert_eq!(local_pref(PROVIDER_IN), Some(20));
        assert_eq!(local_pref(PEER_IN), Some(30));
        assert_eq!(local_pref(PEER_OUT), None);
        assert_eq!(local_pref(ALLOW_ALL), None);
    }
}
