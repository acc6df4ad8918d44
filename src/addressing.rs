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

//! Deterministic CIDR pools. A pool walks the equal-sized sub-prefixes of a
//! parent network in ascending numeric order and hands them out to links,
//! loopbacks and LAN segments. All arithmetic is plain integer increments,
//! so two runs over the same input always allocate the same addresses.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error thrown by pool operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressingError {
    /// All sub-prefixes of the parent network have been handed out.
    #[error("network {parent}: no more subnets of length /{len} available")]
    PoolExhausted {
        /// The parent network of the exhausted pool.
        parent: IpNet,
        /// The requested sub-prefix length.
        len: u8,
    },
    /// The requested sub-prefix length does not fit the parent network.
    #[error("network {parent}: invalid sub-prefix length /{len}")]
    InvalidPrefixLength {
        /// The parent network.
        parent: IpNet,
        /// The offending length.
        len: u8,
    },
}

/// A subnet allocator over a parent CIDR.
///
/// The cursor (`next_available`) always points at the next free sub-prefix.
/// [`AddrPool::next_subnet`] returns the cursor and advances it by one
/// subnet, [`AddrPool::next_ip`] returns the cursor and advances it by one
/// host address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddrPool {
    parent: IpNet,
    next_available: IpNet,
    remaining: u128,
    auto_address: bool,
}

impl AddrPool {
    /// Create a pool over `parent` handing out subnets of `sub_len` bits. If
    /// `sub_len` is `None`, the default is two bits short of the address
    /// family maximum (/30 for IPv4, /126 for IPv6), which leaves two usable
    /// host addresses per subnet.
    pub fn new(parent: IpNet, sub_len: Option<u8>) -> Result<Self, AddressingError> {
        let parent = parent.trunc();
        let len = sub_len.unwrap_or(parent.max_prefix_len() - 2);
        if len < parent.prefix_len() || len > parent.max_prefix_len() {
            return Err(AddressingError::InvalidPrefixLength { parent, len });
        }
        Ok(Self {
            parent,
            next_available: IpNet::new(parent.network(), len).unwrap(),
            remaining: 1u128 << (len - parent.prefix_len()),
            auto_address: sub_len.is_some(),
        })
    }

    /// Create a pool that walks the host addresses of `parent` one by one,
    /// starting at the first host (the network address is skipped). Used for
    /// loopback ranges, where every assignment is a /32 or /128.
    pub fn hosts(parent: IpNet) -> Self {
        let parent = parent.trunc();
        let max = parent.max_prefix_len();
        let first = add_offset(parent.network(), 1);
        Self {
            parent,
            next_available: IpNet::new(first, max).unwrap(),
            remaining: (1u128 << (max - parent.prefix_len())) - 1,
            auto_address: false,
        }
    }

    /// The parent network of this pool.
    pub fn parent(&self) -> IpNet {
        self.parent
    }

    /// `true` iff the pool is over an IPv4 network.
    pub fn is4(&self) -> bool {
        matches!(self.parent, IpNet::V4(_))
    }

    /// Whether subnet addresses may be assigned automatically from this pool.
    pub fn auto_address(&self) -> bool {
        self.auto_address
    }

    /// The sub-prefix length the cursor currently walks with.
    pub fn sub_len(&self) -> u8 {
        self.next_available.prefix_len()
    }

    /// `true` iff `len` is a valid sub-prefix length for this pool.
    pub fn check_prefix(&self, len: u8) -> bool {
        (self.parent.prefix_len()..=self.parent.max_prefix_len()).contains(&len)
    }

    /// Return the subnet at the cursor, then advance the cursor to the next
    /// subnet of the same size. The walk is in ascending numeric order.
    pub fn next_subnet(&mut self, len: u8) -> Result<IpNet, AddressingError> {
        if !self.check_prefix(len) {
            return Err(AddressingError::InvalidPrefixLength { parent: self.parent, len });
        }
        if self.remaining == 0 {
            return Err(AddressingError::PoolExhausted { parent: self.parent, len });
        }
        let res = IpNet::new(self.next_available.network(), len).unwrap();
        let size = 1u128 << (res.max_prefix_len() - len);
        self.remaining -= 1;
        // the cursor only advances while subnets remain, so it never leaves
        // the parent
        if self.remaining > 0 {
            self.next_available = IpNet::new(add_offset(res.network(), size), len).unwrap();
        }
        Ok(res)
    }

    /// Take the next subnet and return its first and second host addresses
    /// (carrying the subnet mask), for the two endpoints of a link.
    pub fn next_link_ips(&mut self) -> Result<(IpNet, IpNet), AddressingError> {
        let len = self.sub_len();
        let net = self.next_subnet(len)?;
        let a = IpNet::new(add_offset(net.network(), 1), len).unwrap();
        let b = IpNet::new(add_offset(net.network(), 2), len).unwrap();
        Ok((a, b))
    }

    /// Return the cursor verbatim, then increment its host bits by one.
    pub fn next_ip(&mut self) -> IpNet {
        let res = self.next_available;
        self.next_available =
            IpNet::new(add_offset(res.addr(), 1), res.prefix_len()).unwrap_or(res);
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        res
    }

    /// Advance the cursor past `reserved`, skipping every cursor-sized
    /// subnet that falls inside it.
    pub fn reserve(&mut self, reserved: IpNet) -> Result<(), AddressingError> {
        let len = self.sub_len();
        while self.remaining > 0 && reserved.contains(&self.next_available.network()) {
            self.next_subnet(len)?;
        }
        Ok(())
    }
}

/// Add `offset` to an address, staying within its family. Overflow wraps,
/// which the pools detect through their remaining counters.
pub(crate) fn add_offset(addr: IpAddr, offset: u128) -> IpAddr {
    match addr {
        IpAddr::V4(a) => {
            IpAddr::V4(u32::from(a).wrapping_add(offset as u32).into())
        }
        IpAddr::V6(a) => IpAddr::V6(u128::from(a).wrapping_add(offset).into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! net {
        ($s:expr) => {
            $s.parse::<IpNet>().unwrap()
        };
    }

    #[test]
    fn walk_link_subnets() {
        let mut pool = AddrPool::new(net!("10.0.0.0/24"), None).unwrap();
        let (a, b) = pool.next_link_ips().unwrap();
        pretty_assertions::assert_eq!(a, net!("10.0.0.1/30"));
        pretty_assertions::assert_eq!(b, net!("10.0.0.2/30"));
        let (a, b) = pool.next_link_ips().unwrap();
        pretty_assertions::assert_eq!(a, net!("10.0.0.5/30"));
        pretty_assertions::assert_eq!(b, net!("10.0.0.6/30"));
        pretty_assertions::assert_eq!(pool.next_subnet(30).unwrap(), net!("10.0.0.8/30"));
    }

    #[test]
    fn explicit_subnet_length() {
        let mut pool = AddrPool::new(net!("10.1.0.0/16"), Some(24)).unwrap();
        pretty_assertions::assert_eq!(pool.next_subnet(24).unwrap(), net!("10.1.0.0/24"));
        pretty_assertions::assert_eq!(pool.next_subnet(24).unwrap(), net!("10.1.1.0/24"));
    }

    #[test]
    fn exhaustion_names_the_parent() {
        // a /30 walked with /30 subnets holds exactly one subnet
        let mut pool = AddrPool::new(net!("10.0.0.0/30"), Some(30)).unwrap();
        assert!(pool.next_link_ips().is_ok());
        pretty_assertions::assert_eq!(
            pool.next_link_ips(),
            Err(AddressingError::PoolExhausted { parent: net!("10.0.0.0/30"), len: 30 })
        );
    }

    #[test]
    fn invalid_length_is_rejected() {
        let pool = AddrPool::new(net!("10.0.0.0/24"), None).unwrap();
        assert!(pool.check_prefix(24));
        assert!(pool.check_prefix(32));
        assert!(!pool.check_prefix(23));
        assert!(!pool.check_prefix(33));
        assert!(AddrPool::new(net!("10.0.0.0/24"), Some(16)).is_err());
    }

    #[test]
    fn host_walk_skips_network_address() {
        let mut pool = AddrPool::hosts(net!("10.100.0.0/24"));
        pretty_assertions::assert_eq!(pool.next_ip(), net!("10.100.0.1/32"));
        pretty_assertions::assert_eq!(pool.next_ip(), net!("10.100.0.2/32"));
        pretty_assertions::assert_eq!(pool.next_ip(), net!("10.100.0.3/32"));
    }

    #[test]
    fn reserved_subnets_are_skipped() {
        let mut pool = AddrPool::new(net!("10.0.0.0/24"), Some(30)).unwrap();
        pool.reserve(net!("10.0.0.0/28")).unwrap();
        pretty_assertions::assert_eq!(pool.next_subnet(30).unwrap(), net!("10.0.0.16/30"));
    }

    #[test]
    fn ipv6_walk() {
        let mut pool = AddrPool::new(net!("2001:db8::/64"), None).unwrap();
        let (a, b) = pool.next_link_ips().unwrap();
        pretty_assertions::assert_eq!(a, net!("2001:db8::1/126"));
        pretty_assertions::assert_eq!(b, net!("2001:db8::2/126"));
        let (a, _) = pool.next_link_ips().unwrap();
        pretty_assertions::assert_eq!(a, net!("2001:db8::5/126"));
    }
}
