//! 128-bit range keys.
//!
//! Every address is packed into a single `u128` by way of its IPv6 form
//! (IPv4 goes through the `::ffff:a.b.c.d` embedding), big-endian. This
//! puts IPv4 and IPv6 into one ordered key space, so the interval index
//! can binary-search both families with the same comparator.

use std::net::{IpAddr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// Pack an address into its range key.
pub fn addr_key(addr: IpAddr) -> u128 {
    let octets = match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    u128::from_be_bytes(octets)
}

/// Unpack a range key back into an address.
///
/// IPv4-mapped keys come back as `IpAddr::V4`.
pub fn key_addr(key: u128) -> IpAddr {
    let v6 = Ipv6Addr::from(key.to_be_bytes());
    match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    }
}

/// Collapse an IPv4-mapped IPv6 address to its IPv4 form.
pub fn normalize(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        IpAddr::V4(_) => addr,
    }
}

/// Key boundaries of a prefix: (network address, broadcast address).
pub fn prefix_range(net: &IpNet) -> (u128, u128) {
    (addr_key(net.network()), addr_key(net.broadcast()))
}

/// The aligned prefix a closed key range encodes.
///
/// For a range that is exactly one CIDR block this reconstructs that
/// block; for anything else it is the smallest aligned block covering
/// both ends. Total over all `start <= end`.
pub fn range_prefix(start: u128, end: u128) -> IpNet {
    let bits = (start ^ end).leading_zeros();
    let mask = if bits == 0 {
        0
    } else {
        u128::MAX << (128 - bits)
    };

    match key_addr(start & mask) {
        // Two mapped keys always share their top 96 bits, so a mapped
        // network implies bits >= 96 here.
        IpAddr::V4(v4) => Ipv4Net::new(v4, bits.saturating_sub(96) as u8)
            .map(IpNet::V4)
            .unwrap_or_else(|_| IpNet::from(IpAddr::V4(v4))),
        IpAddr::V6(v6) => Ipv6Net::new(v6, bits as u8)
            .map(IpNet::V6)
            .unwrap_or_else(|_| IpNet::from(IpAddr::V6(v6))),
    }
}
