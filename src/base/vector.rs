//! Fixed 24-byte on-disk prefix encoding.
//!
//! Layout: bytes 0..16 hold the address in IPv6 form (IPv4 stored
//! mapped), big-endian; bytes 16..20 hold the prefix length as a
//! little-endian u32 in the address family's own terms; bytes 20..24
//! are reserved and written as zero. Readers ignore the reserved tail.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::error::{Error, Result};

/// Size of the encoded prefix in bytes.
pub const PREFIX_VECTOR_SIZE: usize = 24;

/// On-disk prefix vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixVector([u8; PREFIX_VECTOR_SIZE]);

impl PrefixVector {
    /// Encode a prefix. Total: an `IpNet` is valid by construction.
    pub fn from_prefix(net: &IpNet) -> Self {
        let mut out = [0u8; PREFIX_VECTOR_SIZE];

        let addr16: [u8; 16] = match net.addr() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        };
        out[..16].copy_from_slice(&addr16);
        out[16..20].copy_from_slice(&u32::from(net.prefix_len()).to_le_bytes());

        PrefixVector(out)
    }

    /// Wrap raw bytes without validation; `to_prefix` validates.
    pub fn from_bytes(bytes: [u8; PREFIX_VECTOR_SIZE]) -> Self {
        PrefixVector(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PREFIX_VECTOR_SIZE] {
        &self.0
    }

    /// Decode back into a prefix.
    ///
    /// Fails with `InvalidPrefixBits` when the stored length exceeds
    /// 128, or 32 for an IPv4-mapped address. Mapped addresses are
    /// presented as IPv4 prefixes.
    pub fn to_prefix(&self) -> Result<IpNet> {
        let mut len = [0u8; 4];
        len.copy_from_slice(&self.0[16..20]);
        let bits = u32::from_le_bytes(len);
        if bits > 128 {
            return Err(Error::InvalidPrefixBits);
        }

        let mut addr16 = [0u8; 16];
        addr16.copy_from_slice(&self.0[..16]);
        let v6 = Ipv6Addr::from(addr16);

        match v6.to_ipv4_mapped() {
            Some(v4) => decode_v4(v4, bits),
            None => Ipv6Net::new(v6, bits as u8)
                .map(IpNet::V6)
                .map_err(|_| Error::InvalidPrefixBits),
        }
    }
}

fn decode_v4(v4: Ipv4Addr, bits: u32) -> Result<IpNet> {
    let bits = u8::try_from(bits).map_err(|_| Error::InvalidPrefixBits)?;
    Ipv4Net::new(v4, bits)
        .map(IpNet::V4)
        .map_err(|_| Error::InvalidPrefixBits)
}
