//! Base file record schemas.
//!
//! A record is a 24-byte prefix vector followed by a schema-fixed
//! payload. The writer and reader only touch records through the two
//! small traits below, so new schemas plug in without touching the
//! stream code.

use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};

use super::vector::{PrefixVector, PREFIX_VECTOR_SIZE};
use crate::error::{Error, Result};

/// Payload size of a country record.
pub const COUNTRY_CODE_SIZE: usize = 2;
/// Payload size of one company string field.
pub const COMPANY_FIELD_SIZE: usize = 256;

/// Total on-disk size of a country record.
pub const COUNTRY_RECORD_SIZE: usize = PREFIX_VECTOR_SIZE + COUNTRY_CODE_SIZE;
/// Total on-disk size of a company record.
pub const COMPANY_RECORD_SIZE: usize = PREFIX_VECTOR_SIZE + COMPANY_FIELD_SIZE * 2;

/// A record the base writer can serialise.
pub trait WritableRecord {
    /// The record's 24-byte prefix vector.
    fn prefix_vector(&self) -> PrefixVector;

    /// Append the payload bytes after the prefix vector.
    fn write_fields(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// A record the base reader can parse.
pub trait ReadableRecord {
    /// Total record size on disk, prefix vector included.
    const SIZE: usize;

    fn set_prefix(&mut self, net: IpNet);

    /// Parse the payload slice (exactly `SIZE - 24` bytes).
    fn read_fields(&mut self, payload: &[u8]) -> Result<()>;
}

fn placeholder_net() -> IpNet {
    IpNet::from(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Network-to-country record: prefix plus a two-letter country code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    network: IpNet,
    code: String,
}

impl CountryRecord {
    pub fn new(network: IpNet, code: &str) -> Self {
        Self {
            network,
            code: code.trim().to_ascii_uppercase(),
        }
    }

    pub fn network(&self) -> IpNet {
        self.network
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Default for CountryRecord {
    fn default() -> Self {
        Self {
            network: placeholder_net(),
            code: String::new(),
        }
    }
}

impl WritableRecord for CountryRecord {
    fn prefix_vector(&self) -> PrefixVector {
        PrefixVector::from_prefix(&self.network)
    }

    fn write_fields(&self, buf: &mut Vec<u8>) -> Result<()> {
        let code = self.code.as_bytes();
        if code.len() != COUNTRY_CODE_SIZE {
            return Err(Error::InvalidCountryCode(self.code.clone()));
        }
        buf.extend_from_slice(code);
        Ok(())
    }
}

impl ReadableRecord for CountryRecord {
    const SIZE: usize = COUNTRY_RECORD_SIZE;

    fn set_prefix(&mut self, net: IpNet) {
        self.network = net;
    }

    fn read_fields(&mut self, payload: &[u8]) -> Result<()> {
        self.code = String::from_utf8_lossy(&payload[..COUNTRY_CODE_SIZE]).into_owned();
        Ok(())
    }
}

/// Network-to-company record: prefix plus AS name and organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    network: IpNet,
    name: String,
    org: String,
}

impl CompanyRecord {
    pub fn new(network: IpNet, name: &str, org: &str) -> Self {
        Self {
            network,
            name: name.to_string(),
            org: org.to_string(),
        }
    }

    pub fn network(&self) -> IpNet {
        self.network
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn org(&self) -> &str {
        &self.org
    }
}

impl Default for CompanyRecord {
    fn default() -> Self {
        Self {
            network: placeholder_net(),
            name: String::new(),
            org: String::new(),
        }
    }
}

impl WritableRecord for CompanyRecord {
    fn prefix_vector(&self) -> PrefixVector {
        PrefixVector::from_prefix(&self.network)
    }

    fn write_fields(&self, buf: &mut Vec<u8>) -> Result<()> {
        write_padded(buf, &self.name);
        write_padded(buf, &self.org);
        Ok(())
    }
}

impl ReadableRecord for CompanyRecord {
    const SIZE: usize = COMPANY_RECORD_SIZE;

    fn set_prefix(&mut self, net: IpNet) {
        self.network = net;
    }

    fn read_fields(&mut self, payload: &[u8]) -> Result<()> {
        self.name = read_padded(&payload[..COMPANY_FIELD_SIZE]);
        self.org = read_padded(&payload[COMPANY_FIELD_SIZE..COMPANY_FIELD_SIZE * 2]);
        Ok(())
    }
}

/// Write a string into a fixed 256-byte field, NUL padded.
///
/// Overlong input is cut at the last char boundary that fits, so the
/// stored field stays valid UTF-8.
fn write_padded(buf: &mut Vec<u8>, s: &str) {
    let mut n = s.len().min(COMPANY_FIELD_SIZE);
    while n > 0 && !s.is_char_boundary(n) {
        n -= 1;
    }
    buf.extend_from_slice(&s.as_bytes()[..n]);
    buf.resize(buf.len() + (COMPANY_FIELD_SIZE - n), 0);
}

/// Read a NUL-padded fixed field back into a string.
fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
