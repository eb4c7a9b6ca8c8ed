//! ipbase - compact IP geolocation/ASN registry.
//!
//! This crate ingests IP-to-country and IP-to-ASN registries
//! distributed as CSV files, compiles them into an immutable in-memory
//! interval index, and answers longest-match metadata lookups for
//! single addresses over a small HTTP API. A compact binary base
//! format persists per-prefix records for offline reuse.
//!
//! # Features
//!
//! - **One key space**: IPv4 and IPv6 share a single ordered u128 key
//!   domain via the IPv4-in-IPv6 embedding
//! - **Frozen index**: ranges are sorted once and served lock-free to
//!   any number of readers
//! - **Metadata interning**: repeated country/AS rows are stored once
//!   and referenced by 8-byte handles
//! - **Binary bases**: DEFLATE-framed fixed-size record files with
//!   pluggable schemas
//! - **Classification short-circuit**: loopback, test and private
//!   addresses never touch the index
//!
//! # Quick Start
//!
//! ```ignore
//! use ipbase::{CancelFlag, IpRegistry, IpVersion};
//!
//! let registry = IpRegistry::from_csv(
//!     "ip-to-country.csv",
//!     "ip-to-asn.csv",
//!     IpVersion::V4V6,
//!     &CancelFlag::new(),
//! )?;
//!
//! let meta = registry.lookup_ip("8.8.8.8".parse()?)?;
//! println!("{:?}", meta.geo);
//! ```

mod error;
mod ingest;
mod intern;
mod ipset;
mod key;
mod meta;
mod registry;
mod service;

pub mod base;
pub mod http;

// Re-export core types
pub use error::{Error, Result};

// Re-export the data model
pub use meta::{AsMeta, Code2, CountryMeta, IpMetadata, NetMeta, NetworkClass};

// Re-export ingestion types
pub use ingest::{
    parse_asn, read_prefix_csv, CancelFlag, IpVersion, ASN_CSV_FIELDS, COUNTRY_CSV_FIELDS,
};

// Re-export the index and its builder
pub use ipset::{IpRangeSet, IpRangeSetBuilder};

// Re-export interning
pub use intern::{UniquePrefixTable, MAX_TABLE_IDS};

// Re-export the registry and the lookup service
pub use registry::IpRegistry;
pub use service::{class_dictionary, classify, LookupService, MetaCache, MetaLookup, NoopCache};
