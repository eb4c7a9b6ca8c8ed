//! Registry assembly.
//!
//! Builds the in-memory lookup registry out of the two CSV inputs:
//! country rows and AS rows are interned separately, joined by prefix
//! into 8-byte [`NetMeta`] handles, and frozen into the interval
//! index. After the freeze only the two value arrays and the index
//! remain.

use std::collections::hash_map::Entry;
use std::net::IpAddr;
use std::path::Path;

use ahash::AHashMap;
use ipnet::IpNet;

use crate::error::{Error, Result};
use crate::ingest::{self, CancelFlag, IpVersion, ASN_CSV_FIELDS, COUNTRY_CSV_FIELDS};
use crate::intern::UniquePrefixTable;
use crate::meta::{AsMeta, Code2, CountryMeta, IpMetadata, NetMeta, NetworkClass};
use crate::ipset::{IpRangeSet, IpRangeSetBuilder};
use crate::service::MetaLookup;

/// Frozen IP metadata registry.
#[derive(Debug)]
pub struct IpRegistry {
    countries: Vec<CountryMeta>,
    systems: Vec<AsMeta>,
    index: IpRangeSet<NetMeta>,
}

impl IpRegistry {
    /// Ingest both CSV inputs and freeze the registry.
    pub fn from_csv(
        country_csv: impl AsRef<Path>,
        asn_csv: impl AsRef<Path>,
        version: IpVersion,
        cancel: &CancelFlag,
    ) -> Result<Self> {
        let mut country_table: UniquePrefixTable<CountryMeta> = UniquePrefixTable::new();
        ingest::read_prefix_csv(
            country_csv,
            COUNTRY_CSV_FIELDS,
            version,
            cancel,
            |net, cols| {
                let meta = CountryMeta {
                    continent_code: Code2::new(&cols[0]),
                    country_code: Code2::new(&cols[1]),
                    country_name: cols[2].clone(),
                };
                country_table.add(net, meta)?;
                Ok(())
            },
        )?;

        let mut as_table: UniquePrefixTable<AsMeta> = UniquePrefixTable::new();
        ingest::read_prefix_csv(asn_csv, ASN_CSV_FIELDS, version, cancel, |net, cols| {
            let Some(asn) = ingest::parse_asn(&cols[0]) else {
                return Ok(());
            };
            let meta = AsMeta {
                asn,
                country_code: Code2::new(&cols[1]),
                name: cols[2].clone(),
                org: cols[3].clone(),
                domain: cols[4].clone(),
            };
            as_table.add(net, meta)?;
            Ok(())
        })?;

        let index = join_tables(&country_table, &as_table);

        log::info!(
            "registry frozen: ranges={} countries={} systems={}",
            index.size(),
            country_table.len(),
            as_table.len()
        );

        Ok(Self {
            countries: country_table.into_values(),
            systems: as_table.into_values(),
            index,
        })
    }

    /// Number of ranges in the frozen index.
    pub fn size(&self) -> usize {
        self.index.size()
    }

    /// Longest-match metadata lookup for a global address.
    pub fn lookup_ip(&self, addr: IpAddr) -> Result<IpMetadata> {
        let Some((network, meta)) = self.index.get(addr) else {
            return Err(Error::LookupFailed);
        };

        let geo = match meta.country_id {
            0 => None,
            id => self.countries.get((id - 1) as usize).cloned(),
        };
        let asn = match meta.as_id {
            0 => None,
            id => self.systems.get((id - 1) as usize).cloned(),
        };

        Ok(IpMetadata {
            class: NetworkClass::Global,
            network: Some(network),
            geo,
            asn,
        })
    }
}

impl MetaLookup for IpRegistry {
    fn lookup_ip(&self, addr: IpAddr) -> Result<IpMetadata> {
        IpRegistry::lookup_ip(self, addr)
    }
}

/// Merge the two interned tables by prefix and freeze the index.
///
/// A prefix present in both inputs collapses to one entry carrying
/// both ids. An AS prefix with no country row borrows the fallback
/// country id recorded for its country code (0 when unknown).
fn join_tables(
    country_table: &UniquePrefixTable<CountryMeta>,
    as_table: &UniquePrefixTable<AsMeta>,
) -> IpRangeSet<NetMeta> {
    let mut merged: AHashMap<IpNet, NetMeta> = AHashMap::new();
    let mut fallback: AHashMap<Code2, u32> = AHashMap::new();

    country_table.for_each(|id, prefixes, meta| {
        if !meta.country_code.is_empty() {
            fallback.entry(meta.country_code).or_insert(id);
        }
        for net in prefixes {
            merged.insert(*net, NetMeta {
                country_id: id,
                as_id: 0,
            });
        }
    });

    as_table.for_each(|id, prefixes, meta| {
        for net in prefixes {
            match merged.entry(*net) {
                Entry::Occupied(mut e) => {
                    e.get_mut().as_id = id;
                }
                Entry::Vacant(e) => {
                    let country_id = fallback.get(&meta.country_code).copied().unwrap_or(0);
                    e.insert(NetMeta {
                        country_id,
                        as_id: id,
                    });
                }
            }
        }
    });

    let mut builder = IpRangeSetBuilder::with_capacity(merged.len());
    for (net, meta) in &merged {
        builder.add_prefix(net, *meta);
    }
    builder.prepare()
}
