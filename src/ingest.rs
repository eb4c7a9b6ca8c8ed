//! CSV ingestion.
//!
//! Registry inputs are large machine-generated CSV files keyed by
//! prefix in the first column. Files are memory-mapped and scanned in
//! place; each accepted row is handed to a caller callback.
//!
//! Row policy: abort on arity mismatch, skip silently on value parse
//! failure (bad prefix, rejected version, bad ASN).

use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ipnet::IpNet;
use memmap2::Mmap;

use crate::error::{Error, Result};

/// Columns of the country CSV: network, continent, code, name.
pub const COUNTRY_CSV_FIELDS: usize = 4;
/// Columns of the ASN CSV: network, asn, code, name, org, domain.
pub const ASN_CSV_FIELDS: usize = 6;

/// Rows checked between cancellation polls.
const CANCEL_BATCH: usize = 4096;

/// Cooperative cancellation signal for long ingestion runs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// IP version filter applied to ingested prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// Accept everything.
    #[default]
    V4V6,
    /// IPv4 only (plain or IPv4-mapped).
    V4,
    /// IPv6 only.
    V6,
}

impl IpVersion {
    /// Parse a CLI spelling; anything unrecognised accepts all.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" | "v4" | "4" => IpVersion::V4,
            "ipv6" | "v6" | "6" => IpVersion::V6,
            _ => IpVersion::V4V6,
        }
    }

    pub fn accepts(&self, addr: IpAddr) -> bool {
        match self {
            IpVersion::V4V6 => true,
            IpVersion::V4 => match addr {
                IpAddr::V4(_) => true,
                IpAddr::V6(v6) => v6.to_ipv4_mapped().is_some(),
            },
            IpVersion::V6 => addr.is_ipv6(),
        }
    }
}

/// Stream a prefix-keyed CSV file.
///
/// The header row is skipped. Every following non-empty row must have
/// exactly `fields` columns. Rows whose first column does not parse as
/// a prefix, or whose prefix the version filter rejects, are skipped;
/// everything else reaches `row` as the parsed prefix plus the
/// remaining columns. Errors from `row` abort the read.
pub fn read_prefix_csv(
    path: impl AsRef<Path>,
    fields: usize,
    version: IpVersion,
    cancel: &CancelFlag,
    mut row: impl FnMut(IpNet, &[String]) -> Result<()>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let len = file.metadata().map_err(|e| Error::file(path, e))?.len();
    if len == 0 {
        return Err(Error::file(
            path,
            io::Error::new(io::ErrorKind::UnexpectedEof, "missing csv header"),
        ));
    }

    let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::file(path, e))?;

    let mut cols: Vec<String> = Vec::with_capacity(fields);
    let mut line_no = 0usize;

    for raw in map.split(|&b| b == b'\n') {
        line_no += 1;

        if line_no % CANCEL_BATCH == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // header row
        if line_no == 1 {
            continue;
        }

        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        split_fields(line, &mut cols);
        if cols.len() != fields {
            return Err(Error::CsvArity {
                line: line_no,
                want: fields,
                got: cols.len(),
            });
        }

        let net = match cols[0].parse::<IpNet>() {
            Ok(net) => net.trunc(),
            Err(_) => continue,
        };
        if !version.accepts(net.addr()) {
            continue;
        }

        row(net, &cols[1..])?;
    }

    Ok(())
}

/// Split one CSV line, honouring double quotes and `""` escapes.
fn split_fields(line: &str, out: &mut Vec<String>) {
    out.clear();

    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                ',' => out.push(std::mem::take(&mut field)),
                '"' if field.is_empty() => in_quotes = true,
                _ => field.push(c),
            }
        }
    }

    out.push(field);
}

/// Parse an AS number the way the sources spell it: decimal by
/// default, `0x`/`0o`/`0b` prefixes honoured, optional sign.
pub fn parse_asn(s: &str) -> Option<i32> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    i32::try_from(sign * value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn collect(
        content: &str,
        fields: usize,
        version: IpVersion,
    ) -> Result<Vec<(IpNet, Vec<String>)>> {
        let file = csv_file(content);
        let mut rows = Vec::new();
        read_prefix_csv(file.path(), fields, version, &CancelFlag::new(), |net, cols| {
            rows.push((net, cols.to_vec()));
            Ok(())
        })?;
        Ok(rows)
    }

    #[test]
    fn test_header_skipped_rows_parsed() {
        let rows = collect(
            "network,continent,code,name\n8.8.8.0/24,NA,US,United States\n",
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "8.8.8.0/24".parse::<IpNet>().unwrap());
        assert_eq!(rows[0].1, ["NA", "US", "United States"]);
    }

    #[test]
    fn test_arity_mismatch_aborts() {
        let err = collect(
            "network,continent,code,name\n8.8.8.0/24,NA,US\n",
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::CsvArity { line: 2, want: 4, got: 3 }
        ));
    }

    #[test]
    fn test_bad_prefix_skipped() {
        let rows = collect(
            "h,h,h,h\nnot-a-prefix,NA,US,United States\n8.8.8.0/24,NA,US,United States\n",
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_version_filter() {
        let content = "h,h,h,h\n8.8.8.0/24,NA,US,US\n2001:db8::/32,EU,DE,DE\n";

        let v4 = collect(content, COUNTRY_CSV_FIELDS, IpVersion::V4).unwrap();
        assert_eq!(v4.len(), 1);
        assert!(v4[0].0.addr().is_ipv4());

        let v6 = collect(content, COUNTRY_CSV_FIELDS, IpVersion::V6).unwrap();
        assert_eq!(v6.len(), 1);
        assert!(v6[0].0.addr().is_ipv6());

        let all = collect(content, COUNTRY_CSV_FIELDS, IpVersion::V4V6).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_quoted_fields() {
        let rows = collect(
            "h,h,h,h\n8.8.8.0/24,NA,US,\"United States, of \"\"A\"\"\"\n",
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
        )
        .unwrap();

        assert_eq!(rows[0].1[2], "United States, of \"A\"");
    }

    #[test]
    fn test_host_bits_truncated() {
        let rows = collect(
            "h,h,h,h\n8.8.8.8/24,NA,US,US\n",
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
        )
        .unwrap();
        assert_eq!(rows[0].0, "8.8.8.0/24".parse::<IpNet>().unwrap());
    }

    #[test]
    fn test_empty_file_is_error() {
        let err = collect("", COUNTRY_CSV_FIELDS, IpVersion::V4V6).unwrap_err();
        assert!(matches!(err, Error::File { .. }));
    }

    #[test]
    fn test_callback_error_aborts() {
        let file = csv_file("h,h,h,h\n8.8.8.0/24,NA,US,US\n1.0.0.0/24,OC,AU,AU\n");
        let mut calls = 0;
        let err = read_prefix_csv(
            file.path(),
            COUNTRY_CSV_FIELDS,
            IpVersion::V4V6,
            &CancelFlag::new(),
            |_, _| {
                calls += 1;
                Err(Error::InternOverflow)
            },
        )
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, Error::InternOverflow));
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.clone().cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_parse_asn() {
        assert_eq!(parse_asn("15169"), Some(15169));
        assert_eq!(parse_asn("-1"), Some(-1));
        assert_eq!(parse_asn("0x10"), Some(16));
        assert_eq!(parse_asn("0o17"), Some(15));
        assert_eq!(parse_asn("0b101"), Some(5));
        assert_eq!(parse_asn("AS15169"), None);
        assert_eq!(parse_asn("99999999999"), None);
        assert_eq!(parse_asn(""), None);
    }

    #[test]
    fn test_version_accepts_mapped_v4() {
        assert!(IpVersion::V4.accepts("::ffff:8.8.8.8".parse().unwrap()));
        assert!(!IpVersion::V4.accepts("2001:db8::1".parse().unwrap()));
    }
}
