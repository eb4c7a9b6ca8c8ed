//! HTTP response shapes.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use crate::meta::IpMetadata;

/// Unified JSON response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: None,
            errors: None,
            data: Some(data),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            errors: None,
            data: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Flat lookup DTO; empty fields are omitted from the body.
#[derive(Debug, Serialize)]
pub struct LookupDto {
    pub lookup_duration_ms: u64,
    pub success: bool,
    pub request_ip: String,
    pub network_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl LookupDto {
    pub fn from_meta(meta: &IpMetadata, request_ip: IpAddr, took: Duration) -> Self {
        let geo = meta.geo.as_ref();
        let asn = meta.asn.as_ref();

        Self {
            lookup_duration_ms: took.as_millis() as u64,
            success: true,
            request_ip: request_ip.to_string(),
            network_type: meta.class.as_str().to_string(),
            network: meta.network.map(|n| n.to_string()),
            continent_code: geo.and_then(|g| non_empty(g.continent_code.to_string())),
            country_code: geo.and_then(|g| non_empty(g.country_code.to_string())),
            country_name: geo.and_then(|g| non_empty(g.country_name.clone())),
            asn: asn.and_then(|a| if a.asn != 0 { Some(a.asn) } else { None }),
            asn_name: asn.and_then(|a| non_empty(a.name.clone())),
            asn_org: asn.and_then(|a| non_empty(a.org.clone())),
            asn_country_code: asn.and_then(|a| non_empty(a.country_code.to_string())),
            domain: asn.and_then(|a| non_empty(a.domain.clone())),
        }
    }
}
