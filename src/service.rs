//! Lookup service.
//!
//! Classifies the queried address before touching the index: loopback,
//! test and private addresses are answered without a lookup, unknown
//! network areas are rejected, and only global unicast addresses reach
//! the cache and the registry.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::key;
use crate::meta::{IpMetadata, NetworkClass};

/// Primary metadata source (the frozen registry in production).
pub trait MetaLookup {
    fn lookup_ip(&self, addr: IpAddr) -> Result<IpMetadata>;
}

/// Metadata caching collaborator.
///
/// Implementations with mutable state must be internally safe for
/// concurrent writers; `save_ip` is dispatched fire-and-forget.
pub trait MetaCache {
    fn lookup_ip(&self, addr: IpAddr) -> Option<IpMetadata>;
    fn save_ip(&self, addr: IpAddr, meta: &IpMetadata);
}

/// Default cache: stateless, never hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl MetaCache for NoopCache {
    fn lookup_ip(&self, _addr: IpAddr) -> Option<IpMetadata> {
        None
    }

    fn save_ip(&self, _addr: IpAddr, _meta: &IpMetadata) {}
}

struct WellKnown {
    loopback4: IpNet,
    loopback6: IpNet,
    test4: [IpNet; 3],
    test6: IpNet,
    private10: IpNet,
    private172: IpNet,
    private192: IpNet,
    ula: IpNet,
}

static WELL_KNOWN: Lazy<WellKnown> = Lazy::new(|| WellKnown {
    loopback4: parse_net("127.0.0.0/8"),
    loopback6: parse_net("::1/128"),
    test4: [
        parse_net("192.0.2.0/24"),
        parse_net("198.51.100.0/24"),
        parse_net("203.0.113.0/24"),
    ],
    test6: parse_net("2001:db8::/32"),
    private10: parse_net("10.0.0.0/8"),
    private172: parse_net("172.16.0.0/12"),
    private192: parse_net("192.168.0.0/16"),
    ula: parse_net("fc00::/7"),
});

fn parse_net(s: &str) -> IpNet {
    s.parse().expect("well-known prefix")
}

/// Classify an address into its network class, with the matched
/// well-known prefix for the short-circuited classes.
///
/// Total: exactly one class comes back for any address.
pub fn classify(addr: IpAddr) -> (NetworkClass, Option<IpNet>) {
    let wk = &*WELL_KNOWN;
    let addr = key::normalize(addr);

    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            if o[0] == 127 {
                return (NetworkClass::Loopback, Some(wk.loopback4));
            }
            if o[0] == 192 && o[1] == 0 && o[2] == 2 {
                return (NetworkClass::Test, Some(wk.test4[0]));
            }
            if o[0] == 198 && o[1] == 51 && o[2] == 100 {
                return (NetworkClass::Test, Some(wk.test4[1]));
            }
            if o[0] == 203 && o[1] == 0 && o[2] == 113 {
                return (NetworkClass::Test, Some(wk.test4[2]));
            }
            if o[0] == 10 {
                return (NetworkClass::Private, Some(wk.private10));
            }
            if o[0] == 172 && o[1] & 0xf0 == 16 {
                return (NetworkClass::Private, Some(wk.private172));
            }
            if o[0] == 192 && o[1] == 168 {
                return (NetworkClass::Private, Some(wk.private192));
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                return (NetworkClass::Loopback, Some(wk.loopback6));
            }
            let o = v6.octets();
            if o[0] == 0x20 && o[1] == 0x01 && o[2] == 0x0d && o[3] == 0xb8 {
                return (NetworkClass::Test, Some(wk.test6));
            }
            if o[0] & 0xfe == 0xfc {
                return (NetworkClass::Private, Some(wk.ula));
            }
        }
    }

    if is_global_unicast(addr) {
        return (NetworkClass::Global, None);
    }

    (NetworkClass::Unknown, None)
}

/// Global unicast test: not unspecified, loopback, multicast,
/// link-local or (IPv4) broadcast.
fn is_global_unicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_unspecified()
                || v4.is_loopback()
                || v4.is_multicast()
                || v4.is_link_local()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            !(v6.is_unspecified() || v6.is_loopback() || v6.is_multicast())
                && v6.segments()[0] & 0xffc0 != 0xfe80
        }
    }
}

/// Static class dictionary served by `/types`.
pub fn class_dictionary() -> BTreeMap<&'static str, &'static str> {
    NetworkClass::ALL
        .iter()
        .map(|c| (c.as_str(), c.describe()))
        .collect()
}

/// IP metadata lookup with classification short-circuit and a cache
/// collaborator in front of the primary source.
pub struct LookupService<L, C = NoopCache> {
    lookup: Arc<L>,
    cache: Arc<C>,
}

impl<L, C> LookupService<L, C>
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    pub fn new(lookup: Arc<L>, cache: Arc<C>) -> Self {
        Self { lookup, cache }
    }

    /// Resolve metadata for one address.
    ///
    /// Non-global classes short-circuit with minimal metadata; global
    /// addresses go cache first, then the index, and the index result
    /// is saved back to the cache as a background task.
    pub async fn lookup_ip(&self, addr: IpAddr) -> Result<IpMetadata> {
        let addr = key::normalize(addr);
        let (class, network) = classify(addr);

        match class {
            NetworkClass::Unknown => {
                log::warn!("lookup aborted: ip={addr} network_type=unknown");
                Err(Error::UnknownNetworkArea)
            }
            NetworkClass::Loopback | NetworkClass::Test | NetworkClass::Private => {
                log::debug!("lookup skipped: ip={addr} network_type={class}");
                Ok(IpMetadata::minimal(class, network))
            }
            NetworkClass::Global => {
                if let Some(meta) = self.cache.lookup_ip(addr) {
                    log::debug!("cache hit: ip={addr}");
                    return Ok(meta);
                }

                let meta = self.lookup.lookup_ip(addr).map_err(|e| {
                    log::error!("lookup failed: ip={addr} error={e}");
                    e
                })?;

                let cache = Arc::clone(&self.cache);
                let saved = meta.clone();
                tokio::spawn(async move {
                    cache.save_ip(addr, &saved);
                });

                Ok(meta)
            }
        }
    }

    /// Resolve metadata for a prefix by its address.
    pub async fn lookup_prefix(&self, net: IpNet) -> Result<IpMetadata> {
        self.lookup_ip(net.addr()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    struct FixedLookup(IpMetadata);

    impl MetaLookup for FixedLookup {
        fn lookup_ip(&self, _addr: IpAddr) -> Result<IpMetadata> {
            Ok(self.0.clone())
        }
    }

    struct FailingLookup;

    impl MetaLookup for FailingLookup {
        fn lookup_ip(&self, _addr: IpAddr) -> Result<IpMetadata> {
            Err(Error::LookupFailed)
        }
    }

    fn global_meta() -> IpMetadata {
        IpMetadata {
            class: NetworkClass::Global,
            network: Some(net("8.8.8.0/24")),
            geo: None,
            asn: None,
        }
    }

    #[test]
    fn test_classify_loopback() {
        assert_eq!(
            classify(addr("127.0.0.1")),
            (NetworkClass::Loopback, Some(net("127.0.0.0/8")))
        );
        assert_eq!(
            classify(addr("127.200.1.1")),
            (NetworkClass::Loopback, Some(net("127.0.0.0/8")))
        );
        assert_eq!(
            classify(addr("::1")),
            (NetworkClass::Loopback, Some(net("::1/128")))
        );
    }

    #[test]
    fn test_classify_test_networks() {
        assert_eq!(
            classify(addr("192.0.2.5")),
            (NetworkClass::Test, Some(net("192.0.2.0/24")))
        );
        assert_eq!(
            classify(addr("198.51.100.200")),
            (NetworkClass::Test, Some(net("198.51.100.0/24")))
        );
        assert_eq!(
            classify(addr("203.0.113.1")),
            (NetworkClass::Test, Some(net("203.0.113.0/24")))
        );
        assert_eq!(
            classify(addr("2001:db8:abcd::1")),
            (NetworkClass::Test, Some(net("2001:db8::/32")))
        );
    }

    #[test]
    fn test_classify_private() {
        assert_eq!(
            classify(addr("10.20.30.40")),
            (NetworkClass::Private, Some(net("10.0.0.0/8")))
        );
        assert_eq!(
            classify(addr("172.16.0.1")),
            (NetworkClass::Private, Some(net("172.16.0.0/12")))
        );
        assert_eq!(
            classify(addr("172.31.255.255")),
            (NetworkClass::Private, Some(net("172.16.0.0/12")))
        );
        assert_eq!(
            classify(addr("192.168.1.1")),
            (NetworkClass::Private, Some(net("192.168.0.0/16")))
        );
        assert_eq!(
            classify(addr("fd12:3456::1")),
            (NetworkClass::Private, Some(net("fc00::/7")))
        );
    }

    #[test]
    fn test_classify_global_and_unknown() {
        assert_eq!(classify(addr("8.8.8.8")), (NetworkClass::Global, None));
        assert_eq!(classify(addr("2606:4700::1")), (NetworkClass::Global, None));

        // outside every class
        assert_eq!(classify(addr("0.0.0.0")), (NetworkClass::Unknown, None));
        assert_eq!(classify(addr("224.0.0.1")), (NetworkClass::Unknown, None));
        assert_eq!(
            classify(addr("255.255.255.255")),
            (NetworkClass::Unknown, None)
        );
        assert_eq!(classify(addr("169.254.1.1")), (NetworkClass::Unknown, None));
        assert_eq!(classify(addr("fe80::1")), (NetworkClass::Unknown, None));
        assert_eq!(classify(addr("ff02::1")), (NetworkClass::Unknown, None));
    }

    #[test]
    fn test_classify_is_total() {
        // a spread of addresses; every one lands in exactly one class
        for s in [
            "0.0.0.0", "1.1.1.1", "10.0.0.1", "127.0.0.1", "169.254.0.1", "172.20.0.1",
            "192.0.2.1", "192.168.0.1", "198.51.100.1", "203.0.113.1", "224.0.0.5",
            "255.255.255.255", "::", "::1", "2001:db8::1", "2606:4700::1", "fc00::1",
            "fe80::1", "ff02::1",
        ] {
            let (class, _) = classify(addr(s));
            assert!(NetworkClass::ALL.contains(&class), "{s}");
        }
    }

    #[test]
    fn test_classify_mapped_v4_as_v4() {
        assert_eq!(
            classify(addr("::ffff:10.1.2.3")),
            (NetworkClass::Private, Some(net("10.0.0.0/8")))
        );
        assert_eq!(
            classify(addr("::ffff:127.0.0.1")),
            (NetworkClass::Loopback, Some(net("127.0.0.0/8")))
        );
    }

    #[test]
    fn test_class_dictionary_covers_all() {
        let dict = class_dictionary();
        assert_eq!(dict.len(), NetworkClass::ALL.len());
        assert!(dict.contains_key("global"));
        assert!(dict.contains_key("unknown"));
    }

    #[tokio::test]
    async fn test_private_short_circuits_lookup() {
        let service = LookupService::new(Arc::new(FailingLookup), Arc::new(NoopCache));
        let meta = service.lookup_ip(addr("192.168.1.1")).await.unwrap();

        assert_eq!(meta.class, NetworkClass::Private);
        assert_eq!(meta.network, Some(net("192.168.0.0/16")));
        assert!(meta.geo.is_none());
        assert!(meta.asn.is_none());
    }

    #[tokio::test]
    async fn test_loopback_short_circuits_lookup() {
        let service = LookupService::new(Arc::new(FailingLookup), Arc::new(NoopCache));
        let meta = service.lookup_ip(addr("127.0.0.1")).await.unwrap();

        assert_eq!(meta.class, NetworkClass::Loopback);
        assert_eq!(meta.network, Some(net("127.0.0.0/8")));
    }

    #[tokio::test]
    async fn test_unknown_class_is_error() {
        let service = LookupService::new(Arc::new(FailingLookup), Arc::new(NoopCache));
        let err = service.lookup_ip(addr("224.0.0.1")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownNetworkArea));
        assert_eq!(err.to_string(), "unknown network area");
    }

    #[tokio::test]
    async fn test_global_delegates_to_lookup() {
        let service = LookupService::new(Arc::new(FixedLookup(global_meta())), Arc::new(NoopCache));
        let meta = service.lookup_ip(addr("8.8.8.8")).await.unwrap();
        assert_eq!(meta.network, Some(net("8.8.8.0/24")));
    }

    #[tokio::test]
    async fn test_global_miss_propagates() {
        let service = LookupService::new(Arc::new(FailingLookup), Arc::new(NoopCache));
        let err = service.lookup_ip(addr("8.8.8.8")).await.unwrap_err();
        assert!(matches!(err, Error::LookupFailed));
    }

    #[tokio::test]
    async fn test_mapped_v4_classified_as_v4() {
        let service = LookupService::new(Arc::new(FailingLookup), Arc::new(NoopCache));
        let meta = service.lookup_ip(addr("::ffff:192.168.1.1")).await.unwrap();
        assert_eq!(meta.class, NetworkClass::Private);
        assert_eq!(meta.network, Some(net("192.168.0.0/16")));
    }

    #[tokio::test]
    async fn test_lookup_prefix_uses_prefix_addr() {
        let service = LookupService::new(Arc::new(FixedLookup(global_meta())), Arc::new(NoopCache));
        let meta = service.lookup_prefix(net("8.8.8.0/24")).await.unwrap();
        assert_eq!(meta.class, NetworkClass::Global);
    }
}
