//! CDN-front detection heuristic.
//!
//! Classifies a domain as "behind a known CDN" by resolving its addresses
//! and matching them against known CDN prefixes, with a hostname-suffix
//! fallback when resolution fails or times out. Intentionally heuristic:
//! a false negative only means the CDN-known short-circuit will not fire
//! and the domain is reported as failed, which is the safe default.

use crate::core::{DnsResolver, ProxyDetector};
use async_trait::async_trait;
use ipnetwork::IpNetwork;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub struct ProxyHeuristic {
    resolver: Arc<dyn DnsResolver>,
    networks: Vec<IpNetwork>,
    domain_suffixes: Vec<String>,
    dns_timeout: Duration,
}

impl ProxyHeuristic {
    pub fn new(
        resolver: Arc<dyn DnsResolver>,
        networks: Vec<IpNetwork>,
        domain_suffixes: Vec<String>,
        dns_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            networks,
            domain_suffixes,
            dns_timeout,
        }
    }

    fn matches_suffix(&self, domain: &str) -> bool {
        self.domain_suffixes
            .iter()
            .any(|suffix| domain == suffix || domain.ends_with(&format!(".{suffix}")))
    }
}

#[async_trait]
impl ProxyDetector for ProxyHeuristic {
    async fn is_likely_proxied(&self, domain: &str) -> bool {
        match timeout(self.dns_timeout, self.resolver.resolve_v4(domain)).await {
            Ok(Ok(addrs)) => {
                let hit = addrs
                    .iter()
                    .any(|addr| self.networks.iter().any(|net| net.contains(*addr)));
                debug!(domain, proxied = hit, addrs = ?addrs, "CDN prefix check");
                hit
            }
            Ok(Err(e)) => {
                debug!(domain, error = %e, "DNS resolution failed, using suffix fallback");
                self.matches_suffix(domain)
            }
            Err(_) => {
                debug!(domain, "DNS resolution timed out, using suffix fallback");
                self.matches_suffix(domain)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::net::IpAddr;

    struct FixedResolver {
        result: Result<Vec<IpAddr>, String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl DnsResolver for FixedResolver {
        async fn resolve_v4(&self, _domain: &str) -> anyhow::Result<Vec<IpAddr>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.result {
                Ok(addrs) => Ok(addrs.clone()),
                Err(msg) => Err(anyhow!(msg.clone())),
            }
        }
    }

    fn heuristic(resolver: FixedResolver) -> ProxyHeuristic {
        ProxyHeuristic::new(
            Arc::new(resolver),
            vec![
                "104.16.0.0/13".parse().unwrap(),
                "172.64.0.0/13".parse().unwrap(),
                "2606:4700::/32".parse().unwrap(),
            ],
            vec!["cdn-fronted.example".to_string()],
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn cdn_prefix_classifies_as_proxied() {
        let h = heuristic(FixedResolver {
            result: Ok(vec!["104.16.1.1".parse().unwrap()]),
            delay: None,
        });
        assert!(h.is_likely_proxied("site.example.com").await);
    }

    #[tokio::test]
    async fn ipv6_prefix_classifies_as_proxied() {
        let h = heuristic(FixedResolver {
            result: Ok(vec!["2606:4700::1234".parse().unwrap()]),
            delay: None,
        });
        assert!(h.is_likely_proxied("site.example.com").await);
    }

    #[tokio::test]
    async fn unrelated_address_is_not_proxied() {
        let h = heuristic(FixedResolver {
            result: Ok(vec!["93.184.216.34".parse().unwrap()]),
            delay: None,
        });
        assert!(!h.is_likely_proxied("site.example.com").await);
    }

    #[tokio::test]
    async fn resolution_failure_falls_back_to_suffix_match() {
        let h = heuristic(FixedResolver {
            result: Err("SERVFAIL".to_string()),
            delay: None,
        });
        assert!(h.is_likely_proxied("shop.cdn-fronted.example").await);
        assert!(!h.is_likely_proxied("other.example.com").await);
    }

    #[tokio::test]
    async fn resolution_timeout_falls_back_to_suffix_match() {
        let h = heuristic(FixedResolver {
            result: Ok(vec!["104.16.1.1".parse().unwrap()]),
            delay: Some(Duration::from_secs(2)),
        });
        assert!(h.is_likely_proxied("cdn-fronted.example").await);
        assert!(!h.is_likely_proxied("other.example.com").await);
    }
}
