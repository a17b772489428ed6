//! DNS resolution backing the proxy heuristic.

use crate::core::DnsResolver;
use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::rr::RecordType,
    system_conf, TokioResolver,
};
use std::net::IpAddr;
use std::time::Duration;
use tracing::warn;

/// DNS resolver implementation using hickory-resolver.
pub struct HickoryDnsResolver {
    resolver: TokioResolver,
}

impl HickoryDnsResolver {
    /// Creates a resolver from the system configuration, falling back to
    /// Cloudflare DNS when no system servers are configured.
    pub fn new(timeout: Duration) -> Result<Self> {
        let resolver_config = match system_conf::read_system_conf() {
            Ok((config, _)) if !config.name_servers().is_empty() => config,
            _ => {
                warn!("No system DNS servers found, falling back to Cloudflare DNS.");
                ResolverConfig::cloudflare()
            }
        };

        let mut resolver_opts = ResolverOpts::default();
        // ndots = 1 prevents the resolver from appending local search
        // domains; configured domains are always FQDNs.
        resolver_opts.ndots = 1;
        resolver_opts.timeout = timeout;

        let resolver = hickory_resolver::Resolver::builder_with_config(
            resolver_config,
            TokioConnectionProvider::default(),
        )
        .with_options(resolver_opts)
        .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve_v4(&self, domain: &str) -> Result<Vec<IpAddr>> {
        let lookup = self.resolver.lookup(domain, RecordType::A).await?;
        let addrs: Vec<IpAddr> = lookup.into_iter().filter_map(|r| r.ip_addr()).collect();
        if addrs.is_empty() {
            anyhow::bail!("no A records found for {domain}");
        }
        Ok(addrs)
    }
}
