//! In-memory storage backends.
//!
//! History is an append-only log of certificate observations; the claim
//! table backs the idempotent dispatch gate. Both live behind the
//! [`HistorySink`] and [`ClaimStore`] traits so a durable backend can be
//! swapped in without touching the scheduler or dispatch layers.

use crate::core::{CertificateRecord, ClaimStore, HistorySink};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Append-only in-memory observation log.
#[derive(Default)]
pub struct MemoryHistory {
    rows: Mutex<Vec<CertificateRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row ever appended, in insertion order.
    pub fn all(&self) -> Result<Vec<CertificateRecord>> {
        Ok(self
            .rows
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?
            .clone())
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn append(&self, record: &CertificateRecord) -> Result<()> {
        self.rows
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    async fn latest_per_domain(&self) -> Result<Vec<CertificateRecord>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        let mut latest: HashMap<String, CertificateRecord> = HashMap::new();
        for row in rows.iter() {
            match latest.get(&row.domain) {
                Some(existing) if existing.observed_at > row.observed_at => {}
                _ => {
                    latest.insert(row.domain.clone(), row.clone());
                }
            }
        }
        let mut records: Vec<_> = latest.into_values().collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(records)
    }
}

/// Claim table with insert-if-absent semantics.
///
/// The map value is the confirmed send time; `None` means claimed but not
/// yet confirmed. The conditional insert happens under one lock
/// acquisition, so two concurrent claimants for the same key observe
/// exactly one winner.
#[derive(Default)]
pub struct MemoryClaimStore {
    claims: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The confirmed send time for a window, if the send was confirmed.
    pub fn sent_at(&self, window_key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .claims
            .lock()
            .map_err(|_| anyhow!("claim lock poisoned"))?
            .get(window_key)
            .copied()
            .flatten())
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn try_claim(&self, window_key: &str) -> Result<bool> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| anyhow!("claim lock poisoned"))?;
        if claims.contains_key(window_key) {
            return Ok(false);
        }
        claims.insert(window_key.to_string(), None);
        Ok(true)
    }

    async fn mark_sent(&self, window_key: &str, at: DateTime<Utc>) -> Result<()> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| anyhow!("claim lock poisoned"))?;
        match claims.get_mut(window_key) {
            Some(sent) => {
                *sent = Some(at);
                Ok(())
            }
            None => Err(anyhow!("no claim exists for window {window_key}")),
        }
    }

    async fn release(&self, window_key: &str) -> Result<()> {
        self.claims
            .lock()
            .map_err(|_| anyhow!("claim lock poisoned"))?
            .remove(window_key);
        Ok(())
    }
}
