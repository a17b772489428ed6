//! CertSentry - TLS certificate expiry monitor
//!
//! This library provides the core functionality for watching a list of
//! domains, extracting their TLS certificates through layered probe
//! strategies, and sending expiry alerts and daily reports on a cron
//! schedule with exactly-once dispatch per calendar day.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod dns;
pub mod domain;
pub mod normalize;
pub mod notification;
pub mod probes;
pub mod proxy;
pub mod resolver;
pub mod scheduler;
pub mod storage;
pub mod sweep;

// Re-export core types for convenience
pub use crate::core::*;
