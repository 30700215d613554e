//! zmsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `EventDirectory`, `DateRange`, `ArchiveFile`, `Checksum`,
//!   `RemoteManifestEntry`, `SyncPlan`
//! - **Date codec** - decoding of `YY/MM/DD/HH/mm` event directory paths
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IArchiveProducer`,
//!   `IStatusReporter`
//! - **Configuration** - YAML configuration with defaults and validation
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! orchestrator in `zmsync-sync` composes them.

pub mod config;
pub mod domain;
pub mod ports;
