//! adsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ClientState`, `CampaignRow`, `DateRange`, `ErrorRecord`
//! - **Window calculation** - backfill, append and chunking of date ranges
//! - **Port definitions** - Traits for adapters: `IPerformanceSource`, `IProcessProbe`, `IClock`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! The orchestration of ports lives in `adsync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
