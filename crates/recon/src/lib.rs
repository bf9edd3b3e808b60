//! `ledgerlink-recon` — invoice-to-bank reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded records, returns matched snapshots
//! plus an audit summary. Three deterministic passes (exact, fee-tolerant,
//! batch), each over the pool of records left open by the previous one.
//! No CLI or filesystem dependencies; the CSV helpers are string-based.

pub mod batch;
mod commit;
pub mod config;
pub mod csvio;
pub mod engine;
pub mod error;
pub mod fee;
pub mod model;

pub use config::{MatchingConfig, ReconConfig};
pub use engine::reconcile;
pub use error::ReconError;
pub use model::{BankRecord, InvoiceRecord, MatchEvent, ReconOutput, ReconSummary};
