//! Transparency log support for bnd
//!
//! Wire types for `dsse` entries and a small client for submitting them to a
//! Rekor v1 instance.

pub mod client;
pub mod entry;
pub mod error;

pub use client::RekorClient;
pub use entry::{
    signed_entry_timestamp_payload, DsseBody, DsseEntry, InclusionProof, LogEntry,
    LogEntryResponse, Verification, DSSE_KIND, DSSE_VERSION,
};
pub use error::{Error, Result};
