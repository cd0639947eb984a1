//! Individual verification checks
//!
//! Each check returns a [`FailureReason`](crate::FailureReason) on failure so
//! the verifier can report the first failing check.

pub mod helpers;
pub mod identity;
pub mod rekor;
pub mod sct;
pub mod tlog;
pub mod tsa;
