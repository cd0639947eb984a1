//! Attestation bundle handling
//!
//! Encoding, decoding and structural validation of bundles (versions 0.1,
//! 0.2 and 0.3), statement extraction, and JSON Lines collections.

pub mod builder;
pub mod codec;
pub mod error;
pub mod jsonl;
pub mod validation;

pub use builder::{tlog_entry_from_log_entry, BundleV03};
pub use codec::{
    decode, encode, encode_pretty, extract_predicate, extract_predicate_json,
    extract_predicate_type, extract_statement, extract_statement_json, parse_bundle,
    parse_statement,
};
pub use error::{Error, Result};
pub use jsonl::{flatten_json, iterate_jsonl, pack, unpack};
pub use validation::{
    validate_bundle, validate_bundle_with_options, validate_structure, ValidationOptions,
};

pub use bnd_types::{Bundle, MediaType};
