//! # cascade-core
//! Contract types, state model, and settlement operations for Cascade, a
//! cascading-donation contract.

pub mod attestation;
pub mod constants;
pub mod contract;
pub mod distribution;
pub mod error;
pub mod intake;
pub mod ledger;
pub mod nickname;
pub mod rules;
pub mod state;
pub mod traits;
pub mod types;
pub mod validation;
