//! End-to-end and adversarial test suite for Cascade.
//!
//! Integration tests drive the contract through the node and through the
//! in-memory harness in [`helpers`], and property tests try to break the
//! settlement invariants under randomized inputs.

pub mod helpers;
