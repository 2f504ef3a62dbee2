//! Invariant tests module
//!
//! Guarantees that must hold for every message:
//! - Responses echo the id of the request they answer
//! - Responses are only accepted from paired peers

pub mod message_invariant;
