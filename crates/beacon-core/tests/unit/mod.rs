//! Unit tests module
//!
//! This module contains unit tests for individual components:
//! - Peer identifiers
//! - Versioned wire decoding
//! - Storage manager

pub mod storage_test;
pub mod versioned_test;
