//! Integration tests module
//!
//! This module contains end-to-end integration tests:
//! - Canonical round trip through every protocol version
//! - Substrate request/response flow over V3

pub mod round_trip_test;
