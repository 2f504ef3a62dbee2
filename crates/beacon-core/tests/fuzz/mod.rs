//! Fuzz tests module
//!
//! Property-based testing using proptest to find edge cases:
//! - Identifier parsing and formatting
//! - Wire decoding of arbitrary input

pub mod identifier_fuzz;
