//! Shared utilities

pub mod hashing;

pub use hashing::*;
