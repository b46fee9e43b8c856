//! Clipline - play segmented recordings as one continuous timeline
//!
//! This library crate exposes the CLI helpers for integration testing.

pub mod report;
pub mod segments;
