//! Core infrastructure for pymove.
//!
//! This crate provides language-agnostic infrastructure:
//! - Byte spans, text positions and text edits
//! - Character-level diffing into edit blocks and position-addressed edits
//! - Unified diff rendering
//! - Error types and error codes
//! - JSON output types for CLI responses

pub mod diff;
pub mod edit;
pub mod error;
pub mod output;
pub mod text;
pub mod types;
