//! kernel-get library exports.
//!
//! This module exposes internal components for integration testing.

pub mod configure;
pub mod extract;
pub mod fetch;
pub mod kabi;
pub mod locate;
pub mod pipeline;
pub mod process;
pub mod version;
