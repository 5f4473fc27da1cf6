//! Integration tests for Omnibridge

pub mod bridge;
pub mod voice_mimic;
