//! Sluice Core
//!
//! Core types shared across the Sluice pipeline-execution system.
//!
//! This crate contains:
//! - Pipeline types: the record stored in the coordination store and the
//!   worker-side metadata resolved from it
//! - Key layout: helpers for the coordination-store key space

pub mod keys;
pub mod pipeline;

pub use pipeline::{PipelineMetadata, PipelineRecord, PipelineState};
