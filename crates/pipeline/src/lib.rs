//! Candidate types and the filtering stage of recommendation.
//!
//! This crate provides:
//! - `Candidate` and `Provenance`, the tagged output of each generator branch
//! - `UserContext`, the per-request view of what the user has already rated
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//!
//! ## Architecture
//! Both recommendation branches (collaborative and popularity fallback)
//! produce candidates, and both run them through the same pipeline before
//! ranking, so a rated movie can never reach the caller.
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{FilterPipeline, UserContext};
//! use pipeline::filters::AlreadyRatedFilter;
//!
//! let pipeline = FilterPipeline::new().add_filter(AlreadyRatedFilter);
//! let context = UserContext::with_rated(user_id, rated_ids);
//! let filtered = pipeline.apply(candidates, &context)?;
//! ```

pub mod filter_pipeline;
pub mod filters;
pub mod traits;
pub mod types;

// Re-export main types
pub use filter_pipeline::FilterPipeline;
pub use traits::Filter;
pub use types::{Candidate, Provenance, UserContext};
