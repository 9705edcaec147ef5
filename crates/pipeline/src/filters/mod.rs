//! Filter implementations for the candidate pipeline.

pub mod already_rated;

pub use already_rated::AlreadyRatedFilter;
