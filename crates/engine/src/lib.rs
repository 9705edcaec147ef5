//! Engine crate for the movie recommender.
//!
//! Wires the stores, the similarity measures and the candidate pipeline
//! into a single `RecommendationService`.

pub mod config;
pub mod error;
pub mod recommender;
pub mod service;

pub use config::RecommenderConfig;
pub use error::ConfigError;
pub use recommender::{RecommendationGenerator, RecommendationResult};
pub use service::{RecommendationService, UserRatingStats};

// Types that appear in the service's signatures
pub use data_loader::{DataError, MovieAttributes, MovieId, Rating, UserId};
pub use pipeline::Provenance;
pub use similarity::{ContentSimilarityResult, FavoriteMatch, RefreshSummary};
