//! # Data Loader Crate
//!
//! This crate owns the data the recommender reads: the movie catalog, the
//! rating history and the cached user-similarity table.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Rating, MovieAttributes, UserSimilarity, DataIndex)
//! - **parser**: Parse .dat files into Rust structs
//! - **index**: Build indices, per-movie statistics and popularity ranking
//! - **store**: Repository traits and the in-memory `MemoryStore`
//! - **error**: Error types for the data layer
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, MemoryStore, RatingStore};
//! use std::path::Path;
//!
//! let index = DataIndex::load_from_files(Path::new("data/movies"))?;
//! let store = MemoryStore::new(index);
//!
//! let ratings = store.get_ratings_by_user(1)?;
//! println!("User 1 rated {} movies", ratings.len());
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataError, Result};
pub use store::{MemoryStore, MovieCatalog, RatingStore, SimilarityStore};
pub use types::{
    // Type aliases
    MovieId,
    Timestamp,
    UserId,
    // Core types
    DataIndex,
    MovieAttributes,
    MovieStats,
    Rating,
    RatingBounds,
    UserSimilarity,
    // Helpers
    current_timestamp,
};
