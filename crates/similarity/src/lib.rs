//! # Similarity Crate
//!
//! Similarity measures the recommender is built on.
//!
//! ## Components
//!
//! ### Content similarity
//! Weighted comparison of two movies' attributes:
//! - Genre and language overlap (Jaccard)
//! - Release year, critic score and runtime proximity
//!
//! ### User similarity matrix
//! Cosine similarity between users' rating vectors, persisted through a
//! `SimilarityStore` and refreshed as a whole.
//!
//! ### Item neighbors
//! "Users who rated this also rated" aggregation with a support floor.
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, MemoryStore};
//! use similarity::{ContentSimilarityFinder, SimilarityMatrix};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new(DataIndex::load_from_files(dir)?));
//!
//! let content = ContentSimilarityFinder::new(store.clone());
//! let similar = content.similar_movies(42, 6)?;
//!
//! let matrix = SimilarityMatrix::new(store.clone(), store.clone());
//! matrix.refresh()?;
//! let neighbors = matrix.similar_users(1, 10)?;
//! ```

pub mod content;
pub mod item_neighbors;
pub mod matrix;

pub use content::{
    ComponentScores, ContentSimilarityFinder, ContentSimilarityResult, FavoriteMatch,
    rank_by_favorites, rank_similar, score_pair,
};
pub use item_neighbors::{ItemNeighbor, ItemNeighborFinder};
pub use matrix::{RefreshSummary, SimilarityMatrix, compute_user_similarities};
