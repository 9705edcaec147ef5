//! Collaborative similarity matrix over users.
//!
//! ## Algorithm
//! 1. Read every rating and lay them out as a dense user x movie matrix,
//!    missing ratings filled with 0
//! 2. Compute the cosine similarity of every pair of user rows
//! 3. Replace the persisted similarity table with the new pair set
//!
//! The zero fill is part of the model: a movie one user rated and the other
//! did not still contributes to the first user's norm.
//!
//! Refreshes are serialised. The new pair set is computed entirely in
//! memory and handed to the store in one `replace_all`, so readers see
//! either the old table or the new one.

use data_loader::{
    MovieId, Rating, RatingStore, Result, SimilarityStore, Timestamp, UserId,
    UserSimilarity, current_timestamp,
};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Outcome of a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefreshSummary {
    /// Users with at least one rating
    pub users: usize,
    /// Pairs written to the store
    pub pairs: usize,
    pub computed_at: Timestamp,
}

/// Cosine similarity of two equally long vectors given their norms.
/// Zero-length vectors are similar to nothing.
pub fn cosine(a: &[f64], b: &[f64], norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Every unordered pair of rating users with its cosine similarity,
/// in canonical order (`user_a < user_b`), sorted by (user_a, user_b).
pub fn compute_user_similarities(ratings: &[Rating], computed_at: Timestamp) -> Vec<UserSimilarity> {
    let users: Vec<UserId> = ratings
        .iter()
        .map(|r| r.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let movies: Vec<MovieId> = ratings
        .iter()
        .map(|r| r.movie_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let user_row: HashMap<UserId, usize> = users.iter().enumerate().map(|(i, &u)| (u, i)).collect();
    let movie_col: HashMap<MovieId, usize> =
        movies.iter().enumerate().map(|(i, &m)| (m, i)).collect();

    let mut matrix = vec![vec![0.0f64; movies.len()]; users.len()];
    for rating in ratings {
        if let (Some(&row), Some(&col)) = (user_row.get(&rating.user_id), movie_col.get(&rating.movie_id)) {
            matrix[row][col] = f64::from(rating.value);
        }
    }

    let norms: Vec<f64> = matrix
        .par_iter()
        .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    let n = users.len();
    (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let matrix = &matrix;
            let norms = &norms;
            let users = &users;
            ((i + 1)..n).map(move |j| {
                UserSimilarity::new(
                    users[i],
                    users[j],
                    cosine(&matrix[i], &matrix[j], norms[i], norms[j]),
                    computed_at,
                )
            })
        })
        .collect()
}

/// Maintains the user-user similarity table and answers neighbor queries
pub struct SimilarityMatrix {
    ratings: Arc<dyn RatingStore>,
    store: Arc<dyn SimilarityStore>,
    /// Held for the whole of a refresh so two refreshes never interleave
    refresh_lock: Mutex<()>,
}

impl SimilarityMatrix {
    pub fn new(ratings: Arc<dyn RatingStore>, store: Arc<dyn SimilarityStore>) -> Self {
        Self {
            ratings,
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Recompute every pair from the rating store and replace the table.
    ///
    /// An empty rating store leaves the table as it is. On any store error
    /// the previous table stays in place and the error is returned.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<RefreshSummary> {
        // The guard protects no data, so a poisoned lock is still usable
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let computed_at = current_timestamp();
        let ratings = self.ratings.get_all_ratings()?;
        if ratings.is_empty() {
            warn!("Rating store is empty, similarity refresh skipped");
            return Ok(RefreshSummary {
                users: 0,
                pairs: 0,
                computed_at,
            });
        }

        let pairs = compute_user_similarities(&ratings, computed_at);
        let users = ratings
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .len();
        let pair_count = pairs.len();

        self.store.replace_all(pairs).inspect_err(|e| {
            warn!("Similarity refresh failed, keeping previous table: {}", e);
        })?;

        info!(
            "Refreshed user similarities: {} users, {} pairs",
            users, pair_count
        );
        Ok(RefreshSummary {
            users,
            pairs: pair_count,
            computed_at,
        })
    }

    /// Up to `n` other users ranked by similarity to `user_id`, most similar
    /// first; ties are broken by ascending user id.
    #[instrument(skip(self))]
    pub fn similar_users(&self, user_id: UserId, n: usize) -> Result<Vec<(UserId, f64)>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<(UserId, f64)> = self
            .store
            .get_similarities_for_user(user_id)?
            .into_iter()
            .filter_map(|pair| pair.other(user_id).map(|other| (other, pair.similarity)))
            .filter(|&(other, _)| other != user_id)
            .collect();

        neighbors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(n);

        debug!("Found {} neighbors for user {}", neighbors.len(), user_id);
        Ok(neighbors)
    }
}
