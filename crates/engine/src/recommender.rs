//! # Recommendation Generator
//!
//! Produces a ranked list of movies the user has not rated yet.
//!
//! ## Branches
//! 1. **Cold start**: fewer ratings than `min_ratings_for_collaborative`
//!    goes straight to the popularity fallback
//! 2. **Collaborative**: take the top `neighbor_count` similar users, keep
//!    those with similarity > 0, and for every movie they rated that the
//!    user has not, collect `rating * similarity`
//! 3. **Prediction**: a candidate's score is the plain mean of its collected
//!    terms (not normalised by summed similarity)
//! 4. **Fallback**: catalog popularity order, with no predicted score
//!
//! A store error anywhere in the collaborative branch falls back to
//! popularity; callers never see it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use data_loader::{MovieCatalog, MovieId, RatingStore, UserId};
use pipeline::filters::AlreadyRatedFilter;
use pipeline::{Candidate, FilterPipeline, Provenance, UserContext};
use similarity::SimilarityMatrix;

use crate::config::RecommenderConfig;

/// One ranked recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub movie_id: MovieId,
    /// 1-based position in the returned list
    pub rank: usize,
    pub provenance: Provenance,
}

impl RecommendationResult {
    pub fn predicted_score(&self) -> Option<f64> {
        self.provenance.predicted_score()
    }
}

pub struct RecommendationGenerator {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    matrix: Arc<SimilarityMatrix>,
    filter_pipeline: FilterPipeline,
    min_ratings: usize,
    neighbor_count: usize,
}

impl RecommendationGenerator {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        matrix: Arc<SimilarityMatrix>,
        config: &RecommenderConfig,
    ) -> Self {
        Self {
            ratings,
            catalog,
            matrix,
            filter_pipeline: FilterPipeline::new().add_filter(AlreadyRatedFilter),
            min_ratings: config.min_ratings_for_collaborative,
            neighbor_count: config.neighbor_count,
        }
    }

    /// Up to `limit` recommendations for `user_id`. Never fails.
    #[instrument(skip(self))]
    pub fn recommend(&self, user_id: UserId, limit: usize) -> Vec<RecommendationResult> {
        if limit == 0 {
            return Vec::new();
        }
        let start_time = Instant::now();

        let candidates = match self.collaborative(user_id, limit) {
            Ok(Some(candidates)) => candidates,
            Ok(None) => self.popularity(user_id, limit),
            Err(e) => {
                warn!(
                    "Collaborative branch failed for user {}, using popularity: {:#}",
                    user_id, e
                );
                self.popularity(user_id, limit)
            }
        };

        let results: Vec<RecommendationResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| RecommendationResult {
                movie_id: candidate.movie_id,
                rank: i + 1,
                provenance: candidate.provenance,
            })
            .collect();

        info!(
            "Produced {} recommendations for user {} in {:.2?}",
            results.len(),
            user_id,
            start_time.elapsed()
        );
        results
    }

    /// `Ok(None)` means the user belongs on the popularity branch
    fn collaborative(&self, user_id: UserId, limit: usize) -> Result<Option<Vec<Candidate>>> {
        let rating_count = self
            .ratings
            .count_ratings_by_user(user_id)
            .context("count user ratings")?;
        if rating_count < self.min_ratings {
            info!(
                "User {} has {} ratings (< {}), cold start",
                user_id, rating_count, self.min_ratings
            );
            return Ok(None);
        }

        let neighbors: Vec<(UserId, f64)> = self
            .matrix
            .similar_users(user_id, self.neighbor_count)
            .context("fetch similar users")?
            .into_iter()
            .filter(|&(_, similarity)| similarity > 0.0)
            .collect();
        if neighbors.is_empty() {
            info!("User {} has no positively similar neighbors", user_id);
            return Ok(None);
        }

        let rated = self
            .ratings
            .get_ratings_by_user(user_id)
            .context("fetch user ratings")?
            .into_iter()
            .map(|r| r.movie_id);
        let context = UserContext::with_rated(user_id, rated);

        let mut contributions: HashMap<MovieId, Vec<f64>> = HashMap::new();
        for &(neighbor, similarity) in &neighbors {
            let history = self
                .ratings
                .get_ratings_by_user(neighbor)
                .with_context(|| format!("fetch ratings of neighbor {}", neighbor))?;
            for rating in history {
                if context.has_rated(rating.movie_id) {
                    continue;
                }
                contributions
                    .entry(rating.movie_id)
                    .or_default()
                    .push(f64::from(rating.value) * similarity);
            }
        }

        let candidates: Vec<Candidate> = contributions
            .into_iter()
            .filter(|(_, terms)| !terms.is_empty())
            .map(|(movie_id, terms)| {
                let predicted = terms.iter().sum::<f64>() / terms.len() as f64;
                Candidate::collaborative(movie_id, predicted)
            })
            .collect();

        let mut candidates = self.filter_pipeline.apply(candidates, &context)?;
        if candidates.is_empty() {
            info!("Neighbors of user {} rated nothing new", user_id);
            return Ok(None);
        }

        candidates.sort_by(|a, b| {
            let score_a = a.provenance.predicted_score().unwrap_or(0.0);
            let score_b = b.provenance.predicted_score().unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        candidates.truncate(limit);

        debug!(
            "User {}: {} neighbors, {} collaborative candidates kept",
            user_id,
            neighbors.len(),
            candidates.len()
        );
        Ok(Some(candidates))
    }

    /// Popularity order minus what the user rated. Degrades to an empty
    /// list when the stores cannot be read.
    fn popularity(&self, user_id: UserId, limit: usize) -> Vec<Candidate> {
        self.try_popularity(user_id, limit).unwrap_or_else(|e| {
            warn!("Popularity fallback failed for user {}: {:#}", user_id, e);
            Vec::new()
        })
    }

    fn try_popularity(&self, user_id: UserId, limit: usize) -> Result<Vec<Candidate>> {
        let rated: Vec<MovieId> = self
            .ratings
            .get_ratings_by_user(user_id)
            .context("fetch user ratings")?
            .into_iter()
            .map(|r| r.movie_id)
            .collect();

        // Over-fetch so filtering rated movies still leaves `limit` results
        let popular = self
            .catalog
            .get_popularity_ranked_movies(limit.saturating_add(rated.len()))
            .context("fetch popularity ranking")?;

        let context = UserContext::with_rated(user_id, rated);
        let candidates = popular.iter().map(|m| Candidate::popular(m.id)).collect();
        let mut candidates = self.filter_pipeline.apply(candidates, &context)?;
        candidates.truncate(limit);
        Ok(candidates)
    }
}
