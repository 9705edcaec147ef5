//! # Recommendation Service
//!
//! The facade callers use. It owns one instance of every component and
//! decides which failures reach the caller:
//! - `similar_movies_by_content` reports an unknown seed as NotFound
//! - `refresh_user_similarities` and `submit_rating` return their errors
//! - everything else logs store failures and returns an empty result

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use data_loader::{
    DataError, MemoryStore, MovieAttributes, MovieCatalog, MovieId, Rating, RatingStore, Result,
    SimilarityStore, UserId, current_timestamp,
};
use similarity::{
    ContentSimilarityFinder, ContentSimilarityResult, FavoriteMatch, ItemNeighborFinder,
    RefreshSummary, SimilarityMatrix, rank_by_favorites,
};

use crate::config::RecommenderConfig;
use crate::recommender::{RecommendationGenerator, RecommendationResult};

/// Summary of one user's rating history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRatingStats {
    pub user_id: UserId,
    pub total_ratings: usize,
    /// Mean rating rounded to one decimal, 0.0 without ratings
    pub avg_rating: f64,
    /// Whole-star bucket (1..=5) -> count; every bucket is present
    pub distribution: BTreeMap<u8, usize>,
}

#[derive(Clone)]
pub struct RecommendationService {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    content: Arc<ContentSimilarityFinder>,
    matrix: Arc<SimilarityMatrix>,
    item_neighbors: Arc<ItemNeighborFinder>,
    generator: Arc<RecommendationGenerator>,
    config: Arc<RecommenderConfig>,
}

impl RecommendationService {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        similarities: Arc<dyn SimilarityStore>,
        config: RecommenderConfig,
    ) -> Self {
        let content = Arc::new(ContentSimilarityFinder::new(catalog.clone()));
        let matrix = Arc::new(SimilarityMatrix::new(ratings.clone(), similarities));
        let item_neighbors = Arc::new(
            ItemNeighborFinder::new(ratings.clone()).with_min_support(config.behavior_min_support),
        );
        let generator = Arc::new(RecommendationGenerator::new(
            ratings.clone(),
            catalog.clone(),
            matrix.clone(),
            &config,
        ));

        Self {
            ratings,
            catalog,
            content,
            matrix,
            item_neighbors,
            generator,
            config: Arc::new(config),
        }
    }

    /// Wire every contract to one in-memory store
    pub fn from_store(store: Arc<MemoryStore>, config: RecommenderConfig) -> Self {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Attribute-based "movies like this one".
    ///
    /// An unknown seed is `Err(NotFound)`; an unreachable catalog yields an
    /// empty list.
    #[instrument(skip(self))]
    pub fn similar_movies_by_content(
        &self,
        movie_id: MovieId,
        k: usize,
    ) -> Result<Vec<ContentSimilarityResult>> {
        match self.content.similar_movies(movie_id, k) {
            Ok(results) => Ok(results),
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => {
                warn!("Content similarity for movie {} failed: {}", movie_id, e);
                Ok(Vec::new())
            }
        }
    }

    /// Movies favored by the people who rated `movie_id`
    #[instrument(skip(self))]
    pub fn similar_movies_by_behavior(&self, movie_id: MovieId, k: usize) -> Vec<MovieAttributes> {
        let lookup = || -> Result<Vec<MovieAttributes>> {
            let neighbors = self.item_neighbors.find(movie_id, k)?;
            let mut movies = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                if let Some(movie) = self.catalog.get_movie(neighbor.movie_id)? {
                    movies.push(movie);
                }
            }
            Ok(movies)
        };

        lookup().unwrap_or_else(|e| {
            warn!("Behavioral neighbors for movie {} failed: {}", movie_id, e);
            Vec::new()
        })
    }

    /// Recompute the user-user similarity table. On failure the previous
    /// table is still served.
    pub fn refresh_user_similarities(&self) -> Result<RefreshSummary> {
        self.matrix.refresh()
    }

    #[instrument(skip(self))]
    pub fn similar_users(&self, user_id: UserId, n: usize) -> Vec<(UserId, f64)> {
        self.matrix.similar_users(user_id, n).unwrap_or_else(|e| {
            warn!("Similar users for user {} failed: {}", user_id, e);
            Vec::new()
        })
    }

    pub fn recommend_for_user(&self, user_id: UserId, m: usize) -> Vec<RecommendationResult> {
        self.generator.recommend(user_id, m)
    }

    /// Validate and store a rating, then refresh similarities if configured.
    ///
    /// The write stands even if the follow-up refresh fails.
    #[instrument(skip(self, comment))]
    pub fn submit_rating(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        value: f32,
        comment: Option<String>,
    ) -> Result<Rating> {
        if !self.config.rating_bounds.contains(value) {
            return Err(DataError::InvalidValue {
                field: "rating".to_string(),
                value: value.to_string(),
            });
        }
        if self.catalog.get_movie(movie_id)?.is_none() {
            return Err(DataError::movie_not_found(movie_id));
        }

        let mut rating = Rating::new(user_id, movie_id, value, current_timestamp());
        rating.comment = comment;
        let stored = self.ratings.upsert_rating(rating)?;
        info!("User {} rated movie {} as {}", user_id, movie_id, value);

        if self.config.refresh_on_rating {
            if let Err(e) = self.matrix.refresh() {
                warn!("Similarity refresh after rating failed: {}", e);
            }
        }
        Ok(stored)
    }

    pub fn user_rating_stats(&self, user_id: UserId) -> Result<UserRatingStats> {
        let ratings = self.ratings.get_ratings_by_user(user_id)?;

        let mut distribution: BTreeMap<u8, usize> = (1..=5).map(|star| (star, 0)).collect();
        for rating in &ratings {
            let star = rating.value.round().clamp(1.0, 5.0) as u8;
            *distribution.entry(star).or_default() += 1;
        }

        let avg_rating = if ratings.is_empty() {
            0.0
        } else {
            let mean = ratings.iter().map(|r| f64::from(r.value)).sum::<f64>() / ratings.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        Ok(UserRatingStats {
            user_id,
            total_ratings: ratings.len(),
            avg_rating,
            distribution,
        })
    }

    /// Unrated movies ranked by their best content match among the user's
    /// favorites
    #[instrument(skip(self))]
    pub fn recommend_from_favorites(&self, user_id: UserId, limit: usize) -> Vec<FavoriteMatch> {
        let lookup = || -> Result<Vec<FavoriteMatch>> {
            let ratings = self.ratings.get_ratings_by_user(user_id)?;
            let rated: Vec<MovieId> = ratings.iter().map(|r| r.movie_id).collect();
            let favorite_ids: HashSet<MovieId> = ratings
                .iter()
                .filter(|r| r.value >= self.config.favorite_threshold)
                .map(|r| r.movie_id)
                .collect();
            if favorite_ids.is_empty() {
                info!("User {} has no favorites yet", user_id);
                return Ok(Vec::new());
            }

            let mut favorites = Vec::with_capacity(favorite_ids.len());
            for &movie_id in &favorite_ids {
                if let Some(movie) = self.catalog.get_movie(movie_id)? {
                    favorites.push(movie);
                }
            }
            favorites.sort_by_key(|m| m.id);

            let candidates = self.catalog.get_all_movies(&rated)?;
            Ok(rank_by_favorites(&candidates, &favorites, limit))
        };

        lookup().unwrap_or_else(|e| {
            warn!("Favorite-based recommendations for user {} failed: {}", user_id, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::DataIndex;

    fn create_test_service() -> RecommendationService {
        let mut index = DataIndex::new();
        index.insert_movie(
            MovieAttributes::new(1, "Heat")
                .with_genres(["Crime", "Thriller"])
                .with_year(1995),
        );
        index.insert_movie(
            MovieAttributes::new(2, "Collateral")
                .with_genres(["Crime", "Thriller"])
                .with_year(2004),
        );
        index.insert_movie(MovieAttributes::new(3, "Amelie").with_genres(["Romance"]));
        index.insert_movie(MovieAttributes::new(4, "Thief").with_genres(["Crime"]).with_year(1981));

        index.insert_rating(Rating::new(1, 1, 4.6, 0));
        index.insert_rating(Rating::new(1, 3, 2.4, 0));
        index.insert_rating(Rating::new(1, 4, 1.0, 0));
        index.compute_movie_stats();

        RecommendationService::from_store(
            Arc::new(MemoryStore::new(index)),
            RecommenderConfig::default(),
        )
    }

    #[test]
    fn test_user_rating_stats() {
        let service = create_test_service();
        let stats = service.user_rating_stats(1).unwrap();

        assert_eq!(stats.total_ratings, 3);
        // (4.6 + 2.4 + 1.0) / 3 = 2.666..
        assert_eq!(stats.avg_rating, 2.7);
        assert_eq!(stats.distribution[&5], 1);
        assert_eq!(stats.distribution[&2], 1);
        assert_eq!(stats.distribution[&1], 1);
        assert_eq!(stats.distribution[&3], 0);
        assert_eq!(stats.distribution.len(), 5);
    }

    #[test]
    fn test_stats_without_ratings() {
        let service = create_test_service();
        let stats = service.user_rating_stats(42).unwrap();
        assert_eq!(stats.total_ratings, 0);
        assert_eq!(stats.avg_rating, 0.0);
        assert!(stats.distribution.values().all(|&count| count == 0));
    }

    #[test]
    fn test_submit_rating_validation() {
        let service = create_test_service();

        let err = service.submit_rating(1, 2, 6.0, None).unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { .. }));

        let err = service.submit_rating(1, 99, 3.0, None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_submit_rating_upserts() {
        let service = create_test_service();
        let stored = service
            .submit_rating(1, 3, 5.0, Some("better the second time".to_string()))
            .unwrap();

        assert_eq!(stored.value, 5.0);
        assert_eq!(stored.created_at, 0);
        assert_eq!(service.user_rating_stats(1).unwrap().total_ratings, 3);
    }

    #[test]
    fn test_recommend_from_favorites() {
        let service = create_test_service();
        let matches = service.recommend_from_favorites(1, 10);

        // Only Heat is a favorite; Collateral shares its genres, nothing else is unrated
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].movie_id, 2);
        assert_eq!(matches[0].favorite_id, 1);
        assert!(matches[0].total_score > 0.0);
    }

    #[test]
    fn test_recommend_from_favorites_without_favorites() {
        let service = create_test_service();
        assert!(service.recommend_from_favorites(7, 10).is_empty());
    }
}
