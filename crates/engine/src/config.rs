//! Tunable thresholds and limits for the recommender.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "min_ratings_for_collaborative": 3, "neighbor_count": 20 }
//! ```

use crate::error::ConfigError;
use data_loader::RatingBounds;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Users with fewer ratings than this get popularity fallback
    pub min_ratings_for_collaborative: usize,
    /// How many similar users feed a collaborative prediction
    pub neighbor_count: usize,
    /// Default length of `recommend_for_user` results
    pub recommendation_limit: usize,
    /// Default `k` for content-similar movies
    pub similar_movies_limit: usize,
    /// Default length of "also liked" results
    pub behavior_limit: usize,
    /// Co-raters a movie needs before it counts as an "also liked" neighbor
    pub behavior_min_support: u32,
    /// Ratings at or above this mark a movie as a favorite
    pub favorite_threshold: f32,
    pub favorite_recommendation_limit: usize,
    pub rating_bounds: RatingBounds,
    /// Recompute user similarities after every accepted rating
    pub refresh_on_rating: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            min_ratings_for_collaborative: 5,
            neighbor_count: 10,
            recommendation_limit: 12,
            similar_movies_limit: 6,
            behavior_limit: 6,
            behavior_min_support: 3,
            favorite_threshold: 4.0,
            favorite_recommendation_limit: 20,
            rating_bounds: RatingBounds::default(),
            refresh_on_rating: true,
        }
    }
}

impl RecommenderConfig {
    /// Load a config from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = self.rating_bounds;
        if !(bounds.min.is_finite() && bounds.max.is_finite()) || bounds.min >= bounds.max {
            return Err(ConfigError::Invalid(format!(
                "rating bounds [{}, {}] are empty",
                bounds.min, bounds.max
            )));
        }
        if !bounds.contains(self.favorite_threshold) {
            return Err(ConfigError::Invalid(format!(
                "favorite threshold {} lies outside the rating bounds",
                self.favorite_threshold
            )));
        }
        Ok(())
    }

    pub fn with_min_ratings(mut self, min_ratings: usize) -> Self {
        self.min_ratings_for_collaborative = min_ratings;
        self
    }

    pub fn with_neighbor_count(mut self, neighbor_count: usize) -> Self {
        self.neighbor_count = neighbor_count;
        self
    }

    pub fn with_recommendation_limit(mut self, limit: usize) -> Self {
        self.recommendation_limit = limit;
        self
    }

    pub fn with_behavior_min_support(mut self, min_support: u32) -> Self {
        self.behavior_min_support = min_support;
        self
    }

    pub fn with_favorite_threshold(mut self, threshold: f32) -> Self {
        self.favorite_threshold = threshold;
        self
    }

    pub fn with_rating_bounds(mut self, min: f32, max: f32) -> Self {
        self.rating_bounds = RatingBounds { min, max };
        self
    }

    pub fn with_refresh_on_rating(mut self, refresh: bool) -> Self {
        self.refresh_on_rating = refresh;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.json", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::default();
        assert_eq!(config.min_ratings_for_collaborative, 5);
        assert_eq!(config.neighbor_count, 10);
        assert_eq!(config.recommendation_limit, 12);
        assert_eq!(config.behavior_min_support, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let path = write_temp("partial-config", r#"{ "neighbor_count": 25 }"#);
        let config = RecommenderConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.neighbor_count, 25);
        assert_eq!(config.min_ratings_for_collaborative, 5);
        assert_eq!(config.rating_bounds, RatingBounds::default());
    }

    #[test]
    fn test_malformed_json() {
        let path = write_temp("bad-config", "{ neighbor_count: ");
        let err = RecommenderConfig::from_json_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RecommenderConfig::from_json_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = RecommenderConfig::default().with_rating_bounds(5.0, 1.0);
        assert!(config.validate().is_err());

        let config = RecommenderConfig::default().with_favorite_threshold(9.0);
        assert!(config.validate().is_err());
    }
}
