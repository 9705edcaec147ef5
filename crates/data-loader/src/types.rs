//! Core domain types for ratings, movie attributes and user similarity.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - Type aliases for domain clarity (UserId, MovieId)
//! - Plain value structs for catalog and rating records
//! - The in-memory `DataIndex` that backs `MemoryStore`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// The current wall-clock time as a `Timestamp`
pub fn current_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}

// =============================================================================
// Rating
// =============================================================================

/// A single rating from a user for a movie.
///
/// At most one rating exists per (user_id, movie_id); re-rating replaces
/// `value` and `comment` and bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub value: f32,
    pub comment: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rating {
    /// A fresh rating whose creation and update times coincide
    pub fn new(user_id: UserId, movie_id: MovieId, value: f32, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            movie_id,
            value,
            comment: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Inclusive range a rating value must fall in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBounds {
    pub min: f32,
    pub max: f32,
}

impl RatingBounds {
    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

impl Default for RatingBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

// =============================================================================
// Movie attributes
// =============================================================================

/// Catalog record for a movie. Read-only from the recommender's side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovieAttributes {
    pub id: MovieId,
    pub title: String,
    pub genres: BTreeSet<String>,
    /// Release year; `None` when unknown
    pub year: Option<u16>,
    /// Critic score on a 0-10 scale
    pub critic_score: Option<f32>,
    pub runtime_minutes: Option<u16>,
    pub languages: BTreeSet<String>,
}

impl MovieAttributes {
    pub fn new(id: MovieId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_critic_score(mut self, score: f32) -> Self {
        self.critic_score = Some(score);
        self
    }

    pub fn with_runtime(mut self, minutes: u16) -> Self {
        self.runtime_minutes = Some(minutes);
        self
    }
}

// =============================================================================
// User similarity
// =============================================================================

/// Cached similarity between two users, stored once per unordered pair
/// with `user_a < user_b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserSimilarity {
    pub user_a: UserId,
    pub user_b: UserId,
    pub similarity: f64,
    pub computed_at: Timestamp,
}

impl UserSimilarity {
    /// Builds a pair in canonical order regardless of argument order
    pub fn new(first: UserId, second: UserId, similarity: f64, computed_at: Timestamp) -> Self {
        let (user_a, user_b) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        Self {
            user_a,
            user_b,
            similarity,
            computed_at,
        }
    }

    /// The other member of the pair, if `user_id` is part of it
    pub fn other(&self, user_id: UserId) -> Option<UserId> {
        if self.user_a == user_id {
            Some(self.user_b)
        } else if self.user_b == user_id {
            Some(self.user_a)
        } else {
            None
        }
    }
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Aggregate user-rating statistics for a movie
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieStats {
    pub avg_rating: f32,
    pub rating_count: u32,
}

// =============================================================================
// DataIndex - The Core In-Memory Database
// =============================================================================

/// Holds the catalog and every rating, indexed both by user and by movie.
#[derive(Debug, Default)]
pub struct DataIndex {
    pub(crate) movies: HashMap<MovieId, MovieAttributes>,

    /// All ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// All ratings received by each movie
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,

    pub(crate) movie_stats: HashMap<MovieId, MovieStats>,
}

impl DataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_movie(&self, id: MovieId) -> Option<&MovieAttributes> {
        self.movies.get(&id)
    }

    /// Get all ratings made by a user; empty if the user never rated anything
    pub fn get_user_ratings(&self, user_id: UserId) -> &[Rating] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_movie_stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_stats.get(&movie_id)
    }

    /// Movie ids in ascending order, the catalog's iteration order
    pub fn movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.movies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of users with at least one rating, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .user_ratings
            .iter()
            .filter(|(_, ratings)| !ratings.is_empty())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn insert_movie(&mut self, movie: MovieAttributes) {
        self.movies.insert(movie.id, movie);
    }

    /// Insert or replace the rating for (user, movie).
    ///
    /// A replacement keeps the original `created_at`. Returns the rating
    /// that was replaced, if any. Movie stats are not touched; call
    /// `refresh_movie_stats` or `compute_movie_stats` afterwards.
    pub fn insert_rating(&mut self, rating: Rating) -> Option<Rating> {
        let user_list = self.user_ratings.entry(rating.user_id).or_default();

        match user_list.iter_mut().find(|r| r.movie_id == rating.movie_id) {
            Some(existing) => {
                let stored = Rating {
                    created_at: existing.created_at,
                    ..rating
                };
                let previous = std::mem::replace(existing, stored.clone());

                let movie_list = self.movie_ratings.entry(stored.movie_id).or_default();
                match movie_list.iter_mut().find(|r| r.user_id == stored.user_id) {
                    Some(slot) => *slot = stored,
                    None => movie_list.push(stored),
                }
                Some(previous)
            }
            None => {
                user_list.push(rating.clone());
                self.movie_ratings
                    .entry(rating.movie_id)
                    .or_default()
                    .push(rating);
                None
            }
        }
    }

    /// Returns (movies, users with ratings, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.movies.len(), self.user_ids().len(), total_ratings)
    }
}
