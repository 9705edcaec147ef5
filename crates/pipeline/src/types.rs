//! Candidate and context types shared by the generator and the filters.

use data_loader::{MovieId, UserId};
use serde::Serialize;
use std::collections::HashSet;

/// Which branch of the generator produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Predicted from similar users' ratings
    Collaborative { predicted_score: f64 },
    /// Catalog-wide popularity; there is no prediction for this user
    PopularityFallback,
}

impl Provenance {
    pub fn predicted_score(&self) -> Option<f64> {
        match self {
            Provenance::Collaborative { predicted_score } => Some(*predicted_score),
            Provenance::PopularityFallback => None,
        }
    }

    pub fn is_collaborative(&self) -> bool {
        matches!(self, Provenance::Collaborative { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Collaborative { .. } => "collaborative",
            Provenance::PopularityFallback => "popularity-fallback",
        }
    }
}

/// A movie proposed for a user, before ranking
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub movie_id: MovieId,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn collaborative(movie_id: MovieId, predicted_score: f64) -> Self {
        Self {
            movie_id,
            provenance: Provenance::Collaborative { predicted_score },
        }
    }

    pub fn popular(movie_id: MovieId) -> Self {
        Self {
            movie_id,
            provenance: Provenance::PopularityFallback,
        }
    }
}

/// What the filters need to know about the requesting user
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_id: UserId,
    pub rated_movies: HashSet<MovieId>,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            rated_movies: HashSet::new(),
        }
    }

    pub fn with_rated(user_id: UserId, rated: impl IntoIterator<Item = MovieId>) -> Self {
        Self {
            user_id,
            rated_movies: rated.into_iter().collect(),
        }
    }

    pub fn has_rated(&self, movie_id: MovieId) -> bool {
        self.rated_movies.contains(&movie_id)
    }
}
