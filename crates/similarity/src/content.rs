//! Content similarity between catalog entries.
//!
//! Two movies are compared on five attributes, each scored in [0, 100]:
//!
//! | dimension | weight | score |
//! |-----------|--------|-------|
//! | genres    | 0.35   | Jaccard index of the genre sets |
//! | year      | 0.20   | `1 - |Δyear| / 50`, floored at 0 |
//! | score     | 0.20   | `1 - |Δcritic score| / 10`, floored at 0 |
//! | runtime   | 0.15   | `1 - |Δruntime| / 180`, floored at 0 |
//! | languages | 0.10   | Jaccard index of the language sets |
//!
//! A missing (or zero) attribute on either side scores that dimension 0.
//! Every dimension is symmetric, so `score_pair(a, b)` and `score_pair(b, a)`
//! agree.

use data_loader::{DataError, MovieAttributes, MovieCatalog, MovieId, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const GENRE_WEIGHT: f64 = 0.35;
pub const YEAR_WEIGHT: f64 = 0.20;
pub const SCORE_WEIGHT: f64 = 0.20;
pub const RUNTIME_WEIGHT: f64 = 0.15;
pub const LANGUAGE_WEIGHT: f64 = 0.10;

/// Year gap at which year proximity reaches 0
const YEAR_SPAN: f64 = 50.0;
/// Critic score gap at which score proximity reaches 0
const SCORE_SPAN: f64 = 10.0;
/// Runtime gap (minutes) at which runtime proximity reaches 0
const RUNTIME_SPAN: f64 = 180.0;

/// Per-dimension breakdown, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ComponentScores {
    pub genre: f64,
    pub year: f64,
    pub score: f64,
    pub runtime: f64,
    pub language: f64,
}

impl ComponentScores {
    /// Weighted sum of the five dimensions
    pub fn total(&self) -> f64 {
        GENRE_WEIGHT * self.genre
            + YEAR_WEIGHT * self.year
            + SCORE_WEIGHT * self.score
            + RUNTIME_WEIGHT * self.runtime
            + LANGUAGE_WEIGHT * self.language
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSimilarityResult {
    pub movie_a: MovieId,
    pub movie_b: MovieId,
    /// Weighted total in [0, 100]
    pub total_score: f64,
    pub components: ComponentScores,
}

/// Best content match between an unrated movie and one of a user's favorites
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteMatch {
    pub movie_id: MovieId,
    pub favorite_id: MovieId,
    pub total_score: f64,
    pub components: ComponentScores,
}

/// Score two movies against each other
pub fn score_pair(a: &MovieAttributes, b: &MovieAttributes) -> ContentSimilarityResult {
    let components = ComponentScores {
        genre: jaccard(&a.genres, &b.genres) * 100.0,
        year: proximity(
            a.year.map(f64::from),
            b.year.map(f64::from),
            YEAR_SPAN,
        ),
        score: proximity(
            a.critic_score.map(f64::from),
            b.critic_score.map(f64::from),
            SCORE_SPAN,
        ),
        runtime: proximity(
            a.runtime_minutes.map(f64::from),
            b.runtime_minutes.map(f64::from),
            RUNTIME_SPAN,
        ),
        language: jaccard(&a.languages, &b.languages) * 100.0,
    };

    ContentSimilarityResult {
        movie_a: a.id,
        movie_b: b.id,
        total_score: components.total(),
        components,
    }
}

/// |A ∩ B| / |A ∪ B|; 0 when either set is empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// `max(0, 1 - |a - b| / span) * 100`; missing, zero or non-finite inputs score 0
fn proximity(a: Option<f64>, b: Option<f64>, span: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a != 0.0 && b != 0.0 && a.is_finite() && b.is_finite() => {
            (1.0 - (a - b).abs() / span).max(0.0) * 100.0
        }
        _ => 0.0,
    }
}

/// Score `target` against `catalog` and keep the `k` best positive matches.
///
/// The target itself is skipped. Ties on total score are broken by
/// ascending movie id.
pub fn rank_similar(
    target: &MovieAttributes,
    catalog: &[MovieAttributes],
    k: usize,
) -> Vec<ContentSimilarityResult> {
    let mut results: Vec<ContentSimilarityResult> = catalog
        .par_iter()
        .filter(|movie| movie.id != target.id)
        .map(|movie| score_pair(target, movie))
        .filter(|result| result.total_score > 0.0)
        .collect();

    results.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.movie_b.cmp(&b.movie_b))
    });
    results.truncate(k);
    results
}

/// For every candidate, find the favorite it resembles most and keep the
/// `limit` strongest matches. Candidates matching nothing are dropped.
pub fn rank_by_favorites(
    candidates: &[MovieAttributes],
    favorites: &[MovieAttributes],
    limit: usize,
) -> Vec<FavoriteMatch> {
    if favorites.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<FavoriteMatch> = candidates
        .par_iter()
        .filter_map(|candidate| {
            let mut best: Option<ContentSimilarityResult> = None;
            for favorite in favorites {
                let result = score_pair(candidate, favorite);
                let current = best.as_ref().map(|b| b.total_score).unwrap_or(0.0);
                if result.total_score > current {
                    best = Some(result);
                }
            }
            best.map(|b| FavoriteMatch {
                movie_id: candidate.id,
                favorite_id: b.movie_b,
                total_score: b.total_score,
                components: b.components,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });
    matches.truncate(limit);
    matches
}

/// Answers "movies like this one" from catalog attributes alone
pub struct ContentSimilarityFinder {
    catalog: Arc<dyn MovieCatalog>,
}

impl ContentSimilarityFinder {
    pub fn new(catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { catalog }
    }

    /// Top-`k` movies by content similarity to `movie_id`.
    ///
    /// Returns `DataError::NotFound` when the seed movie is not in the catalog.
    #[instrument(skip(self))]
    pub fn similar_movies(&self, movie_id: MovieId, k: usize) -> Result<Vec<ContentSimilarityResult>> {
        let target = self
            .catalog
            .get_movie(movie_id)?
            .ok_or_else(|| DataError::movie_not_found(movie_id))?;

        let catalog = self.catalog.get_all_movies(&[movie_id])?;
        let results = rank_similar(&target, &catalog, k);
        debug!(
            "Scored {} catalog entries, kept {}",
            catalog.len(),
            results.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drama_2000() -> MovieAttributes {
        MovieAttributes::new(1, "X")
            .with_genres(["Drama"])
            .with_year(2000)
            .with_critic_score(8.0)
            .with_runtime(120)
            .with_languages(["EN"])
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = GENRE_WEIGHT + YEAR_WEIGHT + SCORE_WEIGHT + RUNTIME_WEIGHT + LANGUAGE_WEIGHT;
        assert_close(sum, 1.0);
    }

    #[test]
    fn test_identical_movies_score_100() {
        let a = drama_2000();
        let mut b = drama_2000();
        b.id = 2;

        let result = score_pair(&a, &b);
        assert_close(result.total_score, 100.0);
        assert_close(result.components.genre, 100.0);
        assert_close(result.components.language, 100.0);
    }

    #[test]
    fn test_nothing_in_common_scores_zero() {
        let a = MovieAttributes::new(1, "A").with_genres(["Drama"]).with_languages(["EN"]);
        let b = MovieAttributes::new(2, "B").with_genres(["Horror"]).with_languages(["FR"]);

        let result = score_pair(&a, &b);
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.components, ComponentScores::default());
    }

    #[test]
    fn test_symmetry() {
        let a = MovieAttributes::new(1, "A")
            .with_genres(["Drama", "Crime"])
            .with_year(1994)
            .with_critic_score(9.1)
            .with_runtime(142)
            .with_languages(["EN"]);
        let b = MovieAttributes::new(2, "B")
            .with_genres(["Crime", "Thriller", "Mystery"])
            .with_year(2010)
            .with_critic_score(7.4)
            .with_runtime(98)
            .with_languages(["EN", "ES"]);

        assert_eq!(score_pair(&a, &b).total_score, score_pair(&b, &a).total_score);
    }

    #[test]
    fn test_dimension_formulas() {
        let a = MovieAttributes::new(1, "A")
            .with_genres(["Drama", "Crime"])
            .with_year(1990)
            .with_critic_score(8.0)
            .with_runtime(100)
            .with_languages(["EN"]);
        let b = MovieAttributes::new(2, "B")
            .with_genres(["Crime"])
            .with_year(2015)
            .with_critic_score(6.0)
            .with_runtime(190)
            .with_languages(["EN", "FR"]);

        let c = score_pair(&a, &b).components;
        assert_close(c.genre, 50.0);
        assert_close(c.year, 50.0);
        assert_close(c.score, 80.0);
        assert_close(c.runtime, 50.0);
        assert_close(c.language, 50.0);
    }

    #[test]
    fn test_fifty_year_gap_floors_at_zero() {
        let a = MovieAttributes::new(1, "A").with_year(1950);
        let b = MovieAttributes::new(2, "B").with_year(2000);
        let c = MovieAttributes::new(3, "C").with_year(2020);

        assert_eq!(score_pair(&a, &b).components.year, 0.0);
        assert_eq!(score_pair(&a, &c).components.year, 0.0);
    }

    #[test]
    fn test_zero_critic_score_counts_as_missing() {
        let a = MovieAttributes::new(1, "A").with_critic_score(0.0);
        let b = MovieAttributes::new(2, "B").with_critic_score(0.5);
        assert_eq!(score_pair(&a, &b).components.score, 0.0);
    }

    #[test]
    fn test_rank_similar_excludes_target_and_limits() {
        let target = drama_2000();
        let catalog: Vec<MovieAttributes> = (1..=10)
            .map(|id| {
                let mut movie = drama_2000();
                movie.id = id;
                movie.year = Some(2000 + id as u16);
                movie
            })
            .collect();

        let results = rank_similar(&target, &catalog, 3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.movie_b != target.id));
        assert!(results.windows(2).all(|w| w[0].total_score >= w[1].total_score));
        assert_eq!(results[0].movie_b, 2);
    }

    #[test]
    fn test_rank_similar_tie_breaks_by_id() {
        let target = drama_2000();
        let catalog: Vec<MovieAttributes> = [7, 3, 5]
            .into_iter()
            .map(|id| {
                let mut movie = drama_2000();
                movie.id = id;
                movie
            })
            .collect();

        let ids: Vec<MovieId> = rank_similar(&target, &catalog, 6)
            .iter()
            .map(|r| r.movie_b)
            .collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn test_rank_by_favorites_keeps_best_favorite() {
        let favorites = vec![
            MovieAttributes::new(10, "Fav Horror").with_genres(["Horror"]),
            MovieAttributes::new(11, "Fav Drama").with_genres(["Drama"]).with_year(2000),
        ];
        let candidates = vec![
            drama_2000(),
            MovieAttributes::new(2, "Unrelated").with_genres(["Musical"]),
        ];

        let matches = rank_by_favorites(&candidates, &favorites, 10);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].movie_id, 1);
        assert_eq!(matches[0].favorite_id, 11);
        assert_close(matches[0].total_score, 35.0 + 20.0);
    }

    #[test]
    fn test_rank_by_favorites_without_favorites() {
        assert!(rank_by_favorites(&[drama_2000()], &[], 5).is_empty());
    }
}
