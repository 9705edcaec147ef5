//! "Users who liked this also liked" lookups.
//!
//! Collects every user who rated the seed movie, pools their other ratings
//! and ranks the pooled movies by mean rating. Movies rated by fewer than
//! `min_support` of those users are treated as noise.

use data_loader::{MovieId, Rating, RatingStore, Result, UserId};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_MIN_SUPPORT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemNeighbor {
    pub movie_id: MovieId,
    /// Mean rating among users who also rated the seed
    pub mean_rating: f64,
    /// How many of those users rated this movie
    pub support: u32,
}

#[derive(Default, Clone, Copy)]
struct Tally {
    sum: f64,
    count: u32,
}

pub struct ItemNeighborFinder {
    ratings: Arc<dyn RatingStore>,
    min_support: u32,
}

impl ItemNeighborFinder {
    pub fn new(ratings: Arc<dyn RatingStore>) -> Self {
        Self {
            ratings,
            min_support: DEFAULT_MIN_SUPPORT,
        }
    }

    pub fn with_min_support(mut self, min_support: u32) -> Self {
        self.min_support = min_support;
        self
    }

    /// Up to `limit` movies co-rated with `seed`, best mean rating first.
    ///
    /// Ties go to the movie with more support, then the lower id. A seed
    /// nobody has rated yields an empty list.
    #[instrument(skip(self))]
    pub fn find(&self, seed: MovieId, limit: usize) -> Result<Vec<ItemNeighbor>> {
        let raters: Vec<UserId> = self
            .ratings
            .get_ratings_by_movie(seed)?
            .into_iter()
            .map(|r| r.user_id)
            .collect();

        if raters.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let histories = raters
            .iter()
            .map(|&user_id| self.ratings.get_ratings_by_user(user_id))
            .collect::<Result<Vec<Vec<Rating>>>>()?;

        let tallies = histories
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<MovieId, Tally>, history| {
                for rating in history.iter().filter(|r| r.movie_id != seed) {
                    let tally = acc.entry(rating.movie_id).or_default();
                    tally.sum += f64::from(rating.value);
                    tally.count += 1;
                }
                acc
            })
            .reduce(HashMap::new, |mut a, b| {
                for (movie_id, tally) in b {
                    let entry = a.entry(movie_id).or_default();
                    entry.sum += tally.sum;
                    entry.count += tally.count;
                }
                a
            });

        let mut neighbors: Vec<ItemNeighbor> = tallies
            .into_iter()
            .filter(|(_, tally)| tally.count >= self.min_support)
            .map(|(movie_id, tally)| ItemNeighbor {
                movie_id,
                mean_rating: tally.sum / f64::from(tally.count),
                support: tally.count,
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.mean_rating
                .partial_cmp(&a.mean_rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.support.cmp(&a.support))
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        neighbors.truncate(limit);

        debug!(
            "Movie {} has {} co-rated neighbors from {} raters",
            seed,
            neighbors.len(),
            raters.len()
        );
        Ok(neighbors)
    }
}
