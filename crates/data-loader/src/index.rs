//! DataIndex building, statistics and validation.
//!
//! - Parse both data files in parallel
//! - Build the by-user and by-movie rating indices
//! - Compute per-movie aggregate statistics
//! - Rank the catalog by popularity

use crate::error::{DataError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

impl DataIndex {
    /// Load the catalog and rating history from a directory holding
    /// `movies.dat` and `ratings.dat`.
    ///
    /// Duplicate (user, movie) lines are upserted in file order, so the
    /// last line wins and the first line's timestamp is kept as `created_at`.
    pub fn load_from_files(data_dir: &Path) -> Result<Self> {
        info!("Loading movie data from {:?}", data_dir);

        let movies_path = data_dir.join("movies.dat");
        let ratings_path = data_dir.join("ratings.dat");

        let (movies, ratings) = rayon::join(
            || parser::parse_movies(&movies_path),
            || parser::parse_ratings(&ratings_path),
        );
        let movies = movies?;
        let ratings = ratings?;

        info!("Parsed {} movies, {} ratings", movies.len(), ratings.len());

        let mut index = DataIndex::new();
        for movie in movies {
            index.insert_movie(movie);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }

        index.compute_movie_stats();
        index.validate(RatingBounds::default())?;

        info!("DataIndex successfully built and validated");
        Ok(index)
    }

    /// Recompute statistics for every rated movie
    pub fn compute_movie_stats(&mut self) {
        self.movie_stats = self
            .movie_ratings
            .par_iter()
            .map(|(&movie_id, ratings)| (movie_id, stats_for(ratings)))
            .collect();
    }

    /// Recompute statistics for a single movie after a rating write
    pub fn refresh_movie_stats(&mut self, movie_id: MovieId) {
        let stats = stats_for(self.get_movie_ratings(movie_id));
        self.movie_stats.insert(movie_id, stats);
    }

    /// Check that every rating references a known movie and lies within `bounds`
    pub fn validate(&self, bounds: RatingBounds) -> Result<()> {
        for ratings in self.user_ratings.values() {
            for rating in ratings {
                if !self.movies.contains_key(&rating.movie_id) {
                    return Err(DataError::movie_not_found(rating.movie_id));
                }
                if !bounds.contains(rating.value) {
                    return Err(DataError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Movies ordered by aggregate audience score.
    ///
    /// Rated movies come first by mean user rating; unrated movies follow by
    /// critic score. Ties fall back to rating count, then movie id.
    pub fn popularity_ranking(&self, limit: usize) -> Vec<&MovieAttributes> {
        let mut movies: Vec<&MovieAttributes> = self.movies.values().collect();
        movies.sort_by(|a, b| self.compare_popularity(a, b));
        movies.truncate(limit);
        debug!("Popularity ranking produced {} movies", movies.len());
        movies
    }

    fn compare_popularity(&self, a: &MovieAttributes, b: &MovieAttributes) -> Ordering {
        let stats_a = self.rated_stats(a.id);
        let stats_b = self.rated_stats(b.id);

        let by_audience = match (stats_a, stats_b) {
            (Some(sa), Some(sb)) => sb
                .avg_rating
                .partial_cmp(&sa.avg_rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| sb.rating_count.cmp(&sa.rating_count)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        by_audience
            .then_with(|| {
                let critic_a = a.critic_score.unwrap_or(0.0);
                let critic_b = b.critic_score.unwrap_or(0.0);
                critic_b.partial_cmp(&critic_a).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    }

    fn rated_stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_stats
            .get(&movie_id)
            .filter(|stats| stats.rating_count > 0)
    }
}

fn stats_for(ratings: &[Rating]) -> MovieStats {
    let rating_count = ratings.len() as u32;
    let avg_rating = if rating_count > 0 {
        let total: f32 = ratings.iter().map(|r| r.value).sum();
        total / rating_count as f32
    } else {
        0.0
    };
    MovieStats {
        avg_rating,
        rating_count,
    }
}
