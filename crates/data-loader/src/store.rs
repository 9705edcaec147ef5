//! Repository contracts the recommender reads and writes through, plus
//! `MemoryStore`, an in-process implementation of all three.
//!
//! The recommender never touches a storage engine directly. Anything that
//! can answer these queries (a database, a remote service, a test double)
//! can back it.

use crate::error::{DataError, Result};
use crate::types::*;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Durable (user, movie) -> rating mapping
pub trait RatingStore: Send + Sync {
    fn get_ratings_by_user(&self, user_id: UserId) -> Result<Vec<Rating>>;

    fn get_ratings_by_movie(&self, movie_id: MovieId) -> Result<Vec<Rating>>;

    fn get_all_ratings(&self) -> Result<Vec<Rating>>;

    fn count_ratings_by_user(&self, user_id: UserId) -> Result<usize>;

    /// Insert or replace the rating for (user, movie) and return the stored row
    fn upsert_rating(&self, rating: Rating) -> Result<Rating>;
}

/// Read-only access to movie attributes
pub trait MovieCatalog: Send + Sync {
    fn get_movie(&self, movie_id: MovieId) -> Result<Option<MovieAttributes>>;

    /// Every movie not listed in `exclude`, in catalog order
    fn get_all_movies(&self, exclude: &[MovieId]) -> Result<Vec<MovieAttributes>>;

    fn get_popularity_ranked_movies(&self, limit: usize) -> Result<Vec<MovieAttributes>>;
}

/// Materialised cache of pairwise user similarities
pub trait SimilarityStore: Send + Sync {
    /// Replace the whole table. Either every pair is visible afterwards or,
    /// on error, the previous table is left untouched.
    fn replace_all(&self, pairs: Vec<UserSimilarity>) -> Result<()>;

    /// Every stored pair that involves `user_id`, in either position
    fn get_similarities_for_user(&self, user_id: UserId) -> Result<Vec<UserSimilarity>>;

    fn get_all_similarities(&self) -> Result<Vec<UserSimilarity>>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

#[derive(Debug, Default)]
struct SimilarityTable {
    pairs: Vec<UserSimilarity>,
    by_user: HashMap<UserId, Vec<usize>>,
}

impl SimilarityTable {
    fn build(pairs: Vec<UserSimilarity>) -> Result<Self> {
        let mut by_user: HashMap<UserId, Vec<usize>> = HashMap::new();
        for (pos, pair) in pairs.iter().enumerate() {
            if pair.user_a >= pair.user_b {
                return Err(DataError::Validation(format!(
                    "pair ({}, {}) is not in canonical order",
                    pair.user_a, pair.user_b
                )));
            }
            if !pair.similarity.is_finite() || !(-1.0..=1.0).contains(&pair.similarity) {
                return Err(DataError::Validation(format!(
                    "similarity {} for pair ({}, {}) is outside [-1, 1]",
                    pair.similarity, pair.user_a, pair.user_b
                )));
            }
            by_user.entry(pair.user_a).or_default().push(pos);
            by_user.entry(pair.user_b).or_default().push(pos);
        }
        Ok(Self { pairs, by_user })
    }
}

/// Thread-safe store over a `DataIndex` and a similarity table
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<DataIndex>,
    similarities: RwLock<SimilarityTable>,
}

impl MemoryStore {
    pub fn new(index: DataIndex) -> Self {
        Self {
            index: RwLock::new(index),
            similarities: RwLock::new(SimilarityTable::default()),
        }
    }

    /// Run a closure against the current index under a read lock
    pub fn with_index<T>(&self, f: impl FnOnce(&DataIndex) -> T) -> Result<T> {
        let index = self.read_index()?;
        Ok(f(&index))
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, DataIndex>> {
        self.index
            .read()
            .map_err(|_| DataError::Unavailable("rating index lock poisoned".to_string()))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, DataIndex>> {
        self.index
            .write()
            .map_err(|_| DataError::Unavailable("rating index lock poisoned".to_string()))
    }

    fn read_similarities(&self) -> Result<RwLockReadGuard<'_, SimilarityTable>> {
        self.similarities
            .read()
            .map_err(|_| DataError::Unavailable("similarity table lock poisoned".to_string()))
    }
}

impl RatingStore for MemoryStore {
    fn get_ratings_by_user(&self, user_id: UserId) -> Result<Vec<Rating>> {
        Ok(self.read_index()?.get_user_ratings(user_id).to_vec())
    }

    fn get_ratings_by_movie(&self, movie_id: MovieId) -> Result<Vec<Rating>> {
        Ok(self.read_index()?.get_movie_ratings(movie_id).to_vec())
    }

    fn get_all_ratings(&self) -> Result<Vec<Rating>> {
        let index = self.read_index()?;
        let mut ratings: Vec<Rating> = index.user_ratings.values().flatten().cloned().collect();
        ratings.sort_by_key(|r| (r.user_id, r.movie_id));
        Ok(ratings)
    }

    fn count_ratings_by_user(&self, user_id: UserId) -> Result<usize> {
        Ok(self.read_index()?.get_user_ratings(user_id).len())
    }

    fn upsert_rating(&self, rating: Rating) -> Result<Rating> {
        let mut index = self.write_index()?;
        if index.get_movie(rating.movie_id).is_none() {
            return Err(DataError::movie_not_found(rating.movie_id));
        }

        let (user_id, movie_id) = (rating.user_id, rating.movie_id);
        let replaced = index.insert_rating(rating);
        index.refresh_movie_stats(movie_id);
        debug!(
            user_id,
            movie_id,
            replaced = replaced.is_some(),
            "Rating stored"
        );

        index
            .get_user_ratings(user_id)
            .iter()
            .find(|r| r.movie_id == movie_id)
            .cloned()
            .ok_or_else(|| DataError::Unavailable("rating vanished after upsert".to_string()))
    }
}

impl MovieCatalog for MemoryStore {
    fn get_movie(&self, movie_id: MovieId) -> Result<Option<MovieAttributes>> {
        Ok(self.read_index()?.get_movie(movie_id).cloned())
    }

    fn get_all_movies(&self, exclude: &[MovieId]) -> Result<Vec<MovieAttributes>> {
        let index = self.read_index()?;
        Ok(index
            .movie_ids()
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| index.get_movie(id).cloned())
            .collect())
    }

    fn get_popularity_ranked_movies(&self, limit: usize) -> Result<Vec<MovieAttributes>> {
        let index = self.read_index()?;
        Ok(index
            .popularity_ranking(limit)
            .into_iter()
            .cloned()
            .collect())
    }
}

impl SimilarityStore for MemoryStore {
    fn replace_all(&self, pairs: Vec<UserSimilarity>) -> Result<()> {
        // Build and validate off-lock so readers only ever see a complete table
        let table = SimilarityTable::build(pairs)?;
        let mut guard = self
            .similarities
            .write()
            .map_err(|_| DataError::Unavailable("similarity table lock poisoned".to_string()))?;
        *guard = table;
        Ok(())
    }

    fn get_similarities_for_user(&self, user_id: UserId) -> Result<Vec<UserSimilarity>> {
        let table = self.read_similarities()?;
        Ok(table
            .by_user
            .get(&user_id)
            .map(|positions| positions.iter().map(|&pos| table.pairs[pos]).collect())
            .unwrap_or_default())
    }

    fn get_all_similarities(&self) -> Result<Vec<UserSimilarity>> {
        Ok(self.read_similarities()?.pairs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> MemoryStore {
        let mut index = DataIndex::new();
        index.insert_movie(MovieAttributes::new(1, "First"));
        index.insert_movie(MovieAttributes::new(2, "Second"));
        index.insert_movie(MovieAttributes::new(3, "Third"));
        index.insert_rating(Rating::new(1, 1, 4.0, 100));
        index.insert_rating(Rating::new(1, 2, 3.0, 100));
        index.insert_rating(Rating::new(2, 1, 5.0, 100));
        index.compute_movie_stats();
        MemoryStore::new(index)
    }

    #[test]
    fn test_with_index_reads_current_index() {
        let store = create_test_store();
        let (movies, users, ratings) = store.with_index(|index| index.counts()).unwrap();
        assert_eq!((movies, users, ratings), (3, 2, 3));

        store.upsert_rating(Rating::new(5, 3, 4.0, 0)).unwrap();
        let user_ids = store.with_index(|index| index.user_ids()).unwrap();
        assert_eq!(user_ids, vec![1, 2, 5]);
    }

    #[test]
    fn test_rating_queries() {
        let store = create_test_store();
        assert_eq!(store.get_ratings_by_user(1).unwrap().len(), 2);
        assert_eq!(store.get_ratings_by_movie(1).unwrap().len(), 2);
        assert_eq!(store.count_ratings_by_user(2).unwrap(), 1);
        assert_eq!(store.count_ratings_by_user(42).unwrap(), 0);

        let all = store.get_all_ratings().unwrap();
        let keys: Vec<(UserId, MovieId)> = all.iter().map(|r| (r.user_id, r.movie_id)).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_upsert_keeps_single_row_per_pair() {
        let store = create_test_store();
        let stored = store
            .upsert_rating(Rating::new(1, 1, 2.0, 500).with_comment("changed my mind"))
            .unwrap();

        assert_eq!(stored.value, 2.0);
        assert_eq!(stored.created_at, 100);
        assert_eq!(stored.updated_at, 500);
        assert_eq!(store.count_ratings_by_user(1).unwrap(), 2);

        let by_movie = store.get_ratings_by_movie(1).unwrap();
        assert_eq!(by_movie.len(), 2);
        let mine = by_movie.iter().find(|r| r.user_id == 1).unwrap();
        assert_eq!(mine.value, 2.0);
        assert_eq!(mine.comment.as_deref(), Some("changed my mind"));
    }

    #[test]
    fn test_upsert_updates_popularity() {
        let store = create_test_store();
        store.upsert_rating(Rating::new(3, 3, 5.0, 200)).unwrap();
        store.upsert_rating(Rating::new(4, 3, 5.0, 200)).unwrap();

        let top = store.get_popularity_ranked_movies(1).unwrap();
        assert_eq!(top[0].id, 3);
    }

    #[test]
    fn test_upsert_unknown_movie() {
        let store = create_test_store();
        let err = store.upsert_rating(Rating::new(1, 99, 3.0, 0)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_catalog_exclude() {
        let store = create_test_store();
        let movies = store.get_all_movies(&[2]).unwrap();
        let ids: Vec<MovieId> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(store.get_movie(99).unwrap().is_none());
    }

    #[test]
    fn test_similarity_table_symmetric_lookup() {
        let store = create_test_store();
        store
            .replace_all(vec![
                UserSimilarity::new(1, 2, 0.5, 0),
                UserSimilarity::new(3, 2, 0.25, 0),
            ])
            .unwrap();

        let for_two = store.get_similarities_for_user(2).unwrap();
        assert_eq!(for_two.len(), 2);
        let for_three = store.get_similarities_for_user(3).unwrap();
        assert_eq!(for_three[0].other(3), Some(2));
        assert!(store.get_similarities_for_user(9).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_replace_keeps_previous_table() {
        let store = create_test_store();
        store
            .replace_all(vec![UserSimilarity::new(1, 2, 0.5, 0)])
            .unwrap();

        let bad = vec![
            UserSimilarity::new(1, 3, 0.1, 1),
            UserSimilarity::new(2, 3, 1.5, 1),
        ];
        assert!(store.replace_all(bad).is_err());

        let all = store.get_all_similarities().unwrap();
        assert_eq!(all, vec![UserSimilarity::new(1, 2, 0.5, 0)]);
    }
}
