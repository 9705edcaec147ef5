//! Integration tests for the pipeline.
//!
//! These tests build user contexts from a real store and check that both
//! kinds of candidate are filtered the same way.

use data_loader::{DataIndex, MemoryStore, MovieAttributes, MovieCatalog, MovieId, Rating, RatingStore};
use pipeline::filters::AlreadyRatedFilter;
use pipeline::{Candidate, FilterPipeline, Provenance, UserContext};

fn create_test_store() -> MemoryStore {
    let mut index = DataIndex::new();

    index.insert_movie(MovieAttributes::new(1, "Spirited Away").with_critic_score(9.0));
    index.insert_movie(MovieAttributes::new(2, "Paprika").with_critic_score(8.0));
    index.insert_movie(MovieAttributes::new(3, "Akira").with_critic_score(8.5));
    index.insert_movie(MovieAttributes::new(4, "Perfect Blue").with_critic_score(7.5));

    // Movie 1: well liked by many
    for user_id in 10..20 {
        index.insert_rating(Rating::new(user_id, 1, 4.5, 1_000_000));
    }
    // Movie 3: mixed
    for user_id in 10..15 {
        index.insert_rating(Rating::new(user_id, 3, 3.0, 1_000_000));
    }

    // User 1 has rated movies 1 and 2
    index.insert_rating(Rating::new(1, 1, 5.0, 1_000_000));
    index.insert_rating(Rating::new(1, 2, 3.0, 1_000_000));

    index.compute_movie_stats();
    MemoryStore::new(index)
}

fn context_for(store: &MemoryStore, user_id: u32) -> UserContext {
    let rated = store
        .get_ratings_by_user(user_id)
        .unwrap()
        .into_iter()
        .map(|r| r.movie_id);
    UserContext::with_rated(user_id, rated)
}

#[test]
fn test_popularity_candidates_are_filtered() {
    let store = create_test_store();
    let context = context_for(&store, 1);

    let candidates: Vec<Candidate> = store
        .get_popularity_ranked_movies(10)
        .unwrap()
        .iter()
        .map(|m| Candidate::popular(m.id))
        .collect();

    let pipeline = FilterPipeline::new().add_filter(AlreadyRatedFilter);
    let filtered = pipeline.apply(candidates, &context).unwrap();

    let ids: Vec<MovieId> = filtered.iter().map(|c| c.movie_id).collect();
    assert_eq!(ids, vec![3, 4]);
    assert!(filtered.iter().all(|c| c.provenance == Provenance::PopularityFallback));
}

#[test]
fn test_collaborative_candidates_are_filtered() {
    let store = create_test_store();
    let context = context_for(&store, 1);

    let candidates = vec![
        Candidate::collaborative(1, 4.2),
        Candidate::collaborative(3, 2.1),
        Candidate::collaborative(4, 1.7),
    ];

    let filtered = FilterPipeline::new()
        .add_filter(AlreadyRatedFilter)
        .apply(candidates, &context)
        .unwrap();

    assert_eq!(filtered.len(), 2);
    for candidate in &filtered {
        assert!(!context.has_rated(candidate.movie_id));
        assert!(candidate.provenance.is_collaborative());
    }
}

#[test]
fn test_user_without_ratings_keeps_all() {
    let store = create_test_store();
    let context = context_for(&store, 99);

    let candidates: Vec<Candidate> = (1..=4).map(Candidate::popular).collect();
    let filtered = FilterPipeline::new()
        .add_filter(AlreadyRatedFilter)
        .apply(candidates, &context)
        .unwrap();

    assert_eq!(filtered.len(), 4);
}
