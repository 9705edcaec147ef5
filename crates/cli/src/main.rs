use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{DataIndex, MemoryStore, MovieCatalog, MovieId, UserId};
use engine::{
    ContentSimilarityResult, MovieAttributes, Provenance, RecommendationResult,
    RecommendationService, RecommenderConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// movie-recs - content and collaborative movie recommendations
#[derive(Parser)]
#[command(name = "movie-recs")]
#[command(about = "Movie recommendations from catalog attributes and user ratings", long_about = None)]
struct Cli {
    /// Directory holding movies.dat and ratings.dat
    #[arg(short, long, default_value = "data/movies")]
    data_dir: PathBuf,

    /// JSON file overriding recommender thresholds and limits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Movies with similar attributes
    Similar {
        #[arg(long)]
        movie_id: MovieId,

        /// Number of results (defaults to the configured limit)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Movies favored by the people who rated this one
    AlsoLiked {
        #[arg(long)]
        movie_id: MovieId,

        #[arg(short)]
        k: Option<usize>,
    },

    /// Recompute the user similarity table and report its size
    Refresh,

    /// Users with the most similar rating history
    SimilarUsers {
        #[arg(long)]
        user_id: UserId,

        #[arg(short, default_value = "10")]
        n: usize,
    },

    /// Get movie recommendations for a user
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Show which branch produced each recommendation
        #[arg(long)]
        explain: bool,
    },

    /// Recommendations built from the user's highest-rated movies
    Favorites {
        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Rate a movie, then show the user's recommendations.
    /// The rating lives only for this invocation.
    Rate {
        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        movie_id: MovieId,

        #[arg(long)]
        value: f32,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Show a user's rating statistics and top-rated movies
    User {
        #[arg(long)]
        user_id: UserId,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        /// Trigger a similarity refresh every this many requests (0 = never)
        #[arg(long, default_value = "25")]
        refresh_every: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RecommenderConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RecommenderConfig::default(),
    };

    let start = Instant::now();
    let index = DataIndex::load_from_files(&cli.data_dir)
        .with_context(|| format!("Failed to load movie data from {}", cli.data_dir.display()))?;
    let (movies, users, ratings) = index.counts();
    if !cli.json {
        println!(
            "{} Loaded {} movies, {} users, {} ratings in {:?}",
            "✓".green(),
            movies,
            users,
            ratings,
            start.elapsed()
        );
    }

    let store = Arc::new(MemoryStore::new(index));
    let service = RecommendationService::from_store(store.clone(), config);

    // The similarity table is not persisted between runs
    if needs_similarities(&cli.command) {
        service
            .refresh_user_similarities()
            .context("Failed to compute user similarities")?;
    }

    let json = cli.json;
    match cli.command {
        Commands::Similar { movie_id, k } => handle_similar(&service, &store, movie_id, k, json)?,
        Commands::AlsoLiked { movie_id, k } => handle_also_liked(&service, &store, movie_id, k, json)?,
        Commands::Refresh => handle_refresh(&service, json)?,
        Commands::SimilarUsers { user_id, n } => handle_similar_users(&service, user_id, n, json)?,
        Commands::Recommend {
            user_id,
            limit,
            explain,
        } => handle_recommend(&service, &store, user_id, limit, explain, json)?,
        Commands::Favorites { user_id, limit } => {
            handle_favorites(&service, &store, user_id, limit, json)?
        }
        Commands::Rate {
            user_id,
            movie_id,
            value,
            comment,
        } => handle_rate(&service, &store, user_id, movie_id, value, comment, json)?,
        Commands::User { user_id } => handle_user(&service, &store, user_id, json)?,
        Commands::Benchmark {
            requests,
            concurrent,
            refresh_every,
        } => handle_benchmark(service, store, requests, concurrent, refresh_every).await?,
    }

    Ok(())
}

fn needs_similarities(command: &Commands) -> bool {
    matches!(
        command,
        Commands::SimilarUsers { .. }
            | Commands::Recommend { .. }
            | Commands::Benchmark { .. }
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn movie_label(store: &MemoryStore, movie_id: MovieId) -> Result<String> {
    Ok(match store.get_movie(movie_id)? {
        Some(movie) => describe(&movie),
        None => format!("#{}", movie_id),
    })
}

fn describe(movie: &MovieAttributes) -> String {
    let genres = movie.genres.iter().cloned().collect::<Vec<_>>().join(", ");
    match movie.year {
        Some(year) => format!("{} ({}) [{}]", movie.title, year, genres),
        None => format!("{} [{}]", movie.title, genres),
    }
}

/// Handle the 'similar' command
fn handle_similar(
    service: &RecommendationService,
    store: &MemoryStore,
    movie_id: MovieId,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let k = k.unwrap_or(service.config().similar_movies_limit);
    let results: Vec<ContentSimilarityResult> = service
        .similar_movies_by_content(movie_id, k)
        .with_context(|| format!("No similar movies for {}", movie_id))?;

    if json {
        return print_json(&results);
    }

    println!(
        "{}",
        format!("Movies like {}:", movie_label(store, movie_id)?).bold().blue()
    );
    for (i, result) in results.iter().enumerate() {
        let c = &result.components;
        println!(
            "{}. {} - {:.1}",
            (i + 1).to_string().green(),
            movie_label(store, result.movie_b)?,
            result.total_score
        );
        println!(
            "   genre {:.0} | year {:.0} | score {:.0} | runtime {:.0} | language {:.0}",
            c.genre, c.year, c.score, c.runtime, c.language
        );
    }
    Ok(())
}

/// Handle the 'also-liked' command
fn handle_also_liked(
    service: &RecommendationService,
    store: &MemoryStore,
    movie_id: MovieId,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    if store.get_movie(movie_id)?.is_none() {
        bail!("Movie {} not found", movie_id);
    }
    let k = k.unwrap_or(service.config().behavior_limit);
    let movies = service.similar_movies_by_behavior(movie_id, k);

    if json {
        return print_json(&movies);
    }

    println!(
        "{}",
        format!("People who rated {} also liked:", movie_label(store, movie_id)?)
            .bold()
            .blue()
    );
    if movies.is_empty() {
        println!("  (not enough shared ratings yet)");
    }
    for (i, movie) in movies.iter().enumerate() {
        println!("{}. {}", (i + 1).to_string().green(), describe(movie));
    }
    Ok(())
}

/// Handle the 'refresh' command
fn handle_refresh(service: &RecommendationService, json: bool) -> Result<()> {
    let start = Instant::now();
    let summary = service
        .refresh_user_similarities()
        .context("Similarity refresh failed")?;

    if json {
        return print_json(&summary);
    }
    println!(
        "{} {} users, {} pairs in {:?}",
        "✓".green(),
        summary.users,
        summary.pairs,
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'similar-users' command
fn handle_similar_users(
    service: &RecommendationService,
    user_id: UserId,
    n: usize,
    json: bool,
) -> Result<()> {
    let neighbors = service.similar_users(user_id, n);

    if json {
        return print_json(&neighbors);
    }
    println!("{}", format!("Users similar to {}:", user_id).bold().blue());
    for (other, similarity) in neighbors {
        println!("  - user {}: {:.3}", other, similarity);
    }
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    service: &RecommendationService,
    store: &MemoryStore,
    user_id: UserId,
    limit: Option<usize>,
    explain: bool,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(service.config().recommendation_limit);
    let recommendations = service.recommend_for_user(user_id, limit);

    if json {
        return print_json(&recommendations);
    }
    print_recommendations(store, &recommendations, explain)
}

/// Handle the 'favorites' command
fn handle_favorites(
    service: &RecommendationService,
    store: &MemoryStore,
    user_id: UserId,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(service.config().favorite_recommendation_limit);
    let matches = service.recommend_from_favorites(user_id, limit);

    if json {
        return print_json(&matches);
    }
    println!(
        "{}",
        format!("Because user {} loved...", user_id).bold().blue()
    );
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. {} - {:.1} (like {})",
            (i + 1).to_string().green(),
            movie_label(store, m.movie_id)?,
            m.total_score,
            movie_label(store, m.favorite_id)?
        );
    }
    Ok(())
}

/// Handle the 'rate' command
fn handle_rate(
    service: &RecommendationService,
    store: &MemoryStore,
    user_id: UserId,
    movie_id: MovieId,
    value: f32,
    comment: Option<String>,
    json: bool,
) -> Result<()> {
    let stored = service
        .submit_rating(user_id, movie_id, value, comment)
        .context("Rating rejected")?;
    // submit_rating refreshes on its own when configured to
    if !service.config().refresh_on_rating {
        service
            .refresh_user_similarities()
            .context("Failed to compute user similarities")?;
    }
    let recommendations = service.recommend_for_user(user_id, service.config().recommendation_limit);

    if json {
        #[derive(Serialize)]
        struct RateOutput<'a> {
            rating: &'a data_loader::Rating,
            recommendations: &'a [RecommendationResult],
        }
        return print_json(&RateOutput {
            rating: &stored,
            recommendations: &recommendations,
        });
    }

    println!(
        "{} User {} rated {} as {}",
        "✓".green(),
        user_id,
        movie_label(store, movie_id)?,
        stored.value
    );
    print_recommendations(store, &recommendations, true)
}

/// Handle the 'user' command
fn handle_user(
    service: &RecommendationService,
    store: &MemoryStore,
    user_id: UserId,
    json: bool,
) -> Result<()> {
    let stats = service
        .user_rating_stats(user_id)
        .context("Failed to read user ratings")?;
    if stats.total_ratings == 0 {
        return Err(anyhow!("User {} has no ratings", user_id));
    }

    if json {
        return print_json(&stats);
    }

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!("{}Number of ratings: {}", "• ".cyan(), stats.total_ratings);
    println!("{}Average rating: {:.1}", "• ".cyan(), stats.avg_rating);
    println!("Distribution:");
    for (star, count) in stats.distribution.iter().rev() {
        println!("  {} {:>4} {}", "★".repeat(*star as usize), count, "▇".repeat((*count).min(40)));
    }

    let mut top_rated = store.with_index(|index| index.get_user_ratings(user_id).to_vec())?;
    top_rated.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });
    println!("Top rated movies:");
    for rating in top_rated.iter().take(5) {
        println!("  - {} (Rating: {})", movie_label(store, rating.movie_id)?, rating.value);
        if let Some(comment) = &rating.comment {
            println!("    \"{}\"", comment.italic());
        }
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    service: RecommendationService,
    store: Arc<MemoryStore>,
    requests: usize,
    concurrent: usize,
    refresh_every: usize,
) -> Result<()> {
    let user_ids = store.with_index(|index| index.user_ids())?;
    if user_ids.is_empty() {
        bail!("No rated users to benchmark against");
    }

    let users: Vec<UserId> = (0..requests)
        .map(|_| user_ids[rand::random::<u32>() as usize % user_ids.len()])
        .collect();

    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let started = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    let mut refreshes = Vec::new();

    for (i, user_id) in users.into_iter().enumerate() {
        if refresh_every > 0 && i > 0 && i % refresh_every == 0 {
            let service = service.clone();
            refreshes.push(tokio::task::spawn_blocking(move || {
                service.refresh_user_similarities()
            }));
        }

        let permit = permits.clone().acquire_owned().await?;
        let service = service.clone();
        let limit = service.config().recommendation_limit;
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let start = Instant::now();
            let results = service.recommend_for_user(user_id, limit);
            (start.elapsed(), results.first().map(|r| r.provenance))
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(handles.len());
    let mut collaborative = 0usize;
    for handle in handles {
        let (elapsed, provenance) = handle.await?;
        if matches!(provenance, Some(Provenance::Collaborative { .. })) {
            collaborative += 1;
        }
        timings.push(elapsed);
    }
    for refresh in refreshes {
        refresh.await?.context("Refresh during benchmark failed")?;
    }
    let wall_time = started.elapsed();

    if timings.is_empty() {
        println!("No requests issued");
        return Ok(());
    }

    timings.sort();
    let total: Duration = timings.iter().sum();
    let avg_latency = total / timings.len() as u32;
    let percentile = |p: f64| timings[((timings.len() - 1) as f64 * p) as usize];
    let throughput = timings.len() as f64 / wall_time.as_secs_f64().max(f64::EPSILON);

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} collaborative)", timings.len(), collaborative);
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Format and print recommendations
fn print_recommendations(
    store: &MemoryStore,
    recommendations: &[RecommendationResult],
    explain: bool,
) -> Result<()> {
    println!("{}", "Movie Recommendations:".bold().blue());
    if recommendations.is_empty() {
        println!("  (nothing to recommend)");
    }
    for rec in recommendations {
        let score = match rec.predicted_score() {
            Some(score) => format!("{:.2}", score),
            None => "-".to_string(),
        };
        println!(
            "{}. {} - Score: {}",
            rec.rank.to_string().green(),
            movie_label(store, rec.movie_id)?,
            score
        );
        if explain {
            println!("   Source: {}", rec.provenance.label());
        }
    }
    Ok(())
}
