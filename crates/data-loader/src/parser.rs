//! Parser for the catalog and rating data files.
//!
//! - movies.dat: movieId::title::year::critic_score::runtime::genres::languages
//! - ratings.dat: userId::movieId::rating::timestamp[::comment]
//!
//! An empty field means "missing". Genres and languages are `|`-separated.

use crate::error::{DataError, Result};
use crate::types::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

const MOVIE_FIELDS: usize = 7;
const RATING_FIELDS: usize = 4;

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(DataError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(|s| s.to_string()).collect())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a required numeric field
fn parse_field<T>(raw: &str, field: &str, file: &str, line: usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| DataError::Parse {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", field, e),
    })
}

/// Parse an optional numeric field; empty means `None`
fn parse_optional<T>(raw: &str, field: &str, file: &str, line: usize) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_field(raw, field, file, line).map(Some)
}

/// Split a `|`-separated list into a set, ignoring blanks
///
/// Example: "Drama|Crime" -> {"Crime", "Drama"}
fn parse_set(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the movies.dat file
pub fn parse_movies(path: &Path) -> Result<Vec<MovieAttributes>> {
    let file = file_name(path);
    let mut movies = Vec::new();

    for (idx, line) in read_lines(path)?.iter().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split("::").collect();
        if parts.len() != MOVIE_FIELDS {
            return Err(DataError::FieldCountMismatch {
                expected: MOVIE_FIELDS,
                found: parts.len(),
                line: line_no,
            });
        }

        let title = parts[1].trim();
        if title.is_empty() {
            return Err(DataError::Parse {
                file,
                line: line_no,
                reason: "Missing title".to_string(),
            });
        }

        movies.push(MovieAttributes {
            id: parse_field(parts[0], "movieId", &file, line_no)?,
            title: title.to_string(),
            year: parse_optional(parts[2], "year", &file, line_no)?,
            critic_score: parse_optional(parts[3], "critic_score", &file, line_no)?,
            runtime_minutes: parse_optional(parts[4], "runtime", &file, line_no)?,
            genres: parse_set(parts[5]),
            languages: parse_set(parts[6]),
        });
    }
    Ok(movies)
}

/// Parse the ratings.dat file
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    let file = file_name(path);
    let mut ratings = Vec::new();

    for (idx, line) in read_lines(path)?.iter().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        // Comments may themselves contain "::", so only split the leading fields
        let parts: Vec<&str> = line.splitn(RATING_FIELDS + 1, "::").collect();
        if parts.len() < RATING_FIELDS {
            return Err(DataError::FieldCountMismatch {
                expected: RATING_FIELDS,
                found: parts.len(),
                line: line_no,
            });
        }

        let timestamp = parse_field(parts[3], "timestamp", &file, line_no)?;
        let mut rating = Rating::new(
            parse_field(parts[0], "userId", &file, line_no)?,
            parse_field(parts[1], "movieId", &file, line_no)?,
            parse_field(parts[2], "rating", &file, line_no)?,
            timestamp,
        );
        if let Some(comment) = parts.get(4).map(|c| c.trim()).filter(|c| !c.is_empty()) {
            rating.comment = Some(comment.to_string());
        }
        ratings.push(rating);
    }
    Ok(ratings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("data-loader-parser-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_set() {
        let set = parse_set("Drama| Crime||");
        assert_eq!(set.len(), 2);
        assert!(set.contains("Drama"));
        assert!(set.contains("Crime"));
        assert!(parse_set("").is_empty());
    }

    #[test]
    fn test_parse_movies_with_missing_fields() {
        let path = write_temp(
            "movies_missing.dat",
            "1::Heat::1995::8.3::170::Action|Crime::English\n2::Untitled::::::::::\n",
        );
        let movies = parse_movies(&path).unwrap();

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].year, Some(1995));
        assert_eq!(movies[0].critic_score, Some(8.3));
        assert_eq!(movies[0].runtime_minutes, Some(170));
        assert!(movies[0].genres.contains("Crime"));
        assert_eq!(movies[1].year, None);
        assert_eq!(movies[1].critic_score, None);
        assert!(movies[1].genres.is_empty());
        assert!(movies[1].languages.is_empty());
    }

    #[test]
    fn test_parse_movies_field_count_mismatch() {
        let path = write_temp("movies_bad.dat", "1::Heat::1995\n");
        let err = parse_movies(&path).unwrap_err();
        assert!(matches!(err, DataError::FieldCountMismatch { expected: 7, found: 3, line: 1 }));
    }

    #[test]
    fn test_parse_ratings_with_comment() {
        let path = write_temp(
            "ratings_comment.dat",
            "1::10::4.5::978300760::great :: really\n2::10::3::978300761\n",
        );
        let ratings = parse_ratings(&path).unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].value, 4.5);
        assert_eq!(ratings[0].comment.as_deref(), Some("great :: really"));
        assert_eq!(ratings[1].comment, None);
        assert_eq!(ratings[1].created_at, ratings[1].updated_at);
    }

    #[test]
    fn test_parse_ratings_invalid_number() {
        let path = write_temp("ratings_bad.dat", "1::x::4::978300760\n");
        let err = parse_ratings(&path).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_movies(Path::new("/definitely/not/here/movies.dat")).unwrap_err();
        assert!(matches!(err, DataError::FileNotFound { .. }));
    }
}
