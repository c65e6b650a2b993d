use sqlx::PgPool;
use tracing::warn;

use crate::error::{Error, Result};
use crate::filter::JokeFilter;
use crate::models::Joke;
use crate::queries;

/// Business logic for jokes: query dispatch, tag attachment, and translation
/// of storage-level signals into domain errors.
#[derive(Clone)]
pub struct JokeService {
    pool: PgPool,
}

impl JokeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pick one random joke matching every provided filter, or NotFound.
    pub async fn random_joke(&self, filter: &JokeFilter) -> Result<Joke> {
        filter.validate()?;

        let row = match queries::random_joke(&self.pool, filter).await {
            Ok(row) => row,
            Err(sqlx::Error::RowNotFound) => {
                warn!(?filter, "no jokes found matching filter");
                return Err(Error::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        // Best effort: a failed tag lookup degrades to an empty tag list
        // rather than failing the whole request.
        let tags = match queries::tags_for_joke(&self.pool, row.id).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(joke_id = row.id, error = %e, "failed to fetch tags for joke");
                Vec::new()
            }
        };

        Ok(row.into_joke(tags))
    }

    /// All tag names known to the system.
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        Ok(queries::all_tags(&self.pool).await?)
    }

    /// Store a new joke with optional category and tags.
    pub async fn create_joke(
        &self,
        setup: &str,
        punchline: &str,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<Joke> {
        if setup.is_empty() || punchline.is_empty() {
            return Err(Error::MissingFields);
        }

        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let (row, tags) = queries::insert_joke(&self.pool, setup, punchline, category, tags).await?;

        Ok(row.into_joke(tags))
    }
}
