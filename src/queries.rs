use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::Result;
use crate::filter::JokeFilter;
use crate::models::Joke;

/// A row from the jokes table, before tags are attached.
#[derive(Debug, Clone, FromRow)]
pub struct JokeRow {
    pub id: i32,
    pub setup: String,
    pub punchline: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JokeRow {
    pub fn into_joke(self, tags: Vec<String>) -> Joke {
        Joke {
            id: self.id,
            setup: self.setup,
            punchline: self.punchline,
            category: self.category,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fetch one random joke matching the filter. Returns
/// `sqlx::Error::RowNotFound` when nothing matches; the service layer
/// translates that into the domain-level not-found.
pub async fn random_joke(pool: &PgPool, filter: &JokeFilter) -> sqlx::Result<JokeRow> {
    let mut query = filter.build_query();
    query.build_query_as::<JokeRow>().fetch_one(pool).await
}

/// Tag names for one joke, unique and in lexical order.
pub async fn tags_for_joke(pool: &PgPool, joke_id: i32) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT t.name
         FROM tags t
         INNER JOIN joke_tags jt ON t.id = jt.tag_id
         WHERE jt.joke_id = $1
         ORDER BY t.name",
    )
    .bind(joke_id)
    .fetch_all(pool)
    .await
}

/// Every tag name known to the system, in lexical order.
pub async fn all_tags(pool: &PgPool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Insert a joke plus its tags in one transaction. Tags are created on
/// first use and linked through joke_tags. Returns the stored row and the
/// normalized tag set.
pub async fn insert_joke(
    pool: &PgPool,
    setup: &str,
    punchline: &str,
    category: Option<&str>,
    tags: &[String],
) -> Result<(JokeRow, Vec<String>)> {
    // Dedupe and sort up front so the response matches the tag-order invariant.
    let tag_names: BTreeSet<&str> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let mut tx = pool.begin().await?;

    let joke: JokeRow = sqlx::query_as(
        "INSERT INTO jokes (setup, punchline, category)
         VALUES ($1, $2, $3)
         RETURNING id, setup, punchline, category, created_at, updated_at",
    )
    .bind(setup)
    .bind(punchline)
    .bind(category)
    .fetch_one(&mut *tx)
    .await?;

    for name in &tag_names {
        let tag_id: i32 = sqlx::query_scalar(
            "INSERT INTO tags (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO joke_tags (joke_id, tag_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(joke.id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let tags = tag_names.into_iter().map(str::to_string).collect();
    Ok((joke, tags))
}
