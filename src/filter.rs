use sqlx::{Postgres, QueryBuilder};

use crate::error::{Error, Result};

/// Request-scoped filter over the joke table. Each field is optional; the
/// query builder emits only the clauses for the filters that are set, so one
/// statement covers all eight search/category/tags combinations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JokeFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl JokeFilter {
    /// Build a filter from raw query parameters, normalizing as we go:
    /// empty or whitespace-only search/category become absent, tags are
    /// split on commas with blank tokens dropped.
    pub fn from_params(
        search: Option<String>,
        category: Option<String>,
        tags: Option<String>,
    ) -> Self {
        JokeFilter {
            search: search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            category: category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            tags: tags.map(|raw| parse_tags(&raw)).unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.category.is_none() && self.tags.is_empty()
    }

    /// Reject filters with present-but-empty components. HTTP handlers
    /// normalize these away in `from_params`; this guards callers that
    /// construct a filter directly.
    pub fn validate(&self) -> Result<()> {
        if self.search.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::InvalidInput("search must not be empty".to_string()));
        }
        if self.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "category must not be empty".to_string(),
            ));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("tags must not be empty".to_string()));
        }
        Ok(())
    }

    /// Build the random-joke query for this filter. Tags match with OR among
    /// themselves (ANY) and AND against the other predicates. The tag match
    /// uses EXISTS rather than a join so no DISTINCT is needed and
    /// `ORDER BY RANDOM()` stays valid.
    pub fn build_query(&self) -> QueryBuilder<'_, Postgres> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, setup, punchline, category, created_at, updated_at FROM jokes",
        );

        let mut prefix = " WHERE ";

        if !self.tags.is_empty() {
            qb.push(prefix);
            qb.push(
                "EXISTS (SELECT 1 FROM joke_tags jt \
                 INNER JOIN tags t ON t.id = jt.tag_id \
                 WHERE jt.joke_id = jokes.id AND t.name = ANY(",
            );
            qb.push_bind(&self.tags);
            qb.push("))");
            prefix = " AND ";
        }

        if let Some(category) = &self.category {
            qb.push(prefix);
            qb.push("category = ");
            qb.push_bind(category);
            prefix = " AND ";
        }

        if let Some(search) = &self.search {
            qb.push(prefix);
            qb.push("(setup ILIKE '%' || ");
            qb.push_bind(search);
            qb.push(" || '%' OR punchline ILIKE '%' || ");
            qb.push_bind(search);
            qb.push(" || '%')");
        }

        qb.push(" ORDER BY RANDOM() LIMIT 1");
        qb
    }
}

/// Split a comma-separated tag parameter, trimming whitespace and dropping
/// empty tokens: `"a, ,b"` yields `["a", "b"]`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(search: bool, category: bool, tags: bool) -> JokeFilter {
        JokeFilter {
            search: search.then(|| "egg".to_string()),
            category: category.then(|| "food".to_string()),
            tags: if tags {
                vec!["puns".to_string(), "wordplay".to_string()]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn test_parse_tags_drops_blank_tokens() {
        assert_eq!(parse_tags("a, ,b"), vec!["a", "b"]);
        assert_eq!(parse_tags("  puns ,wordplay"), vec!["puns", "wordplay"]);
        assert!(parse_tags(" , ,").is_empty());
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_from_params_normalizes_empty_to_absent() {
        let f = JokeFilter::from_params(
            Some("  ".to_string()),
            Some(String::new()),
            Some(" , ".to_string()),
        );
        assert!(f.is_empty());
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_from_params_trims_values() {
        let f = JokeFilter::from_params(
            Some(" egg ".to_string()),
            Some(" food ".to_string()),
            Some("a, ,b".to_string()),
        );
        assert_eq!(f.search.as_deref(), Some("egg"));
        assert_eq!(f.category.as_deref(), Some("food"));
        assert_eq!(f.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_validate_rejects_blank_components() {
        let f = JokeFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(f.validate().is_err());

        let f = JokeFilter {
            tags: vec!["".to_string()],
            ..Default::default()
        };
        assert!(f.validate().is_err());
    }

    // Exhaustive 8-way check: the emitted SQL contains exactly the clauses
    // for the filters that are set.
    #[test]
    fn test_query_clauses_match_filter_combination() {
        for mask in 0..8u8 {
            let has_search = mask & 1 != 0;
            let has_category = mask & 2 != 0;
            let has_tags = mask & 4 != 0;

            let sql = filter(has_search, has_category, has_tags)
                .build_query()
                .into_sql();

            assert_eq!(sql.contains("ILIKE"), has_search, "combo {:03b}: {}", mask, sql);
            assert_eq!(
                sql.contains("category = "),
                has_category,
                "combo {:03b}: {}",
                mask,
                sql
            );
            assert_eq!(sql.contains("EXISTS"), has_tags, "combo {:03b}: {}", mask, sql);
            assert!(sql.contains("ORDER BY RANDOM() LIMIT 1"));
            assert_eq!(sql.contains("WHERE"), mask != 0);
        }
    }

    #[test]
    fn test_all_filters_joined_with_and() {
        let sql = filter(true, true, true).build_query().into_sql();
        // tags EXISTS, then category, then search, AND-joined in the outer WHERE
        let where_pos = sql.find(" WHERE EXISTS").unwrap();
        let category_pos = sql.find(" AND category = ").unwrap();
        let search_pos = sql.find(" AND (setup ILIKE").unwrap();
        assert!(where_pos < category_pos && category_pos < search_pos, "{}", sql);
    }
}
