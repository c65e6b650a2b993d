use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A dad joke as returned to clients. `tags` is always present, even when
/// empty, and holds unique names in lexical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joke {
    pub id: i32,
    pub setup: String,
    pub punchline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/joke`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJokeRequest {
    #[validate(length(min = 1))]
    pub setup: String,
    #[validate(length(min = 1))]
    pub punchline: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_joke(tags: Vec<String>, category: Option<String>) -> Joke {
        Joke {
            id: 1,
            setup: "Why don't eggs tell jokes?".to_string(),
            punchline: "They'd crack each other up.".to_string(),
            category,
            tags,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tags_always_serialized_even_when_empty() {
        let json = serde_json::to_value(sample_joke(Vec::new(), None)).unwrap();
        assert_eq!(json["tags"], serde_json::json!([]));
    }

    #[test]
    fn test_null_category_omitted() {
        let json = serde_json::to_string(&sample_joke(Vec::new(), None)).unwrap();
        assert!(!json.contains("category"));

        let json = serde_json::to_string(&sample_joke(
            Vec::new(),
            Some("food".to_string()),
        ))
        .unwrap();
        assert!(json.contains("\"category\":\"food\""));
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateJokeRequest {
            setup: "a".to_string(),
            punchline: "b".to_string(),
            category: None,
            tags: Vec::new(),
        };
        assert!(req.validate().is_ok());

        let req = CreateJokeRequest {
            setup: "a".to_string(),
            punchline: String::new(),
            category: None,
            tags: Vec::new(),
        };
        assert!(req.validate().is_err());
    }
}
