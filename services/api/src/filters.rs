//! Query filters for post and tag listings
//!
//! Filters are parsed from raw query parameters into typed values once, at
//! the edge; the stores only ever see the parsed form.

use serde::Deserialize;

use crate::models::Post;
use crate::validation::ValidationErrors;

/// Raw query parameters accepted by `GET /posts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    /// Comma separated list of tag ids
    pub tags: Option<String>,
    /// Case-insensitive keyword search
    pub search: Option<String>,
}

/// Parsed post filter; both criteria compose with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Keep posts carrying at least one of these tags
    pub tag_ids: Option<Vec<i64>>,
    /// Keep posts whose keywords contain this token, ignoring case
    pub search: Option<String>,
}

impl PostFilter {
    /// Parse query parameters; empty parameters are treated as absent
    pub fn from_query(query: &PostQuery) -> Result<Self, ValidationErrors> {
        let tag_ids = match query.tags.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(
                parse_id_list(raw).map_err(|message| ValidationErrors::single("tags", message))?,
            ),
            None => None,
        };

        let search = query
            .search
            .as_deref()
            .filter(|search| !search.is_empty())
            .map(str::to_string);

        Ok(Self { tag_ids, search })
    }

    pub fn matches(&self, post: &Post) -> bool {
        let tagged = self.tag_ids.as_ref().is_none_or(|ids| {
            post.tags.iter().any(|tag| ids.contains(&tag.id))
        });

        let found = self.search.as_ref().is_none_or(|search| {
            post.keywords
                .to_lowercase()
                .contains(&search.to_lowercase())
        });

        tagged && found
    }
}

/// Parse `"1,2,3"` into ids; every token must be an integer
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<i64>()
                .map_err(|_| format!("\"{}\" is not a valid tag id.", token))
        })
        .collect()
}

/// Escape `%`, `_` and `\` so a search token matches literally in `ILIKE`
pub fn escape_like(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Raw query parameters accepted by `GET /tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagQuery {
    pub assigned_only: Option<String>,
}

/// Parsed tag filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagFilter {
    /// Keep only tags attached to at least one post
    pub assigned_only: bool,
}

impl TagFilter {
    pub fn from_query(query: &TagQuery) -> Result<Self, ValidationErrors> {
        let assigned_only = match query.assigned_only.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw.parse::<i64>().map(|flag| flag != 0).map_err(|_| {
                ValidationErrors::single("assigned_only", "A valid integer is required.")
            })?,
        };

        Ok(Self { assigned_only })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostStatus, Tag};
    use chrono::Utc;

    fn post(keywords: &str, tag_ids: &[i64]) -> Post {
        Post {
            id: 1,
            title: "Test".to_string(),
            slug: "test".to_string(),
            by: 1,
            content: "Test".to_string(),
            read_time_min: 2,
            status: PostStatus::Draft,
            keywords: keywords.to_string(),
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            tags: tag_ids
                .iter()
                .map(|id| Tag {
                    id: *id,
                    name: format!("tag{}", id),
                    user_id: 1,
                })
                .collect(),
        }
    }

    fn query(tags: Option<&str>, search: Option<&str>) -> PostQuery {
        PostQuery {
            tags: tags.map(str::to_string),
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1,2,3"), Ok(vec![1, 2, 3]));
        assert_eq!(parse_id_list("4, 5"), Ok(vec![4, 5]));
        assert!(parse_id_list("1,a").is_err());
        assert!(parse_id_list("1,,2").is_err());
    }

    #[test]
    fn test_empty_parameters_are_ignored() {
        let filter = PostFilter::from_query(&query(Some(""), Some(""))).unwrap();
        assert_eq!(filter, PostFilter::default());
    }

    #[test]
    fn test_non_numeric_tag_is_a_validation_error() {
        let errors = PostFilter::from_query(&query(Some("1,two"), None)).unwrap_err();
        assert!(errors.contains("tags"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = PostFilter::from_query(&query(None, Some("my"))).unwrap();
        assert!(filter.matches(&post("MY TEST", &[])));
        assert!(filter.matches(&post("something mY", &[])));
        assert!(!filter.matches(&post("other", &[])));
    }

    #[test]
    fn test_tag_filter_matches_any_listed_tag() {
        let filter = PostFilter::from_query(&query(Some("1,2"), None)).unwrap();
        assert!(filter.matches(&post("", &[1])));
        assert!(filter.matches(&post("", &[2, 3])));
        assert!(!filter.matches(&post("", &[3])));
        assert!(!filter.matches(&post("", &[])));
    }

    #[test]
    fn test_filters_compose_with_and() {
        let filter = PostFilter::from_query(&query(Some("1"), Some("rust"))).unwrap();
        assert!(filter.matches(&post("Rust tips", &[1])));
        assert!(!filter.matches(&post("Rust tips", &[2])));
        assert!(!filter.matches(&post("Go tips", &[1])));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_assigned_only_flag() {
        let parse = |raw: Option<&str>| {
            TagFilter::from_query(&TagQuery {
                assigned_only: raw.map(str::to_string),
            })
        };

        assert!(!parse(None).unwrap().assigned_only);
        assert!(!parse(Some("0")).unwrap().assigned_only);
        assert!(parse(Some("1")).unwrap().assigned_only);
        assert!(parse(Some("2")).unwrap().assigned_only);
        assert!(parse(Some("yes")).is_err());
    }
}
