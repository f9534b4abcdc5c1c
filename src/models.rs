//! Data models for topics, reference links, and generated article drafts.
//!
//! The central type is [`ArticleDraft`], the structured record the
//! generative backend returns for one topic. Every field is declared with a
//! serde default so a sloppy response still deserializes; the
//! [`ArticleDraft::validate`] step immediately after parse is what enforces
//! the required-fields contract and turns gaps into a typed error instead of
//! a missing-key surprise at publish time.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed category set article drafts are steered into. Mirrors the
/// ranking sections the trend source is harvested from.
pub const CATEGORIES: [&str; 4] = ["경제/비즈니스", "IT/테크", "패션/뷰티/리빙", "일반/생활"];

/// Number of tags requested from, and kept after, generation.
pub const TAG_COUNT: usize = 5;

/// A candidate subject harvested from the trend source.
#[derive(Debug, Clone)]
pub struct Topic {
    /// The harvested headline or hot-topic phrase.
    pub keyword: String,
    /// Coarse category chosen by the harvesting side, not by the source.
    pub category_hint: String,
}

/// A title + URL pair woven into generated articles.
///
/// Pools of these are read-only and shared across article generations;
/// each generation samples a few without replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub title: String,
    pub url: String,
}

/// Why a parsed draft failed the required-fields contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// The structured article record produced by the generative backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    /// Article body as HTML markup.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scene description handed to the image generator.
    #[serde(default)]
    pub image_prompt: String,
}

impl ArticleDraft {
    /// Enforce the every-field-present-and-non-empty invariant.
    ///
    /// Tags are trimmed, deduplicated, and capped at [`TAG_COUNT`]. A
    /// category outside [`CATEGORIES`] falls back to the topic's category
    /// hint rather than failing the whole attempt.
    pub fn validate(mut self, category_hint: &str) -> Result<Self, DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::MissingField("title"));
        }
        if self.content.trim().is_empty() {
            return Err(DraftError::MissingField("content"));
        }
        if self.excerpt.trim().is_empty() {
            return Err(DraftError::MissingField("excerpt"));
        }
        if self.image_prompt.trim().is_empty() {
            return Err(DraftError::MissingField("image_prompt"));
        }

        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unique()
            .take(TAG_COUNT)
            .collect();
        if self.tags.is_empty() {
            return Err(DraftError::MissingField("tags"));
        }

        let category = self.category.trim();
        self.category = if CATEGORIES.contains(&category) {
            category.to_string()
        } else {
            category_hint.trim().to_string()
        };
        if self.category.is_empty() {
            return Err(DraftError::MissingField("category"));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "전기요금 절약 방법 핵심 요약".to_string(),
            category: "일반/생활".to_string(),
            content: "<h2>요약</h2><p>본문</p>".to_string(),
            excerpt: "전기요금을 아끼는 현실적인 방법".to_string(),
            tags: vec!["전기요금".to_string(), "절약".to_string()],
            image_prompt: "A cozy living room with a smart thermostat".to_string(),
        }
    }

    #[test]
    fn valid_draft_passes_unchanged() {
        let validated = draft().validate("생활정보").unwrap();
        assert_eq!(validated.category, "일반/생활");
        assert_eq!(validated.tags.len(), 2);
    }

    #[test]
    fn empty_title_is_a_typed_failure() {
        let mut d = draft();
        d.title = "  ".to_string();
        assert_eq!(
            d.validate("생활정보"),
            Err(DraftError::MissingField("title"))
        );
    }

    #[test]
    fn missing_fields_deserialize_then_fail_validation() {
        let d: ArticleDraft = serde_json::from_str(r#"{"title": "only a title"}"#).unwrap();
        assert_eq!(
            d.validate("생활정보"),
            Err(DraftError::MissingField("content"))
        );
    }

    #[test]
    fn unknown_category_falls_back_to_the_hint() {
        let mut d = draft();
        d.category = "완전히 다른 분류".to_string();
        let validated = d.validate("생활정보").unwrap();
        assert_eq!(validated.category, "생활정보");
    }

    #[test]
    fn tags_are_trimmed_deduped_and_capped() {
        let mut d = draft();
        d.tags = vec![
            " 전기요금 ".to_string(),
            "전기요금".to_string(),
            "".to_string(),
            "절약".to_string(),
            "누진세".to_string(),
            "한전".to_string(),
            "에어컨".to_string(),
            "여섯번째".to_string(),
        ];
        let validated = d.validate("생활정보").unwrap();
        assert_eq!(
            validated.tags,
            vec!["전기요금", "절약", "누진세", "한전", "에어컨"]
        );
    }

    #[test]
    fn schema_shaped_payload_round_trips() {
        let raw = r#"{
            "title": "2026년 전기요금 정책 분석",
            "category": "경제/비즈니스",
            "content": "<h2>개요</h2><p>내용</p>",
            "excerpt": "정책 변화 요약",
            "tags": ["전기요금", "정책"],
            "image_prompt": "An illustration of power lines at sunset"
        }"#;
        let d: ArticleDraft = serde_json::from_str(raw).unwrap();
        assert_eq!(d.validate("일반/생활").unwrap().category, "경제/비즈니스");
    }
}
