//! Content Generator: one topic in, one validated [`ArticleDraft`] out.
//!
//! Builds a single schema-constrained request to the generative backend and
//! runs the whole attempt (HTTP call, output repair, parse, validation)
//! inside the shared retry loop, so a malformed response is retried exactly
//! like a 503. On exhaustion the topic is reported as skippable rather than
//! failing the run.

use rand::seq::IndexedRandom;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gemini::{BackendError, GeminiClient, TEXT_MODEL};
use crate::models::{ArticleDraft, CATEGORIES, DraftError, ReferenceLink, TAG_COUNT, Topic};
use crate::repair;
use crate::retry::{Attempt, Retry, RetryPolicy, Transient};

/// Seam over the text backend so the generator can be exercised with fakes.
pub trait TextBackend {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        schema: Value,
    ) -> Result<String, BackendError>;
}

impl TextBackend for GeminiClient {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        schema: Value,
    ) -> Result<String, BackendError> {
        self.generate_text(TEXT_MODEL, system, user, Some(schema))
            .await
    }
}

/// A failed article-generation attempt.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("model returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] DraftError),
}

impl Transient for GenerateError {
    fn is_transient(&self) -> bool {
        match self {
            GenerateError::Backend(e) => e.is_transient(),
            // A fresh generation may well come back clean.
            GenerateError::Malformed(_) | GenerateError::Invalid(_) => true,
        }
    }
}

/// One retryable generation attempt: call, repair, parse, validate.
struct DraftAttempt<'a, B> {
    backend: &'a B,
    system: String,
    user: String,
    category_hint: &'a str,
}

impl<B: TextBackend> Attempt for DraftAttempt<'_, B> {
    type Output = ArticleDraft;
    type Error = GenerateError;

    async fn attempt(&self) -> Result<ArticleDraft, GenerateError> {
        let raw = self
            .backend
            .generate(&self.system, &self.user, article_schema())
            .await?;
        let draft: ArticleDraft = repair::parse_repaired(&raw)?;
        Ok(draft.validate(self.category_hint)?)
    }
}

/// Turns trending topics into validated article drafts.
pub struct ContentGenerator<'a, B = GeminiClient> {
    backend: &'a B,
    policy: RetryPolicy,
}

impl<'a, B: TextBackend> ContentGenerator<'a, B> {
    pub fn new(backend: &'a B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Generate one article for the topic, weaving in the sampled links.
    ///
    /// `None` means the attempt tree was exhausted or hit a permanent
    /// failure; the caller skips the topic and moves on.
    #[instrument(level = "info", skip_all, fields(keyword = %topic.keyword))]
    pub async fn generate_article(
        &self,
        topic: &Topic,
        internal_links: &[ReferenceLink],
        external_links: &[ReferenceLink],
    ) -> Option<ArticleDraft> {
        let working_title = expand_title(&topic.keyword, &topic.category_hint);
        info!(title = %working_title, "Expanded topic into working title");

        let attempt = DraftAttempt {
            backend: self.backend,
            system: system_prompt(&topic.category_hint),
            user: user_prompt(&working_title, topic, internal_links, external_links),
            category_hint: &topic.category_hint,
        };

        match Retry::new(attempt, self.policy.clone()).run().await {
            Ok(draft) => {
                info!(title = %draft.title, tags = draft.tags.len(), "Draft generated");
                Some(draft)
            }
            Err(e) => {
                warn!(error = %e, "Article generation failed; topic will be skipped");
                None
            }
        }
    }
}

/// Expand a harvested keyword into a long-tail headline.
///
/// Audience, scenario, and suffix pools are keyed by category; a random
/// template combines them so repeated runs on the same keyword do not
/// produce identical titles.
pub fn expand_title(keyword: &str, category: &str) -> String {
    let (targets, scenarios, suffixes): (&[&str], &[&str], &[&str]) = match category {
        "경제/비즈니스" => (
            &["직장인", "재테크족", "사회초년생"],
            &["실질적인 변화", "2026년 정책 분석", "놓치면 안 될 혜택"],
            &["가이드", "핵심 요약", "주의사항"],
        ),
        "IT/테크" => (
            &["얼리어답터", "IT 종사자", "학생"],
            &["사용 후기", "스펙 비교", "할인 꿀팁"],
            &["완벽 가이드", "추천 리스트", "솔직 리뷰"],
        ),
        "패션/뷰티/리빙" => (
            &["패션 피플", "그루밍족", "자취생", "신혼부부"],
            &["올해 유행 스타일", "가성비 추천템", "공간 활용법"],
            &["코디 제안", "트렌드 리포트", "꿀템 리뷰"],
        ),
        _ => (
            &["누구나", "관심 있는 분들"],
            &["알아야 할 정보", "최신 소식"],
            &["정리", "근황"],
        ),
    };

    let mut rng = rand::rng();
    let t = targets.choose(&mut rng).unwrap_or(&"누구나");
    let s = scenarios.choose(&mut rng).unwrap_or(&"최신 소식");
    let sx = suffixes.choose(&mut rng).unwrap_or(&"정리");

    let templates = [
        format!("[{t} 필독] {keyword} {s} {sx}"),
        format!("{keyword} {s}, {t}이 꼭 알아야 할 {sx}"),
        format!("{t}을 위한 {keyword} {sx}: {s} 포함"),
    ];
    templates
        .choose(&mut rng)
        .cloned()
        .unwrap_or_else(|| keyword.to_string())
}

fn system_prompt(category: &str) -> String {
    format!(
        "당신은 {category} 분야 전문 블로거입니다. SEO에 최적화된 블로그 글을 \
         요청된 JSON 스키마에 맞춰 작성하세요. 반드시 지킬 것: \
         title, category, content, excerpt, tags, image_prompt 필드를 모두 채울 것. \
         category는 다음 중 하나여야 합니다: {}. \
         content는 올바르게 닫힌 HTML 태그(h2, p, table, tr, td, a)로만 작성하고 \
         2,000자 이상으로 쓸 것. 인사말이나 자기소개로 시작하지 말 것. \
         소제목에 '첫 번째', '1.' 같은 서수 표기를 쓰지 말 것. \
         구체적인 날짜를 본문에 넣지 말 것. \
         'AI로서 작성한 글입니다' 같은 문구를 넣지 말 것. \
         tags에는 핵심 키워드 {TAG_COUNT}개를 담을 것. \
         image_prompt는 대표 이미지를 묘사하는 영어 한 문장으로 쓸 것.",
        CATEGORIES.join(", ")
    )
}

fn user_prompt(
    working_title: &str,
    topic: &Topic,
    internal_links: &[ReferenceLink],
    external_links: &[ReferenceLink],
) -> String {
    let mut prompt = format!(
        "제목: {working_title}\n키워드: {}\n카테고리: {}\n\n\
         [작성 가이드라인]\n\
         1. 서론: 독자의 관심을 끄는 도입부.\n\
         2. 본론: 3개의 핵심 소주제(H2 헤딩 사용)로 상세 설명.\n\
         3. 표: 데이터나 특징을 비교하는 HTML 표를 반드시 1개 포함.\n\
         4. 결론: 내용을 요약하고 독자에게 마지막 조언.\n\
         5. 말투: 친절하고 전문적인 구어체 (~해요).\n",
        topic.keyword, topic.category_hint
    );

    if !internal_links.is_empty() {
        prompt.push_str(
            "\n[내부 링크] 아래 링크를 본문 문장 속 참고 링크(a 태그)로 자연스럽게 녹여 넣으세요.\n",
        );
        for link in internal_links {
            prompt.push_str(&format!("- {} ({})\n", link.title, link.url));
        }
    }
    if !external_links.is_empty() {
        prompt.push_str(
            "\n[외부 링크] 아래 링크는 본문 끝부분에 버튼 스타일의 행동 유도(call-to-action) 요소로 넣으세요.\n",
        );
        for link in external_links {
            prompt.push_str(&format!("- {} ({})\n", link.title, link.url));
        }
    }

    prompt
}

/// Response schema hint sent with every article request.
fn article_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {"type": "STRING"},
            "category": {"type": "STRING", "enum": CATEGORIES},
            "content": {"type": "STRING"},
            "excerpt": {"type": "STRING"},
            "tags": {"type": "ARRAY", "items": {"type": "STRING"}},
            "image_prompt": {"type": "STRING"}
        },
        "required": ["title", "category", "content", "excerpt", "tags", "image_prompt"]
    })
}
