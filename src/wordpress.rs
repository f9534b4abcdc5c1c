//! WordPress REST client: posts, media, and taxonomy terms.
//!
//! Every call is authenticated with an application password over HTTP basic
//! auth and judged by its creation status code (201). Post creation is never
//! retried; a duplicate post is worse than a missed one. Taxonomy terms go
//! through an idempotent get-or-create resolution that survives races with
//! other runs creating the same term.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::models::ArticleDraft;
use crate::utils::truncate_for_log;

/// Lightweight lookups (term search) keep a short leash.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Writes (posts, media, term creation) get a little longer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WpError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    /// The CMS rejected a create because the term already exists; a
    /// re-query will find the winner of the race.
    #[error("term already exists upstream")]
    TermExists,
}

/// The two taxonomies a post references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    fn endpoint(self) -> &'static str {
        match self {
            TaxonomyKind::Category => "categories",
            TaxonomyKind::Tag => "tags",
        }
    }
}

/// A name bound to a stable remote id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxonomyTerm {
    pub id: u64,
    pub name: String,
}

/// The final post payload committed to the CMS.
#[derive(Debug, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub status: &'static str,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<u64>,
}

impl NewPost {
    pub fn published(
        draft: &ArticleDraft,
        category_id: Option<u64>,
        tag_ids: Vec<u64>,
        featured_media: Option<u64>,
    ) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            status: "publish",
            categories: category_id.into_iter().collect(),
            tags: tag_ids,
            featured_media,
        }
    }
}

/// Search/create seam the term resolver runs against, faked in tests.
pub trait TermApi {
    async fn search_terms(
        &self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<Vec<TaxonomyTerm>, WpError>;

    async fn create_term(&self, kind: TaxonomyKind, name: &str) -> Result<TaxonomyTerm, WpError>;
}

/// Idempotent get-or-create resolution of a term name to its remote id.
///
/// Search first and reuse an exact case-insensitive match; only create when
/// the search came up empty; when the create loses a race to another
/// resolver, re-query and take the winner's id. `None` means the term is
/// simply omitted from the post.
#[instrument(level = "info", skip(api))]
pub async fn resolve_term<A: TermApi>(api: &A, kind: TaxonomyKind, name: &str) -> Option<u64> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    match api.search_terms(kind, name).await {
        Ok(terms) => {
            if let Some(term) = exact_match(&terms, name) {
                return Some(term.id);
            }
        }
        Err(e) => warn!(error = %e, "term search failed; attempting create anyway"),
    }

    match api.create_term(kind, name).await {
        Ok(term) => {
            info!(id = term.id, "Created taxonomy term");
            Some(term.id)
        }
        Err(WpError::TermExists) => match api.search_terms(kind, name).await {
            Ok(terms) => exact_match(&terms, name).map(|t| t.id),
            Err(e) => {
                warn!(error = %e, "re-query after create race failed; omitting term");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "term creation failed; omitting term");
            None
        }
    }
}

fn exact_match<'a>(terms: &'a [TaxonomyTerm], name: &str) -> Option<&'a TaxonomyTerm> {
    let wanted = name.to_lowercase();
    terms.iter().find(|t| t.name.to_lowercase() == wanted)
}

#[derive(Deserialize)]
struct CreatedResource {
    id: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
}

/// Client for the WordPress REST API.
pub struct WpClient {
    http: Client,
    base_url: String,
    username: String,
    app_password: String,
}

impl WpClient {
    pub fn new(config: &Config) -> Self {
        let http = Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            base_url: config.wp_base_url.clone(),
            username: config.wp_username.clone(),
            app_password: config.wp_app_password.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{}", self.base_url, path)
    }

    pub async fn resolve_term(&self, kind: TaxonomyKind, name: &str) -> Option<u64> {
        resolve_term(self, kind, name).await
    }

    /// Upload media bytes; `None` on any failure, the post goes out bare.
    #[instrument(level = "info", skip_all, fields(filename = %filename))]
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Option<u64> {
        let request = self
            .http
            .post(self.endpoint("media"))
            .basic_auth(&self.username, Some(&self.app_password))
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            )
            .header(reqwest::header::CONTENT_TYPE, mime_type.to_string())
            .timeout(WRITE_TIMEOUT)
            .body(bytes);

        match Self::created(request.send().await).await {
            Ok(resource) => {
                info!(media_id = resource.id, "Uploaded featured image");
                Some(resource.id)
            }
            Err(e) => {
                warn!(error = %e, "media upload failed; publishing without a featured image");
                None
            }
        }
    }

    /// Commit the post. Exactly one attempt; duplicates are worse than gaps.
    #[instrument(level = "info", skip_all, fields(title = %post.title))]
    pub async fn publish(&self, post: &NewPost) -> bool {
        let request = self
            .http
            .post(self.endpoint("posts"))
            .basic_auth(&self.username, Some(&self.app_password))
            .timeout(WRITE_TIMEOUT)
            .json(post);

        match Self::created(request.send().await).await {
            Ok(resource) => {
                info!(post_id = resource.id, "Post published");
                true
            }
            Err(e) => {
                warn!(error = %e, "post creation failed");
                false
            }
        }
    }

    /// Map a response to its created resource, or a classified error.
    async fn created(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<CreatedResource, WpError> {
        let response = response?;
        let status = response.status();
        if status.as_u16() != 201 {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                if err.code == "term_exists" {
                    return Err(WpError::TermExists);
                }
            }
            return Err(WpError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(response.json::<CreatedResource>().await?)
    }
}

impl TermApi for WpClient {
    async fn search_terms(
        &self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<Vec<TaxonomyTerm>, WpError> {
        let response = self
            .http
            .get(self.endpoint(kind.endpoint()))
            .basic_auth(&self.username, Some(&self.app_password))
            .query(&[("search", name), ("per_page", "100")])
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WpError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(response.json::<Vec<TaxonomyTerm>>().await?)
    }

    async fn create_term(&self, kind: TaxonomyKind, name: &str) -> Result<TaxonomyTerm, WpError> {
        let response = self
            .http
            .post(self.endpoint(kind.endpoint()))
            .basic_auth(&self.username, Some(&self.app_password))
            .timeout(WRITE_TIMEOUT)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await;

        let created = Self::created(response).await?;
        Ok(TaxonomyTerm {
            id: created.id,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// In-memory taxonomy store with WordPress search-then-create semantics.
    struct FakeTermApi {
        terms: Mutex<Vec<TaxonomyTerm>>,
        create_calls: AtomicUsize,
        next_id: AtomicU64,
        /// Simulates a losing race: the first search misses a term another
        /// writer is about to create.
        hide_first_search: AtomicUsize,
    }

    impl FakeTermApi {
        fn new() -> Self {
            Self {
                terms: Mutex::new(Vec::new()),
                create_calls: AtomicUsize::new(0),
                next_id: AtomicU64::new(11),
                hide_first_search: AtomicUsize::new(0),
            }
        }

        fn seeded(names: &[&str]) -> Self {
            let api = Self::new();
            for name in names {
                let id = api.next_id.fetch_add(1, Ordering::SeqCst);
                api.terms.lock().unwrap().push(TaxonomyTerm {
                    id,
                    name: name.to_string(),
                });
            }
            api
        }

        fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }
    }

    impl TermApi for FakeTermApi {
        async fn search_terms(
            &self,
            _kind: TaxonomyKind,
            name: &str,
        ) -> Result<Vec<TaxonomyTerm>, WpError> {
            if self.hide_first_search.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| n - 1)
            }).is_ok()
            {
                return Ok(Vec::new());
            }
            let wanted = name.to_lowercase();
            Ok(self
                .terms
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.name.to_lowercase().contains(&wanted))
                .cloned()
                .collect())
        }

        async fn create_term(
            &self,
            _kind: TaxonomyKind,
            name: &str,
        ) -> Result<TaxonomyTerm, WpError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let mut terms = self.terms.lock().unwrap();
            if terms
                .iter()
                .any(|t| t.name.to_lowercase() == name.to_lowercase())
            {
                return Err(WpError::TermExists);
            }
            let term = TaxonomyTerm {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                name: name.to_string(),
            };
            terms.push(term.clone());
            Ok(term)
        }
    }

    #[tokio::test]
    async fn resolving_twice_creates_once_and_reuses_the_id() {
        let api = FakeTermApi::new();

        let first = resolve_term(&api, TaxonomyKind::Tag, "Foo").await;
        let second = resolve_term(&api, TaxonomyKind::Tag, "Foo").await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn resolution_is_case_insensitive() {
        let api = FakeTermApi::seeded(&["Foo"]);

        let id = resolve_term(&api, TaxonomyKind::Tag, "foo").await;

        assert_eq!(id, Some(11));
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn substring_hits_do_not_count_as_matches() {
        let api = FakeTermApi::seeded(&["Foobar"]);

        let id = resolve_term(&api, TaxonomyKind::Tag, "Foo").await;

        // "Foobar" comes back from the substring search but must not be
        // reused; a fresh "Foo" term is created instead.
        assert_eq!(api.create_calls(), 1);
        assert_ne!(id, Some(11));
        assert!(id.is_some());
    }

    #[tokio::test]
    async fn losing_a_create_race_recovers_the_winning_id() {
        let api = FakeTermApi::seeded(&["Foo"]);
        // First search misses the term even though it exists upstream, so
        // the resolver tries to create and collides.
        api.hide_first_search.store(1, Ordering::SeqCst);

        let id = resolve_term(&api, TaxonomyKind::Category, "Foo").await;

        assert_eq!(id, Some(11));
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn blank_names_resolve_to_nothing() {
        let api = FakeTermApi::new();
        assert_eq!(resolve_term(&api, TaxonomyKind::Tag, "   ").await, None);
        assert_eq!(api.create_calls(), 0);
    }

    struct FailingApi;

    impl TermApi for FailingApi {
        async fn search_terms(
            &self,
            _kind: TaxonomyKind,
            _name: &str,
        ) -> Result<Vec<TaxonomyTerm>, WpError> {
            Err(WpError::Status {
                status: 500,
                body: String::new(),
            })
        }

        async fn create_term(
            &self,
            _kind: TaxonomyKind,
            _name: &str,
        ) -> Result<TaxonomyTerm, WpError> {
            Err(WpError::Status {
                status: 500,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn total_failure_omits_the_term() {
        assert_eq!(
            resolve_term(&FailingApi, TaxonomyKind::Tag, "Foo").await,
            None
        );
    }

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "제목".to_string(),
            category: "일반/생활".to_string(),
            content: "<p>본문</p>".to_string(),
            excerpt: "요약".to_string(),
            tags: vec!["태그".to_string()],
            image_prompt: "prompt".to_string(),
        }
    }

    #[test]
    fn payload_without_image_omits_featured_media() {
        let post = NewPost::published(&draft(), Some(3), vec![5, 8], None);
        let value = serde_json::to_value(&post).unwrap();

        assert_eq!(value["status"], "publish");
        assert_eq!(value["categories"], serde_json::json!([3]));
        assert_eq!(value["tags"], serde_json::json!([5, 8]));
        assert!(value.get("featured_media").is_none());
    }

    #[test]
    fn payload_with_image_carries_the_media_id() {
        let post = NewPost::published(&draft(), None, vec![], Some(42));
        let value = serde_json::to_value(&post).unwrap();

        assert_eq!(value["featured_media"], 42);
        assert_eq!(value["categories"], serde_json::json!([]));
    }
}
