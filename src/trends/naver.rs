//! Naver ranking scrapers.
//!
//! Harvests candidate topics from the daily news ranking pages (one per
//! section) and the blog hot-topic listing. Both are plain HTML pages with
//! stable class names, so a couple of selectors is all it takes.

use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::models::Topic;

/// Browser user agent; the ranking pages refuse obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Ranking sections and the category hint attached to their topics. `None`
/// marks the blog hot-topic listing, which has no section id.
const SECTIONS: [(Option<&str>, &str); 4] = [
    (Some("101"), "경제/비즈니스"),
    (Some("105"), "IT/테크"),
    (Some("103"), "패션/뷰티/리빙"),
    (None, "일반/생활"),
];

const TOPICS_PER_SECTION: usize = 5;
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

static NEWS_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".rankingnews_list .list_title").unwrap());
static HOT_TOPIC: Lazy<Selector> = Lazy::new(|| Selector::parse(".list_hottopic .desc").unwrap());

/// Harvest candidate topics from every section.
///
/// Sections are visited sequentially with a short politeness pause; a
/// failed fetch logs and yields nothing for that section.
#[instrument(level = "info", skip_all)]
pub async fn collect_topics(http: &Client) -> Vec<Topic> {
    let mut topics = Vec::new();

    for (section, category) in SECTIONS {
        let titles = match section {
            Some(id) => news_ranking(http, id).await,
            None => blog_hot_topics(http).await,
        };
        for keyword in titles {
            topics.push(Topic {
                keyword,
                category_hint: category.to_string(),
            });
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let topics = dedupe(topics);
    info!(count = topics.len(), "Collected candidate topics");
    topics
}

async fn news_ranking(http: &Client, section_id: &str) -> Vec<String> {
    let url = format!("https://news.naver.com/main/ranking/popularDay.naver?sectionId={section_id}");
    match fetch_page(http, &url).await {
        Ok(html) => extract_texts(&html, &NEWS_TITLE, TOPICS_PER_SECTION),
        Err(e) => {
            warn!(section_id, error = %e, "news ranking fetch failed");
            Vec::new()
        }
    }
}

async fn blog_hot_topics(http: &Client) -> Vec<String> {
    let url = "https://section.blog.naver.com/HotTopicList.naver";
    match fetch_page(http, url).await {
        Ok(html) => extract_texts(&html, &HOT_TOPIC, TOPICS_PER_SECTION),
        Err(e) => {
            warn!(error = %e, "blog hot-topic fetch failed");
            Vec::new()
        }
    }
}

async fn fetch_page(http: &Client, url: &str) -> Result<String, reqwest::Error> {
    http.get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Pull the text of every selector match, trimmed, up to `limit` entries.
fn extract_texts(html: &str, selector: &Selector, limit: usize) -> Vec<String> {
    Html::parse_document(html)
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

/// Drop repeated keywords, keeping the first occurrence's category hint.
fn dedupe(topics: Vec<Topic>) -> Vec<Topic> {
    topics
        .into_iter()
        .unique_by(|t| t.keyword.clone())
        .collect()
}
