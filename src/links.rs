//! Reference-link pools woven into generated articles.
//!
//! Internal links point back at the blog's own posts; external links feed
//! the call-to-action elements. The static pool comes from a local YAML
//! file and can be topped up with entries parsed from syndication feeds.

use quick_xml::Reader;
use quick_xml::events::Event;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::models::ReferenceLink;

const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// The internal and external link pools for one run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkPool {
    #[serde(default)]
    pub internal: Vec<ReferenceLink>,
    #[serde(default)]
    pub external: Vec<ReferenceLink>,
}

impl LinkPool {
    /// Load the static pool from disk. A missing or malformed file is not
    /// fatal; articles are simply generated without reference links.
    pub fn load(path: &str) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path, error = %e, "no link-pool file; continuing with empty pools");
                return Self::default();
            }
        };
        match serde_yaml::from_str(&raw) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(path, error = %e, "link-pool file failed to parse; continuing with empty pools");
                Self::default()
            }
        }
    }

    /// Union syndication-feed entries into the external pool.
    #[instrument(level = "info", skip_all)]
    pub async fn extend_from_feeds(&mut self, http: &Client, feeds: &[String]) {
        for feed in feeds {
            match fetch_feed(http, feed).await {
                Ok(items) => {
                    info!(feed = %feed, count = items.len(), "Feed entries joined the link pool");
                    self.external.extend(items);
                }
                Err(e) => warn!(feed = %feed, error = %e, "feed fetch failed; skipping"),
            }
        }
    }
}

async fn fetch_feed(http: &Client, url: &str) -> Result<Vec<ReferenceLink>, reqwest::Error> {
    let body = http
        .get(url)
        .timeout(FEED_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_feed_items(&body))
}

/// Pull `title`/`link` pairs out of RSS `<item>` elements.
pub fn parse_feed_items(xml: &str) -> Vec<ReferenceLink> {
    #[derive(PartialEq)]
    enum Field {
        Title,
        Link,
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut title = String::new();
    let mut link = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                }
                b"title" if in_item => field = Some(Field::Title),
                b"link" if in_item => field = Some(Field::Link),
                _ => field = None,
            },
            Ok(Event::Text(e)) => {
                if let Ok(decoded) = e.decode() {
                    if let Ok(text) = quick_xml::escape::unescape(&decoded) {
                        match field {
                            Some(Field::Title) => title.push_str(&text),
                            Some(Field::Link) => link.push_str(&text),
                            None => {}
                        }
                    }
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                match field {
                    Some(Field::Title) => title.push_str(&text),
                    Some(Field::Link) => link.push_str(&text),
                    None => {}
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = false;
                    if !title.trim().is_empty() && !link.trim().is_empty() {
                        items.push(ReferenceLink {
                            title: title.trim().to_string(),
                            url: link.trim().to_string(),
                        });
                    }
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "feed XML parse error; keeping what was read");
                break;
            }
            _ => {}
        }
    }

    items
}

/// Sample up to `n` links without replacement.
pub fn sample_links(pool: &[ReferenceLink], n: usize) -> Vec<ReferenceLink> {
    pool.choose_multiple(&mut rand::rng(), n).cloned().collect()
}
