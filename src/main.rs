//! # trendpress
//!
//! An unattended publishing bot: harvests trending topics, generates an
//! SEO-shaped article and a featured image with Gemini, and publishes the
//! result to a WordPress site over its REST API.
//!
//! ## Pipeline
//!
//! 1. **Collect**: scrape candidate topics from the Naver ranking pages
//! 2. **Select**: pick a random batch and spread it across a 2-hour window
//! 3. **Generate**: one schema-constrained article per topic, with
//!    exponential-backoff retries and defensive output repair
//! 4. **Decorate**: best-effort featured image and idempotent
//!    category/tag resolution; neither can block publication
//! 5. **Publish**: exactly one create-post call per topic
//!
//! One bad topic never aborts the batch; it is logged and skipped.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... WP_USERNAME=... WP_APP_PASSWORD=... trendpress
//! ```

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod gemini;
mod generator;
mod image;
mod links;
mod models;
mod repair;
mod retry;
mod scheduler;
mod trends;
mod utils;
mod wordpress;

use cli::Cli;
use config::Config;
use gemini::GeminiClient;
use generator::ContentGenerator;
use image::ImageGenerator;
use links::{LinkPool, sample_links};
use models::Topic;
use rand::seq::IndexedRandom;
use retry::RetryPolicy;
use utils::slugify_title;
use wordpress::{NewPost, TaxonomyKind, WpClient};

const INTERNAL_LINKS_PER_POST: usize = 2;
const EXTERNAL_LINKS_PER_POST: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("trendpress starting up");

    let args = Cli::parse();
    let config = match Config::from_cli(args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration invalid; aborting before any network call");
            return Err(e.into());
        }
    };

    // Shared client for scraping and feed fetching; the generative backend
    // and the CMS get their own clients with their own timeouts.
    let http = reqwest::Client::builder()
        .user_agent(trends::naver::USER_AGENT)
        .build()?;

    // ---- Collect topics ----
    let topics = trends::naver::collect_topics(&http).await;
    if topics.is_empty() {
        error!("no topics harvested; nothing to publish");
        return Err("no topics harvested".into());
    }

    // ---- Link pools ----
    let mut pool = LinkPool::load(&config.link_pool_path);
    pool.extend_from_feeds(&http, &config.feeds).await;
    info!(
        internal = pool.internal.len(),
        external = pool.external.len(),
        "Link pools ready"
    );

    // ---- Select topics and plan the schedule ----
    let (selected, schedule) = if config.test_mode {
        info!("Test mode: publishing one post immediately");
        (pick_topics(&topics, 1), vec![Duration::ZERO])
    } else {
        let selected = pick_topics(&topics, config.max_posts);
        let schedule = scheduler::posting_schedule(selected.len(), scheduler::POSTING_WINDOW);
        info!(count = selected.len(), "Selected topics for this run");
        scheduler::announce(&schedule);
        (selected, schedule)
    };

    // ---- Components ----
    let gemini = GeminiClient::new(&config);
    let wp = WpClient::new(&config);
    let policy = RetryPolicy::default();
    let articles = ContentGenerator::new(&gemini, policy.clone());
    let images = ImageGenerator::new(&gemini, policy);

    // ---- Per-topic pipeline ----
    let mut published = 0usize;
    let mut skipped = 0usize;
    let mut last_offset = Duration::ZERO;

    for (topic, offset) in selected.iter().zip(schedule) {
        let gap = offset.saturating_sub(last_offset);
        last_offset = offset;
        if !gap.is_zero() {
            info!(
                minutes = gap.as_secs() / 60,
                keyword = %topic.keyword,
                "Sleeping until the next publication slot"
            );
            tokio::time::sleep(gap).await;
        }

        info!(keyword = %topic.keyword, category = %topic.category_hint, "Processing topic");
        let internal = sample_links(&pool.internal, INTERNAL_LINKS_PER_POST);
        let external = sample_links(&pool.external, EXTERNAL_LINKS_PER_POST);

        let Some(draft) = articles.generate_article(topic, &internal, &external).await else {
            skipped += 1;
            continue;
        };

        // Featured image is best effort; generation and upload may each
        // fail without touching the rest of the pipeline.
        let featured_media = match images.generate_image(&draft.image_prompt).await {
            Some(img) => {
                let filename = format!(
                    "{}.{}",
                    slugify_title(&draft.title),
                    image::file_extension(&img.mime_type)
                );
                wp.upload_media(img.bytes, &filename, &img.mime_type).await
            }
            None => None,
        };

        let category_id = wp.resolve_term(TaxonomyKind::Category, &draft.category).await;
        let mut tag_ids = Vec::new();
        for tag in &draft.tags {
            if let Some(id) = wp.resolve_term(TaxonomyKind::Tag, tag).await {
                tag_ids.push(id);
            }
        }

        let post = NewPost::published(&draft, category_id, tag_ids, featured_media);
        if wp.publish(&post).await {
            info!(title = %draft.title, "Published");
            published += 1;
        } else {
            warn!(title = %draft.title, "Publish failed; topic skipped");
            skipped += 1;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        published,
        skipped,
        secs = elapsed.as_secs(),
        "Run complete"
    );

    Ok(())
}

/// Pick up to `count` topics at random, without replacement.
fn pick_topics(topics: &[Topic], count: usize) -> Vec<Topic> {
    topics
        .choose_multiple(&mut rand::rng(), count)
        .cloned()
        .collect()
}
