//! Command-line interface definitions.
//!
//! Credentials and flags can be provided via command-line options or the
//! environment variables the deployment workflow exports. The parsed
//! arguments are collapsed into a validated [`crate::config::Config`]
//! before anything touches the network.

use clap::Parser;

/// Command-line arguments for the trendpress publishing run.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// WordPress account the posts are published under
    #[arg(long, env = "WP_USERNAME")]
    pub wp_username: Option<String>,

    /// WordPress application password for that account
    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    pub wp_app_password: Option<String>,

    /// Base URL of the WordPress site
    #[arg(long, env = "WP_BASE_URL", default_value = "https://virz.net")]
    pub wp_base_url: String,

    /// Publish a single post immediately instead of the randomized batch
    #[arg(long, env = "TEST_MODE")]
    pub test_mode: bool,

    /// Path to the YAML link-pool file
    #[arg(long, default_value = "links.yaml")]
    pub link_pool: String,

    /// Syndication feed URL whose entries join the external link pool
    /// (repeatable)
    #[arg(long = "feed")]
    pub feeds: Vec<String>,

    /// Maximum number of posts per run
    #[arg(long, default_value_t = 10)]
    pub max_posts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_an_unattended_run() {
        let cli = Cli::parse_from(["trendpress"]);
        assert_eq!(cli.wp_base_url, "https://virz.net");
        assert_eq!(cli.link_pool, "links.yaml");
        assert_eq!(cli.max_posts, 10);
        assert!(cli.feeds.is_empty());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "trendpress",
            "--test-mode",
            "--max-posts",
            "3",
            "--feed",
            "https://example.org/rss",
            "--feed",
            "https://example.net/feed.xml",
        ]);
        assert!(cli.test_mode);
        assert_eq!(cli.max_posts, 3);
        assert_eq!(cli.feeds.len(), 2);
    }
}
