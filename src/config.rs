//! Runtime configuration assembled once at startup.
//!
//! No component reads ambient environment state directly; everything flows
//! through this struct, which makes the pipeline deterministic to test with
//! injected configuration. Validation happens before any network call so a
//! missing credential aborts the process immediately.

use thiserror::Error;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential {0} (set the environment variable or pass the flag)")]
    MissingCredential(&'static str),
}

/// Everything a publishing run needs to know, validated up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub wp_username: String,
    pub wp_app_password: String,
    pub wp_base_url: String,
    pub test_mode: bool,
    pub link_pool_path: String,
    pub feeds: Vec<String>,
    pub max_posts: usize,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: required(cli.gemini_api_key, "GEMINI_API_KEY")?,
            wp_username: required(cli.wp_username, "WP_USERNAME")?,
            wp_app_password: required(cli.wp_app_password, "WP_APP_PASSWORD")?,
            wp_base_url: cli.wp_base_url.trim_end_matches('/').to_string(),
            test_mode: cli.test_mode,
            link_pool_path: cli.link_pool,
            feeds: cli.feeds,
            max_posts: cli.max_posts.max(1),
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli_with_credentials() -> Cli {
        Cli::parse_from([
            "trendpress",
            "--gemini-api-key",
            "key",
            "--wp-username",
            "author",
            "--wp-app-password",
            "secret",
        ])
    }

    #[test]
    fn complete_credentials_validate() {
        let config = Config::from_cli(cli_with_credentials()).unwrap();
        assert_eq!(config.gemini_api_key, "key");
        assert_eq!(config.wp_base_url, "https://virz.net");
    }

    #[test]
    fn missing_api_key_is_rejected_before_any_network_call() {
        let mut cli = cli_with_credentials();
        cli.gemini_api_key = None;
        assert!(matches!(
            Config::from_cli(cli),
            Err(ConfigError::MissingCredential("GEMINI_API_KEY"))
        ));
    }

    #[test]
    fn empty_password_counts_as_missing() {
        let mut cli = cli_with_credentials();
        cli.wp_app_password = Some("   ".to_string());
        assert!(matches!(
            Config::from_cli(cli),
            Err(ConfigError::MissingCredential("WP_APP_PASSWORD"))
        ));
    }

    #[test]
    fn trailing_slash_on_the_base_url_is_normalized() {
        let mut cli = cli_with_credentials();
        cli.wp_base_url = "https://blog.example/".to_string();
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.wp_base_url, "https://blog.example");
    }
}
