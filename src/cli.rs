//! Command-line interface definitions for newscomp.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be provided through an environment variable.

use clap::Parser;

/// Command-line arguments for newscomp.
///
/// # Examples
///
/// ```sh
/// # Walk every theme
/// newscomp -o ./out -a ./allowed_domains.yaml
///
/// # Two themes, four seeds at a time
/// newscomp -o ./out -a ./allowed_domains.yaml -t Tech -t Politics -w 4
///
/// # Compare coverage of specific stories
/// newscomp -o ./out -a ./allowed_domains.yaml -u https://apnews.com/article/...
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for per-theme result files and the record store
    #[arg(short, long, env = "NEWSCOMP_OUTPUT_DIR")]
    pub output_dir: String,

    /// Optional path to the model config.yaml file
    #[arg(short, long, env = "NEWSCOMP_CONFIG")]
    pub config: Option<String>,

    /// Allowed source domains (YAML list or one domain per line)
    #[arg(short, long, env = "NEWSCOMP_ALLOWED_DOMAINS")]
    pub allowed_domains: String,

    /// Theme to discover seed articles for; repeatable (default: all themes)
    #[arg(short, long = "theme", env = "NEWSCOMP_THEMES", value_delimiter = ',')]
    pub themes: Vec<String>,

    /// Seed article URL to analyze instead of discovering seeds; repeatable
    #[arg(short, long = "url", env = "NEWSCOMP_URL")]
    pub urls: Vec<String>,

    /// Seed URLs processed concurrently
    #[arg(short, long, env = "NEWSCOMP_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Custom Search engine id
    #[arg(long, env = "GOOGLE_CX")]
    pub google_cx: Option<String>,

    /// Custom Search API key, used when no service account works
    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,

    /// Service-account key, as a path to the JSON file or the JSON itself
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_KEY")]
    pub google_service_account_key: Option<String>,
}
