use std::env;
use std::path::PathBuf;

use crate::store::data_dir;

/// Application configuration loaded from environment variables.
/// Secrets stay in the environment; everything else is CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    // Model providers
    pub openai_api_key: String,
    pub anthropic_api_key: Option<String>,

    // Storage
    pub data_dir: PathBuf,

    // Answer service
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Config for the enrichment pipeline (transcription, embeddings, summaries).
    /// Panics with a clear message if required vars are missing.
    pub fn pipeline_from_env() -> Self {
        Self {
            openai_api_key: required_env("OPENAI_API_KEY"),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            data_dir: data_dir(),
            api_host: default_host(),
            api_port: default_port(),
        }
    }

    /// Config for the answer service.
    pub fn api_from_env() -> Self {
        Self {
            openai_api_key: required_env("OPENAI_API_KEY"),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            data_dir: data_dir(),
            api_host: env::var("API_HOST").unwrap_or_else(|_| default_host()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| default_port().to_string())
                .parse()
                .expect("API_PORT must be a number"),
        }
    }

    /// Config for crawl-only runs. No provider keys needed.
    pub fn crawl_from_env() -> Self {
        Self {
            openai_api_key: String::new(),
            anthropic_api_key: None,
            data_dir: data_dir(),
            api_host: default_host(),
            api_port: default_port(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}
