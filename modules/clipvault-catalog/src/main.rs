use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use clipvault_catalog::build::{run_build, BuildOptions};
use clipvault_catalog::crawl::{run_crawl, CrawlOptions};
use clipvault_catalog::describe::{run_describe, DescribeOptions};
use clipvault_catalog::walker::WalkerConfig;
use clipvault_common::{Config, ProfileStore};
use clipvault_rag::export::run_export;
use clipvault_rag::index::{
    collect_docs, collect_rendered_docs, save_index, IndexBuilder, IndexPaths,
};
use feed_client::{normalize_profile, FeedClient};

#[derive(Parser)]
#[command(name = "clipvault", about = "Creator catalog ingest and RAG dataset pipeline")]
struct Cli {
    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a creator's public catalog into the record store
    Crawl {
        /// Profile URL, @handle, or username
        #[arg(long)]
        profile: String,
        /// Item cap (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_items: usize,
        /// Reuse stored records that already captured audio
        #[arg(long)]
        skip_existing: bool,
        /// Download and parse caption tracks
        #[arg(long)]
        write_captions: bool,
        /// Skip audio capture
        #[arg(long)]
        no_audio: bool,
        /// Pause between item enrichments, in milliseconds
        #[arg(long, default_value_t = 0)]
        sleep_ms: u64,
        /// Consecutive no-new-item pages tolerated before stopping
        #[arg(long, default_value_t = 3)]
        stall_threshold: u32,
        /// Backward cursor shift on empty pages, in days
        #[arg(long, default_value_t = 7)]
        backoff_days: i64,
        /// Absolute page-fetch ceiling
        #[arg(long, default_value_t = 200)]
        max_pages: u32,
    },
    /// Deduplicate the store, transcribe audio, and write the unified dataset
    Build {
        #[arg(long)]
        profile: String,
        /// Skip transcription entirely
        #[arg(long)]
        no_transcribe: bool,
        /// Reuse persisted transcripts
        #[arg(long)]
        skip_existing: bool,
        /// Transcription cap (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max: usize,
        #[arg(long, default_value_t = 0)]
        sleep_ms: u64,
        /// Transcription model
        #[arg(long, default_value = "gpt-4o-transcribe")]
        model: String,
    },
    /// Export the RAG-friendly dataset (markdown, jsonl)
    Export {
        #[arg(long)]
        profile: String,
    },
    /// Build the vector index from the unified dataset
    Index {
        #[arg(long)]
        profile: String,
        /// Embedding model
        #[arg(long, default_value = "text-embedding-3-large")]
        model: String,
        /// Embedding batch size
        #[arg(long, default_value_t = 25)]
        batch: usize,
        /// Embed the rendered markdown documents instead of raw transcripts
        #[arg(long)]
        use_md: bool,
    },
    /// Compute dataset docs: token statistics plus optional summaries
    Describe {
        #[arg(long)]
        profile: String,
        /// Skip model summaries
        #[arg(long)]
        no_summaries: bool,
        /// Keep records that already carry a summary
        #[arg(long)]
        skip_existing: bool,
        /// Summarization cap (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max: usize,
        #[arg(long, default_value_t = 0)]
        sleep_ms: u64,
        /// Summary model
        #[arg(long, default_value = "gpt-4.1")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["clipvault_catalog", "clipvault_common", "clipvault_rag", "feed_client"] {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Crawl {
            profile,
            max_items,
            skip_existing,
            write_captions,
            no_audio,
            sleep_ms,
            stall_threshold,
            backoff_days,
            max_pages,
        } => {
            let config = Config::crawl_from_env();
            let client = FeedClient::new();
            let opts = CrawlOptions {
                profile,
                max_items,
                skip_existing,
                write_captions,
                download_audio: !no_audio,
                sleep: Duration::from_millis(sleep_ms),
                walker: WalkerConfig {
                    stall_threshold,
                    backoff_window_ms: backoff_days * 86_400_000,
                    max_pages,
                    ..WalkerConfig::default()
                },
            };
            let stats = run_crawl(&client, &config.data_dir, &opts).await?;
            info!("Crawl finished. {stats}");
        }

        Command::Build {
            profile,
            no_transcribe,
            skip_existing,
            max,
            sleep_ms,
            model,
        } => {
            let store = profile_store(&profile);
            let opts = BuildOptions {
                skip_existing,
                max,
                sleep: Duration::from_millis(sleep_ms),
            };
            let stats = if no_transcribe {
                run_build(&store, None, &opts).await?
            } else {
                let config = Config::pipeline_from_env();
                let transcriber =
                    OpenAi::new(&config.openai_api_key, "gpt-4.1").with_transcription_model(model);
                run_build(&store, Some(&transcriber), &opts).await?
            };
            info!("Build finished. {stats}");
        }

        Command::Export { profile } => {
            let store = profile_store(&profile);
            let stats = run_export(&store)?;
            info!("Export finished. {stats}");
        }

        Command::Index {
            profile,
            model,
            batch,
            use_md,
        } => {
            let config = Config::pipeline_from_env();
            let profile_ref = normalize_profile(&profile);
            let store = ProfileStore::new(&config.data_dir, &profile_ref.username);

            let unified = store.load_unified()?;
            let docs = if use_md {
                collect_rendered_docs(&store, &unified.records)?
            } else {
                collect_docs(&unified.records)
            };

            let embedder =
                OpenAi::new(&config.openai_api_key, "gpt-4.1").with_embedding_model(model);
            let builder = IndexBuilder::new(&embedder).with_batch_size(batch);
            let (meta, matrix) = builder.build(&docs).await?;
            save_index(&IndexPaths::new(&store), &meta, &matrix)?;
            info!(rows = matrix.rows(), dim = matrix.dim(), "Index finished");
        }

        Command::Describe {
            profile,
            no_summaries,
            skip_existing,
            max,
            sleep_ms,
            model,
        } => {
            let store = profile_store(&profile);
            let opts = DescribeOptions {
                skip_existing,
                max,
                sleep: Duration::from_millis(sleep_ms),
            };
            let stats = if no_summaries {
                run_describe(&store, None, &opts).await?
            } else {
                let config = Config::pipeline_from_env();
                let summarizer = OpenAi::new(&config.openai_api_key, model);
                run_describe(&store, Some(&summarizer), &opts).await?
            };
            info!("Describe finished. {stats}");
        }
    }

    Ok(())
}

/// Store for a profile argument. Only the data root is needed here; provider
/// keys are validated where an agent is actually constructed.
fn profile_store(profile: &str) -> ProfileStore {
    let config = Config::crawl_from_env();
    let profile_ref = normalize_profile(profile);
    ProfileStore::new(&config.data_dir, &profile_ref.username)
}
