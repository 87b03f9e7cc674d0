// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use quill::config::QuillConfig;
use quill::corpus::Corpus;
use quill::dispatch::Dispatcher;
use quill::engine::runtime::HttpModelRuntime;
use quill::engine::GenerationEngine;
use quill::filter::probe::HttpLinkProbe;
use quill::filter::PolicyFilter;
use quill::platform::{HttpPlatformClient, PlatformClient};
use quill::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Scheduled generative-text posting bot", long_about = None)]
struct Cli {
    /// Allow the bot to actually publish posts (default is dry-run)
    #[arg(short, long, default_value_t = false)]
    enable: bool,

    /// Path to a list of blocked terms, one per line
    #[arg(short, long)]
    blocked: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Startup configuration failures are fatal; nothing is scheduled yet.
    let config = QuillConfig::from_env()?;
    info!("Starting quill for @{}", config.source_user);
    if !cli.enable {
        info!("Posting disabled: running in dry-run mode");
    }

    let platform: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(
        config.platform_base_url.clone(),
        config.bearer_token.clone(),
    ));
    let user_id = platform.lookup_user(&config.source_user).await?;
    info!("Resolved @{} to user id {}", config.source_user, user_id);

    // Corpus collection, base-model download, and fine-tuning all happen
    // here, once, before the first cycle. Each step is skipped when its
    // artifact already exists.
    let runtime = HttpModelRuntime::new(config.runtime_base_url.clone());
    let mut engine = GenerationEngine::new(Box::new(runtime), &config);
    engine.ensure_ready(platform.as_ref(), &user_id).await?;

    let corpus = Corpus::load(&config.corpus_path())?;
    let blocked = PolicyFilter::load_block_list(cli.blocked.as_deref());
    let probe = HttpLinkProbe::new(config.probe_timeout_secs)?;
    let filter = PolicyFilter::new(blocked, Box::new(probe));
    let dispatcher = Dispatcher::new(platform.clone(), cli.enable);

    let scheduler = Scheduler::new(
        engine,
        filter,
        corpus,
        dispatcher,
        Duration::from_secs(config.post_interval_secs),
    );

    let cancel = CancellationToken::new();
    let mut schedule = tokio::spawn(scheduler.run(cancel.clone()));

    tokio::select! {
        result = &mut schedule => {
            error!("Scheduler unexpectedly terminated");
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, cancelling schedule");
            cancel.cancel();
            schedule.await?;
        }
    }

    Ok(())
}
