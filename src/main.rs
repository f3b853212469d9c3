//! Docmatch entrypoint: one pipeline run over the configured collections.

use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::signal;

use docmatch::checkpoint::CheckpointManager;
use docmatch::config::Config;
use docmatch::index::{DocumentIndex, JsonlFactsStore, LopdfExtractor};
use docmatch::pipeline::{CancelFlag, Pipeline};
use docmatch::render::{PdftoppmRenderer, RenderService};
use docmatch::verify::{HttpVerificationBackend, VerificationClient};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(config = ?config.redacted(), "Docmatch starting");

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("cannot create work dir {}", config.work_dir.display()))?;

    let store = Arc::new(JsonlFactsStore::open(config.facts_cache_path())?);
    let index = DocumentIndex::new(Arc::new(LopdfExtractor::new()), store, config.text_pages);

    let render = RenderService::new(Arc::new(PdftoppmRenderer::new()), config.render_config());

    let backend = Arc::new(HttpVerificationBackend::new(config.backend_config()?)?);
    let mut client = VerificationClient::new(backend, config.pricing, config.retry_config());
    if let Some(path) = &config.instruction_path {
        let instruction = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read instruction file {}", path.display()))?;
        client = client.with_instruction(instruction.trim());
    }

    let checkpoint = Arc::new(CheckpointManager::open(config.checkpoint_path())?);

    let cancel = CancelFlag::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let pipeline = Pipeline::new(
        config.pipeline_config(),
        config.restricted_spec(),
        config.reference_spec(),
        index,
        render,
        client,
        checkpoint,
    )
    .with_cancel_flag(cancel);

    let report = pipeline.run().await?;

    let report_path = config.report_path();
    std::fs::write(&report_path, report.to_json()?)
        .with_context(|| format!("cannot write report {}", report_path.display()))?;

    let summary = &report.summary;
    tracing::info!(
        outcome = %summary.outcome,
        matches = summary.matches,
        non_matches = summary.non_matches,
        errors = summary.errors,
        pending = summary.pending,
        needs_review = summary.needs_review,
        total_cost = %summary.total_cost,
        calls = summary.calls_made,
        report = %report_path.display(),
        "Docmatch finished"
    );

    Ok(())
}

async fn cancel_on_signal(cancel: CancelFlag) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing in-flight calls");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, finishing in-flight calls");
        }
    }

    cancel.cancel();
}
