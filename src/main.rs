use anyhow::{Context, Result, bail};
use clap::Parser;
use cvsift::{
    config,
    llm::OllamaChatClient,
    logging,
    metrics::BatchMetrics,
    pipeline::{JobDescription, Pipeline, PipelineSettings},
    reader::{self, FileReader},
    store::SupabaseStore,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(
    name = "cvsift",
    about = "Structure resumes with a local LLM, score them against a job, and store both"
)]
struct Cli {
    /// Resume files or directories to screen.
    #[arg(default_value = "cv_sample.pdf")]
    paths: Vec<PathBuf>,
    /// File holding the job description (defaults to the built-in posting).
    #[arg(long)]
    job_file: Option<PathBuf>,
    /// Job title stored with each evaluation.
    #[arg(long)]
    job_title: Option<String>,
    /// Model override (defaults to `LLM_MODEL`).
    #[arg(long)]
    model: Option<String>,
    /// Do not probe Ollama before starting.
    #[arg(long)]
    skip_health_check: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %format!("{err:#}"), "cvsift stopped");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("missing or invalid store configuration")?;
    logging::init_tracing();

    let chat = OllamaChatClient::new(config.ollama_url.clone())?;
    let mut settings = PipelineSettings::from_config(config, load_job(&cli)?);
    if let Some(model) = cli.model {
        settings.model = model;
    }

    if !cli.skip_health_check {
        ensure_backend(&chat, &settings.model).await?;
    }

    let documents = reader::discover_documents(&cli.paths);
    if documents.is_empty() {
        bail!("no documents found in {:?}", cli.paths);
    }

    let store = SupabaseStore::from_config()?;
    let pipeline = Pipeline::new(
        Arc::new(FileReader),
        Arc::new(chat),
        Arc::new(store),
        settings,
    );
    let metrics = BatchMetrics::new();

    tracing::info!(
        documents = documents.len(),
        job = %pipeline.settings().job.title,
        model = %pipeline.settings().model,
        "Starting screening batch"
    );
    for document in &documents {
        let outcome = pipeline.run(document).await;
        metrics.record(&outcome);
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        documents = snapshot.documents_seen,
        candidates = snapshot.candidates_persisted,
        aborted = snapshot.documents_aborted,
        evaluations = snapshot.evaluations_persisted,
        "Batch finished"
    );
    Ok(())
}

fn load_job(cli: &Cli) -> Result<JobDescription> {
    let mut job = JobDescription::default();
    if let Some(path) = &cli.job_file {
        job.description = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job description at {}", path.display()))?;
    }
    if let Some(title) = &cli.job_title {
        job.title = title.clone();
    }
    Ok(job)
}

async fn ensure_backend(chat: &OllamaChatClient, model: &str) -> Result<()> {
    tracing::info!("Checking Ollama availability");
    let models = chat
        .check_available()
        .await
        .context("could not reach Ollama; make sure `ollama serve` is running")?;
    let tagged = format!("{model}:");
    if !models
        .iter()
        .any(|name| name == model || name.starts_with(&tagged))
    {
        tracing::warn!(model, available = ?models, "Model not installed; run `ollama pull`");
    }
    tracing::info!("Ollama online");
    Ok(())
}
