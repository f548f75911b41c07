//! DocReader command line: extract one PDF, run a batch over a directory,
//! or check which inference backends are ready.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use docreader::config::{clamp_workers, reports_dir, AppConfig};
use docreader::models::{is_pdf_filename, BatchJob, Document};
use docreader::pipeline::batch::{BatchConfig, BatchOrchestrator, CancelToken};
use docreader::pipeline::extraction::ExtractionEngine;
use docreader::pipeline::routing::{BackendAvailability, DocumentAnalyzer, ModelRouter, OllamaClient};
use docreader::storage::{DocumentStore, FileSource, MemoryStore};

#[derive(Parser)]
#[command(name = "docreader")]
#[command(about = "Local PDF extraction and analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from one PDF and print the extraction report
    Extract {
        file: PathBuf,
        /// Also print the extracted text
        #[arg(long)]
        text: bool,
    },

    /// Process every PDF in a directory as one batch
    Batch {
        dir: PathBuf,
        /// Question asked of every document after extraction
        #[arg(short, long)]
        template: Option<String>,
        /// Worker threads (default from DOCREADER_WORKERS, else 4)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Job name shown in the report
        #[arg(long, default_value = "cli batch")]
        name: String,
    },

    /// Report OCR and inference backend availability
    Health,
}

#[derive(Serialize)]
struct HealthReport {
    ollama_url: String,
    ocr_available: bool,
    backends: BackendAvailability,
}

fn main() -> anyhow::Result<()> {
    docreader::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Extract { file, text } => extract(&config, &file, text),
        Commands::Batch {
            dir,
            template,
            workers,
            name,
        } => batch(&config, &dir, template, workers, &name),
        Commands::Health => health(&config),
    }
}

fn extract(config: &AppConfig, file: &Path, print_text: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let engine = ExtractionEngine::from_settings(&config.ocr);
    let result = engine.extract(&bytes)?;

    println!("{}", result.summary());
    if print_text {
        println!("\n{}", result.text);
    }
    Ok(())
}

fn batch(
    config: &AppConfig,
    dir: &Path,
    template: Option<String>,
    workers: Option<usize>,
    name: &str,
) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut ids = Vec::new();
    for path in pdf_files(dir)? {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = std::fs::metadata(&path)?.len();
        let document = Document::new_upload(&filename, &path, size)?;
        store.save_document(&document)?;
        ids.push(document.id);
    }
    if ids.is_empty() {
        bail!("no PDF files found in {}", dir.display());
    }

    let mut job = BatchJob::new(name, None, template, ids)?;
    for id in &job.document_ids {
        let document = store.load_document(id)?.with_batch(job.id);
        store.save_document(&document)?;
    }
    job.description = Some(format!("Directory {}", dir.display()));
    store.save_batch_job(&job)?;

    let analyzer = if job.has_analysis_template() {
        let client = OllamaClient::new(&config.ollama_url)?;
        let router = ModelRouter::new(Box::new(client), config.backends.clone());
        Some(Arc::new(DocumentAnalyzer::new(router)))
    } else {
        None
    };

    let orchestrator = BatchOrchestrator::new(
        store,
        Arc::new(FileSource),
        Arc::new(ExtractionEngine::from_settings(&config.ocr)),
        analyzer,
        BatchConfig {
            workers: clamp_workers(workers.unwrap_or(config.workers)),
        },
    );
    let summary = orchestrator.run_batch(job.id, &CancelToken::new())?;

    let json = serde_json::to_string_pretty(&summary)?;
    let reports = reports_dir();
    std::fs::create_dir_all(&reports)?;
    let report_path = reports.join(format!("batch-{}.json", summary.job_id));
    std::fs::write(&report_path, &json)?;

    println!("{json}");
    eprintln!("Report written to {}", report_path.display());
    Ok(())
}

fn health(config: &AppConfig) -> anyhow::Result<()> {
    let client = OllamaClient::new(&config.ollama_url)?;
    let router = ModelRouter::new(Box::new(client), config.backends.clone());
    let report = HealthReport {
        ollama_url: config.ollama_url.clone(),
        ocr_available: ExtractionEngine::from_settings(&config.ocr).ocr_available(),
        backends: router.check_availability(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `.pdf` files directly inside `dir`, sorted by name.
fn pdf_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_pdf = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_pdf_filename);
        if path.is_file() && is_pdf {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
