//! # Severity Evaluator
//!
//! Compara os clusters de um treino com o rótulo verdadeiro (`label_true`)
//! após o casamento ótimo cluster → rótulo.
//!
//! ## Uso
//! ```bash
//! severity_evaluator                                  # outputs/cluster_assignments.csv
//! severity_evaluator --assignments outro.csv --outputs relatorio/
//! ```

use clap::Parser;
use severity_core::config::AppConfig;
use severity_core::pipeline::ASSIGNMENTS_FILE;
use severity_core::{Dataset, EvaluationReport, PipelineError, evaluate_assignments};
use std::path::{Path, PathBuf};
use tracing::{error, info};

const METRICS_FILE: &str = "eval_metrics.json";
const CONFUSION_FILE: &str = "confusion_matrix.csv";

#[derive(Parser)]
#[command(name = "severity_evaluator")]
#[command(about = "Avalia clusters de severidade contra rótulos verdadeiros")]
#[command(version)]
struct Cli {
    /// CSV com `label_true` e `cluster_id` (padrão: <outputs>/cluster_assignments.csv)
    #[arg(short, long)]
    assignments: Option<PathBuf>,

    /// Diretório das métricas e da matriz de confusão (padrão: [paths].outputs)
    #[arg(short, long)]
    outputs: Option<PathBuf>,

    /// Arquivo de configuração (padrão: ./severidade.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config.unwrap_or_else(AppConfig::default_path));

    let outputs = cli.outputs.unwrap_or_else(|| config.paths.outputs.clone());
    let assignments = cli
        .assignments
        .unwrap_or_else(|| config.paths.outputs.join(ASSIGNMENTS_FILE));

    if let Err(e) = run(&assignments, &outputs) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(assignments: &Path, outputs: &Path) -> Result<(), PipelineError> {
    let dataset = Dataset::read_csv(assignments)?;
    let report = evaluate_assignments(&dataset)?;

    let metrics_path = outputs.join(METRICS_FILE);
    let confusion_path = outputs.join(CONFUSION_FILE);
    report.write_metrics_json(&metrics_path)?;
    report.confusion.write_csv(&confusion_path)?;

    print_report(&report);
    info!(
        "Métricas em {} | matriz de confusão em {}",
        metrics_path.display(),
        confusion_path.display()
    );
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    let m = &report.metrics;
    println!("Avaliação de Clusters");
    println!("=====================");
    for (name, value) in [
        ("ARI", m.ari),
        ("AMI", m.ami),
        ("NMI", m.nmi),
        ("Homogeneity", m.homogeneity),
        ("Completeness", m.completeness),
        ("VMeasure", m.v_measure),
        ("Accuracy_opt_map", m.accuracy),
    ] {
        println!("{name:<18} {value:.4}");
    }

    println!();
    println!("Mapeamento cluster → rótulo:");
    for (cluster, label) in &report.cluster_labels {
        println!("  {cluster:>3} → {label}");
    }
}
