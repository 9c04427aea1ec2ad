//! # Severity Trainer
//!
//! Gera leituras sintéticas, treina o K-Means de severidade e classifica
//! novos CSVs com os artefatos salvos.
//!
//! ## Uso
//! ```bash
//! severity_trainer generate --n-samples 3000       # data/sensors.csv
//! severity_trainer train                           # outputs/ + artifacts/
//! severity_trainer predict --input novos.csv       # outputs/predictions.csv
//! ```

use clap::{Parser, Subcommand};
use severity_core::config::AppConfig;
use severity_core::pipeline::{self, PREDICTIONS_FILE};
use severity_core::synthetic::generate_dataset;
use severity_core::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "severity_trainer")]
#[command(about = "Clusterização de leituras de sensores em níveis de severidade")]
#[command(version)]
struct Cli {
    /// Arquivo de configuração (padrão: ./severidade.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gera um dataset sintético rotulado
    Generate {
        /// Número de amostras (padrão: [synthetic].n_samples)
        #[arg(short, long)]
        n_samples: Option<usize>,

        /// Semente (padrão: [synthetic].seed)
        #[arg(long)]
        seed: Option<u64>,

        /// CSV de saída (padrão: [paths].data)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Escolhe k, treina o modelo e grava saídas e artefatos
    Train {
        /// CSV de treino (padrão: [paths].data)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Classifica um CSV com os artefatos salvos
    Predict {
        /// CSV com as colunas de features do treino
        #[arg(short, long)]
        input: PathBuf,

        /// CSV de saída (padrão: <outputs>/predictions.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
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

    // ── Config ──
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let result = match cli.command {
        Commands::Generate {
            n_samples,
            seed,
            output,
        } => cmd_generate(&config, n_samples, seed, output),
        Commands::Train { data } => cmd_train(config, data),
        Commands::Predict { input, output } => cmd_predict(&config, &input, output),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn cmd_generate(
    config: &AppConfig,
    n_samples: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<(), PipelineError> {
    let n_samples = n_samples.unwrap_or(config.synthetic.n_samples);
    let seed = seed.unwrap_or(config.synthetic.seed);
    let output = output.unwrap_or_else(|| config.paths.data.clone());

    let dataset = generate_dataset(n_samples, seed)?;
    dataset.write_csv(&output)?;

    println!("[OK] Gerado: {} ({} linhas)", output.display(), dataset.len());
    Ok(())
}

fn cmd_train(mut config: AppConfig, data: Option<PathBuf>) -> Result<(), PipelineError> {
    if let Some(data) = data {
        config.paths.data = data;
    }

    let (run, outputs) = pipeline::run_training(&config)?;
    let sel = &run.selection;

    println!("Treino de Severidade");
    println!("====================");
    println!("Amostras:   {}", run.labels.len());
    println!("Features:   {}", run.bundle.feature_cols().join(", "));
    println!(
        "k:          {} (via {}, score {:.4})",
        sel.best_k, sel.method, sel.best_score
    );
    println!();
    print_summary(run.summary().rows());
    println!();
    println!("[OK] Assignments: {}", outputs.assignments.display());
    println!("[OK] Resumo:      {}", outputs.summary.display());
    println!("[OK] Scores:      {}", outputs.selection_scores.display());
    println!("[OK] Artefatos:   {}", outputs.artifacts.display());
    Ok(())
}

fn cmd_predict(
    config: &AppConfig,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<(), PipelineError> {
    let output = output.unwrap_or_else(|| config.paths.outputs.join(PREDICTIONS_FILE));
    let predictions = pipeline::run_prediction(&config.paths.artifacts, input, &output)?;
    println!(
        "[OK] {} linhas classificadas → {}",
        predictions.len(),
        output.display()
    );
    Ok(())
}

fn print_summary(rows: &[Vec<String>]) {
    println!("{:>8}  {:<12} {:>8}", "cluster", "severidade", "amostras");
    for row in rows {
        if let [cluster, severity, count] = row.as_slice() {
            println!("{cluster:>8}  {severity:<12} {count:>8}");
        }
    }
}
