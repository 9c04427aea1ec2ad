//! Treino e inferência de ponta a ponta.
//!
//! O treino calcula tudo em memória (features → scaler → k → modelo →
//! severidades) e só então grava saídas e artefatos. Uma falha em qualquer
//! etapa não deixa nada pela metade no disco.

use crate::artifacts::ArtifactBundle;
use crate::config::AppConfig;
use crate::dataset::{CLUSTER_ID_COLUMN, Dataset, SEVERITY_COLUMN};
use crate::error::{PipelineError, Result};
use crate::features::select_feature_columns;
use crate::scaler::StandardScaler;
use crate::selection::{ClusterSelection, choose_k};
use crate::severity::{BASE_LEVELS, SeverityMap, feature_weights};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ASSIGNMENTS_FILE: &str = "cluster_assignments.csv";
pub const SUMMARY_FILE: &str = "cluster_summary.csv";
pub const SELECTION_SCORES_FILE: &str = "selection_scores.csv";
pub const PREDICTIONS_FILE: &str = "predictions.csv";

/// Resultado de um treino, ainda não persistido.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub selection: ClusterSelection,
    /// Cluster de cada linha do dataset de treino.
    pub labels: Vec<usize>,
    /// Dataset de entrada + `cluster_id` + `severity`.
    pub assignments: Dataset,
    pub bundle: ArtifactBundle,
}

impl TrainingRun {
    /// Contagem por `(cluster_id, severity)`, só clusters com amostras.
    pub fn summary(&self) -> Dataset {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &c in &self.labels {
            *counts.entry(c).or_default() += 1;
        }

        let mut table = Dataset::new(
            [CLUSTER_ID_COLUMN, SEVERITY_COLUMN, "count"]
                .map(String::from)
                .to_vec(),
        );
        for (cluster, count) in counts {
            let severity = self
                .bundle
                .severity_map()
                .get(cluster)
                .map(|l| l.to_string())
                .unwrap_or_default();
            table.push_row(vec![cluster.to_string(), severity, count.to_string()]);
        }
        table
    }

    /// Scores de cada k da grade.
    pub fn selection_scores(&self) -> Dataset {
        let mut table = Dataset::new(
            ["k", "silhouette", "calinski_harabasz"]
                .map(String::from)
                .to_vec(),
        );
        let sel = &self.selection;
        for ((k, sil), ch) in sel
            .k_grid
            .iter()
            .zip(sel.silhouette_scores.iter())
            .zip(sel.ch_scores.iter())
        {
            table.push_row(vec![k.to_string(), sil.to_string(), ch.to_string()]);
        }
        table
    }
}

/// Caminhos gravados por [`write_training_outputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutputs {
    pub assignments: PathBuf,
    pub summary: PathBuf,
    pub selection_scores: PathBuf,
    pub artifacts: PathBuf,
}

/// Treina sobre um dataset já carregado.
pub fn train(dataset: &Dataset, config: &AppConfig) -> Result<TrainingRun> {
    config.ensure_valid()?;
    let feature_cols = select_feature_columns(dataset)?;
    info!(
        "Treino: {} amostras, features: {}",
        dataset.len(),
        feature_cols.join(", ")
    );

    let raw = dataset.feature_matrix(&feature_cols)?;
    let (scaler, x) = StandardScaler::fit_transform(raw.view())?;

    let selection = choose_k(x.view(), &config.selection_params())?;
    let (model, labels) = config.model_params(selection.best_k).fit(x.view())?;
    if model.n_clusters() > BASE_LEVELS {
        warn!(
            "{} clusters para {} níveis base; usando tokens critico+N",
            model.n_clusters(),
            BASE_LEVELS
        );
    }

    let weights = feature_weights(&feature_cols, &config.severity.weights);
    let severity_map =
        SeverityMap::from_clusters(x.view(), &labels, model.centroids().view(), &weights);
    for (cluster, level) in severity_map.iter() {
        info!("Cluster {cluster} → {level}");
    }

    let assignments = annotate(dataset, &labels, &severity_map)?;
    let bundle = ArtifactBundle::new(
        scaler,
        model,
        feature_cols,
        severity_map,
        selection.summary(),
    )?;

    Ok(TrainingRun {
        selection,
        labels,
        assignments,
        bundle,
    })
}

/// Grava assignments, resumo, scores da seleção e o bundle.
pub fn write_training_outputs(
    run: &TrainingRun,
    outputs_dir: &Path,
    artifacts_dir: &Path,
) -> Result<TrainingOutputs> {
    let outputs = TrainingOutputs {
        assignments: outputs_dir.join(ASSIGNMENTS_FILE),
        summary: outputs_dir.join(SUMMARY_FILE),
        selection_scores: outputs_dir.join(SELECTION_SCORES_FILE),
        artifacts: artifacts_dir.to_path_buf(),
    };

    run.assignments.write_csv(&outputs.assignments)?;
    run.summary().write_csv(&outputs.summary)?;
    run.selection_scores().write_csv(&outputs.selection_scores)?;
    run.bundle.save(artifacts_dir)?;

    info!("Saídas de treino gravadas em {}", outputs_dir.display());
    Ok(outputs)
}

/// Carrega `paths.data`, treina e grava tudo.
pub fn run_training(config: &AppConfig) -> Result<(TrainingRun, TrainingOutputs)> {
    let dataset = Dataset::read_csv(&config.paths.data)?;
    let run = train(&dataset, config)?;
    let outputs = write_training_outputs(&run, &config.paths.outputs, &config.paths.artifacts)?;
    Ok((run, outputs))
}

/// Classifica um dataset com um bundle já carregado.
pub fn predict_dataset(bundle: &ArtifactBundle, dataset: &Dataset) -> Result<Dataset> {
    bundle.check_columns(dataset)?;
    let raw = dataset.feature_matrix(bundle.feature_cols())?;
    let x = bundle.scaler().transform(raw.view())?;
    let labels = bundle.model().predict(x.view())?;
    annotate(dataset, &labels, bundle.severity_map())
}

/// Carrega o bundle de `artifacts_dir`, classifica `input` e grava em `output`.
pub fn run_prediction(artifacts_dir: &Path, input: &Path, output: &Path) -> Result<Dataset> {
    let bundle = ArtifactBundle::load(artifacts_dir)?;
    let dataset = Dataset::read_csv(input)?;
    let predictions = predict_dataset(&bundle, &dataset)?;
    predictions.write_csv(output)?;
    info!(
        "{} predições gravadas em {}",
        predictions.len(),
        output.display()
    );
    Ok(predictions)
}

fn annotate(dataset: &Dataset, labels: &[usize], severity_map: &SeverityMap) -> Result<Dataset> {
    let severities = labels
        .iter()
        .map(|&c| {
            severity_map.get(c).map(|l| l.to_string()).ok_or_else(|| {
                PipelineError::CorruptArtifact(format!("cluster {c} sem severidade"))
            })
        })
        .collect::<Result<Vec<String>>>()?;
    let ids = labels.iter().map(usize::to_string).collect();

    Ok(dataset.with_columns(&[(CLUSTER_ID_COLUMN, ids), (SEVERITY_COLUMN, severities)]))
}
