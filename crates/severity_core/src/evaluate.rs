//! Avaliação dos clusters contra o rótulo verdadeiro.
//!
//! Os IDs de cluster são arbitrários, então antes de medir acerto cada
//! cluster é casado com um rótulo verdadeiro pelo algoritmo húngaro,
//! maximizando o total de coincidências na matriz de confusão.

use crate::dataset::{CLUSTER_ID_COLUMN, Dataset, LABEL_COLUMN};
use crate::error::{PipelineError, Result};
use crate::hungarian::maximize_assignment;
use crate::metrics::{
    accuracy, adjusted_mutual_info_score, adjusted_rand_score,
    homogeneity_completeness_v_measure, normalized_mutual_info_score,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Codificação lexicográfica dos rótulos verdadeiros (`alerta` = 0, `bom` = 1…).
///
/// Depende dos dados; deve ser reconstruída a cada avaliação.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoding {
    classes: Vec<String>,
}

impl LabelEncoding {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn decode(&self, idx: usize) -> Option<&str> {
        self.classes.get(idx).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Casamento ótimo cluster → rótulo verdadeiro.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalMapping {
    /// `cluster_id → índice do rótulo`; clusters sem par recebem índices
    /// a partir de `n_true`, que nunca coincidem com um rótulo real.
    pub mapping: BTreeMap<usize, usize>,
    /// Predições já traduzidas pelo `mapping`.
    pub mapped: Vec<usize>,
}

/// Monta a matriz de confusão (linhas = rótulo, colunas = cluster) e resolve
/// a atribuição que maximiza o traço.
pub fn optimal_label_mapping(y_true: &[usize], y_pred: &[usize], n_true: usize) -> OptimalMapping {
    let clusters: Vec<usize> = y_pred.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let column: BTreeMap<usize, usize> = clusters.iter().enumerate().map(|(j, &c)| (c, j)).collect();

    let mut confusion = Array2::<u64>::zeros((n_true, clusters.len()));
    for (&t, p) in y_true.iter().zip(y_pred.iter()) {
        confusion[[t, column[p]]] += 1;
    }

    let mut mapping = BTreeMap::new();
    for (row, col) in maximize_assignment(confusion.view()) {
        mapping.insert(clusters[col], row);
    }
    let mut next = n_true;
    for &c in &clusters {
        mapping.entry(c).or_insert_with(|| {
            next += 1;
            next - 1
        });
    }
    debug!("Mapeamento ótimo cluster → rótulo: {mapping:?}");

    let mapped = y_pred.iter().map(|p| mapping[p]).collect();
    OptimalMapping { mapping, mapped }
}

/// Métricas externas de concordância, com os nomes das chaves do relatório.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    #[serde(rename = "ARI")]
    pub ari: f64,
    #[serde(rename = "AMI")]
    pub ami: f64,
    #[serde(rename = "NMI")]
    pub nmi: f64,
    #[serde(rename = "Homogeneity")]
    pub homogeneity: f64,
    #[serde(rename = "Completeness")]
    pub completeness: f64,
    #[serde(rename = "VMeasure")]
    pub v_measure: f64,
    #[serde(rename = "Accuracy_opt_map")]
    pub accuracy: f64,
}

pub fn compute_metrics(y_true: &[usize], y_pred: &[usize]) -> EvaluationMetrics {
    let (homogeneity, completeness, v_measure) = homogeneity_completeness_v_measure(y_true, y_pred);
    EvaluationMetrics {
        ari: adjusted_rand_score(y_true, y_pred),
        ami: adjusted_mutual_info_score(y_true, y_pred),
        nmi: normalized_mutual_info_score(y_true, y_pred),
        homogeneity,
        completeness,
        v_measure,
        accuracy: accuracy(y_true, y_pred),
    }
}

/// Matriz de confusão rotulada, após o mapeamento ótimo.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub counts: Array2<u64>,
}

impl ConfusionMatrix {
    /// Acertos exatos (diagonal das colunas que correspondem a rótulos).
    pub fn trace(&self) -> u64 {
        (0..self.rows.len().min(self.columns.len()))
            .map(|i| self.counts[[i, i]])
            .sum()
    }

    pub fn to_dataset(&self) -> Dataset {
        let mut headers = vec![LABEL_COLUMN.to_string()];
        headers.extend(self.columns.iter().cloned());
        let mut table = Dataset::new(headers);
        for (i, label) in self.rows.iter().enumerate() {
            let mut row = vec![label.clone()];
            row.extend(self.counts.row(i).iter().map(u64::to_string));
            table.push_row(row);
        }
        table
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.to_dataset().write_csv(path)
    }
}

/// Resultado completo da avaliação.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub metrics: EvaluationMetrics,
    pub confusion: ConfusionMatrix,
    /// `cluster_id → rótulo verdadeiro casado` (ausente = cluster sem par).
    pub cluster_labels: BTreeMap<usize, String>,
}

impl EvaluationReport {
    pub fn write_metrics_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.metrics)?;
        Ok(())
    }
}

/// Avalia rótulos verdadeiros contra IDs de cluster já atribuídos.
pub fn evaluate_labels<S: AsRef<str>>(labels_true: &[S], cluster_ids: &[usize]) -> EvaluationReport {
    let encoding = LabelEncoding::fit(labels_true);
    let y_true: Vec<usize> = labels_true
        .iter()
        .map(|l| encoding.encode(l.as_ref()).unwrap_or_default())
        .collect();
    let n_true = encoding.len();

    let OptimalMapping { mapping, mapped } = optimal_label_mapping(&y_true, cluster_ids, n_true);
    let metrics = compute_metrics(&y_true, &mapped);

    let unmatched: Vec<usize> = mapping
        .iter()
        .filter(|&(_, &m)| m >= n_true)
        .map(|(&c, _)| c)
        .collect();
    let mut columns: Vec<String> = encoding.classes().to_vec();
    columns.extend(unmatched.iter().map(|c| format!("cluster_{c}")));

    let mut counts = Array2::<u64>::zeros((n_true, columns.len()));
    for (&t, &m) in y_true.iter().zip(mapped.iter()) {
        counts[[t, m]] += 1;
    }

    let cluster_labels = mapping
        .iter()
        .filter_map(|(&c, &m)| encoding.decode(m).map(|l| (c, l.to_string())))
        .collect();

    EvaluationReport {
        metrics,
        confusion: ConfusionMatrix {
            rows: encoding.classes().to_vec(),
            columns,
            counts,
        },
        cluster_labels,
    }
}

/// Avalia um dataset de assignments (`label_true` + `cluster_id`).
pub fn evaluate_assignments(dataset: &Dataset) -> Result<EvaluationReport> {
    let required = [LABEL_COLUMN.to_string(), CLUSTER_ID_COLUMN.to_string()];
    let missing = dataset.missing_columns(&required);
    if !missing.is_empty() {
        return Err(PipelineError::MissingRequiredColumns(missing));
    }

    let labels = dataset.column(LABEL_COLUMN).unwrap_or_default();
    let cluster_ids = dataset
        .column(CLUSTER_ID_COLUMN)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            parse_cluster_id(cell).ok_or_else(|| PipelineError::NonNumericValue {
                column: CLUSTER_ID_COLUMN.to_string(),
                row: i + 1,
                value: cell.to_string(),
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let report = evaluate_labels(&labels, &cluster_ids);
    let n_clusters = cluster_ids.iter().collect::<BTreeSet<_>>().len();
    info!(
        "Avaliação: {} amostras, {} rótulos, {n_clusters} clusters | acurácia {:.4} | ARI {:.4}",
        labels.len(),
        report.confusion.rows.len(),
        report.metrics.accuracy,
        report.metrics.ari
    );
    Ok(report)
}

fn parse_cluster_id(cell: &str) -> Option<usize> {
    let cell = cell.trim();
    cell.parse::<usize>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as usize)
    })
}
