//! Seleção das colunas de features.

use crate::dataset::{Dataset, LABEL_COLUMN, TIMESTAMP_COLUMN};
use crate::error::{PipelineError, Result};
use tracing::{debug, warn};

/// Colunas que nunca entram como feature.
const IGNORED_COLUMNS: [&str; 2] = [TIMESTAMP_COLUMN, LABEL_COLUMN];

/// Retorna as colunas numéricas do dataset, na ordem do cabeçalho, sem
/// `timestamp` e `label_true`.
///
/// A ordem devolvida é a que deve ser persistida e reutilizada na inferência.
pub fn select_feature_columns(dataset: &Dataset) -> Result<Vec<String>> {
    let features: Vec<String> = dataset
        .headers()
        .iter()
        .enumerate()
        .filter(|(_, name)| !IGNORED_COLUMNS.contains(&name.as_str()))
        .filter(|(idx, name)| {
            if dataset.is_numeric_column(*idx) {
                return true;
            }
            if dataset.has_numeric_cell(*idx) {
                if let Some((row, value)) = dataset.first_non_numeric(*idx) {
                    warn!("Coluna '{name}' ignorada: valor não numérico na linha {row} ({value:?})");
                }
            }
            false
        })
        .map(|(_, name)| name.clone())
        .collect();

    if features.is_empty() {
        return Err(PipelineError::NoNumericFeatures);
    }

    debug!("Features selecionadas: {}", features.join(", "));
    Ok(features)
}
