//! Escolha do número de clusters.
//!
//! Para cada k da grade, ajusta um K-Means e calcula silhouette e
//! Calinski-Harabasz. Vence o k de maior silhouette; se esse máximo ficar
//! abaixo do limiar, não há separação clara e o k de maior CH decide.

use crate::error::{PipelineError, Result};
use crate::kmeans::KMeansParams;
use crate::metrics::{calinski_harabasz_score, silhouette_score};
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

/// Métrica que decidiu o k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Silhouette,
    CalinskiHarabasz,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionMethod::Silhouette => "silhouette",
            SelectionMethod::CalinskiHarabasz => "calinski_harabasz",
        })
    }
}

/// Parâmetros da busca.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    pub k_min: usize,
    pub k_max: usize,
    pub silhouette_threshold: f64,
    /// Inicializações do K-Means por k candidato.
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 8,
            silhouette_threshold: 0.35,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Resultado completo da busca por k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSelection {
    pub k_grid: Vec<usize>,
    pub silhouette_scores: Vec<f64>,
    pub ch_scores: Vec<f64>,
    pub best_k: usize,
    pub method: SelectionMethod,
    /// Score vencedor, na escala da métrica que decidiu.
    pub best_score: f64,
}

impl ClusterSelection {
    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            method: self.method,
            best_k: self.best_k,
            best_score: self.best_score,
        }
    }
}

/// Resumo persistido junto aos artefatos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub method: SelectionMethod,
    pub best_k: usize,
    pub best_score: f64,
}

/// Busca o k em `[k_min, k_max]` sobre a matriz já padronizada.
pub fn choose_k(x: ArrayView2<'_, f64>, params: &SelectionParams) -> Result<ClusterSelection> {
    validate_range(x, params)?;

    let k_grid: Vec<usize> = (params.k_min..=params.k_max).collect();
    let mut silhouette_scores = Vec::with_capacity(k_grid.len());
    let mut ch_scores = Vec::with_capacity(k_grid.len());

    for &k in &k_grid {
        let (_, labels) = KMeansParams::new(k)
            .n_init(params.n_init)
            .max_iter(params.max_iter)
            .tol(params.tol)
            .seed(params.seed)
            .fit(x)?;
        let sil = silhouette_score(x, &labels);
        let ch = calinski_harabasz_score(x, &labels);
        debug!("k={k}: silhouette {sil:.4} | calinski-harabasz {ch:.2}");
        silhouette_scores.push(sil);
        ch_scores.push(ch);
    }

    let (sil_idx, best_sil) = first_argmax(&silhouette_scores).ok_or_else(|| {
        PipelineError::InvalidSelectionRange("nenhum silhouette válido na grade".into())
    })?;

    let (best_k, method, best_score) = if best_sil >= params.silhouette_threshold {
        (k_grid[sil_idx], SelectionMethod::Silhouette, best_sil)
    } else {
        let (ch_idx, best_ch) = first_argmax(&ch_scores).ok_or_else(|| {
            PipelineError::InvalidSelectionRange("nenhum Calinski-Harabasz válido na grade".into())
        })?;
        info!(
            "Silhouette máximo {best_sil:.4} abaixo do limiar {:.2}; usando Calinski-Harabasz",
            params.silhouette_threshold
        );
        (k_grid[ch_idx], SelectionMethod::CalinskiHarabasz, best_ch)
    };

    info!("k escolhido: {best_k} via {method} (score {best_score:.4})");

    Ok(ClusterSelection {
        k_grid,
        silhouette_scores,
        ch_scores,
        best_k,
        method,
        best_score,
    })
}

fn validate_range(x: ArrayView2<'_, f64>, params: &SelectionParams) -> Result<()> {
    if params.k_min < 2 {
        return Err(PipelineError::InvalidSelectionRange(format!(
            "k_min deve ser >= 2 (recebido {})",
            params.k_min
        )));
    }
    if params.k_min >= params.k_max {
        return Err(PipelineError::InvalidSelectionRange(format!(
            "k_min ({}) deve ser menor que k_max ({})",
            params.k_min, params.k_max
        )));
    }
    if x.nrows() < params.k_max {
        return Err(PipelineError::InvalidSelectionRange(format!(
            "{} amostras para k_max = {}",
            x.nrows(),
            params.k_max
        )));
    }
    let distinct = count_distinct_rows(x);
    if distinct < params.k_min {
        return Err(PipelineError::InvalidSelectionRange(format!(
            "apenas {distinct} amostras distintas para k_min = {}",
            params.k_min
        )));
    }
    Ok(())
}

fn count_distinct_rows(x: ArrayView2<'_, f64>) -> usize {
    x.axis_iter(Axis(0))
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Índice e valor do primeiro máximo, ignorando NaN.
fn first_argmax(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    fn two_blobs_1d() -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let low = Normal::new(0.0, 0.5).unwrap();
        let high = Normal::new(10.0, 0.5).unwrap();
        Array2::from_shape_fn((100, 1), |(i, _)| {
            if i % 2 == 0 {
                low.sample(&mut rng)
            } else {
                high.sample(&mut rng)
            }
        })
    }

    fn fast_params() -> SelectionParams {
        SelectionParams {
            n_init: 3,
            ..SelectionParams::default()
        }
    }

    #[test]
    fn two_separated_blobs_pick_k2_by_silhouette() {
        let x = two_blobs_1d();
        let sel = choose_k(x.view(), &SelectionParams::default()).unwrap();
        assert_eq!(sel.best_k, 2);
        assert_eq!(sel.method, SelectionMethod::Silhouette);
        assert!(sel.best_score > 0.9, "score {}", sel.best_score);
    }

    #[test]
    fn scores_stay_in_range() {
        let x = two_blobs_1d();
        let sel = choose_k(x.view(), &fast_params()).unwrap();
        assert_eq!(sel.k_grid, (2..=8).collect::<Vec<_>>());
        assert_eq!(sel.silhouette_scores.len(), 7);
        for (&s, &ch) in sel.silhouette_scores.iter().zip(sel.ch_scores.iter()) {
            assert!((-1.0..=1.0).contains(&s));
            assert!(ch >= 0.0);
        }
        assert!(sel.k_grid.contains(&sel.best_k));
    }

    #[test]
    fn unreachable_threshold_falls_back_to_calinski_harabasz() {
        let x = two_blobs_1d();
        let params = SelectionParams {
            silhouette_threshold: 1.01,
            ..fast_params()
        };
        let sel = choose_k(x.view(), &params).unwrap();
        assert_eq!(sel.method, SelectionMethod::CalinskiHarabasz);
        let (idx, best) = first_argmax(&sel.ch_scores).unwrap();
        assert_eq!(sel.best_k, sel.k_grid[idx]);
        assert_eq!(sel.best_score, best);
    }

    #[test]
    fn threshold_at_minimum_keeps_silhouette() {
        let x = two_blobs_1d();
        let params = SelectionParams {
            silhouette_threshold: -1.0,
            ..fast_params()
        };
        let sel = choose_k(x.view(), &params).unwrap();
        assert_eq!(sel.method, SelectionMethod::Silhouette);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let x = two_blobs_1d();
        for (k_min, k_max) in [(3, 3), (5, 2), (1, 4)] {
            let params = SelectionParams {
                k_min,
                k_max,
                ..fast_params()
            };
            assert!(matches!(
                choose_k(x.view(), &params),
                Err(PipelineError::InvalidSelectionRange(_))
            ));
        }
    }

    #[test]
    fn too_few_distinct_samples() {
        let x = array![[1.0], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0]];
        assert!(matches!(
            choose_k(x.view(), &fast_params()),
            Err(PipelineError::InvalidSelectionRange(_))
        ));
    }

    #[test]
    fn argmax_prefers_first_and_skips_nan() {
        assert_eq!(first_argmax(&[0.2, 0.5, 0.5, 0.1]), Some((1, 0.5)));
        assert_eq!(first_argmax(&[f64::NAN, 0.3]), Some((1, 0.3)));
        assert_eq!(first_argmax(&[]), None);
    }

    #[test]
    fn method_serializes_snake_case() {
        let json = serde_json::to_string(&SelectionMethod::CalinskiHarabasz).unwrap();
        assert_eq!(json, "\"calinski_harabasz\"");
        assert_eq!(SelectionMethod::Silhouette.to_string(), "silhouette");
    }
}
