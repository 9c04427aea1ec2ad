//! Padronização z-score por coluna.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Média e desvio padrão (populacional) aprendidos por coluna.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Ajusta o scaler às colunas de `x`.
    ///
    /// Colunas de variância zero recebem escala 1.0 e viram 0 após o
    /// `transform`, em vez de NaN.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(PipelineError::InvalidSelectionRange(
                "scaler precisa de pelo menos uma amostra".into(),
            ));
        }

        let mean = x.sum_axis(Axis(0)) / n as f64;
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, m)| {
                let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n as f64;
                let sd = var.sqrt();
                if sd == 0.0 { 1.0 } else { sd }
            })
            .collect::<Array1<f64>>();

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PipelineError::CorruptArtifact(format!(
                "scaler espera {} colunas, recebeu {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }
}
