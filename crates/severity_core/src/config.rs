//! Configuração unificada via TOML.
//!
//! Um único `severidade.toml` concentra caminhos, parâmetros da busca por k,
//! do modelo final, pesos de risco e do gerador sintético.

use crate::error::{PipelineError, Result};
use crate::kmeans::KMeansParams;
use crate::selection::SelectionParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Nome padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_FILE: &str = "severidade.toml";

/// Caminhos de entrada e saída.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// CSV de treino
    pub data: PathBuf,
    /// Assignments, resumos, predições e métricas
    pub outputs: PathBuf,
    /// Bundle scaler + modelo + metadados
    pub artifacts: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data").join("sensors.csv"),
            outputs: PathBuf::from("outputs"),
            artifacts: PathBuf::from("artifacts"),
        }
    }
}

/// Busca do número de clusters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub k_min: usize,
    pub k_max: usize,
    /// Abaixo deste silhouette máximo, decide o Calinski-Harabasz
    pub silhouette_threshold: f64,
    /// Inicializações por k candidato
    pub n_init: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 8,
            silhouette_threshold: 0.35,
            n_init: 10,
        }
    }
}

/// Ajuste final do K-Means.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_init: 20,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Pesos do score de risco por feature (ausente = 1.0).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    pub weights: BTreeMap<String, f64>,
}

/// Gerador de dataset sintético.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub n_samples: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_samples: 3000,
            seed: 42,
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub selection: SelectionConfig,
    pub model: ModelConfig,
    pub severity: SeverityConfig,
    pub synthetic: SyntheticConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Encode(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do `severidade.toml` (diretório atual).
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let sel = &self.selection;

        if sel.k_min < 2 {
            errors.push(format!("k_min deve ser >= 2 (atual: {})", sel.k_min));
        }
        if sel.k_min >= sel.k_max {
            errors.push(format!(
                "k_min ({}) deve ser menor que k_max ({})",
                sel.k_min, sel.k_max
            ));
        }
        if !(-1.0..=1.0).contains(&sel.silhouette_threshold) {
            errors.push(format!(
                "Limiar de silhouette inválido: {} (-1.0–1.0)",
                sel.silhouette_threshold
            ));
        }
        if sel.n_init == 0 || self.model.n_init == 0 {
            errors.push("n_init não pode ser 0".into());
        }
        if self.model.max_iter == 0 {
            errors.push("max_iter não pode ser 0".into());
        }
        if self.model.tol.is_nan() || self.model.tol < 0.0 {
            errors.push(format!("Tolerância inválida: {}", self.model.tol));
        }
        for (feature, w) in &self.severity.weights {
            if !w.is_finite() || *w < 0.0 {
                errors.push(format!("Peso inválido para '{feature}': {w}"));
            }
        }
        if self.synthetic.n_samples == 0 {
            errors.push("n_samples do gerador não pode ser 0".into());
        }

        errors
    }

    /// Como [`validate`](Self::validate), mas falha com todos os erros juntos.
    ///
    /// Uma faixa `[k_min, k_max]` inválida sai como `InvalidSelectionRange`,
    /// o mesmo erro que a busca por k daria.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let sel = &self.selection;
        if sel.k_min < 2 || sel.k_min >= sel.k_max {
            return Err(PipelineError::InvalidSelectionRange(errors.join("; ")));
        }
        Err(PipelineError::InvalidConfig(errors))
    }

    /// Parâmetros da busca por k (mesma semente e critério de parada do modelo final).
    pub fn selection_params(&self) -> SelectionParams {
        SelectionParams {
            k_min: self.selection.k_min,
            k_max: self.selection.k_max,
            silhouette_threshold: self.selection.silhouette_threshold,
            n_init: self.selection.n_init,
            max_iter: self.model.max_iter,
            tol: self.model.tol,
            seed: self.model.seed,
        }
    }

    /// Parâmetros do ajuste final para `k` clusters.
    pub fn model_params(&self, k: usize) -> KMeansParams {
        KMeansParams::new(k)
            .n_init(self.model.n_init)
            .max_iter(self.model.max_iter)
            .tol(self.model.tol)
            .seed(self.model.seed)
    }
}
