//! # Severity Core
//!
//! Crate compartilhada do pipeline de severidade: transforma leituras de
//! sensores (temperatura, umidade, vibração, luminosidade) em clusters
//! K-Means ranqueados como `bom`, `alerta`, `critico`…
//!
//! ## Módulos
//! - [`dataset`] – Tabela CSV de leituras
//! - [`features`] – Seleção das colunas numéricas
//! - [`scaler`] – Padronização z-score
//! - [`kmeans`] – K-Means com seeding k-means++
//! - [`metrics`] – Silhouette, Calinski-Harabasz, ARI, AMI, NMI…
//! - [`selection`] – Escolha do número de clusters
//! - [`severity`] – Níveis de severidade e mapa cluster → nível
//! - [`hungarian`] – Atribuição ótima para alinhar clusters e rótulos
//! - [`evaluate`] – Avaliação contra o rótulo verdadeiro
//! - [`artifacts`] – Bundle scaler + modelo + metadados
//! - [`pipeline`] – Treino e inferência de ponta a ponta
//! - [`synthetic`] – Gerador de leituras sintéticas
//! - [`config`] – Configuração unificada via TOML
//! - [`error`] – Erros do pipeline

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod hungarian;
pub mod kmeans;
pub mod metrics;
pub mod pipeline;
pub mod scaler;
pub mod selection;
pub mod severity;
pub mod synthetic;

// Re-exports convenientes
pub use artifacts::ArtifactBundle;
pub use config::AppConfig;
pub use dataset::Dataset;
pub use error::{PipelineError, Result};
pub use evaluate::{EvaluationMetrics, EvaluationReport, evaluate_assignments};
pub use selection::{ClusterSelection, SelectionMethod};
pub use severity::{SeverityLevel, SeverityMap};
