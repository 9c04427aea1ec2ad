//! Erros do pipeline de severidade.
//!
//! Todos são fatais: o pipeline é um cálculo em lote determinístico, então
//! repetir com a mesma entrada reproduz a mesma falha.

use std::path::PathBuf;

/// Erros do pipeline (treino, inferência, avaliação e artefatos).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Arquivo não encontrado: {}", .0.display())]
    MissingInputFile(PathBuf),

    #[error("Nenhuma coluna numérica encontrada para clusterização")]
    NoNumericFeatures,

    #[error("Colunas ausentes no CSV de entrada: {}", .0.join(", "))]
    MissingFeatureColumns(Vec<String>),

    #[error("Colunas obrigatórias ausentes: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    #[error("Faixa de seleção inválida: {0}")]
    InvalidSelectionRange(String),

    #[error("Valor não numérico na coluna '{column}' (linha {row}): {value:?}")]
    NonNumericValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Artefato inconsistente: {0}")]
    CorruptArtifact(String),

    #[error("Artefato muito curto ({0} bytes, mínimo 2)")]
    TooShort(usize),

    #[error("Magic byte inválido: 0x{found:02X} (esperado 0x{expected:02X})")]
    InvalidMagic { found: u8, expected: u8 },

    #[error("Versão de artefato incompatível: {0}")]
    VersionMismatch(u8),

    #[error("Configuração inválida: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Erro de serialização: {0}")]
    Encode(String),

    #[error("Erro de deserialização: {0}")]
    Decode(String),

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
