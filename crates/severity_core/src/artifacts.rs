//! Bundle de artefatos: scaler + modelo + metadados.
//!
//! Três arquivos no mesmo diretório, sempre salvos e carregados juntos:
//!
//! ```text
//! artifacts/
//! ├── scaler.bin     [0x53 'S'][Ver.][bincode StandardScaler]
//! ├── kmeans.bin     [0x4B 'K'][Ver.][bincode KMeansModel]
//! └── metadata.json  features, mapa de severidade, resumo da seleção
//! ```
//!
//! O magic byte distinto por arquivo detecta arquivos trocados; o bincode
//! preserva os `f64` bit a bit, então a inferência reproduz o treino.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::kmeans::KMeansModel;
use crate::scaler::StandardScaler;
use crate::selection::SelectionSummary;
use crate::severity::SeverityMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic byte do scaler serializado.
pub const SCALER_MAGIC: u8 = 0x53; // 'S'

/// Magic byte do modelo serializado.
pub const MODEL_MAGIC: u8 = 0x4B; // 'K'

/// Versão atual do formato dos artefatos.
pub const ARTIFACT_VERSION: u8 = 1;

/// Tamanho do header (magic + version).
const HEADER_SIZE: usize = 2;

pub const SCALER_FILE: &str = "scaler.bin";
pub const MODEL_FILE: &str = "kmeans.bin";
pub const METADATA_FILE: &str = "metadata.json";

/// Codifica um objeto como `[MAGIC][VERSION][bincode...]`.
pub fn encode_frame<T: Serialize>(magic: u8, value: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(value).map_err(|e| PipelineError::Encode(e.to_string()))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.push(magic);
    frame.push(ARTIFACT_VERSION);
    frame.extend_from_slice(&body);

    Ok(frame)
}

/// Decodifica um frame, validando magic byte e versão antes do corpo.
pub fn decode_frame<T: DeserializeOwned>(magic: u8, data: &[u8]) -> Result<T> {
    if data.len() < HEADER_SIZE {
        return Err(PipelineError::TooShort(data.len()));
    }

    if data[0] != magic {
        return Err(PipelineError::InvalidMagic {
            found: data[0],
            expected: magic,
        });
    }

    let version = data[1];
    if version != ARTIFACT_VERSION {
        return Err(PipelineError::VersionMismatch(version));
    }

    bincode::deserialize(&data[HEADER_SIZE..]).map_err(|e| PipelineError::Decode(e.to_string()))
}

/// Metadados legíveis do bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u8,
    /// Ordem das colunas usada no treino; a inferência reutiliza tal e qual.
    pub feature_cols: Vec<String>,
    pub severity_map: SeverityMap,
    pub model_selection: SelectionSummary,
}

/// Scaler, modelo e metadados de um mesmo treino.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    scaler: StandardScaler,
    model: KMeansModel,
    metadata: ArtifactMetadata,
}

impl ArtifactBundle {
    pub fn new(
        scaler: StandardScaler,
        model: KMeansModel,
        feature_cols: Vec<String>,
        severity_map: SeverityMap,
        selection: SelectionSummary,
    ) -> Result<Self> {
        let bundle = Self {
            scaler,
            model,
            metadata: ArtifactMetadata {
                format_version: ARTIFACT_VERSION,
                feature_cols,
                severity_map,
                model_selection: selection,
            },
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn model(&self) -> &KMeansModel {
        &self.model
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn feature_cols(&self) -> &[String] {
        &self.metadata.feature_cols
    }

    pub fn severity_map(&self) -> &SeverityMap {
        &self.metadata.severity_map
    }

    /// Garante que o dataset tem todas as colunas que o modelo espera.
    pub fn check_columns(&self, dataset: &Dataset) -> Result<()> {
        let missing = dataset.missing_columns(&self.metadata.feature_cols);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingFeatureColumns(missing))
        }
    }

    fn validate(&self) -> Result<()> {
        let n_features = self.metadata.feature_cols.len();
        if self.scaler.n_features() != n_features || self.model.n_features() != n_features {
            return Err(PipelineError::CorruptArtifact(format!(
                "{} features nos metadados, {} no scaler, {} no modelo",
                n_features,
                self.scaler.n_features(),
                self.model.n_features()
            )));
        }
        if !self.metadata.severity_map.covers(self.model.n_clusters()) {
            return Err(PipelineError::CorruptArtifact(format!(
                "mapa de severidade não cobre os {} clusters do modelo",
                self.model.n_clusters()
            )));
        }
        Ok(())
    }

    /// Salva os três arquivos em `dir`.
    ///
    /// Tudo é serializado em memória antes de tocar o disco; cada arquivo é
    /// gravado como `.tmp` e renomeado, metadados por último.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let scaler_bytes = encode_frame(SCALER_MAGIC, &self.scaler)?;
        let model_bytes = encode_frame(MODEL_MAGIC, &self.model)?;
        let metadata_bytes = serde_json::to_vec_pretty(&self.metadata)?;

        std::fs::create_dir_all(dir)?;
        let parts = [
            (SCALER_FILE, scaler_bytes),
            (MODEL_FILE, model_bytes),
            (METADATA_FILE, metadata_bytes),
        ];

        let mut staged = Vec::with_capacity(parts.len());
        for (name, bytes) in &parts {
            let tmp = dir.join(format!("{name}.tmp"));
            std::fs::write(&tmp, bytes)?;
            staged.push((tmp, dir.join(name)));
        }
        for (tmp, target) in staged {
            std::fs::rename(&tmp, &target)?;
        }

        info!(
            "Artefatos salvos em {} (k={}, {} features)",
            dir.display(),
            self.model.n_clusters(),
            self.metadata.feature_cols.len()
        );
        Ok(())
    }

    /// Carrega os três arquivos de `dir` e verifica a consistência entre eles.
    pub fn load(dir: &Path) -> Result<Self> {
        let scaler: StandardScaler = decode_frame(SCALER_MAGIC, &read_required(dir, SCALER_FILE)?)?;
        let model: KMeansModel = decode_frame(MODEL_MAGIC, &read_required(dir, MODEL_FILE)?)?;
        let metadata: ArtifactMetadata =
            serde_json::from_slice(&read_required(dir, METADATA_FILE)?)?;

        if metadata.format_version != ARTIFACT_VERSION {
            return Err(PipelineError::VersionMismatch(metadata.format_version));
        }

        let bundle = Self {
            scaler,
            model,
            metadata,
        };
        bundle.validate()?;
        debug!(
            "Artefatos carregados de {}: features [{}]",
            dir.display(),
            bundle.metadata.feature_cols.join(", ")
        );
        Ok(bundle)
    }
}

fn read_required(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path: PathBuf = dir.join(name);
    if !path.exists() {
        return Err(PipelineError::MissingInputFile(path));
    }
    Ok(std::fs::read(&path)?)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::KMeansParams;
    use crate::selection::SelectionMethod;
    use crate::severity::SeverityLevel;
    use ndarray::array;

    fn sample_bundle() -> ArtifactBundle {
        let x = array![[20.0, 50.0], [21.0, 52.0], [35.0, 10.0], [36.5, 12.0]];
        let (scaler, z) = StandardScaler::fit_transform(x.view()).unwrap();
        let (model, labels) = KMeansParams::new(2).fit(z.view()).unwrap();
        let severity_map = SeverityMap::from_clusters(
            z.view(),
            &labels,
            model.centroids().view(),
            &[1.0, 1.0],
        );
        ArtifactBundle::new(
            scaler,
            model,
            vec!["temperatura_c".into(), "umidade_pct".into()],
            severity_map,
            SelectionSummary {
                method: SelectionMethod::Silhouette,
                best_k: 2,
                best_score: 0.87,
            },
        )
        .unwrap()
    }

    #[test]
    fn save_load_roundtrip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = sample_bundle();
        bundle.save(dir.path()).unwrap();
        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(bundle, loaded);
        assert_eq!(bundle.scaler().mean(), loaded.scaler().mean());
        assert_eq!(bundle.model().centroids(), loaded.model().centroids());
        assert!(!dir.path().join("scaler.bin.tmp").exists());
    }

    #[test]
    fn metadata_json_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        sample_bundle().save(dir.path()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["feature_cols"][0], "temperatura_c");
        assert_eq!(json["model_selection"]["method"], "silhouette");
        assert_eq!(json["model_selection"]["best_k"], 2);
        let tokens: Vec<&str> = json["severity_map"]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(tokens.contains(&"bom"));
        assert!(tokens.contains(&"alerta"));
    }

    #[test]
    fn missing_part_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        sample_bundle().save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(MODEL_FILE)).unwrap();
        match ArtifactBundle::load(dir.path()) {
            Err(PipelineError::MissingInputFile(path)) => assert!(path.ends_with(MODEL_FILE)),
            other => panic!("esperado MissingInputFile, obtido {other:?}"),
        }
    }

    #[test]
    fn swapped_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        sample_bundle().save(dir.path()).unwrap();
        std::fs::copy(dir.path().join(MODEL_FILE), dir.path().join(SCALER_FILE)).unwrap();
        assert!(matches!(
            ArtifactBundle::load(dir.path()),
            Err(PipelineError::InvalidMagic {
                found: MODEL_MAGIC,
                expected: SCALER_MAGIC
            })
        ));
    }

    #[test]
    fn header_is_correct() {
        let bundle = sample_bundle();
        let encoded = encode_frame(MODEL_MAGIC, bundle.model()).unwrap();
        assert_eq!(encoded[0], MODEL_MAGIC);
        assert_eq!(encoded[1], ARTIFACT_VERSION);
    }

    #[test]
    fn rejects_short_frame_and_wrong_version() {
        assert!(matches!(
            decode_frame::<StandardScaler>(SCALER_MAGIC, &[SCALER_MAGIC]),
            Err(PipelineError::TooShort(1))
        ));
        let mut encoded = encode_frame(SCALER_MAGIC, sample_bundle().scaler()).unwrap();
        encoded[1] = 99;
        assert!(matches!(
            decode_frame::<StandardScaler>(SCALER_MAGIC, &encoded),
            Err(PipelineError::VersionMismatch(99))
        ));
    }

    #[test]
    fn inconsistent_parts_are_rejected() {
        let bundle = sample_bundle();
        let result = ArtifactBundle::new(
            bundle.scaler().clone(),
            bundle.model().clone(),
            vec!["temperatura_c".into()],
            bundle.severity_map().clone(),
            bundle.metadata().model_selection,
        );
        assert!(matches!(result, Err(PipelineError::CorruptArtifact(_))));

        let partial: SeverityMap = [(0, SeverityLevel::Bom)].into_iter().collect();
        let result = ArtifactBundle::new(
            bundle.scaler().clone(),
            bundle.model().clone(),
            bundle.feature_cols().to_vec(),
            partial,
            bundle.metadata().model_selection,
        );
        assert!(matches!(result, Err(PipelineError::CorruptArtifact(_))));
    }

    #[test]
    fn check_columns_names_missing_ones() {
        let bundle = sample_bundle();
        let ds = Dataset::from_reader("temperatura_c,outra\n1,2\n".as_bytes()).unwrap();
        match bundle.check_columns(&ds) {
            Err(PipelineError::MissingFeatureColumns(cols)) => {
                assert_eq!(cols, vec!["umidade_pct".to_string()]);
            }
            other => panic!("esperado MissingFeatureColumns, obtido {other:?}"),
        }
    }
}
