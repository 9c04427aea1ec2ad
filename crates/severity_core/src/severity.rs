//! Níveis de severidade e mapeamento cluster → severidade.
//!
//! Os IDs de cluster do K-Means não têm ordem; aqui eles são ranqueados pelo
//! risco médio (média das features padronizadas) e recebem tokens em ordem
//! crescente: `bom`, `alerta`, `critico`, `critico+`, `critico++`,
//! `critico+++`, e depois `critico+4`, `critico+5`…

use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Nível de severidade, ordenado do menor para o maior risco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SeverityLevel {
    Bom,
    Alerta,
    /// `Critico(0)` = `critico`, `Critico(3)` = `critico+++`, `Critico(4)` = `critico+4`.
    Critico(u32),
}

/// Quantidade de tokens do vocabulário fixo.
pub const BASE_LEVELS: usize = 6;

impl SeverityLevel {
    /// Nível na posição `rank` do vocabulário (0 = `bom`).
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => SeverityLevel::Bom,
            1 => SeverityLevel::Alerta,
            r => SeverityLevel::Critico((r - 2) as u32),
        }
    }

    pub fn rank(self) -> usize {
        match self {
            SeverityLevel::Bom => 0,
            SeverityLevel::Alerta => 1,
            SeverityLevel::Critico(plus) => plus as usize + 2,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Bom => f.write_str("bom"),
            SeverityLevel::Alerta => f.write_str("alerta"),
            SeverityLevel::Critico(plus @ 0..=3) => {
                write!(f, "critico{}", "+".repeat(*plus as usize))
            }
            SeverityLevel::Critico(plus) => write!(f, "critico+{plus}"),
        }
    }
}

impl FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bom" => return Ok(SeverityLevel::Bom),
            "alerta" => return Ok(SeverityLevel::Alerta),
            _ => {}
        }
        let rest = s
            .strip_prefix("critico")
            .ok_or_else(|| format!("severidade desconhecida: {s:?}"))?;
        if rest.chars().all(|c| c == '+') && rest.len() <= 3 {
            return Ok(SeverityLevel::Critico(rest.len() as u32));
        }
        match rest.strip_prefix('+').and_then(|n| n.parse::<u32>().ok()) {
            Some(n) if n >= 4 => Ok(SeverityLevel::Critico(n)),
            _ => Err(format!("severidade desconhecida: {s:?}")),
        }
    }
}

impl From<SeverityLevel> for String {
    fn from(level: SeverityLevel) -> Self {
        level.to_string()
    }
}

impl TryFrom<String> for SeverityLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Score de risco de uma amostra: `Σ wᵢ·zᵢ / n_features`.
///
/// Com todos os pesos 1.0 é a média simples das features padronizadas.
pub fn risk_score(row: ArrayView1<'_, f64>, weights: &[f64]) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    row.iter().zip(weights.iter()).map(|(z, w)| z * w).sum::<f64>() / row.len() as f64
}

/// Resolve os pesos por feature; features sem peso configurado valem 1.0.
pub fn feature_weights(feature_names: &[String], configured: &BTreeMap<String, f64>) -> Vec<f64> {
    feature_names
        .iter()
        .map(|name| configured.get(name).copied().unwrap_or(1.0))
        .collect()
}

/// Mapa `cluster_id → severidade`, monotônico no risco médio do cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityMap(BTreeMap<usize, SeverityLevel>);

impl SeverityMap {
    /// Ranqueia os clusters pelo risco médio das amostras e atribui os
    /// níveis em ordem crescente.
    ///
    /// `centroids` cobre clusters que ficaram sem amostras: o risco deles é o
    /// do próprio centróide, garantindo uma entrada para todo ID `0..k`.
    pub fn from_clusters(
        x: ArrayView2<'_, f64>,
        labels: &[usize],
        centroids: ArrayView2<'_, f64>,
        weights: &[f64],
    ) -> Self {
        let k = centroids.nrows();
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (row, &c) in x.axis_iter(Axis(0)).zip(labels.iter()) {
            sums[c] += risk_score(row, weights);
            counts[c] += 1;
        }

        let mut ranked: Vec<(usize, f64)> = (0..k)
            .map(|c| {
                let risk = if counts[c] > 0 {
                    sums[c] / counts[c] as f64
                } else {
                    risk_score(centroids.row(c), weights)
                };
                (c, risk)
            })
            .collect();
        // Ordenação estável: empate mantém o menor ID primeiro
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        Self(
            ranked
                .into_iter()
                .enumerate()
                .map(|(rank, (cluster, _))| (cluster, SeverityLevel::from_rank(rank)))
                .collect(),
        )
    }

    pub fn get(&self, cluster: usize) -> Option<SeverityLevel> {
        self.0.get(&cluster).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` quando há entrada para todo ID em `0..k`.
    pub fn covers(&self, k: usize) -> bool {
        (0..k).all(|c| self.0.contains_key(&c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, SeverityLevel)> + '_ {
        self.0.iter().map(|(&c, &l)| (c, l))
    }
}

impl FromIterator<(usize, SeverityLevel)> for SeverityMap {
    fn from_iter<T: IntoIterator<Item = (usize, SeverityLevel)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
