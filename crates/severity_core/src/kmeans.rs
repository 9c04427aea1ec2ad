//! K-Means (Lloyd) com inicialização k-means++.
//!
//! Distância euclidiana no espaço padronizado. Várias inicializações são
//! sorteadas a partir de um único `ChaCha8Rng`, então o resultado é
//! determinístico para a mesma semente.

use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parâmetros de ajuste do K-Means.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub n_clusters: usize,
    /// Número de inicializações; vence a de menor inércia.
    pub n_init: usize,
    pub max_iter: usize,
    /// Tolerância relativa à variância média das features.
    pub tol: f64,
    pub seed: u64,
}

impl KMeansParams {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Ajusta o modelo e retorna também o rótulo de cada linha de `x`.
    pub fn fit(&self, x: ArrayView2<'_, f64>) -> Result<(KMeansModel, Vec<usize>)> {
        let k = self.n_clusters;
        if k == 0 || self.n_init == 0 || self.max_iter == 0 {
            return Err(PipelineError::InvalidSelectionRange(format!(
                "parâmetros inválidos: k={k}, n_init={}, max_iter={}",
                self.n_init, self.max_iter
            )));
        }
        if x.nrows() < k {
            return Err(PipelineError::InvalidSelectionRange(format!(
                "{} amostras para {k} clusters",
                x.nrows()
            )));
        }

        let tol = self.tol * mean_variance(x);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<(KMeansModel, Vec<usize>)> = None;

        for run in 0..self.n_init {
            let init = kmeans_plus_plus(x, k, &mut rng);
            let (model, labels) = lloyd(x, init, self.max_iter, tol);
            debug!(
                "k={k} init {run}: inércia {:.4} em {} iterações",
                model.inertia, model.n_iter
            );
            // Empate fica com a primeira inicialização
            if best.as_ref().is_none_or(|(b, _)| model.inertia < b.inertia) {
                best = Some((model, labels));
            }
        }

        best.ok_or_else(|| PipelineError::InvalidSelectionRange("nenhuma inicialização".into()))
    }
}

/// Modelo K-Means ajustado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    centroids: Array2<f64>,
    inertia: f64,
    n_iter: usize,
}

impl KMeansModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Soma das distâncias quadradas de cada amostra ao seu centróide.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Atribui cada linha ao centróide mais próximo, sem reajustar.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.n_features() {
            return Err(PipelineError::CorruptArtifact(format!(
                "modelo espera {} features, recebeu {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(x
            .axis_iter(Axis(0))
            .map(|row| nearest(row, &self.centroids).0)
            .collect())
    }
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Centróide mais próximo; empates ficam com o menor ID.
fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, center) in centroids.axis_iter(Axis(0)).enumerate() {
        let d = squared_distance(row, center);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn mean_variance(x: ArrayView2<'_, f64>) -> f64 {
    let n = x.nrows() as f64;
    let total: f64 = x
        .axis_iter(Axis(1))
        .map(|col| {
            let m = col.sum() / n;
            col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n
        })
        .sum();
    total / x.ncols().max(1) as f64
}

/// Sorteia `k` centros com probabilidade proporcional a D².
fn kmeans_plus_plus(x: ArrayView2<'_, f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::zeros((k, x.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&x.row(first));
    let mut closest: Vec<f64> = x
        .axis_iter(Axis(0))
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        // Todos os pesos zerados: só restam pontos repetidos
        let idx = match WeightedIndex::new(&closest) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..n),
        };
        centroids.row_mut(c).assign(&x.row(idx));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let d = squared_distance(row, centroids.row(c));
            if d < closest[i] {
                closest[i] = d;
            }
        }
    }

    centroids
}

fn assign(x: ArrayView2<'_, f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        let (c, _) = nearest(row, centroids);
        if labels[i] != c {
            labels[i] = c;
            changed = true;
        }
    }
    changed
}

fn lloyd(
    x: ArrayView2<'_, f64>,
    mut centroids: Array2<f64>,
    max_iter: usize,
    tol: f64,
) -> (KMeansModel, Vec<usize>) {
    let k = centroids.nrows();
    let mut labels = vec![usize::MAX; x.nrows()];
    assign(x, &centroids, &mut labels);

    let mut n_iter = 0;
    for _ in 0..max_iter {
        n_iter += 1;

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for (row, &c) in x.axis_iter(Axis(0)).zip(labels.iter()) {
            let mut acc = sums.row_mut(c);
            acc += &row;
            counts[c] += 1;
        }

        let mut shift = 0.0;
        for c in 0..k {
            // Cluster vazio mantém o centróide anterior
            if counts[c] == 0 {
                continue;
            }
            let new_center = &sums.row(c) / counts[c] as f64;
            shift += squared_distance(new_center.view(), centroids.row(c));
            centroids.row_mut(c).assign(&new_center);
        }

        let changed = assign(x, &centroids, &mut labels);
        if !changed || shift <= tol {
            break;
        }
    }

    let inertia = x
        .axis_iter(Axis(0))
        .zip(labels.iter())
        .map(|(row, &c)| squared_distance(row, centroids.row(c)))
        .sum();

    (
        KMeansModel {
            centroids,
            inertia,
            n_iter,
        },
        labels,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, -0.1],
            [-0.1, 0.1],
            [5.0, 5.0],
            [5.1, 4.9],
            [4.9, 5.1],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let x = blobs();
        let (model, labels) = KMeansParams::new(2).fit(x.view()).unwrap();
        assert_eq!(model.n_clusters(), 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(model.inertia() < 0.2);
    }

    #[test]
    fn predict_on_training_data_matches_fit_labels() {
        let x = blobs();
        let (model, labels) = KMeansParams::new(3).n_init(5).fit(x.view()).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), labels);
    }

    #[test]
    fn same_seed_same_model() {
        let x = blobs();
        let a = KMeansParams::new(2).seed(7).fit(x.view()).unwrap();
        let b = KMeansParams::new(2).seed(7).fit(x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn predict_assigns_new_points_to_nearest_centroid() {
        let x = blobs();
        let (model, labels) = KMeansParams::new(2).fit(x.view()).unwrap();
        let new = array![[0.2, 0.2], [4.8, 5.2]];
        let pred = model.predict(new.view()).unwrap();
        assert_eq!(pred, vec![labels[0], labels[3]]);
    }

    #[test]
    fn rejects_more_clusters_than_samples() {
        let x = array![[0.0], [1.0]];
        assert!(matches!(
            KMeansParams::new(3).fit(x.view()),
            Err(PipelineError::InvalidSelectionRange(_))
        ));
    }

    #[test]
    fn duplicate_points_do_not_break_seeding() {
        let x = array![[1.0], [1.0], [1.0], [2.0]];
        let (model, labels) = KMeansParams::new(3).fit(x.view()).unwrap();
        assert_eq!(model.n_clusters(), 3);
        assert_eq!(labels.len(), 4);
        assert_ne!(labels[0], labels[3]);
    }
}
