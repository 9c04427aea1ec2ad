//! Métricas de qualidade de clusterização.
//!
//! Internas (sem rótulo verdadeiro): silhouette e Calinski-Harabasz.
//! Externas (comparando duas rotulações): ARI, AMI, NMI, homogeneidade,
//! completude e V-measure. Logaritmo natural em todas as entropias.

use crate::kmeans::squared_distance;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::collections::BTreeMap;

// ──────────────────────────────────────────────
// Internas
// ──────────────────────────────────────────────

/// Coeficiente de silhouette médio, em [-1, 1].
///
/// `s(i) = (b - a) / max(a, b)`, com `a` a distância média ao próprio
/// cluster e `b` a menor distância média a outro cluster. Pontos em
/// clusters unitários valem 0; menos de dois clusters populados resulta em 0.
pub fn silhouette_score(x: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = x.nrows();
    let (ids, compact) = compact_labels(labels);
    let k = ids.len();
    if n < 2 || k < 2 {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &c in &compact {
        sizes[c] += 1;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[compact[j]] += squared_distance(x.row(i), x.row(j)).sqrt();
            }
        }

        let own = compact[i];
        if sizes[own] == 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

/// Índice de Calinski-Harabasz: dispersão entre clusters sobre dispersão
/// interna, cada uma normalizada pelos graus de liberdade. Não negativo.
pub fn calinski_harabasz_score(x: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = x.nrows();
    let (ids, compact) = compact_labels(labels);
    let k = ids.len();
    if k < 2 || n <= k {
        return 0.0;
    }

    let overall: Array1<f64> = x.sum_axis(Axis(0)) / n as f64;
    let mut centers = Array2::<f64>::zeros((k, x.ncols()));
    let mut sizes = vec![0usize; k];
    for (row, &c) in x.axis_iter(Axis(0)).zip(compact.iter()) {
        let mut acc = centers.row_mut(c);
        acc += &row;
        sizes[c] += 1;
    }
    for (mut center, &size) in centers.axis_iter_mut(Axis(0)).zip(sizes.iter()) {
        center /= size as f64;
    }

    let between: f64 = centers
        .axis_iter(Axis(0))
        .zip(sizes.iter())
        .map(|(center, &size)| size as f64 * squared_distance(center, overall.view()))
        .sum();
    let within: f64 = x
        .axis_iter(Axis(0))
        .zip(compact.iter())
        .map(|(row, &c)| squared_distance(row, centers.row(c)))
        .sum();

    if within == 0.0 {
        return 1.0;
    }
    (between / (k - 1) as f64) / (within / (n - k) as f64)
}

/// Mapeia rótulos arbitrários para `0..k` na ordem crescente dos IDs.
fn compact_labels(labels: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let index: BTreeMap<usize, usize> = labels
        .iter()
        .copied()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let ids = index.keys().copied().collect();
    let compact = labels.iter().map(|l| index[l]).collect();
    (ids, compact)
}

// ──────────────────────────────────────────────
// Externas
// ──────────────────────────────────────────────

/// Tabela de contingência: linhas = classes verdadeiras, colunas = clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    counts: Array2<u64>,
    n: u64,
}

impl Contingency {
    /// Cruza as duas rotulações posição a posição.
    ///
    /// Com tamanhos diferentes, só o prefixo comum é contado.
    pub fn new(labels_true: &[usize], labels_pred: &[usize]) -> Self {
        let len = labels_true.len().min(labels_pred.len());
        let (labels_true, labels_pred) = (&labels_true[..len], &labels_pred[..len]);
        let (classes, true_idx) = compact_labels(labels_true);
        let (clusters, pred_idx) = compact_labels(labels_pred);
        let mut counts = Array2::<u64>::zeros((classes.len(), clusters.len()));
        for (&r, &c) in true_idx.iter().zip(pred_idx.iter()) {
            counts[[r, c]] += 1;
        }
        Self {
            counts,
            n: labels_true.len() as u64,
        }
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_clusters(&self) -> usize {
        self.counts.ncols()
    }

    fn row_sums(&self) -> Vec<u64> {
        self.counts.sum_axis(Axis(1)).to_vec()
    }

    fn col_sums(&self) -> Vec<u64> {
        self.counts.sum_axis(Axis(0)).to_vec()
    }

    fn mutual_info(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        let a = self.row_sums();
        let b = self.col_sums();
        let mut mi = 0.0;
        for ((i, j), &nij) in self.counts.indexed_iter() {
            if nij == 0 {
                continue;
            }
            let nij = nij as f64;
            mi += nij / n * (n * nij / (a[i] as f64 * b[j] as f64)).ln();
        }
        mi.max(0.0)
    }
}

fn entropy(sizes: &[u64]) -> f64 {
    let n: u64 = sizes.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    sizes
        .iter()
        .filter(|&&s| s > 0)
        .map(|&s| {
            let p = s as f64 / n;
            -p * p.ln()
        })
        .sum()
}

/// Adjusted Rand Index via matriz de confusão de pares.
pub fn adjusted_rand_score(labels_true: &[usize], labels_pred: &[usize]) -> f64 {
    let cont = Contingency::new(labels_true, labels_pred);
    let n = cont.n as f64;
    let sum_squares: f64 = cont.counts.iter().map(|&c| (c as f64).powi(2)).sum();
    let sum_rows: f64 = cont.row_sums().iter().map(|&s| (s as f64).powi(2)).sum();
    let sum_cols: f64 = cont.col_sums().iter().map(|&s| (s as f64).powi(2)).sum();

    let tp = sum_squares - n;
    let fp = sum_cols - sum_squares;
    let fn_ = sum_rows - sum_squares;
    let tn = n * n - fp - fn_ - sum_squares;

    if fn_ == 0.0 && fp == 0.0 {
        return 1.0;
    }
    2.0 * (tp * tn - fn_ * fp) / ((tp + fn_) * (fn_ + tn) + (tp + fp) * (fp + tn))
}

/// Informação mútua normalizada (média aritmética das entropias).
pub fn normalized_mutual_info_score(labels_true: &[usize], labels_pred: &[usize]) -> f64 {
    let cont = Contingency::new(labels_true, labels_pred);
    if single_partition(&cont) {
        return 1.0;
    }
    let mi = cont.mutual_info();
    if mi == 0.0 {
        return 0.0;
    }
    let h_true = entropy(&cont.row_sums());
    let h_pred = entropy(&cont.col_sums());
    mi / ((h_true + h_pred) / 2.0)
}

/// Informação mútua ajustada ao acaso (modelo hipergeométrico exato).
pub fn adjusted_mutual_info_score(labels_true: &[usize], labels_pred: &[usize]) -> f64 {
    let cont = Contingency::new(labels_true, labels_pred);
    if single_partition(&cont) {
        return 1.0;
    }
    let mi = cont.mutual_info();
    let emi = expected_mutual_info(&cont);
    let h_true = entropy(&cont.row_sums());
    let h_pred = entropy(&cont.col_sums());
    let mut denom = (h_true + h_pred) / 2.0 - emi;
    denom = if denom < 0.0 {
        denom.min(-f64::EPSILON)
    } else {
        denom.max(f64::EPSILON)
    };
    (mi - emi) / denom
}

fn single_partition(cont: &Contingency) -> bool {
    let (r, c) = (cont.n_classes(), cont.n_clusters());
    (r == 1 && c == 1) || (r == 0 && c == 0)
}

fn expected_mutual_info(cont: &Contingency) -> f64 {
    let n = cont.n as usize;
    if n == 0 {
        return 0.0;
    }
    // ln(k!) para k em 0..=n
    let mut ln_fact = vec![0.0f64; n + 1];
    for k in 1..=n {
        ln_fact[k] = ln_fact[k - 1] + (k as f64).ln();
    }

    let nf = n as f64;
    let a = cont.row_sums();
    let b = cont.col_sums();
    let mut emi = 0.0;
    for &ai in &a {
        let ai = ai as usize;
        for &bj in &b {
            let bj = bj as usize;
            let start = (ai + bj).saturating_sub(n).max(1);
            let end = ai.min(bj);
            for nij in start..=end {
                let term = nij as f64 / nf * ((nf * nij as f64) / (ai as f64 * bj as f64)).ln();
                let ln_p = ln_fact[ai] + ln_fact[bj] + ln_fact[n - ai] + ln_fact[n - bj]
                    - ln_fact[n]
                    - ln_fact[nij]
                    - ln_fact[ai - nij]
                    - ln_fact[bj - nij]
                    - ln_fact[n + nij - ai - bj];
                emi += term * ln_p.exp();
            }
        }
    }
    emi
}

/// Homogeneidade, completude e V-measure (β = 1).
pub fn homogeneity_completeness_v_measure(
    labels_true: &[usize],
    labels_pred: &[usize],
) -> (f64, f64, f64) {
    if labels_true.is_empty() || labels_pred.is_empty() {
        return (1.0, 1.0, 1.0);
    }
    let cont = Contingency::new(labels_true, labels_pred);
    let h_true = entropy(&cont.row_sums());
    let h_pred = entropy(&cont.col_sums());
    let mi = cont.mutual_info();

    let homogeneity = if h_true > 0.0 { mi / h_true } else { 1.0 };
    let completeness = if h_pred > 0.0 { mi / h_pred } else { 1.0 };
    let v_measure = if homogeneity + completeness == 0.0 {
        0.0
    } else {
        2.0 * homogeneity * completeness / (homogeneity + completeness)
    };
    (homogeneity, completeness, v_measure)
}

/// Fração de posições em que as duas rotulações coincidem (prefixo comum).
pub fn accuracy(labels_true: &[usize], labels_pred: &[usize]) -> f64 {
    let len = labels_true.len().min(labels_pred.len());
    if len == 0 {
        return 0.0;
    }
    let hits = labels_true
        .iter()
        .zip(labels_pred.iter())
        .filter(|(a, b)| a == b)
        .count();
    hits as f64 / len as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPS: f64 = 1e-9;

    #[test]
    fn silhouette_well_separated() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [5.0, 5.0], [5.1, 5.1]];
        let s = silhouette_score(x.view(), &[0, 0, 1, 1]);
        assert!(s > 0.9 && s <= 1.0, "silhouette {s}");
    }

    #[test]
    fn silhouette_bad_partition_is_negative() {
        let x = array![[0.0], [0.1], [5.0], [5.1]];
        let s = silhouette_score(x.view(), &[0, 1, 0, 1]);
        assert!(s < 0.0 && s >= -1.0, "silhouette {s}");
    }

    #[test]
    fn silhouette_singletons_and_single_cluster() {
        let x = array![[0.0], [1.0], [10.0]];
        // O ponto isolado vale 0, os outros dois contam normalmente
        let s = silhouette_score(x.view(), &[0, 0, 1]);
        let expected = (0.9 + 8.0 / 9.0) / 3.0;
        assert!((s - expected).abs() < 1e-9, "silhouette {s}");
        assert_eq!(silhouette_score(x.view(), &[4, 4, 4]), 0.0);
    }

    #[test]
    fn calinski_harabasz_known_value() {
        let x = array![[0.0], [2.0], [10.0], [12.0]];
        let ch = calinski_harabasz_score(x.view(), &[0, 0, 1, 1]);
        assert!((ch - 50.0).abs() < EPS, "ch {ch}");
    }

    #[test]
    fn calinski_harabasz_zero_within_dispersion() {
        let x = array![[0.0], [0.0], [10.0], [10.0]];
        assert_eq!(calinski_harabasz_score(x.view(), &[0, 0, 1, 1]), 1.0);
    }

    #[test]
    fn ari_reference_values() {
        assert!((adjusted_rand_score(&[0, 0, 1, 1], &[1, 1, 0, 0]) - 1.0).abs() < EPS);
        assert!((adjusted_rand_score(&[0, 0, 1, 1], &[0, 0, 1, 2]) - 4.0 / 7.0).abs() < EPS);
        assert!((adjusted_rand_score(&[0, 0, 1, 1], &[0, 1, 0, 1]) + 0.5).abs() < EPS);
    }

    #[test]
    fn v_measure_and_nmi_reference_values() {
        let (h, c, v) = homogeneity_completeness_v_measure(&[0, 0, 1, 1], &[0, 0, 1, 2]);
        assert!((h - 1.0).abs() < EPS);
        assert!((c - 2.0 / 3.0).abs() < EPS);
        assert!((v - 0.8).abs() < EPS);
        let nmi = normalized_mutual_info_score(&[0, 0, 1, 1], &[0, 0, 1, 2]);
        assert!((nmi - 0.8).abs() < EPS);
    }

    #[test]
    fn homogeneity_with_single_cluster() {
        let (h, c, _) = homogeneity_completeness_v_measure(&[0, 0, 1, 1], &[0, 0, 0, 0]);
        assert!(h.abs() < EPS);
        assert!((c - 1.0).abs() < EPS);
    }

    #[test]
    fn ami_perfect_and_independent() {
        assert!((adjusted_mutual_info_score(&[0, 0, 1, 1, 2, 2], &[5, 5, 3, 3, 9, 9]) - 1.0).abs() < EPS);
        // MI = 0 e EMI = ln(2)/3 ⇒ AMI = -0.5
        let ami = adjusted_mutual_info_score(&[0, 0, 1, 1], &[0, 1, 0, 1]);
        assert!((ami + 0.5).abs() < 1e-9, "ami {ami}");
    }

    #[test]
    fn nmi_degenerate_cases() {
        assert_eq!(normalized_mutual_info_score(&[1, 1, 1], &[2, 2, 2]), 1.0);
        assert_eq!(normalized_mutual_info_score(&[0, 0, 1, 1], &[0, 1, 0, 1]), 0.0);
    }

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 2, 0]), 0.75);
    }

    #[test]
    fn mismatched_lengths_use_common_prefix() {
        let short = [0, 0, 1, 1];
        let long = [3, 3, 5, 5, 9, 9];
        assert_eq!(adjusted_rand_score(&short, &long), 1.0);
        assert_eq!(adjusted_rand_score(&long, &short), 1.0);
        assert!((normalized_mutual_info_score(&short, &long) - 1.0).abs() < 1e-12);
        assert_eq!(Contingency::new(&short, &long).counts().sum(), 4);
        assert_eq!(accuracy(&[0, 1], &[0, 1, 1]), 1.0);
        let (h, c, v) = homogeneity_completeness_v_measure(&short, &[]);
        assert_eq!((h, c, v), (1.0, 1.0, 1.0));
    }
}
