//! Atribuição ótima (algoritmo húngaro) para matrizes retangulares.
//!
//! Versão com potenciais em O(r²·c), custos inteiros para resultado exato.

use ndarray::{Array2, ArrayView2};

/// Resolve o problema de atribuição minimizando o custo total.
///
/// Retorna pares `(linha, coluna)` ordenados por linha. Com `r` linhas e `c`
/// colunas, são atribuídos `min(r, c)` pares; cada linha e cada coluna
/// aparece no máximo uma vez.
pub fn linear_sum_assignment(cost: ArrayView2<'_, i64>) -> Vec<(usize, usize)> {
    let (rows, cols) = cost.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    if rows > cols {
        let transposed = cost.t().to_owned();
        let mut pairs: Vec<(usize, usize)> = solve(&transposed)
            .into_iter()
            .map(|(r, c)| (c, r))
            .collect();
        pairs.sort_unstable();
        return pairs;
    }
    solve(&cost.to_owned())
}

/// Atribuição que maximiza a soma de `weights` (ex.: acertos numa matriz de
/// confusão).
pub fn maximize_assignment(weights: ArrayView2<'_, u64>) -> Vec<(usize, usize)> {
    let cost = weights.mapv(|w| -(w as i64));
    linear_sum_assignment(cost.view())
}

/// Exige `linhas <= colunas`. Índices internos começam em 1; 0 é sentinela.
fn solve(a: &Array2<i64>) -> Vec<(usize, usize)> {
    let (n, m) = a.dim();
    let inf = i64::MAX / 4;
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![inf; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = inf;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = a[[i0 - 1, j - 1]] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}
