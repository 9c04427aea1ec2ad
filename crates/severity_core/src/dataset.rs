//! Tabela de leituras de sensores carregada de CSV.
//!
//! As células são mantidas como texto para que as saídas (assignments,
//! predições) repitam a entrada exatamente; a conversão numérica acontece só
//! quando uma matriz de features é montada.

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Coluna de tempo, nunca usada como feature.
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// Rótulo verdadeiro (ground truth), nunca usado como feature.
pub const LABEL_COLUMN: &str = "label_true";
/// Coluna adicionada com o ID do cluster.
pub const CLUSTER_ID_COLUMN: &str = "cluster_id";
/// Coluna adicionada com o token de severidade.
pub const SEVERITY_COLUMN: &str = "severity";

/// Dataset tabular: cabeçalho + linhas de células em texto.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len(), "linha com largura errada");
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Células de uma coluna, na ordem das linhas.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Uma coluna é numérica quando tem linhas e todas as células são
    /// números finitos.
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        !self.rows.is_empty() && self.first_non_numeric(idx).is_none()
    }

    /// Primeira célula não numérica da coluna: linha (1-based) e valor.
    pub fn first_non_numeric(&self, idx: usize) -> Option<(usize, &str)> {
        self.rows
            .iter()
            .enumerate()
            .find(|(_, r)| parse_number(&r[idx]).is_none())
            .map(|(i, r)| (i + 1, r[idx].as_str()))
    }

    /// `true` se ao menos uma célula da coluna é um número finito.
    pub fn has_numeric_cell(&self, idx: usize) -> bool {
        self.rows.iter().any(|r| parse_number(&r[idx]).is_some())
    }

    /// Lê uma coluna como `f64`, falhando na primeira célula não numérica.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingRequiredColumns(vec![name.to_string()]))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                parse_number(&r[idx]).ok_or_else(|| PipelineError::NonNumericValue {
                    column: name.to_string(),
                    row: i + 1,
                    value: r[idx].clone(),
                })
            })
            .collect()
    }

    /// Lista as colunas de `required` que não existem no cabeçalho.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .cloned()
            .collect()
    }

    /// Monta a matriz `linhas × features` na ordem de `columns`.
    pub fn feature_matrix(&self, columns: &[String]) -> Result<Array2<f64>> {
        let missing = self.missing_columns(columns);
        if !missing.is_empty() {
            return Err(PipelineError::MissingFeatureColumns(missing));
        }

        let parsed: Vec<Vec<f64>> = columns
            .iter()
            .map(|c| self.numeric_column(c))
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn((self.len(), columns.len()), |(i, j)| {
            parsed[j][i]
        }))
    }

    /// Retorna uma cópia com as colunas de `extra`. Uma coluna que já existe
    /// é sobrescrita no lugar; as novas vão para a direita.
    pub fn with_columns(&self, extra: &[(&str, Vec<String>)]) -> Dataset {
        let mut out = self.clone();
        for (name, values) in extra {
            match out.column_index(name) {
                Some(idx) => {
                    for (row, value) in out.rows.iter_mut().zip(values) {
                        row[idx] = value.clone();
                    }
                }
                None => {
                    out.headers.push(name.to_string());
                    for (row, value) in out.rows.iter_mut().zip(values) {
                        row.push(value.clone());
                    }
                }
            }
        }
        out
    }

    /// Carrega um CSV com cabeçalho.
    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInputFile(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file)?;
        debug!(
            "CSV {} carregado: {} linhas × {} colunas",
            path.display(),
            dataset.len(),
            dataset.headers.len()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut dataset = Dataset::new(headers);
        for record in rdr.records() {
            let record = record?;
            dataset.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(dataset)
    }

    /// Grava o dataset em CSV, criando o diretório pai se preciso.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.to_writer(file)?;
        debug!("CSV salvo em {} ({} linhas)", path.display(), self.len());
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let csv = "timestamp,temperatura_c,umidade_pct,label_true\n\
                   2024-01-01 00:00:00,22.5,55,bom\n\
                   2024-01-01 00:01:00,35.1,12.5,critico\n";
        Dataset::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn reads_headers_and_rows() {
        let ds = sample();
        assert_eq!(ds.headers().len(), 4);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.column("label_true").unwrap(), vec!["bom", "critico"]);
    }

    #[test]
    fn numeric_detection() {
        let ds = sample();
        assert!(!ds.is_numeric_column(0));
        assert!(ds.is_numeric_column(1));
        assert!(ds.is_numeric_column(2));
        assert!(!ds.is_numeric_column(3));
    }

    #[test]
    fn feature_matrix_follows_requested_order() {
        let ds = sample();
        let cols = vec!["umidade_pct".to_string(), "temperatura_c".to_string()];
        let m = ds.feature_matrix(&cols).unwrap();
        assert_eq!(m.dim(), (2, 2));
        assert_eq!(m[[0, 0]], 55.0);
        assert_eq!(m[[1, 1]], 35.1);
    }

    #[test]
    fn feature_matrix_reports_missing_columns() {
        let ds = sample();
        let cols = vec!["temperatura_c".to_string(), "vibracao_digital".to_string()];
        match ds.feature_matrix(&cols) {
            Err(PipelineError::MissingFeatureColumns(missing)) => {
                assert_eq!(missing, vec!["vibracao_digital".to_string()]);
            }
            other => panic!("esperado MissingFeatureColumns, obtido {other:?}"),
        }
    }

    #[test]
    fn non_numeric_cell_names_column_and_row() {
        let csv = "a,b\n1,2\n3,x\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        match ds.numeric_column("b") {
            Err(PipelineError::NonNumericValue { column, row, .. }) => {
                assert_eq!(column, "b");
                assert_eq!(row, 2);
            }
            other => panic!("esperado NonNumericValue, obtido {other:?}"),
        }
    }

    #[test]
    fn with_columns_appends_on_the_right() {
        let ds = sample();
        let out = ds.with_columns(&[(CLUSTER_ID_COLUMN, vec!["0".into(), "1".into()])]);
        assert_eq!(out.headers().last().unwrap(), CLUSTER_ID_COLUMN);
        assert_eq!(out.rows()[1].last().unwrap(), "1");
        assert_eq!(out.rows()[1][1], "35.1");
    }

    #[test]
    fn with_columns_overwrites_existing_column() {
        let ds = sample().with_columns(&[(CLUSTER_ID_COLUMN, vec!["0".into(), "1".into()])]);
        let out = ds.with_columns(&[
            (CLUSTER_ID_COLUMN, vec!["7".into(), "7".into()]),
            (SEVERITY_COLUMN, vec!["bom".into(), "bom".into()]),
        ]);
        let count = |name: &str| out.headers().iter().filter(|h| h.as_str() == name).count();
        assert_eq!(count(CLUSTER_ID_COLUMN), 1);
        assert_eq!(count(SEVERITY_COLUMN), 1);
        assert_eq!(out.headers().len(), 6);
        assert_eq!(out.column(CLUSTER_ID_COLUMN).unwrap(), vec!["7", "7"]);
        assert_eq!(out.headers()[4], CLUSTER_ID_COLUMN);
    }

    #[test]
    fn first_non_numeric_cell_is_located() {
        let csv = "a,b,c
1,2,x
3,,y
";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.first_non_numeric(0), None);
        assert_eq!(ds.first_non_numeric(1), Some((2, "")));
        assert!(ds.has_numeric_cell(1));
        assert!(!ds.has_numeric_cell(2));
        assert!(!ds.is_numeric_column(1));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Dataset::read_csv(Path::new("/nao/existe/sensors.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInputFile(_)));
    }

    #[test]
    fn csv_roundtrip_keeps_text() {
        let ds = sample();
        let mut buf = Vec::new();
        ds.to_writer(&mut buf).unwrap();
        let back = Dataset::from_reader(buf.as_slice()).unwrap();
        assert_eq!(ds, back);
    }
}
