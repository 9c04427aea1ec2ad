//! Gerador de leituras sintéticas rotuladas.
//!
//! Simula o ESP32 com quatro sensores (temperatura, umidade, vibração e
//! luminosidade) em três regimes: `bom`, `alerta` e `critico`.

use crate::dataset::{Dataset, LABEL_COLUMN, TIMESTAMP_COLUMN};
use crate::error::{PipelineError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Normal};
use tracing::info;

pub const TEMPERATURE_COLUMN: &str = "temperatura_c";
pub const HUMIDITY_COLUMN: &str = "umidade_pct";
pub const VIBRATION_COLUMN: &str = "vibracao_digital";
pub const LUMINOSITY_COLUMN: &str = "luminosidade_analogica";

/// Faixa do ADC de 12 bits do ESP32.
const LUMINOSITY_MAX: f64 = 4095.0;

/// Regime de operação: fração do dataset e distribuição de cada sensor.
#[derive(Debug, Clone, Copy)]
struct SensorProfile {
    label: &'static str,
    share: f64,
    /// (média, desvio)
    temperature: (f64, f64),
    humidity: (f64, f64),
    /// Probabilidade de vibração detectada
    vibration: f64,
    luminosity: (f64, f64),
}

const PROFILES: [SensorProfile; 3] = [
    SensorProfile {
        label: "bom",
        share: 0.60,
        temperature: (22.0, 1.5),
        humidity: (55.0, 7.0),
        vibration: 0.03,
        luminosity: (1800.0, 500.0),
    },
    SensorProfile {
        label: "alerta",
        share: 0.25,
        temperature: (27.0, 2.5),
        humidity: (75.0, 6.0),
        vibration: 0.15,
        luminosity: (3800.0, 300.0),
    },
    SensorProfile {
        label: "critico",
        share: 0.15,
        temperature: (35.0, 3.5),
        humidity: (15.0, 8.0),
        vibration: 0.45,
        luminosity: (4200.0, 250.0),
    },
];

/// Uma leitura gerada, antes da formatação em CSV.
#[derive(Debug, Clone, PartialEq)]
struct Reading {
    temperature: f64,
    humidity: f64,
    vibration: u8,
    luminosity: u32,
    label: &'static str,
}

/// Amostras por regime; a sobra do truncamento vai para o primeiro (`bom`).
fn profile_counts(n_samples: usize) -> [usize; 3] {
    let mut counts = PROFILES.map(|p| (p.share * n_samples as f64) as usize);
    let assigned: usize = counts.iter().sum();
    counts[0] += n_samples - assigned;
    counts
}

fn normal(params: (f64, f64)) -> Result<Normal<f64>> {
    Normal::new(params.0, params.1).map_err(|e| PipelineError::InvalidConfig(vec![e.to_string()]))
}

fn sample_profile(
    profile: &SensorProfile,
    count: usize,
    rng: &mut ChaCha8Rng,
    out: &mut Vec<Reading>,
) -> Result<()> {
    let temperature = normal(profile.temperature)?;
    let humidity = normal(profile.humidity)?;
    let luminosity = normal(profile.luminosity)?;
    let vibration = Bernoulli::new(profile.vibration)
        .map_err(|e| PipelineError::InvalidConfig(vec![e.to_string()]))?;

    for _ in 0..count {
        out.push(Reading {
            temperature: temperature.sample(rng).clamp(-20.0, 80.0),
            humidity: humidity.sample(rng).clamp(0.0, 100.0),
            vibration: u8::from(vibration.sample(rng)),
            luminosity: luminosity.sample(rng).clamp(0.0, LUMINOSITY_MAX) as u32,
            label: profile.label,
        });
    }
    Ok(())
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Gera `n_samples` leituras embaralhadas, determinísticas para a mesma semente.
pub fn generate_dataset(n_samples: usize, seed: u64) -> Result<Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let counts = profile_counts(n_samples);

    let mut readings = Vec::with_capacity(n_samples);
    for (profile, &count) in PROFILES.iter().zip(counts.iter()) {
        sample_profile(profile, count, &mut rng, &mut readings)?;
    }
    readings.shuffle(&mut rng);

    let mut dataset = Dataset::new(
        [
            TIMESTAMP_COLUMN,
            TEMPERATURE_COLUMN,
            HUMIDITY_COLUMN,
            VIBRATION_COLUMN,
            LUMINOSITY_COLUMN,
            LABEL_COLUMN,
        ]
        .map(String::from)
        .to_vec(),
    );
    let start = start_time();
    for (i, r) in readings.into_iter().enumerate() {
        let ts = start + Duration::minutes(i as i64);
        dataset.push_row(vec![
            ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.temperature.to_string(),
            r.humidity.to_string(),
            r.vibration.to_string(),
            r.luminosity.to_string(),
            r.label.to_string(),
        ]);
    }

    info!(
        "Dataset sintético: {} amostras (bom {}, alerta {}, critico {})",
        n_samples, counts[0], counts[1], counts[2]
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::select_feature_columns;

    #[test]
    fn counts_add_up_with_remainder_on_bom() {
        assert_eq!(profile_counts(3000), [1800, 750, 450]);
        assert_eq!(profile_counts(7), [5, 1, 1]);
        assert_eq!(profile_counts(0), [0, 0, 0]);
    }

    #[test]
    fn same_seed_same_dataset() {
        let a = generate_dataset(200, 11).unwrap();
        let b = generate_dataset(200, 11).unwrap();
        let c = generate_dataset(200, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn layout_and_proportions() {
        let ds = generate_dataset(1000, 42).unwrap();
        assert_eq!(ds.len(), 1000);
        assert_eq!(
            ds.headers(),
            &[
                "timestamp",
                "temperatura_c",
                "umidade_pct",
                "vibracao_digital",
                "luminosidade_analogica",
                "label_true"
            ]
        );
        let labels = ds.column(LABEL_COLUMN).unwrap();
        let count = |l: &str| labels.iter().filter(|&&x| x == l).count();
        assert_eq!(count("bom"), 600);
        assert_eq!(count("alerta"), 250);
        assert_eq!(count("critico"), 150);
        // Embaralhado: as primeiras 600 linhas não são todas `bom`
        assert!(labels[..600].iter().any(|&l| l != "bom"));
    }

    #[test]
    fn values_respect_sensor_ranges() {
        let ds = generate_dataset(2000, 7).unwrap();
        for t in ds.numeric_column(TEMPERATURE_COLUMN).unwrap() {
            assert!((-20.0..=80.0).contains(&t));
        }
        for h in ds.numeric_column(HUMIDITY_COLUMN).unwrap() {
            assert!((0.0..=100.0).contains(&h));
        }
        for v in ds.column(VIBRATION_COLUMN).unwrap() {
            assert!(v == "0" || v == "1");
        }
        for l in ds.column(LUMINOSITY_COLUMN).unwrap() {
            let l: u32 = l.parse().unwrap();
            assert!(l <= 4095);
        }
    }

    #[test]
    fn timestamps_advance_one_minute() {
        let ds = generate_dataset(3, 1).unwrap();
        let ts = ds.column(TIMESTAMP_COLUMN).unwrap();
        assert_eq!(ts, vec!["2024-01-01 00:00:00", "2024-01-01 00:01:00", "2024-01-01 00:02:00"]);
    }

    #[test]
    fn generated_data_has_four_features() {
        let ds = generate_dataset(50, 3).unwrap();
        let features = select_feature_columns(&ds).unwrap();
        assert_eq!(
            features,
            vec![TEMPERATURE_COLUMN, HUMIDITY_COLUMN, VIBRATION_COLUMN, LUMINOSITY_COLUMN]
        );
    }
}
