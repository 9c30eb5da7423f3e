use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use fenetre_db::models::Pool;

use crate::backtest::ProgressFn;
use crate::error::{EngineError, Result};
use crate::score::Scorer;
use crate::search::{
    propose_trend_window, propose_window, SearchConfig, TrendSearchConfig,
};
use crate::series::DrawSeries;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEpoch {
    /// Nombre de tirages récents retirés pour cette époque.
    pub offset: usize,
    /// Date du tirage le plus récent restant.
    pub epoch_end_date: String,
    pub proposal: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSeries {
    pub truncation_step: usize,
    pub min_tail: usize,
    pub profile: String,
    pub epochs: Vec<DriftEpoch>,
}

/// Rejoue la recherche de fenêtre sur des historiques tronqués, comme si
/// elle avait été lancée à des dates antérieures. La série obtenue dit si
/// la fenêtre proposée est elle-même stable dans le temps (fenêtre figée)
/// ou dérive (recalcul périodique) ; la décision revient à l'appelant.
pub fn drift_analysis(
    series: &DrawSeries,
    targets: &[(Scorer, Pool)],
    cfg: &SearchConfig,
    truncation_step: usize,
    min_tail: usize,
    progress: Option<ProgressFn>,
) -> Result<DriftSeries> {
    let largest = largest_candidate(cfg.bounds.min, cfg.bounds.max, cfg.bounds.step)?;
    let floor = largest + cfg.delta;
    validate_tail(truncation_step, min_tail, floor, series.len())?;

    let offsets: Vec<usize> = (0..=series.len() - min_tail)
        .step_by(truncation_step)
        .collect();
    let total = offsets.len();
    let done = AtomicUsize::new(0);

    let epochs: Vec<DriftEpoch> = offsets
        .par_iter()
        .map(|&offset| {
            let tail = series.tail(offset)?;
            let proposal = propose_window(&tail, targets, cfg)?;
            if let Some(report) = progress {
                report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            Ok(DriftEpoch {
                offset,
                epoch_end_date: tail.as_slice()[0].date.clone(),
                proposal: proposal.window,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "dérive : {} époques, pas de troncature {}",
        epochs.len(),
        truncation_step
    );

    Ok(DriftSeries {
        truncation_step,
        min_tail,
        profile: cfg.profile.name.clone(),
        epochs,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendDriftEpoch {
    pub offset: usize,
    pub epoch_end_date: String,
    pub proposal: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendDriftSeries {
    pub truncation_step: usize,
    pub min_tail: usize,
    pub profile: String,
    pub epochs: Vec<TrendDriftEpoch>,
}

/// Pendant tendance de [`drift_analysis`] : rejoue la recherche (W, R).
pub fn drift_trend_analysis(
    series: &DrawSeries,
    pools: &[Pool],
    cfg: &TrendSearchConfig,
    truncation_step: usize,
    min_tail: usize,
    progress: Option<ProgressFn>,
) -> Result<TrendDriftSeries> {
    let largest = largest_candidate(cfg.bounds.min, cfg.bounds.max, cfg.bounds.step)?;
    validate_tail(truncation_step, min_tail, largest, series.len())?;

    let offsets: Vec<usize> = (0..=series.len() - min_tail)
        .step_by(truncation_step)
        .collect();
    let total = offsets.len();
    let done = AtomicUsize::new(0);

    let epochs: Vec<TrendDriftEpoch> = offsets
        .par_iter()
        .map(|&offset| {
            let tail = series.tail(offset)?;
            let proposal = propose_trend_window(&tail, pools, cfg)?;
            if let Some(report) = progress {
                report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            Ok(TrendDriftEpoch {
                offset,
                epoch_end_date: tail.as_slice()[0].date.clone(),
                proposal: proposal.windows,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TrendDriftSeries {
        truncation_step,
        min_tail,
        profile: cfg.profile.name.clone(),
        epochs,
    })
}

fn largest_candidate(min: usize, max: usize, step: usize) -> Result<usize> {
    if min == 0 || step == 0 || min > max {
        return Err(EngineError::InvalidBounds {
            detail: format!("min={min}, max={max}, step={step}"),
        });
    }
    Ok(min + (max - min) / step * step)
}

/// Chaque époque doit pouvoir évaluer le balayage complet, sinon les
/// propositions ne seraient pas comparables entre elles.
fn validate_tail(
    truncation_step: usize,
    min_tail: usize,
    floor: usize,
    available: usize,
) -> Result<()> {
    if truncation_step == 0 {
        return Err(EngineError::InvalidBounds {
            detail: "pas de troncature nul".to_string(),
        });
    }
    if min_tail < floor {
        return Err(EngineError::InvalidBounds {
            detail: format!(
                "min_tail = {min_tail} inférieur au balayage complet ({floor} tirages requis)"
            ),
        });
    }
    if available < min_tail {
        return Err(EngineError::InsufficientHistory {
            requested: min_tail,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchBounds, ThresholdProfile};
    use crate::testutil::make_test_draws;

    fn config() -> SearchConfig {
        SearchConfig {
            bounds: SearchBounds {
                min: 50,
                max: 100,
                step: 10,
            },
            delta: 10,
            top_k: 10,
            profile: ThresholdProfile::standard(),
        }
    }

    #[test]
    fn test_drift_epoch_layout() {
        let series = DrawSeries::new(make_test_draws(300)).unwrap();
        let drift = drift_analysis(
            &series,
            &[(Scorer::Frequency, Pool::Balls)],
            &config(),
            20,
            150,
            None,
        )
        .unwrap();
        // offsets 0, 20, …, 140 : 300 − 140 = 160 ≥ 150, 300 − 160 < 150.
        assert_eq!(drift.epochs.len(), 8);
        assert_eq!(drift.epochs[0].offset, 0);
        assert_eq!(drift.epochs[7].offset, 140);
        // Les dates d'époque reculent dans le temps.
        for pair in drift.epochs.windows(2) {
            assert!(pair[0].epoch_end_date > pair[1].epoch_end_date);
        }
    }

    #[test]
    fn test_drift_stable_history_stable_proposal() {
        // Historique cyclique : chaque époque doit proposer la borne basse.
        let series = DrawSeries::new(make_test_draws(300)).unwrap();
        let drift = drift_analysis(
            &series,
            &[(Scorer::Frequency, Pool::Balls)],
            &config(),
            20,
            150,
            None,
        )
        .unwrap();
        for epoch in &drift.epochs {
            assert_eq!(epoch.proposal, Some(50), "époque {}", epoch.offset);
        }
    }

    #[test]
    fn test_drift_min_tail_must_cover_sweep() {
        let series = DrawSeries::new(make_test_draws(300)).unwrap();
        let err = drift_analysis(
            &series,
            &[(Scorer::Frequency, Pool::Balls)],
            &config(),
            20,
            100,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidBounds { .. }));
    }

    #[test]
    fn test_drift_insufficient_history() {
        let series = DrawSeries::new(make_test_draws(120)).unwrap();
        let err = drift_analysis(
            &series,
            &[(Scorer::Frequency, Pool::Balls)],
            &config(),
            20,
            150,
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHistory {
                requested: 150,
                available: 120
            }
        );
    }

    #[test]
    fn test_trend_drift_stable_history() {
        let series = DrawSeries::new(make_test_draws(300)).unwrap();
        let cfg = TrendSearchConfig {
            bounds: SearchBounds {
                min: 60,
                max: 100,
                step: 20,
            },
            recent_min: 10,
            recent_step: 10,
            delta: 10,
            profile: ThresholdProfile::standard(),
        };
        let drift =
            drift_trend_analysis(&series, &[Pool::Balls], &cfg, 30, 150, None).unwrap();
        assert_eq!(drift.epochs.len(), 6);
        for epoch in &drift.epochs {
            assert_eq!(epoch.proposal, Some((60, 10)), "époque {}", epoch.offset);
        }
    }
}
