use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use fenetre_db::models::Pool;

use crate::error::{EngineError, Result};
use crate::metrics::{label_concordance, rank, spearman, top_k_overlap, StabilityMetric};
use crate::score::{trend_labels, Scorer};
use crate::search::{PairMetric, ThresholdProfile, TrendPairMetric};
use crate::series::DrawSeries;

/// Rappel de progression (positions évaluées, positions totales).
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub delta: usize,
    /// Pas de glissement de la fenêtre le long de l'historique.
    pub step: usize,
    pub top_k: usize,
    pub profile: ThresholdProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestPosition {
    pub offset: usize,
    /// Date du tirage le plus récent de la fenêtre à cette position.
    pub window_end_date: String,
    pub pairs: Vec<PairMetric>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub window: usize,
    pub delta: usize,
    pub step: usize,
    pub profile: String,
    pub total_positions: usize,
    pub valid_positions: usize,
    pub pass_rate: f64,
    pub positions: Vec<BacktestPosition>,
}

/// Fait glisser la fenêtre proposée sur tout l'historique : une position est
/// valide si la métrique y franchit les mêmes seuils que pendant la
/// recherche. Répond à « la fenêtre se comporte-t-elle bien partout, pas
/// seulement là où elle a été découverte ? ».
pub fn backtest_window(
    series: &DrawSeries,
    targets: &[(Scorer, Pool)],
    window: usize,
    cfg: &BacktestConfig,
    progress: Option<ProgressFn>,
) -> Result<BacktestReport> {
    if targets.is_empty() {
        return Err(EngineError::InvalidBounds {
            detail: "aucune paire (score, pool) à évaluer".to_string(),
        });
    }
    if window == 0 || cfg.delta == 0 || cfg.step == 0 {
        return Err(EngineError::InvalidBounds {
            detail: "fenêtre, Δ et pas doivent être ≥ 1".to_string(),
        });
    }
    let len = series.len();
    if window + cfg.delta > len {
        return Err(EngineError::InsufficientHistory {
            requested: window + cfg.delta,
            available: len,
        });
    }

    let offsets: Vec<usize> = (0..=len - window - cfg.delta).step_by(cfg.step).collect();
    let total = offsets.len();
    let done = AtomicUsize::new(0);
    let draws = series.as_slice();
    let profile = &cfg.profile;

    let positions: Vec<BacktestPosition> = offsets
        .par_iter()
        .map(|&offset| {
            let pairs: Vec<PairMetric> = targets
                .iter()
                .map(|&(scorer, pool)| {
                    let base = scorer.score(&draws[offset..offset + window], pool);
                    let shifted =
                        scorer.score(&draws[offset..offset + window + cfg.delta], pool);
                    let metric = StabilityMetric {
                        rho: spearman(&rank(&base), &rank(&shifted)),
                        overlap: top_k_overlap(&base, &shifted, cfg.top_k),
                    };
                    let valid =
                        metric.rho >= profile.min_rho && metric.overlap >= profile.min_overlap;
                    PairMetric {
                        scorer: scorer.name().to_string(),
                        pool: pool.to_string(),
                        metric,
                        valid,
                    }
                })
                .collect();
            let valid = pairs.iter().all(|p| p.valid);
            if let Some(report) = progress {
                report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            BacktestPosition {
                offset,
                window_end_date: draws[offset].date.clone(),
                pairs,
                valid,
            }
        })
        .collect();

    let valid_positions = positions.iter().filter(|p| p.valid).count();
    let pass_rate = valid_positions as f64 / total as f64;
    log::info!(
        "backtest fenêtre {} : {}/{} positions valides ({:.1} %)",
        window,
        valid_positions,
        total,
        pass_rate * 100.0
    );

    Ok(BacktestReport {
        window,
        delta: cfg.delta,
        step: cfg.step,
        profile: profile.name.clone(),
        total_positions: total,
        valid_positions,
        pass_rate,
        positions,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBacktestPosition {
    pub offset: usize,
    pub window_end_date: String,
    pub pairs: Vec<TrendPairMetric>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBacktestReport {
    pub long_window: usize,
    pub recent_window: usize,
    pub delta: usize,
    pub step: usize,
    pub profile: String,
    pub total_positions: usize,
    pub valid_positions: usize,
    pub pass_rate: f64,
    pub positions: Vec<TrendBacktestPosition>,
}

/// Backtest de la variante tendance pour un couple (W, R) proposé.
pub fn backtest_trend_window(
    series: &DrawSeries,
    pools: &[Pool],
    long_window: usize,
    recent_window: usize,
    cfg: &BacktestConfig,
    progress: Option<ProgressFn>,
) -> Result<TrendBacktestReport> {
    if pools.is_empty() {
        return Err(EngineError::InvalidBounds {
            detail: "aucun pool à évaluer".to_string(),
        });
    }
    if recent_window == 0 || cfg.delta == 0 || cfg.step == 0 {
        return Err(EngineError::InvalidBounds {
            detail: "R, δ et pas doivent être ≥ 1".to_string(),
        });
    }
    if recent_window + 2 * cfg.delta > long_window {
        return Err(EngineError::InvalidBounds {
            detail: format!(
                "R + 2δ = {} dépasse W = {}",
                recent_window + 2 * cfg.delta,
                long_window
            ),
        });
    }
    let len = series.len();
    if long_window > len {
        return Err(EngineError::InsufficientHistory {
            requested: long_window,
            available: len,
        });
    }

    let offsets: Vec<usize> = (0..=len - long_window).step_by(cfg.step).collect();
    let total = offsets.len();
    let done = AtomicUsize::new(0);
    let draws = series.as_slice();
    let profile = &cfg.profile;

    let positions: Vec<TrendBacktestPosition> = offsets
        .par_iter()
        .map(|&offset| {
            let window = &draws[offset..offset + long_window];
            let pairs: Vec<TrendPairMetric> = pools
                .iter()
                .map(|&pool| {
                    let near = trend_labels(window, pool, recent_window);
                    let mid = trend_labels(window, pool, recent_window + cfg.delta);
                    let far = trend_labels(window, pool, recent_window + 2 * cfg.delta);
                    let concordance_near = label_concordance(&near, &mid);
                    let concordance_far = label_concordance(&mid, &far);
                    let valid = concordance_near >= profile.min_concordance
                        && concordance_far >= profile.min_concordance;
                    TrendPairMetric {
                        pool: pool.to_string(),
                        concordance_near,
                        concordance_far,
                        valid,
                    }
                })
                .collect();
            let valid = pairs.iter().all(|p| p.valid);
            if let Some(report) = progress {
                report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            TrendBacktestPosition {
                offset,
                window_end_date: draws[offset].date.clone(),
                pairs,
                valid,
            }
        })
        .collect();

    let valid_positions = positions.iter().filter(|p| p.valid).count();
    let pass_rate = valid_positions as f64 / total as f64;

    Ok(TrendBacktestReport {
        long_window,
        recent_window,
        delta: cfg.delta,
        step: cfg.step,
        profile: profile.name.clone(),
        total_positions: total,
        valid_positions,
        pass_rate,
        positions,
    })
}
