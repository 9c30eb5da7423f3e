use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use fenetre_db::models::Pool;

use crate::error::{EngineError, Result};
use crate::metrics::{label_concordance, rank, spearman, top_k_overlap, StabilityMetric};
use crate::score::{trend_labels, Scorer};
use crate::series::DrawSeries;

/// Profil de seuils nommé. Les variantes de classement sont jugées sur
/// rho ET recouvrement ; la variante tendance sur la concordance seule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub name: String,
    pub min_rho: f64,
    pub min_overlap: f64,
    pub min_concordance: f64,
    pub consecutive_required: usize,
}

impl ThresholdProfile {
    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            min_rho: 0.90,
            min_overlap: 0.90,
            min_concordance: 0.90,
            consecutive_required: 3,
        }
    }

    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            min_rho: 0.80,
            min_overlap: 0.80,
            min_concordance: 0.85,
            consecutive_required: 2,
        }
    }

    pub fn soft() -> Self {
        Self {
            name: "souple".to_string(),
            min_rho: 0.70,
            min_overlap: 0.60,
            min_concordance: 0.75,
            consecutive_required: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchBounds {
    pub min: usize,
    pub max: usize,
    pub step: usize,
}

impl SearchBounds {
    fn validate(&self) -> Result<()> {
        if self.min == 0 || self.step == 0 || self.min > self.max {
            return Err(EngineError::InvalidBounds {
                detail: format!(
                    "min={}, max={}, step={} (attendu : 1 ≤ min ≤ max, step ≥ 1)",
                    self.min, self.max, self.step
                ),
            });
        }
        Ok(())
    }

    /// Candidats croissants : min, min+step, …, ≤ max.
    fn sweep(&self) -> Vec<usize> {
        (self.min..=self.max).step_by(self.step).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub bounds: SearchBounds,
    /// Incrément de comparaison Δ : chaque fenêtre N est comparée à N+Δ.
    pub delta: usize,
    pub top_k: usize,
    pub profile: ThresholdProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairMetric {
    pub scorer: String,
    pub pool: String,
    pub metric: StabilityMetric,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub window: usize,
    pub pairs: Vec<PairMetric>,
    pub valid: bool,
}

/// Résultat de la recherche : la plus petite fenêtre ouvrant une série de
/// `consecutive_required` candidats valides, ou None si la borne haute est
/// atteinte sans série qualifiante. Jamais de repli silencieux sur une
/// borne : l'appelant décide quoi faire d'un None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowProposal {
    pub window: Option<usize>,
    pub profile: String,
    pub delta: usize,
    pub top_k: usize,
    pub candidates: Vec<CandidateResult>,
}

fn first_run_start(flags: &[bool], required: usize) -> Option<usize> {
    let required = required.max(1);
    let mut run = 0usize;
    for (i, &ok) in flags.iter().enumerate() {
        if ok {
            run += 1;
            if run == required {
                return Some(i + 1 - required);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Recherche la plus petite fenêtre stable pour une ou plusieurs paires
/// (score, pool) devant toutes passer simultanément.
pub fn propose_window(
    series: &DrawSeries,
    targets: &[(Scorer, Pool)],
    cfg: &SearchConfig,
) -> Result<WindowProposal> {
    if targets.is_empty() {
        return Err(EngineError::InvalidBounds {
            detail: "aucune paire (score, pool) à évaluer".to_string(),
        });
    }
    if cfg.delta == 0 {
        return Err(EngineError::InvalidBounds {
            detail: "Δ doit être ≥ 1".to_string(),
        });
    }
    cfg.bounds.validate()?;

    let candidates = cfg.bounds.sweep();
    let largest = *candidates.last().expect("sweep non vide");
    let required = largest + cfg.delta;
    if required > series.len() {
        return Err(EngineError::InsufficientHistory {
            requested: required,
            available: series.len(),
        });
    }

    let draws = series.as_slice();
    let profile = &cfg.profile;
    // collect() conserve l'ordre des candidats : la première série valide
    // reste déterministe même en parallèle.
    let results: Vec<CandidateResult> = candidates
        .par_iter()
        .map(|&n| {
            let pairs: Vec<PairMetric> = targets
                .iter()
                .map(|&(scorer, pool)| {
                    let base = scorer.score(&draws[..n], pool);
                    let shifted = scorer.score(&draws[..n + cfg.delta], pool);
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
            CandidateResult {
                window: n,
                pairs,
                valid,
            }
        })
        .collect();

    let flags: Vec<bool> = results.iter().map(|r| r.valid).collect();
    let window = first_run_start(&flags, profile.consecutive_required).map(|i| candidates[i]);

    match window {
        Some(w) => log::info!(
            "fenêtre proposée : {} (profil {}, {} candidats)",
            w,
            profile.name,
            candidates.len()
        ),
        None => log::info!(
            "aucune fenêtre stable sur [{}, {}] (profil {})",
            cfg.bounds.min,
            cfg.bounds.max,
            profile.name
        ),
    }

    Ok(WindowProposal {
        window,
        profile: profile.name.clone(),
        delta: cfg.delta,
        top_k: cfg.top_k,
        candidates: results,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSearchConfig {
    /// Balayage de la fenêtre longue W.
    pub bounds: SearchBounds,
    /// Balayage de la fenêtre courte R : recent_min, +recent_step, …, ≤ W/2.
    pub recent_min: usize,
    pub recent_step: usize,
    /// Décalage δ : les étiquettes sont comparées à R, R+δ et R+2δ.
    pub delta: usize,
    pub profile: ThresholdProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPairMetric {
    pub pool: String,
    /// Concordance entre R et R+δ.
    pub concordance_near: f64,
    /// Concordance entre R+δ et R+2δ.
    pub concordance_far: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendCandidateResult {
    pub long_window: usize,
    pub recent_window: usize,
    pub pairs: Vec<TrendPairMetric>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendProposal {
    pub windows: Option<(usize, usize)>,
    pub profile: String,
    pub delta: usize,
    pub candidates: Vec<TrendCandidateResult>,
}

/// Variante tendance : balayage imbriqué des couples (W, R), R ≤ W/2 et
/// R + 2δ ≤ W. La série de candidats valides consécutifs est suivie à W
/// fixe (une série enjambant deux W mélangerait des paramétrages sans lien).
pub fn propose_trend_window(
    series: &DrawSeries,
    pools: &[Pool],
    cfg: &TrendSearchConfig,
) -> Result<TrendProposal> {
    if pools.is_empty() {
        return Err(EngineError::InvalidBounds {
            detail: "aucun pool à évaluer".to_string(),
        });
    }
    if cfg.recent_min == 0 || cfg.recent_step == 0 || cfg.delta == 0 {
        return Err(EngineError::InvalidBounds {
            detail: "recent_min, recent_step et δ doivent être ≥ 1".to_string(),
        });
    }
    cfg.bounds.validate()?;

    let longs = cfg.bounds.sweep();
    let largest = *longs.last().expect("sweep non vide");
    if largest > series.len() {
        return Err(EngineError::InsufficientHistory {
            requested: largest,
            available: series.len(),
        });
    }

    let draws = series.as_slice();
    let profile = &cfg.profile;

    // (candidats du W, première série valide du W le cas échéant)
    let per_long: Vec<(Vec<TrendCandidateResult>, Option<usize>)> = longs
        .par_iter()
        .map(|&w| {
            let window = &draws[..w];
            let recents: Vec<usize> = (cfg.recent_min..=w / 2)
                .step_by(cfg.recent_step)
                .filter(|r| r + 2 * cfg.delta <= w)
                .collect();

            let results: Vec<TrendCandidateResult> = recents
                .iter()
                .map(|&r| {
                    let pairs: Vec<TrendPairMetric> = pools
                        .iter()
                        .map(|&pool| {
                            let near = trend_labels(window, pool, r);
                            let mid = trend_labels(window, pool, r + cfg.delta);
                            let far = trend_labels(window, pool, r + 2 * cfg.delta);
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
                    TrendCandidateResult {
                        long_window: w,
                        recent_window: r,
                        pairs,
                        valid,
                    }
                })
                .collect();

            let flags: Vec<bool> = results.iter().map(|c| c.valid).collect();
            let hit = first_run_start(&flags, profile.consecutive_required).map(|i| recents[i]);
            (results, hit)
        })
        .collect();

    let mut candidates = Vec::new();
    let mut windows = None;
    for (w, (results, hit)) in longs.iter().zip(per_long) {
        if windows.is_none() {
            if let Some(r) = hit {
                windows = Some((*w, r));
            }
        }
        candidates.extend(results);
    }

    match windows {
        Some((w, r)) => log::info!(
            "fenêtres de tendance proposées : W={}, R={} (profil {})",
            w,
            r,
            profile.name
        ),
        None => log::info!(
            "aucune paire (W, R) stable sur [{}, {}] (profil {})",
            cfg.bounds.min,
            cfg.bounds.max,
            profile.name
        ),
    }

    Ok(TrendProposal {
        windows,
        profile: profile.name.clone(),
        delta: cfg.delta,
        candidates,
    })
}
