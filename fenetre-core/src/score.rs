use fenetre_db::models::{Draw, Pool};

/// Seuils de classement du ratio de tendance.
pub const RISING_RATIO: f64 = 1.2;
pub const FALLING_RATIO: f64 = 0.8;

/// Les trois variantes de score produisant un classement.
/// La variante tendance (catégorielle) est à part : voir [`trend_labels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scorer {
    Frequency,
    Absence,
    OverRepresentation,
}

impl Scorer {
    pub fn name(&self) -> &'static str {
        match self {
            Scorer::Frequency => "Fréquence",
            Scorer::Absence => "Retard",
            Scorer::OverRepresentation => "Surreprésentation",
        }
    }

    /// Vecteur de scores sur tout le pool. `draws` est déjà restreint à la
    /// fenêtre d'analyse (draws[0] = le plus récent) ; un numéro jamais vu
    /// reçoit 0, ou le plafond pour le retard.
    pub fn score(&self, draws: &[Draw], pool: Pool) -> Vec<f64> {
        match self {
            Scorer::Frequency => frequency_scores(draws, pool),
            Scorer::Absence => absence_scores(draws, pool),
            Scorer::OverRepresentation => overrepresentation_scores(draws, pool),
        }
    }
}

impl std::fmt::Display for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub(crate) fn frequency_counts(draws: &[Draw], pool: Pool) -> Vec<u32> {
    let mut counts = vec![0u32; pool.size()];
    for draw in draws {
        for &n in pool.numbers_from(draw) {
            let idx = (n - 1) as usize;
            if idx < counts.len() {
                counts[idx] += 1;
            }
        }
    }
    counts
}

fn frequency_scores(draws: &[Draw], pool: Pool) -> Vec<f64> {
    frequency_counts(draws, pool)
        .into_iter()
        .map(|c| c as f64)
        .collect()
}

/// Retard : position du premier tirage contenant le numéro, plafonné à
/// draws.len() pour un numéro absent de toute la fenêtre.
fn absence_scores(draws: &[Draw], pool: Pool) -> Vec<f64> {
    let cap = draws.len();
    let mut gaps = vec![cap; pool.size()];
    for (t, draw) in draws.iter().enumerate() {
        for &n in pool.numbers_from(draw) {
            let idx = (n - 1) as usize;
            if idx < gaps.len() && gaps[idx] == cap {
                gaps[idx] = t;
            }
        }
    }
    gaps.into_iter().map(|g| g as f64).collect()
}

/// z-score binomial : (k − N·p0) / sqrt(N·p0·(1−p0)).
/// Variance nulle ou négative (modèle nul dégénéré) : score 0.
fn overrepresentation_scores(draws: &[Draw], pool: Pool) -> Vec<f64> {
    let n = draws.len() as f64;
    let p0 = pool.null_probability();
    let variance = n * p0 * (1.0 - p0);
    if variance <= 0.0 {
        return vec![0.0; pool.size()];
    }
    let expected = n * p0;
    let sd = variance.sqrt();
    frequency_counts(draws, pool)
        .into_iter()
        .map(|k| (k as f64 - expected) / sd)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Stable,
    Falling,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Rising => write!(f, "HAUSSE"),
            Trend::Stable => write!(f, "STABLE"),
            Trend::Falling => write!(f, "BAISSE"),
        }
    }
}

/// Étiquettes de tendance sur tout le pool. `draws` couvre la fenêtre longue
/// W ; `recent` est la fenêtre courte R (R ≤ W). Pour chaque numéro :
/// attendu = freq(W)/W · R, ratio = freq(R)/attendu (0 si attendu nul),
/// puis HAUSSE si ratio > 1.2, BAISSE si ratio < 0.8, STABLE sinon.
pub fn trend_labels(draws: &[Draw], pool: Pool, recent: usize) -> Vec<Trend> {
    let long_len = draws.len();
    let recent = recent.min(long_len);
    let long_counts = frequency_counts(draws, pool);
    let recent_counts = frequency_counts(&draws[..recent], pool);

    long_counts
        .iter()
        .zip(recent_counts.iter())
        .map(|(&long_k, &recent_k)| {
            let expected = if long_len > 0 {
                long_k as f64 / long_len as f64 * recent as f64
            } else {
                0.0
            };
            let ratio = if expected > 0.0 {
                recent_k as f64 / expected
            } else {
                0.0
            };
            if ratio > RISING_RATIO {
                Trend::Rising
            } else if ratio < FALLING_RATIO {
                Trend::Falling
            } else {
                Trend::Stable
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_test_draws;

    #[test]
    fn test_frequency_covers_pool() {
        let draws = make_test_draws(100);
        let scores = Scorer::Frequency.score(&draws, Pool::Balls);
        assert_eq!(scores.len(), 50);
        // 100 tirages cycliques : chaque boule apparaît exactement 10 fois.
        for (i, &s) in scores.iter().enumerate() {
            assert_eq!(s, 10.0, "boule {} : {}", i + 1, s);
        }
    }

    #[test]
    fn test_frequency_bounded_by_window() {
        let draws = make_test_draws(60);
        for pool in [Pool::Balls, Pool::Stars] {
            for &s in &Scorer::Frequency.score(&draws, pool) {
                assert!(s >= 0.0 && s <= 60.0);
            }
        }
    }

    #[test]
    fn test_absence_recent_and_capped() {
        // Le numéro 7 présent dans les 40 tirages récents et nulle part
        // ailleurs ; un numéro jamais tiré prend le plafond 200.
        let mut draws = make_test_draws(200);
        for (i, d) in draws.iter_mut().enumerate() {
            d.balls = if i < 40 {
                [7, 10, 20, 30, 40]
            } else {
                [10, 20, 30, 40, 41]
            };
        }
        let scores = Scorer::Absence.score(&draws, Pool::Balls);
        assert_eq!(scores[6], 0.0, "boule 7 vue au tirage 0");
        assert_eq!(scores[0], 200.0, "boule 1 jamais vue : plafond");
        for &s in &scores {
            assert!(s >= 0.0 && s <= 200.0);
        }
    }

    #[test]
    fn test_overrepresentation_finite_and_zero_mean() {
        let draws = make_test_draws(100);
        let scores = Scorer::OverRepresentation.score(&draws, Pool::Balls);
        for &z in &scores {
            assert!(z.is_finite());
        }
        // Distribution parfaitement uniforme : k = N·p0 pour chaque boule.
        for &z in &scores {
            assert!(z.abs() < 1e-9, "z = {z}");
        }
    }

    #[test]
    fn test_overrepresentation_degenerate_window() {
        let draws: Vec<_> = make_test_draws(0);
        let scores = Scorer::OverRepresentation.score(&draws, Pool::Balls);
        assert!(scores.iter().all(|&z| z == 0.0));
    }

    #[test]
    fn test_trend_labels_rising_falling() {
        // 60 tirages : la boule 1 n'apparaît que dans les 10 récents (hausse),
        // la boule 6 que dans les 50 anciens (baisse).
        let mut draws = make_test_draws(60);
        for (i, d) in draws.iter_mut().enumerate() {
            d.balls = if i < 10 {
                [1, 2, 3, 4, 5]
            } else {
                [6, 2, 3, 4, 5]
            };
        }
        let labels = trend_labels(&draws, Pool::Balls, 10);
        assert_eq!(labels[0], Trend::Rising, "boule 1");
        assert_eq!(labels[5], Trend::Falling, "boule 6");
        assert_eq!(labels[1], Trend::Stable, "boule 2 constante");
    }

    #[test]
    fn test_trend_labels_never_seen_is_falling() {
        // attendu = 0 → ratio = 0 < 0.8.
        let mut draws = make_test_draws(40);
        for d in draws.iter_mut() {
            d.balls = [1, 2, 3, 4, 5];
        }
        let labels = trend_labels(&draws, Pool::Balls, 10);
        assert_eq!(labels[49], Trend::Falling, "boule 50 jamais vue");
    }

    #[test]
    fn test_trend_labels_total_over_pool() {
        let draws = make_test_draws(80);
        assert_eq!(trend_labels(&draws, Pool::Balls, 20).len(), 50);
        assert_eq!(trend_labels(&draws, Pool::Stars, 20).len(), 12);
    }
}
