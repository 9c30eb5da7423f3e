use serde::{Deserialize, Serialize};

use crate::score::Trend;

/// Métrique de stabilité entre deux paramétrages d'un score de classement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilityMetric {
    pub rho: f64,
    pub overlap: f64,
}

/// Indices du pool triés par score décroissant, égalités départagées par
/// identifiant croissant. Ce départage est le même partout : deux vecteurs
/// uniformes produisent donc exactement le même ordre.
pub(crate) fn ranked_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

/// Table de rangs : rank[i] = rang du numéro i+1, de 1 (le plus fort) à n.
/// Bijection sur 1..=n par construction.
pub fn rank(scores: &[f64]) -> Vec<usize> {
    let order = ranked_order(scores);
    let mut ranks = vec![0usize; scores.len()];
    for (r, &idx) in order.iter().enumerate() {
        ranks[idx] = r + 1;
    }
    ranks
}

/// Corrélation de rang de Spearman : 1 − 6·Σd² / (n·(n²−1)), sur tout le
/// pool. Deux classements identiques (y compris le cas tout-à-égalité,
/// rendu identique par le départage déterministe) donnent exactement 1.
pub fn spearman(rank_a: &[usize], rank_b: &[usize]) -> f64 {
    debug_assert_eq!(rank_a.len(), rank_b.len());
    let n = rank_a.len();
    if n < 2 {
        return 1.0;
    }
    let sum_d2: i64 = rank_a
        .iter()
        .zip(rank_b.iter())
        .map(|(&a, &b)| {
            let d = a as i64 - b as i64;
            d * d
        })
        .sum();
    let n = n as f64;
    1.0 - 6.0 * sum_d2 as f64 / (n * (n * n - 1.0))
}

/// Ensemble des K numéros les plus forts (même départage que [`rank`]).
pub fn top_k_set(scores: &[f64], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    let mut top: Vec<usize> = ranked_order(scores).into_iter().take(k).collect();
    top.sort_unstable();
    top
}

/// Recouvrement des top-K : |A ∩ B| / K.
pub fn top_k_overlap(scores_a: &[f64], scores_b: &[f64], k: usize) -> f64 {
    let k = k.min(scores_a.len()).min(scores_b.len());
    if k == 0 {
        return 1.0;
    }
    let set_a = top_k_set(scores_a, k);
    let set_b = top_k_set(scores_b, k);
    let shared = set_a.iter().filter(|i| set_b.contains(i)).count();
    shared as f64 / k as f64
}

/// Concordance d'étiquettes : fraction des numéros portant la même tendance.
pub fn label_concordance(labels_a: &[Trend], labels_b: &[Trend]) -> f64 {
    debug_assert_eq!(labels_a.len(), labels_b.len());
    if labels_a.is_empty() {
        return 1.0;
    }
    let same = labels_a
        .iter()
        .zip(labels_b.iter())
        .filter(|(a, b)| a == b)
        .count();
    same as f64 / labels_a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{trend_labels, Scorer};
    use crate::testutil::{make_regime_draws, make_test_draws};
    use fenetre_db::models::Pool;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_rank_is_bijection() {
        let draws = make_test_draws(137);
        for scorer in [
            Scorer::Frequency,
            Scorer::Absence,
            Scorer::OverRepresentation,
        ] {
            for pool in [Pool::Balls, Pool::Stars] {
                let ranks = rank(&scorer.score(&draws, pool));
                let mut sorted = ranks.clone();
                sorted.sort_unstable();
                let expected: Vec<usize> = (1..=pool.size()).collect();
                assert_eq!(sorted, expected, "{} / {}", scorer, pool);
            }
        }
    }

    #[test]
    fn test_rank_ties_by_ascending_number() {
        // Scores tous égaux : rangs = ordre des identifiants.
        let ranks = rank(&vec![3.5; 12]);
        let expected: Vec<usize> = (1..=12).collect();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn test_rank_descending_score() {
        let scores = vec![1.0, 5.0, 3.0, 5.0];
        // 5.0 en double : le numéro 2 passe avant le numéro 4.
        assert_eq!(rank(&scores), vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_spearman_identity() {
        let draws = make_test_draws(90);
        let ranks = rank(&Scorer::Frequency.score(&draws, Pool::Balls));
        assert_eq!(spearman(&ranks, &ranks), 1.0);
    }

    #[test]
    fn test_spearman_reversed() {
        let a: Vec<usize> = (1..=10).collect();
        let b: Vec<usize> = (1..=10).rev().collect();
        assert!((spearman(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_uniform_convention() {
        // Fenêtres multiples du cycle : fréquences toutes égales des deux
        // côtés, classements identiques par départage → rho = 1 exactement.
        let draws = make_test_draws(160);
        let a = rank(&Scorer::Frequency.score(&draws[..100], Pool::Balls));
        let b = rank(&Scorer::Frequency.score(&draws[..150], Pool::Balls));
        assert_eq!(spearman(&a, &b), 1.0);
    }

    #[test]
    fn test_top_k_overlap_identity() {
        let draws = make_test_draws(70);
        let scores = Scorer::Absence.score(&draws, Pool::Balls);
        assert_eq!(top_k_overlap(&scores, &scores, 10), 1.0);
    }

    #[test]
    fn test_top_k_overlap_disjoint() {
        let mut a = vec![0.0; 20];
        let mut b = vec![0.0; 20];
        for i in 0..5 {
            a[i] = 10.0;
            b[i + 10] = 10.0;
        }
        assert_eq!(top_k_overlap(&a, &b, 5), 0.0);
    }

    #[test]
    fn test_overlap_never_increases_with_delta() {
        // Sur un historique par régimes, élargir l'écart Δ à fenêtre fixe ne
        // peut pas rendre les top-K plus semblables. Vérifié sur plusieurs
        // tranches de départ.
        let all = make_regime_draws(50, 150);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5 {
            let start = rng.random_range(0..40);
            let draws = &all[start..];
            let n = 50;
            let base = Scorer::Frequency.score(&draws[..n], Pool::Balls);
            let mut previous = f64::INFINITY;
            for delta in [50usize, 100, 150, 200] {
                let shifted = Scorer::Frequency.score(&draws[..n + delta], Pool::Balls);
                let overlap = top_k_overlap(&base, &shifted, 10);
                assert!(
                    overlap <= previous + 1e-12,
                    "départ {start}, Δ={delta} : {overlap} > {previous}"
                );
                previous = overlap;
            }
        }
    }

    #[test]
    fn test_label_concordance_identity_and_range() {
        let draws = make_test_draws(120);
        let labels = trend_labels(&draws, Pool::Balls, 30);
        assert_eq!(label_concordance(&labels, &labels), 1.0);

        let other = trend_labels(&draws, Pool::Balls, 15);
        let c = label_concordance(&labels, &other);
        assert!((0.0..=1.0).contains(&c));
    }
}
