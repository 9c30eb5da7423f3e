//! Générateurs de tirages synthétiques pour les tests.

use fenetre_db::models::Draw;

/// Date fictive au format ISO, strictement croissante avec `idx`
/// (calendrier simplifié : 28 jours par mois, 12 mois).
fn fake_date(idx: usize) -> String {
    let day = idx % 28 + 1;
    let month = (idx / 28) % 12 + 1;
    let year = 2000 + idx / (28 * 12);
    format!("{year:04}-{month:02}-{day:02}")
}

/// Historique cyclique : le tirage i martèle le groupe (i % 10) de 5 boules.
/// draws[0] = le plus récent.
pub fn make_test_draws(n: usize) -> Vec<Draw> {
    (0..n)
        .map(|i| {
            let base = (i % 10) as u8;
            Draw {
                draw_id: format!("{i:04}"),
                day: if i % 2 == 0 { "MARDI" } else { "VENDREDI" }.to_string(),
                date: fake_date(n - i),
                balls: [
                    base * 5 + 1,
                    base * 5 + 2,
                    base * 5 + 3,
                    base * 5 + 4,
                    base * 5 + 5,
                ],
                stars: [base % 12 + 1, (base + 6) % 12 + 1],
            }
        })
        .collect()
}

/// Historique en deux régimes. Les 6 × `block` tirages récents martèlent
/// chacun un groupe disjoint de 5 boules, du groupe {26..30} (bloc le plus
/// récent) jusqu'au groupe {1..5} (6e bloc). Les `filler` tirages anciens
/// cyclent uniformément sur tout le pool. Un classement par fréquence n'est
/// donc stable qu'une fois les 6 blocs entièrement couverts.
pub fn make_regime_draws(block: usize, filler: usize) -> Vec<Draw> {
    let n = 6 * block + filler;
    (0..n)
        .map(|i| {
            let balls: [u8; 5] = if i < 6 * block {
                let b = (i / block) as u8;
                let lo = 26 - 5 * b;
                [lo, lo + 1, lo + 2, lo + 3, lo + 4]
            } else {
                let m = (i % 10) as u8;
                [m * 5 + 1, m * 5 + 2, m * 5 + 3, m * 5 + 4, m * 5 + 5]
            };
            let s = (i % 6) as u8;
            Draw {
                draw_id: format!("{i:04}"),
                day: if i % 2 == 0 { "MARDI" } else { "VENDREDI" }.to_string(),
                date: fake_date(n - i),
                balls,
                stars: [s + 1, s + 7],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates_strictly_decreasing() {
        let draws = make_test_draws(600);
        for pair in draws.windows(2) {
            assert!(
                pair[0].date > pair[1].date,
                "dates non décroissantes : {} puis {}",
                pair[0].date,
                pair[1].date
            );
        }
    }

    #[test]
    fn test_regime_blocks() {
        let draws = make_regime_draws(50, 150);
        assert_eq!(draws.len(), 450);
        // Bloc 0 : groupe {26..30}
        assert_eq!(draws[0].balls, [26, 27, 28, 29, 30]);
        assert_eq!(draws[49].balls, [26, 27, 28, 29, 30]);
        // Bloc 5 : groupe {1..5}
        assert_eq!(draws[299].balls, [1, 2, 3, 4, 5]);
        // Remplissage uniforme ensuite
        assert_eq!(draws[300].balls, [1, 2, 3, 4, 5]);
        assert_eq!(draws[301].balls, [6, 7, 8, 9, 10]);
    }
}
