use fenetre_db::models::{Draw, Pool};

use crate::error::{EngineError, Result};

/// Vue ordonnée de l'historique : draws[0] = tirage le plus récent.
/// Les dates sont au format ISO (YYYY-MM-DD), strictement décroissantes.
#[derive(Debug, Clone)]
pub struct DrawSeries {
    draws: Vec<Draw>,
}

impl DrawSeries {
    pub fn new(draws: Vec<Draw>) -> Result<Self> {
        for pair in draws.windows(2) {
            if pair[0].date <= pair[1].date {
                return Err(EngineError::InvalidSeries {
                    detail: format!(
                        "dates non strictement décroissantes : {} puis {}",
                        pair[0].date, pair[1].date
                    ),
                });
            }
        }
        Ok(Self { draws })
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn as_slice(&self) -> &[Draw] {
        &self.draws
    }

    /// Les `n` tirages les plus récents.
    pub fn window(&self, n: usize) -> Result<&[Draw]> {
        self.window_at(0, n)
    }

    /// `n` tirages à partir de la position `offset` (0 = le plus récent).
    pub fn window_at(&self, offset: usize, n: usize) -> Result<&[Draw]> {
        let end = offset
            .checked_add(n)
            .ok_or(EngineError::InsufficientHistory {
                requested: usize::MAX,
                available: self.draws.len(),
            })?;
        if end > self.draws.len() {
            return Err(EngineError::InsufficientHistory {
                requested: end,
                available: self.draws.len(),
            });
        }
        Ok(&self.draws[offset..end])
    }

    /// Série tronquée : on retire les `offset` tirages les plus récents,
    /// comme si l'analyse avait été lancée à une date antérieure.
    pub fn tail(&self, offset: usize) -> Result<DrawSeries> {
        if offset > self.draws.len() {
            return Err(EngineError::InsufficientHistory {
                requested: offset,
                available: self.draws.len(),
            });
        }
        Ok(DrawSeries {
            draws: self.draws[offset..].to_vec(),
        })
    }

    /// Retard d'un numéro : position du premier tirage le contenant parmi
    /// les `window` plus récents, plafonné à `window` s'il n'apparaît pas.
    pub fn gap_of(&self, number: u8, pool: Pool, window: usize) -> Result<usize> {
        let draws = self.window(window)?;
        for (t, draw) in draws.iter().enumerate() {
            if pool.numbers_from(draw).contains(&number) {
                return Ok(t);
            }
        }
        Ok(window)
    }
}
