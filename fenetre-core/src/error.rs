use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// La fenêtre demandée (comparaison à +Δ incluse) dépasse l'historique.
    #[error("historique insuffisant : {requested} tirages demandés, {available} disponibles")]
    InsufficientHistory { requested: usize, available: usize },

    #[error("bornes de recherche invalides : {detail}")]
    InvalidBounds { detail: String },

    #[error("série de tirages invalide : {detail}")]
    InvalidSeries { detail: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
