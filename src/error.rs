use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid moveset for {species}: {reason}")]
    InvalidMoveset { species: String, reason: String },

    #[error("{species} resolves to CP {cp}, above the cap of {cap}")]
    CpCapExceeded { species: String, cp: u32, cap: u32 },

    #[error("Missing move data: {0}")]
    MissingMoveData(String),

    #[error("Missing species data: {0}")]
    MissingSpeciesData(String),

    #[error("Level {level} is not available for {species}")]
    InvalidLevel { species: String, level: f64 },

    #[error("{species} has no {form} form")]
    UnsupportedForm { species: String, form: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Ranking run cancelled after {0} iteration(s)")]
    Cancelled(usize),
}

impl Error {
    /// Fatal errors abort a whole ranking run; everything else only excludes
    /// the combatant or pair it was raised for.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Cancelled(_))
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
