pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("invalid NRRD: {0}")]
    InvalidNrrd(String),
    #[error("region '{0}' contains no values")]
    EmptyRegion(String),
    #[error("plotting failed: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn nrrd(message: impl Into<String>) -> Self {
        Self::InvalidNrrd(message.into())
    }

    pub fn shape(expected: &[usize], found: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    /// Flatten a drawing error; backend error types are generic, so only the message is kept.
    pub fn plot(error: impl std::fmt::Display) -> Self {
        Self::Plot(error.to_string())
    }
}
