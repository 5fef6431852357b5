use thiserror::Error;

/// Errors surfaced by the router before or while building its graph.
///
/// Failing to find a path is never an error: routing escalates group
/// transparency and finally falls back to a direct bent path.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("shape '{0}' has no boundary (fewer than three non-collinear points)")]
    MissingBoundary(String),

    #[error("'{0}' has a non-finite or out-of-range coordinate")]
    InvalidCoordinate(String),

    #[error("duplicate shape id '{0}'")]
    DuplicateShape(String),

    #[error("unknown shape '{0}'")]
    UnknownShape(String),

    #[error("unknown port '{port}' on shape '{shape}'")]
    UnknownPort { shape: String, port: String },

    #[error("group '{group}' lists unknown child '{child}'")]
    UnknownChild { group: String, child: String },

    #[error("visibility graph inconsistency: {0}")]
    Inconsistent(String),
}

pub type RouterResult<T> = std::result::Result<T, RouterError>;
