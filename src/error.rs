use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while loading, reading or transforming a trajectory.
///
/// Every one of these is fatal to the iteration that produced it. Iterators yield the error once
/// and then stop.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An argument that can never be valid, such as an empty list of files or a zero chunk size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A frame range that does not fit the frames that are actually available.
    #[error("range error: {0}")]
    Range(String),

    /// A mask that cannot be resolved, resolves to nothing, or does not fit a frame.
    #[error("selection error: {0}")]
    Selection(String),

    /// The backing file could not be opened or read.
    #[error("could not read '{}': {source}", path.display())]
    SourceIo {
        path: PathBuf,
        // Held in an `Arc` so that the error can be handed to every fan-out view.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The backing file was readable, but its contents are not a valid trajectory.
    #[error("malformed file '{}' at line {line}: {message}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Frames, selections or topologies with incompatible numbers of atoms.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::SourceIo {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn format(path: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            line,
            message: message.into(),
        }
    }
}
