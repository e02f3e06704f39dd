use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] stetho_oauth::Error),

    #[error("failed to write {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("PCM data must hold whole 16-bit samples, got {0} bytes")]
    OddPcmLength(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
