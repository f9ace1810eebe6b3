use crate::FileKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RMergeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No input files were provided")]
    EmptyBatch,

    #[error("No data produced: none of the {files} input file(s) could be read")]
    NoData { files: usize },

    #[error("Mixed batch: {file} looks like {found} data but the batch is {expected}")]
    MixedBatch {
        file: String,
        expected: FileKind,
        found: FileKind,
    },

    #[error("Output error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, RMergeError>;

/// Why a single input file was skipped. Never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no supported encoding could decode the file (tried {tried})")]
    Undecodable { tried: String },

    #[error("missing header row")]
    MissingHeader,

    #[error("malformed table ({encoding}): {message}")]
    Malformed { encoding: String, message: String },
}
