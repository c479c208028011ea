//! Error kinds shared by the repertoire crates.

/// Errors raised while building or querying repertoire data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepError {
    #[error("Malformed clonotype record {record}: {message}")]
    Parse { record: usize, message: String },

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Index {index} is out of bounds for a container of size {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Unknown property for symbol '{0}'")]
    MissingProperty(char),

    #[error("Clonotype {cdr3nt} is not coding")]
    NotCoding { cdr3nt: String },

    #[error("Illegal state: {0}")]
    IllegalState(&'static str),
}

pub type Result<T, E = RepError> = std::result::Result<T, E>;

impl RepError {
    pub fn parse(record: usize, message: impl ToString) -> Self {
        RepError::Parse {
            record,
            message: message.to_string(),
        }
    }

    pub fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(RepError::IndexOutOfBounds { index, len })
        }
    }
}
