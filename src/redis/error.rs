//! Command error taxonomy
//!
//! Four classes reach the caller:
//! - validation (`WrongType`, `IndexOutOfRange`, `InvalidScore`): nothing was staged
//! - not found (`NoSuchKey`): the command needs an existing key
//! - consistency (`Consistency`): the persisted structure is broken; fatal
//! - store (`Store`): the engine failed; propagated verbatim

use super::meta::KeyType;
use crate::store::StoreError;

#[derive(Debug)]
pub enum CommandError {
    /// Operation against a key holding the wrong kind of value
    WrongType {
        key: Vec<u8>,
        expected: KeyType,
        actual: KeyType,
    },
    /// Index outside the range allowed by the operation
    IndexOutOfRange { index: i64, length: u64 },
    /// Score that cannot take part in a total order (NaN)
    InvalidScore(f64),
    /// The operation requires an existing key
    NoSuchKey(Vec<u8>),
    /// Broken links, length/chain mismatch or an undecodable record
    Consistency(String),
    /// Underlying store failure
    Store(StoreError),
}

impl CommandError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CommandError::WrongType { .. }
                | CommandError::IndexOutOfRange { .. }
                | CommandError::InvalidScore(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CommandError::NoSuchKey(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Consistency(_))
    }

    pub(crate) fn consistency(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(fault = %msg, "consistency fault");
        CommandError::Consistency(msg)
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::WrongType {
                key,
                expected,
                actual,
            } => write!(
                f,
                "WRONGTYPE key '{}' holds {} but the operation expects {}",
                String::from_utf8_lossy(key),
                actual,
                expected
            ),
            CommandError::IndexOutOfRange { index, length } => {
                write!(f, "index {} out of range for length {}", index, length)
            }
            CommandError::InvalidScore(score) => write!(f, "invalid score: {}", score),
            CommandError::NoSuchKey(key) => {
                write!(f, "no such key '{}'", String::from_utf8_lossy(key))
            }
            CommandError::Consistency(msg) => write!(f, "consistency fault: {}", msg),
            CommandError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Store(e)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let wrong = CommandError::WrongType {
            key: b"k".to_vec(),
            expected: KeyType::List,
            actual: KeyType::String,
        };
        assert!(wrong.is_validation());
        assert!(!wrong.is_fatal());
        assert!(wrong.to_string().starts_with("WRONGTYPE"));

        assert!(CommandError::IndexOutOfRange { index: 3, length: 3 }.is_validation());
        assert!(CommandError::InvalidScore(f64::NAN).is_validation());
        assert!(CommandError::NoSuchKey(b"k".to_vec()).is_not_found());
        assert!(CommandError::Consistency("x".into()).is_fatal());

        let store = CommandError::from(StoreError::Unavailable("closed".into()));
        assert!(!store.is_validation() && !store.is_not_found() && !store.is_fatal());
    }
}
