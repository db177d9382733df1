use thiserror::Error;

use crate::store::StoreError;
use crate::variant::ParseError;

/// Terminal failures of a single apply run. None of them leave a partial write behind.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("malformed value '{literal}' for key '{key}'")]
    MalformedValue {
        key: String,
        literal: String,
        #[source]
        source: ParseError,
    },

    #[error("unknown settings location '{0}'")]
    UnknownLocation(String),

    #[error("unknown key '{key}' in '{location}'")]
    UnknownKey { location: String, key: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApplyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownSchema(location) => ApplyError::UnknownLocation(location),
            StoreError::UnknownKey { location, key } => ApplyError::UnknownKey { location, key },
            other => ApplyError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_split_by_kind() {
        let err: ApplyError = StoreError::UnknownSchema("org.example".to_string()).into();
        assert!(matches!(err, ApplyError::UnknownLocation(_)));

        let err: ApplyError = StoreError::UnknownKey {
            location: "org.example".to_string(),
            key: "k".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown key 'k' in 'org.example'");

        let err: ApplyError = StoreError::Backend("boom".to_string()).into();
        assert!(matches!(err, ApplyError::Store(_)));
        assert_eq!(err.to_string(), "settings backend error: boom");
    }
}
