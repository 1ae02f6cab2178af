/// Errors that can occur in the data layer.
///
/// The variants follow the failure signals a repository contract exposes:
/// construction-time validation (`NullArgument`, `InvalidArgument`), mapping
/// errors for attributes that do not exist (`Mapping`), identifier conflicts
/// on ACID providers (`EntityExists`), and contract violations on method
/// declarations (`UnsupportedOperation`).
#[derive(Debug)]
pub enum DataError {
    /// A required argument was absent at construction time.
    NullArgument(&'static str),
    /// An argument was present but outside its legal range.
    InvalidArgument(String),
    /// A query references an attribute the entity does not have.
    Mapping(String),
    /// An entity with the same identifier already exists.
    EntityExists(String),
    /// A repository method declaration breaks the operation contract.
    UnsupportedOperation(String),
    /// A keyset cursor cannot be applied to the request.
    InvalidCursor(String),
    /// A derived method name or query string could not be parsed or bound.
    Query(String),
    NotFound(String),
    /// A single result was required but nothing matched.
    EmptyResult(String),
    /// A single result was required but several entities matched.
    NonUniqueResult(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by provider crates (e.g. `strata-sqlx`) to wrap driver-specific
    /// errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn query(msg: impl Into<String>) -> Self {
        DataError::Query(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        DataError::Mapping(msg.into())
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NullArgument(arg) => write!(f, "Null argument: {arg} is required"),
            DataError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            DataError::Mapping(msg) => write!(f, "Mapping error: {msg}"),
            DataError::EntityExists(msg) => write!(f, "Entity exists: {msg}"),
            DataError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {msg}"),
            DataError::InvalidCursor(msg) => write!(f, "Invalid cursor: {msg}"),
            DataError::Query(msg) => write!(f, "Query error: {msg}"),
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::EmptyResult(msg) => write!(f, "Empty result: {msg}"),
            DataError::NonUniqueResult(msg) => write!(f, "Non-unique result: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Other(err.to_string())
    }
}

impl From<crate::config::ConfigError> for DataError {
    fn from(err: crate::config::ConfigError) -> Self {
        DataError::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_argument() {
        let err = DataError::NullArgument("property");
        assert_eq!(err.to_string(), "Null argument: property is required");
    }

    #[test]
    fn test_database_source_is_preserved() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = DataError::database(io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk gone"));
    }
}
