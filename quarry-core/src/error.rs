use uuid::Uuid;

/// Root causes raised by the core.
///
/// They travel inside [`crate::Error`] (usually wrapped with the query
/// diagnostics as context) and can be recovered with `error.downcast_ref::<ErrorKind>()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// The [`crate::Database`] has no connection factory and no transaction supplied one.
    #[error(
        "No connection factory is configured, use `Database::with_factory` or run the query with an explicit connection"
    )]
    MissingConnectionFactory,
    /// Rows were requested from a query that has no row mapper.
    #[error("You must provide a row mapper to this query by calling `map(|row| ...)`")]
    MissingMapper,
    /// Rows were requested but the statement did not produce a result set (DML).
    #[error("Rows were requested but the query returned no result set")]
    NoResultSet,
    /// A single row was required but the result set was empty.
    #[error("The query returned no rows")]
    EmptyResult,
    /// A batch was executed without entities.
    #[error("Batch expression with no entities")]
    EmptyBatch,
    /// Parameter at the position is an untyped NULL without handler or SQL type.
    #[error("Parameter #{0} is null, you must provide a handler or sql type")]
    NullParameter(usize),
    /// Parameter at the position has a type with no built-in binding and no handler.
    #[error("Don't know how to handle parameter #{position} of type {type_name}")]
    UnsupportedParameter { position: usize, type_name: &'static str },
    /// The expression tree cannot be rendered into a valid statement.
    #[error("{0}")]
    Structural(String),
    /// The transaction was marked rollback-only by a failing participant and did not commit.
    #[error("Transaction {0} was rolled back because one of its participants failed")]
    TransactionRolledBack(Uuid),
    /// The connection was already closed.
    #[error("The connection is closed")]
    ConnectionClosed,
}

impl ErrorKind {
    /// Find the kind at the root of the error, if any.
    pub fn of(error: &crate::Error) -> Option<&ErrorKind> {
        error.downcast_ref::<ErrorKind>()
    }
}
