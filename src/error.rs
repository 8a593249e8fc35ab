use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported plan: {0}")]
    UnsupportedPlan(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("parameter type error: {0}")]
    ParameterType(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: u64, message: String },

    #[error("CSV line {0} exceeds the maximum line buffer size")]
    LineTooLong(u64),

    #[error("transaction aborted: {0}")]
    TransactionAbort(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
