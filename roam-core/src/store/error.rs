use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to open database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse schema {path}: {source}")]
    SchemaParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("failed to read source file {path} for table {table}: {source}")]
    SourceFile {
        table: String,
        path: PathBuf,
        source: csv::Error,
    },
    #[error("source file for table {table} has no column {column}")]
    MissingColumn { table: String, column: String },
    #[error("{table} line {line}: column {column} expects {expected}, got '{value}'")]
    Coercion {
        table: String,
        line: u64,
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("{table} line {line}: column {column} must not be empty")]
    NullValue {
        table: String,
        line: u64,
        column: String,
    },
    #[error("{table} line {line}: column {column} must be at least {minimum}, got '{value}'")]
    InvalidValue {
        table: String,
        line: u64,
        column: String,
        value: String,
        minimum: f64,
    },
    #[error("{table} line {line}: constraint violated: {source}")]
    Constraint {
        table: String,
        line: u64,
        source: rusqlite::Error,
    },
    #[error("plan store path not configured")]
    MissingStore,
    #[error("plan store schema not configured")]
    MissingSchema,
    #[error("plan store at {path} has not been built")]
    NotBuilt { path: PathBuf },
    #[error("plan store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Failures that move the store to ERROR regardless of the build policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::OpenDatabase { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
