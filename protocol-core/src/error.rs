//! Library-level errors: fallible paths that are not themselves protocol
//! `Value`s (AST validation, program loading). Distinct from `RuntimeError`,
//! which is a `Value` a running program can produce and propagate.

use thiserror::Error;

use crate::ast::ValidateError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("protocol AST failed validation:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    InvalidProtocol(Vec<ValidateError>),

    #[error("failed to parse program definition: {0}")]
    ProgramFormat(#[from] serde_yaml::Error),

    #[error("collection error: {0}")]
    Collection(#[from] crate::collection::CollectionError),
}
