//! Error taxonomy: load-time configuration errors, row-local evaluation
//! errors, and run-aborting fatal errors.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems, all detected eagerly at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write configuration {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'output_columns' cannot be empty")]
    EmptyOutputColumns,

    #[error("column {position} 'name' cannot be empty")]
    EmptyColumnName { position: usize },

    #[error("duplicate output column name {name:?}")]
    DuplicateColumnName { name: String },

    #[error("column {name:?} width must be a positive number, got {width}")]
    InvalidWidth { name: String, width: f64 },

    #[error("column {name:?} sets both 'date_format' and 'date_range_format'")]
    ConflictingDateFormats { name: String },

    #[error("header formatting '{field}' must be a 6-digit hex color, got {value:?}")]
    InvalidColor { field: &'static str, value: String },

    #[error("'freeze_panes' {value:?} is not a valid cell reference (e.g. 'A2', 'B3')")]
    InvalidFreezePanes { value: String },

    #[error("'freeze_panes' column {name:?} is not an output column")]
    UnknownFreezeColumn { name: String },
}

/// Row-local failure evaluating one output cell.
///
/// Never escapes the row transformer: the cell is blanked and the error is
/// recorded as a [`crate::spec::SpecRowWarning`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unresolved column reference {name:?}")]
    UnresolvedReference { name: String },

    #[error("formula syntax error at offset {offset}: {message}")]
    FormulaSyntax { offset: usize, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("operand {name:?} is not numeric: {value:?}")]
    NonNumericOperand { name: String, value: String },

    #[error("formula result {value} is not a finite number")]
    NonFiniteResult { value: f64 },
}

/// Input problems that make a processing run impossible.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("input table has no columns")]
    EmptyHeader,

    #[error("input table has duplicate column name {name:?}")]
    DuplicateInputColumn { name: String },
}
