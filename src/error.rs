//! Unified error model for parsing, validation and plan translation.
//! Every public entry point returns `AppResult<T>`; the `code` field is a stable,
//! machine-readable identifier and `sqlstate()` maps it onto the SQL standard classes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Syntax { code: String, message: String },
    Validation { code: String, message: String },
    NotFound { code: String, message: String },
    Unsupported { code: String, message: String },
    Plan { code: String, message: String },
    Config { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Syntax { code, .. }
            | AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Unsupported { code, .. }
            | AppError::Plan { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Syntax { message, .. }
            | AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Unsupported { message, .. }
            | AppError::Plan { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn syntax<S: Into<String>>(code: S, msg: S) -> Self { AppError::Syntax { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unsupported<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unsupported { code: code.into(), message: msg.into() } }
    pub fn plan<S: Into<String>>(code: S, msg: S) -> Self { AppError::Plan { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// SQLSTATE for this error. Validation errors are refined by their code.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            AppError::Syntax { .. } => "42601",                       // syntax_error
            AppError::NotFound { code, .. } if code == "unknown_column" => "42703", // undefined_column
            AppError::NotFound { code, .. } if code == "unknown_function" => "42883", // undefined_function
            AppError::NotFound { .. } => "42P01",                     // undefined_table
            AppError::Validation { code, .. } => match code.as_str() {
                "ambiguous_column" => "42702",
                "type_mismatch" => "42804",
                "not_grouped" | "invalid_aggregate" => "42803",
                "duplicate_alias" => "42712",
                "conformance" => "42601",
                _ => "42000",
            },
            AppError::Unsupported { .. } => "0A000",                  // feature_not_supported
            AppError::Config { .. } => "F0000",                       // config_file_error
            AppError::Io { .. } => "58030",                           // io_error
            AppError::Plan { .. } | AppError::Internal { .. } => "XX000", // internal_error
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Syntax { .. } | AppError::Validation { .. } | AppError::NotFound { .. } => 1,
            AppError::Unsupported { .. } | AppError::Plan { .. } => 3,
            AppError::Config { .. } | AppError::Io { .. } => 2,
            AppError::Internal { .. } => 70,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the original variant when the chain already carries an AppError
        if let Some(app) = err.downcast_ref::<AppError>() {
            return app.clone();
        }
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config { code: "invalid_json".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_mapping() {
        assert_eq!(AppError::syntax("syntax_error", "oops").sqlstate(), "42601");
        assert_eq!(AppError::not_found("unknown_table", "no t").sqlstate(), "42P01");
        assert_eq!(AppError::not_found("unknown_column", "no c").sqlstate(), "42703");
        assert_eq!(AppError::not_found("unknown_function", "no f").sqlstate(), "42883");
        assert_eq!(AppError::validation("ambiguous_column", "x").sqlstate(), "42702");
        assert_eq!(AppError::validation("type_mismatch", "x").sqlstate(), "42804");
        assert_eq!(AppError::validation("not_grouped", "x").sqlstate(), "42803");
        assert_eq!(AppError::validation("something_else", "x").sqlstate(), "42000");
        assert_eq!(AppError::unsupported("unsupported", "x").sqlstate(), "0A000");
        assert_eq!(AppError::internal("internal", "panic").sqlstate(), "XX000");
    }

    #[test]
    fn display_and_accessors() {
        let e = AppError::not_found("unknown_table", "Table 'emp' not found");
        assert_eq!(e.code_str(), "unknown_table");
        assert_eq!(e.message(), "Table 'emp' not found");
        assert_eq!(e.to_string(), "unknown_table: Table 'emp' not found");
    }

    #[test]
    fn anyhow_roundtrip_keeps_variant() {
        let original = AppError::validation("type_mismatch", "bad");
        let wrapped: anyhow::Error = original.clone().into();
        let back: AppError = wrapped.into();
        assert_eq!(back, original);

        let plain: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(plain.code_str(), "internal_error");
    }

    #[test]
    fn serializes_with_type_tag() {
        let e = AppError::syntax("syntax_error", "unexpected token");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "syntax");
        assert_eq!(v["code"], "syntax_error");
    }
}
