use std::path::{Path, PathBuf};

use thiserror::Error;

/// A persisted collection could not be turned into a usable catalog.
///
/// Fatal to startup. Every variant carries the offending file so the caller
/// can offer to delete or reset it.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unable to read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },
    #[error("malformed configuration in {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },
    #[error("profile '{profile}' in {} references unknown app '{app}'", .path.display())]
    UnknownApp {
        path: PathBuf,
        profile: String,
        app: String,
    },
    #[error("app '{app}' is defined more than once ({})", .path.display())]
    DuplicateApp { path: PathBuf, app: String },
    #[error("unable to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

impl ConfigurationError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigurationError::Unreadable { path, .. }
            | ConfigurationError::Malformed { path, .. }
            | ConfigurationError::UnknownApp { path, .. }
            | ConfigurationError::DuplicateApp { path, .. }
            | ConfigurationError::Write { path, .. } => path,
        }
    }
}

/// An argument value does not satisfy its declared type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown argument type '{0}'")]
    UnknownType(String),
    #[error("'{value}' is not a boolean (expected True or False)")]
    NotABool { value: String },
    #[error("'{value}' is not an integer")]
    NotAnInteger { value: String },
    #[error("'{value}' is not a number")]
    NotAFloat { value: String },
    #[error("{value} is outside {min}..{max}")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },
    #[error("'{value}' is not one of {}", .choices.join(", "))]
    NotAChoice { value: String, choices: Vec<String> },
}

/// Command-line assembly could not produce a complete invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("argument '{argument}' requires a value")]
    MissingRequired { argument: String },
    #[error("argument '{argument}' is invalid: {source}")]
    Invalid {
        argument: String,
        #[source]
        source: ValidationError,
    },
}

/// An app could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{app} needs configuration: {reason}")]
    ConfigurationRequired { app: String, reason: String },
    #[error("{app} has an invalid configuration: {source}")]
    Invalid {
        app: String,
        #[source]
        source: AssemblyError,
    },
    #[error("{app} is busy ({state})")]
    Busy { app: String, state: String },
    #[error("{app} is not available: {reason}")]
    Unavailable { app: String, reason: String },
    #[error("failed to start {app}: {message}")]
    Spawn { app: String, message: String },
}

/// Interactive profile mutations that were refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),
    #[error("profile '{profile}' has no app '{app}'")]
    UnknownApp { profile: String, app: String },
    #[error("'{app}' is required by profile '{profile}' and cannot be untagged")]
    Required { profile: String, app: String },
}

pub type ConfigurationResult<T> = std::result::Result<T, ConfigurationError>;
