//! The table of optional plugin extras and the version constraints each one
//! pins, read from a `pyproject`-style `[project.optional-dependencies]` table.

mod manifest;
mod requirement;

pub use manifest::{normalize_name, ExtrasManifest};
pub use requirement::{Requirement, Version};

#[derive(Debug, thiserror::Error)]
pub enum ExtrasError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("manifest has no [project.optional-dependencies] table")]
    MissingTable,
    #[error("invalid extra name {0:?}")]
    InvalidName(String),
    #[error("extra {extra:?} must list exactly one dependency, found {count}")]
    DependencyCount { extra: String, count: usize },
    #[error("extra {extra:?} has invalid specifier {specifier:?}: {reason}")]
    InvalidSpecifier {
        extra: String,
        specifier: String,
        reason: String,
    },
    #[error("extra {name:?} duplicates {existing:?}")]
    Duplicate { name: String, existing: String },
    #[error("unknown extra {0:?}")]
    UnknownExtra(String),
}

pub type Result<T> = std::result::Result<T, ExtrasError>;
