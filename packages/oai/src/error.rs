//! Error types for the harvesting engine.
//!
//! `OaiError` is the protocol error vocabulary: every variant maps onto an
//! OAI-PMH `<error code="...">` element and is never surfaced as a transport
//! failure. Collaborator failures (index, token storage, renderers) have their
//! own error types and are converted at the engine boundary.

use thiserror::Error;

/// Protocol-level error returned to harvesters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OaiError {
    /// Missing or unknown verb.
    #[error("{0}")]
    BadVerb(String),

    /// A required argument is missing, repeated, or not legal for the verb.
    #[error("{0}")]
    BadArgument(String),

    /// The token name is invalid, unknown, expired, corrupt, or stale.
    #[error("The value of the resumptionToken argument is invalid or expired")]
    BadResumptionToken,

    /// The metadata format is unknown or not enabled.
    #[error("The metadata format identified by the value given for the metadataPrefix argument is not supported by the item or by the repository")]
    CannotDisseminateFormat,

    /// No record exists for the identifier.
    #[error("The value of the identifier argument is unknown or illegal in this repository")]
    IdDoesNotExist,

    /// The list query matched zero documents.
    #[error("The combination of the values of the from, until, set and metadataPrefix arguments results in an empty list")]
    NoRecordsMatch,

    /// No metadata formats are available.
    #[error("There are no metadata formats available for the specified item")]
    NoMetadataFormats,

    /// The repository does not support sets.
    #[error("The repository does not support sets")]
    NoSetHierarchy,
}

impl OaiError {
    /// The OAI-PMH error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadVerb(_) => "badVerb",
            Self::BadArgument(_) => "badArgument",
            Self::BadResumptionToken => "badResumptionToken",
            Self::CannotDisseminateFormat => "cannotDisseminateFormat",
            Self::IdDoesNotExist => "idDoesNotExist",
            Self::NoRecordsMatch => "noRecordsMatch",
            Self::NoMetadataFormats => "noMetadataFormats",
            Self::NoSetHierarchy => "noSetHierarchy",
        }
    }

    /// Whether the `<request>` element may echo the request arguments.
    ///
    /// The protocol forbids echoing attributes for `badVerb` and
    /// `badArgument` responses.
    #[must_use]
    pub fn echoes_arguments(&self) -> bool {
        !matches!(self, Self::BadVerb(_) | Self::BadArgument(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the schema.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, OaiError>;
