use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegexListError {
    #[error("error parsing regexp {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("the request does not carry an object")]
    MissingObject,

    #[error("the request does not carry the previous version of the object")]
    MissingOldObject,

    #[error("failed to decode {kind}: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum AccessControlError {
    #[error("invalid user info annotation: {0}")]
    InvalidAnnotation(#[source] serde_json::Error),

    #[error("user {user} with groups [{groups}] is not allowed to set user annotation {annotation}")]
    NotAllowed {
        user: String,
        groups: String,
        annotation: &'static str,
    },
}

/// Every reason the mutation webhook denies a request for
#[derive(Error, Debug)]
pub enum MutationError {
    #[error("the admission request is empty")]
    EmptyRequest,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    AccessControl(#[from] AccessControlError),

    #[error("unauthorized pod mutation: user {user} removed or did not provide the user info annotation")]
    UnauthorizedPodMutation { user: String },
}

impl MutationError {
    /// HTTP status code reported inside of the admission response
    pub fn code(&self) -> u16 {
        match self {
            MutationError::EmptyRequest
            | MutationError::Decode(_)
            | MutationError::AccessControl(AccessControlError::InvalidAnnotation(_)) => 400,
            MutationError::AccessControl(AccessControlError::NotAllowed { .. })
            | MutationError::UnauthorizedPodMutation { .. } => 403,
        }
    }
}

/// Failures talking to the configuration validation service. None of them
/// is surfaced to the requester: the validation fails open.
#[derive(Error, Debug)]
pub enum ValidationServiceError {
    #[error("cannot reach the validation service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("validation service answered with status {0}")]
    UnexpectedStatus(u16),

    #[error("cannot read the validation service response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("malformed validation service response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// The validation service rejected the configuration, the reason is
    /// reported verbatim
    #[error("{0}")]
    Denied(String),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read admission settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse admission settings: {0}")]
    Yaml(#[source] serde_yaml::Error),
}
