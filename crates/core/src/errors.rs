use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("record key is empty after normalization")]
    EmptyKey,
    #[error("value for `{key}` is empty")]
    EmptyValue { key: String },
    #[error("pmf score {0} is outside 1..=5")]
    InvalidPmfScore(u8),
    #[error("unknown event kind `{0}`")]
    UnknownEventKind(String),
    #[error("unknown reaction action `{0}`")]
    UnknownReactionAction(String),
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("chat transport failure: {0}")]
    Transport(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("`{command}` is restricted to the bot owner")]
    OwnerOnly { command: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to show in the chat.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "⚠️ No pude procesarlo. Revisa el formato e inténtalo de nuevo.",
            Self::Forbidden { .. } => "Comando solo para admin.",
            Self::ServiceUnavailable { .. } => {
                "⚠️ El almacenamiento no está disponible ahora mismo. Inténtalo en un momento."
            }
            Self::Internal { .. } => "⚠️ Algo ha fallado por mi parte.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::OwnerOnly { command } => {
                Self::Forbidden { message: format!("{command} is owner-only"), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Transport(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
