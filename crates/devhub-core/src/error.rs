//! Error types for DevHub core.

use thiserror::Error;

/// Core error type for hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),

    #[error("Rollback error: {0}")]
    Rollback(#[from] RollbackError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Broker admin error: {0}")]
    Admin(#[from] AdminError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Device specification errors, terminal for a single connection only.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("numeric field `{0}` must declare both min and max")]
    MissingRange(String),

    #[error("field `{field}`: min {min} is greater than max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },
}

/// Saga step, doubling as the name of the resource it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    DeviceRecord,
    BrokerCredential,
    AclPolicy,
}

impl std::fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RegistrationStep::DeviceRecord => "device record",
            RegistrationStep::BrokerCredential => "broker credential",
            RegistrationStep::AclPolicy => "ACL policy",
        };
        write!(f, "{}", name)
    }
}

/// A resource a compensation failed to remove.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanedResource {
    pub resource: RegistrationStep,
    pub cause: String,
}

/// A compensation failed to undo a committed step.
///
/// Carried up instead of swallowed: the orphan list is the only record of
/// broker/store state that now needs operator cleanup.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("rollback for device {client_id} incomplete, orphaned: {}", format_orphans(.orphaned))]
pub struct RollbackError {
    pub client_id: String,
    pub orphaned: Vec<OrphanedResource>,
}

fn format_orphans(orphaned: &[OrphanedResource]) -> String {
    orphaned
        .iter()
        .map(|o| format!("{} ({})", o.resource, o.cause))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Registration saga errors.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid device specification: {0}")]
    Specification(#[from] ValidationError),

    #[error("{step} step failed: {cause}")]
    Step { step: RegistrationStep, cause: String },

    #[error("{step} step failed: {cause}; {rollback}")]
    StepUnrecovered {
        step: RegistrationStep,
        cause: String,
        rollback: RollbackError,
    },
}

impl RegistrationError {
    /// The saga step the failure originated in, if any.
    pub fn failed_step(&self) -> Option<RegistrationStep> {
        match self {
            RegistrationError::Specification(_) => None,
            RegistrationError::Step { step, .. } => Some(*step),
            RegistrationError::StepUnrecovered { step, .. } => Some(*step),
        }
    }
}

/// Onboarding handshake errors.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("could not reach device endpoint {endpoint}: {cause}")]
    Endpoint { endpoint: String, cause: String },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("device declined the credential payload")]
    Declined,

    #[error("device confirmation was malformed: {0}")]
    MalformedConfirmation(String),

    #[error("no confirmation from device within {0}s")]
    ConfirmationTimeout(u64),

    #[error("connection to device lost: {0}")]
    ConnectionLost(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{cause}; {rollback}")]
    Unrecovered {
        cause: Box<OnboardingError>,
        rollback: RollbackError,
    },
}

/// Command transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MQTT connection failed: {0}")]
    Connection(String),

    #[error("no confirmation on {topic} within {seconds}s")]
    Timeout { topic: String, seconds: u64 },

    #[error("device rejected command: {0}")]
    Rejected(String),

    #[error("unusable confirmation payload: {0}")]
    Payload(String),
}

/// Control-path errors.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Device not found: {0}")]
    UnknownDevice(String),

    #[error("Device {device} has no field `{field}`")]
    InvalidField { device: String, field: String },

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("device did not confirm update of `{field}`: {source}")]
    Connection {
        field: String,
        #[source]
        source: TransportError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Persistence store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Invalid device id: {0}")]
    InvalidId(String),

    #[error("Device {device} has no field `{field}`")]
    FieldNotFound { device: String, field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broker admin API errors.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("broker admin request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("broker admin refused to {action}: HTTP {status}")]
    Api { action: &'static str, status: u16 },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, HubError>;
