//! Error types for the Polar BLE bridge
//! Command failures are local to the command that raised them; none of these
//! errors ever touches the device registry.

use thiserror::Error;

/// A rejection reported by the native SDK, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NativeError {
    /// Platform error code, when the native side supplies one.
    pub code: Option<String>,
    /// Human readable description from the native side.
    pub message: String,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the bridge to its callers.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A command was issued before `configure` completed.
    #[error("Polar BLE API is not configured, call configure first")]
    Unconfigured,

    /// The native command itself rejected.
    #[error("native command `{command}` failed: {source}")]
    Native {
        command: &'static str,
        #[source]
        source: NativeError,
    },

    /// The native constant table has no entry for the derived wire key.
    #[error("no wire constant `{key}` exported for event `{name}`")]
    UnknownEventName { name: String, key: String },

    /// The constant exists but does not hold an event name.
    #[error("constant `{key}` is not a string event name")]
    InvalidConstant { key: String },

    /// A feature name that the native constant table does not export.
    #[error("unknown feature `{0}`")]
    UnknownFeature(String),

    /// The event dispatcher task is no longer running.
    #[error("event dispatcher has stopped")]
    DispatcherClosed,
}

impl BridgeError {
    pub(crate) fn native(command: &'static str, source: NativeError) -> Self {
        Self::Native { command, source }
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
