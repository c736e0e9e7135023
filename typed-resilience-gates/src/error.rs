//! Gate error types.

use thiserror::Error;

/// A gate refused to run the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The circuit breaker is open.
    #[error("CircuitBreaker '{name}' does not permit further calls")]
    CallNotPermitted {
        /// Circuit breaker name.
        name: String,
    },

    /// The bulkhead has no free slot.
    #[error("Bulkhead '{name}' is full and does not permit further calls")]
    BulkheadFull {
        /// Bulkhead name.
        name: String,
    },

    /// The rate limiter has no permit available.
    #[error("RateLimiter '{name}' does not permit further calls")]
    RequestNotPermitted {
        /// Rate limiter name.
        name: String,
    },
}

impl Rejection {
    /// Create a call-not-permitted rejection.
    pub fn call_not_permitted(name: impl Into<String>) -> Self {
        Self::CallNotPermitted { name: name.into() }
    }

    /// Create a bulkhead-full rejection.
    pub fn bulkhead_full(name: impl Into<String>) -> Self {
        Self::BulkheadFull { name: name.into() }
    }

    /// Create a request-not-permitted rejection.
    pub fn request_not_permitted(name: impl Into<String>) -> Self {
        Self::RequestNotPermitted { name: name.into() }
    }

    /// Name of the gate that rejected the call.
    pub fn gate_name(&self) -> &str {
        match self {
            Self::CallNotPermitted { name }
            | Self::BulkheadFull { name }
            | Self::RequestNotPermitted { name } => name,
        }
    }
}

/// Error of a guarded call: either the operation failed or the gate
/// rejected the call before it ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError<E> {
    /// The operation ran and returned this error.
    #[error("{0}")]
    Operation(E),

    /// The gate rejected the call; the operation never ran.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl<E> GuardError<E> {
    /// Check if the gate rejected the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Get the rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Operation(_) => None,
        }
    }

    /// Get the operation error, if the operation ran.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::Rejected(_) => None,
        }
    }

    /// Take the operation error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::Rejected(_) => None,
        }
    }

    /// Transform the operation error, keeping rejections as they are.
    pub fn map_operation<F, U>(self, f: F) -> GuardError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            Self::Operation(error) => GuardError::Operation(f(error)),
            Self::Rejected(rejection) => GuardError::Rejected(rejection),
        }
    }
}

/// Result type for guarded calls.
pub type GuardResult<T, E> = Result<T, GuardError<E>>;
