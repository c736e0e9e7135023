//! # typed-resilience-gates
//!
//! Single-pass adapters that run a `Result`-returning operation through a
//! permission gate.
//!
//! The gates themselves (circuit breaker state machines, bulkhead slot
//! accounting, rate limiter refill) are provided by the caller through the
//! [`CircuitBreaker`], [`Bulkhead`] and [`RateLimiter`] traits. Each adapter
//! asks for permission, runs the operation at most once, reports completion,
//! and maps a refusal into [`GuardError::Rejected`].
//!
//! ## Example
//!
//! ```ignore
//! use typed_resilience_gates::{circuit_breaker, GuardError, Rejection};
//!
//! match circuit_breaker::execute(&breaker, || client.fetch(id)) {
//!     Ok(item) => render(item),
//!     Err(GuardError::Rejected(Rejection::CallNotPermitted { .. })) => serve_cached(id),
//!     Err(GuardError::Operation(err)) => report(err),
//!     Err(other) => report_rejection(other),
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bulkhead;
pub mod circuit_breaker;
pub mod error;
pub mod rate_limiter;

// Re-exports
pub use bulkhead::Bulkhead;
pub use circuit_breaker::CircuitBreaker;
pub use error::{GuardError, GuardResult, Rejection};
pub use rate_limiter::RateLimiter;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{Bulkhead, CircuitBreaker, GuardError, GuardResult, RateLimiter, Rejection};
}
