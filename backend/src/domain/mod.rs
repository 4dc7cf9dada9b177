//! Domain services and primitives.
//!
//! Public surface:
//! - [`backup`]: dump exporter and dump directory management.
//! - [`mirror`]: remote-to-local table mirror.
//! - [`schedule`]: wall-clock schedules and the job driver.
//! - [`ports`]: traits implemented by outbound adapters.
//! - [`Error`] / [`ErrorCode`]: the error payload crossing into HTTP.

pub mod backup;
pub mod error;
pub mod mirror;
pub mod ports;
pub mod schedule;

pub use self::error::{Error, ErrorCode, ErrorValidationError};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use pos_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::not_found("no such backup"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
