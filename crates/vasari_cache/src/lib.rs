//! Request coalescing for Vasari.
//!
//! [`InFlightRegistry`] runs at most one computation per key at a time and
//! hands its outcome to every caller that asked for the same key while it was
//! running.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod in_flight;

pub use in_flight::InFlightRegistry;
pub use vasari_error::{CoalesceError, CoalesceErrorKind};
