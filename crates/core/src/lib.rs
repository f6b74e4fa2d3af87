//! Foundational types shared by every layer of the open/recover pipeline:
//! the closed-set error type and the monotonic id newtypes the recovery
//! invariants are stated over.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::{FileNumber, SequenceNumber};
