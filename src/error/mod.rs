//! Error handling for catalog runs.
//!
//! Errors fall into three families that decide how a run reacts:
//! - [`ConnectionError`]: the database cannot be reached; the run is aborted
//! - [`OperationError`]: a single catalog operation failed; recorded as a failed outcome
//! - [`ArgumentError`]: configuration or catalog input is malformed; raised before connecting
//!
//! MongoDB driver errors are kept as-is and rendered through [`ErrorInfo`],
//! which extracts the server code, code name and message from the driver's
//! typed error kinds.
//!
//! # Example
//!
//! ```rust,no_run
//! use mongo_catalog::error::ErrorInfo;
//!
//! fn describe(err: &mongodb::error::Error) -> String {
//!     ErrorInfo::from_mongodb_error(err).summary()
//! }
//! ```

pub mod kinds;
pub mod mongo;

pub use kinds::{ArgumentError, CatalogError, ConnectionError, OperationError, Result};
pub use mongo::ErrorInfo;
