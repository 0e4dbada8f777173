//! User-facing alerting.
//!
//! [`AlertPresenter`] is the only part of the crate that interrupts the
//! user; everything else only produces records.

pub mod messages;
pub mod presenter;
pub mod surface;

pub use messages::MessageCatalog;
pub use presenter::{
    AlertPresenter, HandleOptions, HandleOutcome, PresentOptions, PresentOutcome, RetryCallback,
};
pub use surface::{ActionRole, AlertAction, AlertDialog, AlertSurface, LogSurface};
