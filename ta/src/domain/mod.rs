//! Domain types for generated tasks
//!
//! A [`Task`] lives only as long as it takes to turn model output into a
//! ticket. Nothing here is persisted.

mod error;
mod priority;
mod task;

pub use error::DomainError;
pub use priority::Priority;
pub use task::{DUE_DATE_FORMAT, Task, parse_due_on};
