//! Mock collaborators for engine tests.

mod router;
mod storage;
mod transport;

pub use router::Router;
pub use storage::Storage;
pub use transport::{Behavior, Transport};
