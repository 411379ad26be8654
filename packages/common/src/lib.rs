//! Shared building blocks for the quire document model: the typed error,
//! its result alias and the event bus embedded by stateful entities.

pub mod emitter;
pub mod error;
pub mod result;

pub use emitter::*;
pub use error::*;
pub use result::*;
