//! Atomic document edits, their position maps, and the [`Transform`] builder
//! that composes them.

mod error;
mod map;
mod step;
mod transform;

pub use error::{StepError, StepResult};
pub use map::{MapRange, MapResult, Mappable, Mapping, StepMap};
pub use step::Step;
pub use transform::Transform;
