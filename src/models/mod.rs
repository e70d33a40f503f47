pub mod form;
pub mod pain_point;
pub mod snapshot;
pub mod submission;

pub use form::*;
pub use pain_point::*;
pub use snapshot::*;
pub use submission::*;
