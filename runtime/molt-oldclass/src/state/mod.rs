pub mod recursion;
pub mod runtime_state;

pub use recursion::{CompareMarker, CompareOp, ComparisonGuard};
pub use runtime_state::{CallCx, Runtime};
