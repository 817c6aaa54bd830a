//! Passes that derive schedule state: forward propagation of dependency
//! bounds, containment bounds, completion roll-up and the critical path.

pub mod adjust_bounds;
pub mod completion;
pub mod critical_path;
pub mod scheduler;

pub use adjust_bounds::AdjustBounds;
pub use completion::CompletionAggregator;
pub use critical_path::{CriticalPath, CriticalScope};
pub use scheduler::{DateRange, Scheduler};
