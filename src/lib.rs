pub mod calculations;
pub mod calendar;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod manager;
pub mod shared;
pub mod snapshot;
pub mod task;
pub mod time_unit;

pub use calculations::{CriticalScope, DateRange};
pub use calendar::{AlwaysWorkingCalendar, Calendar, DayType, WorkCalendar, WorkCalendarConfig};
pub use config::EngineConfig;
pub use dependency::{Collision, ConstraintType, Hardness, TaskDependency, Variation};
pub use diagnostics::{NoopObserver, RecordingObserver, ScheduleEvent, ScheduleObserver};
pub use error::{Result, ScheduleError};
pub use hierarchy::{ROOT_TASK_ID, TaskHierarchy};
pub use manager::{NewTask, TaskManager};
pub use shared::SharedProject;
pub use snapshot::ScheduleSnapshot;
pub use task::{ResourceAssignment, Task, TaskActivity, TaskId};
pub use time_unit::{TimeDuration, TimeUnit};
