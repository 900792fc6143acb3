pub mod lifecycle;
pub mod sinks;
pub mod store;

pub use lifecycle::*;
pub use sinks::*;
pub use store::{PgScheduleStore, ScheduleStore};
