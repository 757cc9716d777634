pub mod errors;
pub mod filters;
pub mod generate;
pub mod models;
pub mod scheduler;
pub mod share;
pub mod stats;
pub mod store;
pub mod study;
pub mod timer;

pub use errors::*;
pub use filters::*;
pub use models::*;
pub use scheduler::*;
pub use stats::*;
pub use store::{Store, StoreBackend, StoreKey, SubscriptionId};
pub use study::StudyService;
pub use timer::driver::{TimerDriver, TimerEvent};
pub use timer::{PomodoroTimer, TickOutcome, TimerMode, TimerSnapshot, Transition};
