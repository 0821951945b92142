//! Disruptive events: generation, lifecycle and effects

pub mod dispatcher;
pub mod factory;
pub mod kinds;
pub mod scheduler;

pub use dispatcher::{DispatchOutcome, EventDispatcher, Observer, Phase};
pub use factory::EventFactory;
pub use kinds::{Event, EventKind};
pub use scheduler::{EventNotice, EventScheduler, SchedulerOutcome};
