// Application Layer - Use Cases and Business Rules

pub mod config;
pub mod constants;
pub mod eligibility;
pub mod events;
pub mod priority;
pub mod queue;
pub mod snapshot;

// Re-exports
pub use config::{QueueConfig, ResetPassphrase};
pub use events::{EventSubscriber, QueueEvent};
pub use priority::{PrioritySorter, QueueTier};
pub use queue::{CheckInOutcome, QueueService, RegistrationForm};
