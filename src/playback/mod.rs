pub mod coordinator;
pub mod engine;
pub mod events;
pub mod sync;

pub use coordinator::{combine, Coordinator};
pub use engine::{ReplaySession, SessionCommand};
pub use events::{EventBus, ReplayEvent};
pub use sync::{DriftCorrector, DRIFT_THRESHOLD_MS};
