//! Event bus for planning progress
//!
//! The workflow emits a [`PlanEvent`] at every phase transition, fetch
//! result and coordinator decision. Consumers subscribe to the bus: the CLI
//! prints colored progress lines and the [`EventLogger`] keeps a JSONL
//! history per trip.
//!
//! ```text
//!  WorkflowController ──emit──▶ EventBus (tokio broadcast) ──▶ CLI progress
//!                                                          └─▶ EventLogger (.jsonl)
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, default_runs_dir, read_trip_events, spawn_event_logger};
pub use types::{EventLogEntry, PlanEvent};
