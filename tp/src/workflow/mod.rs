//! Planning workflow
//!
//! [`WorkflowController`] runs the graph for one [`TripState`];
//! [`Planner`] wraps it with validation, result assembly and persistence.
//!
//! [`TripState`]: crate::domain::TripState

mod controller;
mod phase;
mod planner;

pub use controller::WorkflowController;
pub use phase::{Phase, PhaseMachine};
pub use planner::{Planner, Services};
