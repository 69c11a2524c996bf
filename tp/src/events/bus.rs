//! Event Bus - pub/sub for planning progress
//!
//! The EventBus uses a tokio broadcast channel to deliver events to all
//! subscribers. The workflow emits; the CLI progress printer and the event
//! logger subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PlanEvent;
use crate::domain::{Category, Money};
use crate::workflow::Phase;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

pub struct EventBus {
    tx: broadcast::Sender<PlanEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: PlanEvent) {
        debug!(event_type = event.event_type(), trip_id = event.trip_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PlanEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one trip
    pub fn emitter_for(&self, trip_id: impl Into<String>) -> EventEmitter {
        let trip_id = trip_id.into();
        debug!(%trip_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: Some(self.tx.clone()),
            trip_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events for one trip without owning the bus
///
/// A detached emitter drops everything; it is used when nobody listens.
#[derive(Clone)]
pub struct EventEmitter {
    tx: Option<broadcast::Sender<PlanEvent>>,
    trip_id: String,
}

impl EventEmitter {
    pub fn detached(trip_id: impl Into<String>) -> Self {
        Self {
            tx: None,
            trip_id: trip_id.into(),
        }
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn emit(&self, event: PlanEvent) {
        if let Some(tx) = &self.tx {
            debug!(event_type = event.event_type(), "EventEmitter::emit");
            let _ = tx.send(event);
        }
    }

    // === Convenience methods ===

    pub fn plan_started(&self, destination: &str, days: u32) {
        self.emit(PlanEvent::PlanStarted {
            trip_id: self.trip_id.clone(),
            destination: destination.to_string(),
            days,
        });
    }

    pub fn phase_entered(&self, phase: Phase, iteration: u32) {
        self.emit(PlanEvent::PhaseEntered {
            trip_id: self.trip_id.clone(),
            phase,
            iteration,
        });
    }

    pub fn category_fetched(&self, category: Category, count: usize, cycle: u32) {
        self.emit(PlanEvent::CategoryFetched {
            trip_id: self.trip_id.clone(),
            category,
            count,
            cycle,
        });
    }

    pub fn selection_made(&self, iteration: u32, total_cost: Money, fits: bool) {
        self.emit(PlanEvent::SelectionMade {
            trip_id: self.trip_id.clone(),
            iteration,
            total_cost,
            fits,
        });
    }

    pub fn stories_ready(&self, count: usize) {
        self.emit(PlanEvent::StoriesReady {
            trip_id: self.trip_id.clone(),
            count,
        });
    }

    pub fn warning(&self, message: &str) {
        self.emit(PlanEvent::Warning {
            trip_id: self.trip_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn plan_completed(&self, total_cost: Money, within_budget: bool, best_effort: bool) {
        self.emit(PlanEvent::PlanCompleted {
            trip_id: self.trip_id.clone(),
            total_cost,
            within_budget,
            best_effort,
        });
    }

    pub fn plan_failed(&self, category: &str, message: &str) {
        self.emit(PlanEvent::PlanFailed {
            trip_id: self.trip_id.clone(),
            category: category.to_string(),
            message: message.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
