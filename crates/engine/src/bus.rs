// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub for persisted events.
//!
//! The bus is bounded and lossy: a subscriber that falls more than
//! `capacity` events behind has its oldest entries dropped and learns how
//! many via [`BusMessage::Lagged`]. The event store stays authoritative;
//! laggards reconcile by re-reading it. Per-subscriber ordering is
//! preserved; nothing is promised across subscribers.

use am_core::event::{EventType, WorkflowEvent};
use am_core::workflow::WorkflowId;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Which events a subscriber wants.
///
/// `None` means wildcard for that axis; the default subscribes to everything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub event_types: Option<HashSet<EventType>>,
    pub workflows: Option<HashSet<WorkflowId>>,
}

impl SubscriptionFilter {
    /// Subscribe to everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to a fixed set of event types.
    pub fn for_event_types(types: impl IntoIterator<Item = EventType>) -> Self {
        Self { event_types: Some(types.into_iter().collect()), workflows: None }
    }

    /// Subscribe to a fixed set of workflows.
    pub fn for_workflows(ids: impl IntoIterator<Item = WorkflowId>) -> Self {
        Self { event_types: None, workflows: Some(ids.into_iter().collect()) }
    }

    pub fn matches(&self, event: &WorkflowEvent) -> bool {
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(workflows) = &self.workflows {
            if !workflows.contains(&event.workflow_id) {
                return false;
            }
        }
        true
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Event(Arc<WorkflowEvent>),
    /// The subscriber fell behind and this many events were dropped for it.
    Lagged(u64),
}

/// Bounded broadcast bus. Cheap to clone; all clones publish into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<WorkflowEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a persisted event to all current subscribers.
    ///
    /// Publishing never blocks and never fails: with no subscribers the
    /// event is simply not delivered (the store already has it).
    pub fn publish(&self, event: Arc<WorkflowEvent>) {
        let _ = self.tx.send(event);
    }

    /// Register a subscriber with the given filter.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> BusSubscription {
        BusSubscription { rx: self.tx.subscribe(), filter }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A single subscriber's ordered, filtered view of the bus.
pub struct BusSubscription {
    rx: broadcast::Receiver<Arc<WorkflowEvent>>,
    filter: SubscriptionFilter,
}

impl BusSubscription {
    /// Next matching message, or `None` once the bus is gone.
    ///
    /// Non-matching events are consumed silently. Overflow surfaces as
    /// [`BusMessage::Lagged`] with the dropped count before delivery resumes.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(BusMessage::Event(event));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(dropped = count, "event bus subscriber lagged, events dropped");
                    return Some(BusMessage::Lagged(count));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Replace the filter (e.g. a WebSocket client changing subscriptions).
    pub fn set_filter(&mut self, filter: SubscriptionFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
