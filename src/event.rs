use std::collections::VecDeque;

use crate::component::ComponentType;
use crate::entity::EntityHandle;

/// Entity lifecycle transitions, queued for the embedding game loop
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    /// Entity finished construction and is live
    Spawned(EntityHandle),

    /// Entity was torn down; `died` selects death vs plain removal
    Removed { entity: EntityHandle, died: bool },

    /// A single component was detached from a live entity
    ComponentDetached(EntityHandle, ComponentType),

    /// A component's active flag changed
    ActiveChanged {
        entity: EntityHandle,
        component: ComponentType,
        active: bool,
    },

    /// Construction failed and the entity was rolled back to absent
    ConstructFailed(EntityHandle),
}

impl LifecycleEvent {
    /// Get the entity involved in this event
    pub fn entity(&self) -> EntityHandle {
        match self {
            LifecycleEvent::Spawned(entity)
            | LifecycleEvent::ComponentDetached(entity, _)
            | LifecycleEvent::ConstructFailed(entity) => *entity,
            LifecycleEvent::Removed { entity, .. }
            | LifecycleEvent::ActiveChanged { entity, .. } => *entity,
        }
    }

    /// Get event type name for debugging
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::Spawned(_) => "Spawned",
            LifecycleEvent::Removed { .. } => "Removed",
            LifecycleEvent::ComponentDetached(_, _) => "ComponentDetached",
            LifecycleEvent::ActiveChanged { .. } => "ActiveChanged",
            LifecycleEvent::ConstructFailed(_) => "ConstructFailed",
        }
    }
}

/// Bounded queue of lifecycle events
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<LifecycleEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Add event to queue. Events past capacity are dropped with a warning.
    pub fn push(&mut self, event: LifecycleEvent) {
        if self.events.len() < self.capacity {
            self.events.push_back(event);
        } else {
            self.dropped += 1;
            tracing::warn!(
                capacity = self.capacity,
                event = event.event_type(),
                entity = %event.entity(),
                "lifecycle event queue overflow"
            );
        }
    }

    pub fn pop(&mut self) -> Option<LifecycleEvent> {
        self.events.pop_front()
    }

    /// Take every pending event in order.
    pub fn drain(&mut self) -> impl Iterator<Item = LifecycleEvent> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events lost to overflow since creation
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
