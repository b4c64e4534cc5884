//! Graph-mutation events and the subscriber registry.
//!
//! The layout consumes one event per graph mutation, applies it, then
//! forwards it unchanged to every subscriber in subscription order.
//! Particle movements are announced through the same channel.

use glam::DVec3;

use super::attribute::AttributeValue;
use crate::graph::{EdgeId, NodeId};

/// Element an attribute belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeTarget {
    Graph,
    Node(NodeId),
    Edge(EdgeId),
}

/// A mutation of the laid-out graph, or a movement produced by the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded {
        id: NodeId,
    },
    NodeRemoved {
        id: NodeId,
    },
    EdgeAdded {
        id: EdgeId,
        from: NodeId,
        to: NodeId,
        directed: bool,
    },
    EdgeRemoved {
        id: EdgeId,
    },
    GraphCleared,
    StepBegins {
        step: f64,
    },
    AttributeAdded {
        target: AttributeTarget,
        name: String,
        value: AttributeValue,
    },
    AttributeChanged {
        target: AttributeTarget,
        name: String,
        old: Option<AttributeValue>,
        new: AttributeValue,
    },
    AttributeRemoved {
        target: AttributeTarget,
        name: String,
    },
    /// A particle reached a new position during a step.
    NodeMoved {
        id: NodeId,
        position: DVec3,
    },
}

/// Receives every event the layout forwards.
pub trait LayoutListener {
    fn on_event(&mut self, event: &GraphEvent);
}

impl<F> LayoutListener for F
where
    F: FnMut(&GraphEvent),
{
    fn on_event(&mut self, event: &GraphEvent) {
        self(event)
    }
}

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Ordered list of listeners.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriberId, Box<dyn LayoutListener>)>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl LayoutListener + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener, in subscription order.
    pub fn emit(&mut self, event: &GraphEvent) {
        for (_, listener) in &mut self.listeners {
            listener.on_event(event);
        }
    }
}
