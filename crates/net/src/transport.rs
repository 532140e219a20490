//! Transport collaborator boundary and an in-memory loopback network.
//!
//! The loopback network delivers frames in order, per receiving endpoint,
//! and stamps every frame with its sender. It stands in for a real RPC
//! layer in tests and the headless demo.

use spawnsync_core::EndpointId;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use tracing::trace;

/// Delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target endpoint is not connected.
    #[error("endpoint {0} is not connected")]
    UnknownEndpoint(EndpointId),
}

/// A received frame plus the sender metadata the transport attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Endpoint that sent the frame.
    pub sender: EndpointId,
    /// Raw frame bytes.
    pub frame: Vec<u8>,
}

/// Addressed unicast delivery between named endpoints.
pub trait Transport {
    /// Endpoint this transport sends from.
    fn local(&self) -> EndpointId;

    /// Deliver `frame` to `target` only.
    fn send(&mut self, target: EndpointId, frame: Vec<u8>) -> Result<(), TransportError>;
}

/// Record of one delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Sending endpoint.
    pub from: EndpointId,
    /// Receiving endpoint.
    pub to: EndpointId,
    /// Frame size in bytes.
    pub len: usize,
}

/// In-memory network of endpoints with per-endpoint inbound queues.
#[derive(Debug, Default)]
pub struct LoopbackNetwork {
    queues: BTreeMap<EndpointId, VecDeque<Inbound>>,
    deliveries: Vec<Delivery>,
}

impl LoopbackNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an endpoint. Reconnecting keeps its queue.
    pub fn connect(&mut self, endpoint: EndpointId) {
        self.queues.entry(endpoint).or_default();
    }

    /// Disconnect an endpoint, discarding anything queued for it.
    pub fn disconnect(&mut self, endpoint: EndpointId) {
        self.queues.remove(&endpoint);
    }

    /// Whether `endpoint` is connected.
    pub fn is_connected(&self, endpoint: EndpointId) -> bool {
        self.queues.contains_key(&endpoint)
    }

    /// Borrow a transport that sends as `local`.
    pub fn transport(&mut self, local: EndpointId) -> LoopbackTransport<'_> {
        LoopbackTransport {
            network: self,
            local,
        }
    }

    /// Take every frame queued for `endpoint`, in arrival order.
    pub fn drain(&mut self, endpoint: EndpointId) -> Vec<Inbound> {
        self.queues
            .get_mut(&endpoint)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of frames waiting for `endpoint`.
    pub fn pending(&self, endpoint: EndpointId) -> usize {
        self.queues.get(&endpoint).map_or(0, VecDeque::len)
    }

    /// Total frames waiting anywhere.
    pub fn total_pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Every delivery made so far, in send order.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    fn deliver(&mut self, from: EndpointId, to: EndpointId, frame: Vec<u8>) -> Result<(), TransportError> {
        let queue = self
            .queues
            .get_mut(&to)
            .ok_or(TransportError::UnknownEndpoint(to))?;
        trace!(%from, %to, len = frame.len(), "loopback delivery");
        self.deliveries.push(Delivery {
            from,
            to,
            len: frame.len(),
        });
        queue.push_back(Inbound {
            sender: from,
            frame,
        });
        Ok(())
    }
}

/// Sending handle bound to one endpoint of a [`LoopbackNetwork`].
pub struct LoopbackTransport<'a> {
    network: &'a mut LoopbackNetwork,
    local: EndpointId,
}

impl Transport for LoopbackTransport<'_> {
    fn local(&self) -> EndpointId {
        self.local
    }

    fn send(&mut self, target: EndpointId, frame: Vec<u8>) -> Result<(), TransportError> {
        self.network.deliver(self.local, target, frame)
    }
}
