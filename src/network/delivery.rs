use crate::NodeId;
use crate::protocol::RoutingVector;

/// Outbound side of the delivery layer.
///
/// Sending is fire-and-forget: the node never waits for an acknowledgment and
/// never learns whether the vector arrived. Implementations must keep vectors
/// sent from one node to the same recipient in order.
pub trait Transport {
    fn send(&mut self, to: NodeId, vector: RoutingVector);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, to: NodeId, vector: RoutingVector) {
        (**self).send(to, vector);
    }
}

/// Transport that only records what it was asked to send.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    sent: Vec<(NodeId, RoutingVector)>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[(NodeId, RoutingVector)] {
        &self.sent
    }

    pub fn recipients(&self) -> Vec<NodeId> {
        self.sent.iter().map(|(to, _)| *to).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&mut self) -> Vec<(NodeId, RoutingVector)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, to: NodeId, vector: RoutingVector) {
        self.sent.push((to, vector));
    }
}
