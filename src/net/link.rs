//! Channel pair between the simulation and the realtime transport
//!
//! The simulation never blocks on the network: outbound sends are
//! fire-and-forget and inbound messages are buffered until the next tick
//! drains them.

use tokio::sync::mpsc;
use tracing::debug;

use super::protocol::{InboundEvent, OutboundEvent};

/// Inbound messages buffered per link before the transport sees backpressure
pub const INBOUND_BUFFER: usize = 1024;

/// Simulation side of the link
#[derive(Debug)]
pub struct RealtimeLink {
    outbound_tx: mpsc::UnboundedSender<OutboundEvent>,
    inbound_rx: mpsc::Receiver<InboundEvent>,
}

/// Transport side of the link, driven by a bridge task
#[derive(Debug)]
pub struct LinkEndpoint {
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundEvent>,
    pub inbound_tx: mpsc::Sender<InboundEvent>,
}

impl RealtimeLink {
    pub fn pair() -> (RealtimeLink, LinkEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        (
            RealtimeLink {
                outbound_tx,
                inbound_rx,
            },
            LinkEndpoint {
                outbound_rx,
                inbound_tx,
            },
        )
    }

    /// Queue a message for the transport. Dropped silently once the transport is gone.
    pub fn send(&self, event: OutboundEvent) {
        let name = event.name();
        if self.outbound_tx.send(event).is_err() {
            debug!(event = name, "Realtime transport closed, dropping message");
        }
    }

    /// Drain everything that arrived since the last tick
    pub fn drain(&mut self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inbound_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn is_closed(&self) -> bool {
        self.outbound_tx.is_closed()
    }
}
