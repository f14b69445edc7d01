//! Outbound half of a connection.
//!
//! Everything a coordinator and its sessions write to the client goes
//! through one [`Outbound`], serialized to a raw JSON string. The transport
//! drains the paired receiver in order.

use cdpmux_protocol::{Event, OutboundMessage, Response};
use tokio::sync::mpsc;

/// Receiver the transport forwards to the client.
pub type OutboundReceiver = mpsc::UnboundedReceiver<String>;

/// Cloneable writer for the connection's outbound stream.
#[derive(Clone, Debug)]
pub struct Outbound {
	tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
	pub fn channel() -> (Self, OutboundReceiver) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	pub fn event(&self, event: Event) {
		self.send(OutboundMessage::Event(event));
	}

	pub fn response(&self, response: Response) {
		self.send(OutboundMessage::Response(response));
	}

	/// Returns true once the transport has dropped its receiver.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	fn send(&self, message: OutboundMessage) {
		let raw = match serde_json::to_string(&message) {
			Ok(raw) => raw,
			Err(err) => {
				tracing::error!(error = %err, "failed to serialize outbound message");
				return;
			}
		};
		if self.tx.send(raw).is_err() {
			tracing::debug!("outbound channel closed, dropping message");
		}
	}
}
