use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Outbound half of the collaborator contract: anything that can push one
/// encoded frame towards the host. Message boundaries are the transport's
/// responsibility; the channel hands over complete frames.
///
/// The inbound half is not a trait. Whoever drives the transport (a socket
/// read loop, a native bridge callback, a test) feeds each delivered payload
/// to [`crate::Channel::handle_message`].
pub trait Transport: Send {
    fn send(&mut self, frame: String) -> Result<(), ChannelError>;
}

/// Adapter turning a closure into a [`Transport`]. Handy for tests and for
/// bridges that are already a function call away.
pub struct FnTransport<F>(pub F);

impl<F> Transport for FnTransport<F>
where
    F: FnMut(String) -> Result<(), ChannelError> + Send,
{
    fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        (self.0)(frame)
    }
}

/// In-memory transport backed by an unbounded queue. The receiving end is
/// whatever pump forwards frames to the host side.
pub struct QueueTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl QueueTransport {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Transport for QueueTransport {
    fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        self.tx
            .send(frame)
            .map_err(|_| ChannelError::Transport("outbound queue closed".to_string()))
    }
}

/// Build a [`QueueTransport`] together with the receiver that drains it.
pub fn queue_pair() -> (QueueTransport, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueTransport::new(tx), rx)
}
