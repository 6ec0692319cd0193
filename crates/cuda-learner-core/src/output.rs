//! Printed output travelling from the sandbox back to the local caller.

use tokio::sync::mpsc;

/// Sending half handed to a procedure; each message is one `print`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<String>,
}

impl OutputSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn print(&self, message: impl Into<String>) {
        // A caller that stopped listening does not stop the procedure.
        let _ = self.tx.send(message.into());
    }
}
