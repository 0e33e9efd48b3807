//! Reply handles for request-reply patterns

use crate::common::error::TransportResult;

/// Sends the reply for one received request
pub trait ReplyHandle: Send {
    /// Send reply
    fn send(&self, data: &[u8]) -> TransportResult<()>;

    /// Send the empty acknowledgment used by the control channel
    fn acknowledge(&self) -> TransportResult<()> {
        self.send(&[])
    }
}
