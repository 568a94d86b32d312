pub mod reader;
pub mod writer;

use std::collections::HashMap;

/// Absolute maximum size of a single DNS message on the wire (§6 External interfaces).
pub const MAX_MESSAGE_SIZE: usize = 9000;

/// Message size above which implementers should consider fragmenting a response
/// across multiple messages. Purely advisory; the codec does not enforce it.
pub const WARNING_MESSAGE_SIZE: usize = 1460;

/// A fixed-size scratch buffer used both to decode an inbound datagram and to
/// build an outbound one, tracking name-compression state along the way.
pub struct BytePacketBuffer {
    pub buf: [u8; MAX_MESSAGE_SIZE],
    pub pos: usize,
    pub(crate) reading_labels: HashMap<usize, String>,
    pub(crate) writing_labels: HashMap<String, usize>,
}

impl Clone for BytePacketBuffer {
    fn clone(&self) -> Self {
        Self {
            buf: self.buf,
            pos: self.pos,
            reading_labels: self.reading_labels.clone(),
            writing_labels: self.writing_labels.clone(),
        }
    }
}

impl Default for BytePacketBuffer {
    /// This gives us a fresh buffer for holding the packet contents, and a
    /// field for keeping track of where we are.
    fn default() -> Self {
        BytePacketBuffer {
            buf: [0; MAX_MESSAGE_SIZE],
            pos: 0,
            reading_labels: HashMap::new(),
            writing_labels: HashMap::new(),
        }
    }
}

impl BytePacketBuffer {
    /// Builds a buffer from a received datagram, truncating to the maximum
    /// message size if (somehow) exceeded.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buffer = Self::default();
        let len = data.len().min(MAX_MESSAGE_SIZE);
        buffer.buf[..len].copy_from_slice(&data[..len]);
        buffer
    }

    /// Current position within buffer
    pub fn pos(&self) -> usize {
        self.pos
    }
}
