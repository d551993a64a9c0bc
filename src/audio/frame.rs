use bytes::{Bytes, BytesMut};

/// Reassembles fixed-size codec frames from the device's chunked HTTP body
///
/// The device hands out audio in whatever chunk sizes its HTTP stack picks.
/// Device ports feed those chunks in with [`push`](Self::push) and pull out
/// complete frames with [`next_frame`](Self::next_frame).
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    buffer: BytesMut,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            buffer: BytesMut::with_capacity(frame_size * 4),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete frame, if enough bytes are buffered
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buffer.len() < self.frame_size {
            return None;
        }
        Some(self.buffer.split_to(self.frame_size).freeze())
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop a partial frame left over at end of stream
    pub fn discard_partial(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}
