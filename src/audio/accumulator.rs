//! Reassembly of an irregularly chunked sample stream into fixed-length frames.

use std::borrow::Cow;

/// One analysis window worth of mono samples.
pub type Frame = Vec<f32>;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Buffers incoming samples and hands out complete frames in arrival order.
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_len: usize,
    residue: Vec<f32>,
}

impl FrameAccumulator {
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            residue: Vec::with_capacity(frame_len),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of samples carried over to the next call.
    pub fn residue_len(&self) -> usize {
        self.residue.len()
    }

    /// Drop any carried samples, e.g. after the stream was paused.
    pub fn reset(&mut self) {
        self.residue.clear();
    }

    /// Feed a chunk of samples. Frames are produced lazily as the iterator is driven.
    pub fn ingest<'a>(&'a mut self, chunk: &'a [f32]) -> Frames<'a> {
        Frames {
            acc: self,
            chunk: Cow::Borrowed(chunk),
            pos: 0,
        }
    }

    /// Feed raw native-endian f32 bytes.
    ///
    /// Panics if the length is not a whole number of samples.
    pub fn ingest_bytes(&mut self, bytes: &[u8]) -> Frames<'_> {
        assert!(
            bytes.len() % SAMPLE_BYTES == 0,
            "chunk of {} bytes is not a whole number of f32 samples",
            bytes.len()
        );
        let samples = bytes
            .chunks_exact(SAMPLE_BYTES)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Frames {
            acc: self,
            chunk: Cow::Owned(samples),
            pos: 0,
        }
    }
}

/// Lazy sequence of frames completed by one `ingest` call.
///
/// Samples not consumed when the iterator is dropped are kept in the residue.
pub struct Frames<'a> {
    acc: &'a mut FrameAccumulator,
    chunk: Cow<'a, [f32]>,
    pos: usize,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let n = self.acc.frame_len;

        // Left behind by an iterator that was dropped early
        if self.acc.residue.len() >= n {
            return Some(self.acc.residue.drain(..n).collect());
        }

        let need = n - self.acc.residue.len();
        let rest = &self.chunk[self.pos..];
        if rest.len() < need {
            self.acc.residue.extend_from_slice(rest);
            self.pos = self.chunk.len();
            return None;
        }

        let mut frame = std::mem::replace(&mut self.acc.residue, Vec::with_capacity(n));
        frame.extend_from_slice(&rest[..need]);
        self.pos += need;
        Some(frame)
    }
}

impl Drop for Frames<'_> {
    fn drop(&mut self) {
        if self.pos < self.chunk.len() {
            self.acc.residue.extend_from_slice(&self.chunk[self.pos..]);
            self.pos = self.chunk.len();
        }
    }
}
