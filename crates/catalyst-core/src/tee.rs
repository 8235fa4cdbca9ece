//! Size-capped ring buffer for capturing child-process output.
//!
//! Every step that shells out to an external process (git clone, image
//! build, artifact extraction) tees its stdout/stderr to both the
//! deployment's Log Sink and one of these buffers, so that a failure can
//! attach a bounded tail of output to the error it raises without holding
//! the entire transcript in memory.

use std::collections::VecDeque;

/// A byte ring that retains at most `capacity` bytes, dropping the oldest
/// content once full.
#[derive(Debug, Clone)]
pub struct OutputRing {
    capacity: usize,
    buffer: VecDeque<u8>,
}

impl OutputRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity.min(64 * 1024)),
        }
    }

    /// Append a chunk, evicting the oldest bytes if the ring overflows.
    pub fn push(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if self.buffer.len() >= self.capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(byte);
        }
    }

    /// Render the retained bytes as a lossy UTF-8 string.
    pub fn as_string(&self) -> String {
        let bytes: Vec<u8> = self.buffer.iter().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Render up to the last `max_chars` characters, for embedding in a
    /// bounded error message.
    pub fn tail(&self, max_chars: usize) -> String {
        let full = self.as_string();
        if full.chars().count() <= max_chars {
            return full;
        }
        full.chars()
            .skip(full.chars().count() - max_chars)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_retains_content_under_capacity() {
        let mut ring = OutputRing::new(100);
        ring.push(b"hello");
        assert_eq!(ring.as_string(), "hello");
    }

    #[test]
    fn ring_evicts_oldest_bytes_when_full() {
        let mut ring = OutputRing::new(5);
        ring.push(b"abcdef");
        assert_eq!(ring.as_string(), "bcdef");
    }

    #[test]
    fn ring_accumulates_across_multiple_pushes() {
        let mut ring = OutputRing::new(10);
        ring.push(b"abc");
        ring.push(b"def");
        assert_eq!(ring.as_string(), "abcdef");
    }

    #[test]
    fn tail_returns_whole_buffer_when_shorter_than_limit() {
        let mut ring = OutputRing::new(100);
        ring.push(b"short");
        assert_eq!(ring.tail(50), "short");
    }

    #[test]
    fn tail_truncates_to_last_n_chars() {
        let mut ring = OutputRing::new(1000);
        ring.push(b"0123456789");
        assert_eq!(ring.tail(4), "6789");
    }

    #[test]
    fn empty_ring_reports_empty() {
        let ring = OutputRing::new(10);
        assert!(ring.is_empty());
    }
}
