//! Bounded terminal output buffer

use std::collections::VecDeque;

use tokio::sync::RwLock;

/// Ring of decoded output chunks.
///
/// Chunks are kept in arrival order; once `capacity` is reached the oldest
/// chunk is evicted for every new one. Every chunk ever appended gets a
/// sequence number so readers can ask for what they have not seen yet.
#[derive(Debug)]
pub struct OutputBuffer {
    capacity: usize,
    ring: RwLock<Ring>,
}

#[derive(Debug, Default)]
struct Ring {
    chunks: VecDeque<String>,
    /// Number of chunks ever appended (sequence of the next chunk)
    total: u64,
}

impl Ring {
    fn first_seq(&self) -> u64 {
        self.total - self.chunks.len() as u64
    }
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: RwLock::new(Ring {
                chunks: VecDeque::with_capacity(capacity.min(1024)),
                total: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a chunk, evicting the oldest ones beyond capacity.
    /// Returns the number of evicted chunks.
    pub async fn push(&self, chunk: String) -> usize {
        let mut ring = self.ring.write().await;
        let mut evicted = 0;
        while ring.chunks.len() >= self.capacity {
            ring.chunks.pop_front();
            evicted += 1;
        }
        ring.chunks.push_back(chunk);
        ring.total += 1;
        evicted
    }

    /// Ordered copy of the buffered chunks
    pub async fn snapshot(&self) -> Vec<String> {
        self.ring.read().await.chunks.iter().cloned().collect()
    }

    /// Buffered output concatenated
    pub async fn text(&self) -> String {
        self.ring.read().await.chunks.iter().map(String::as_str).collect()
    }

    /// Chunks appended at or after `seq` that are still buffered, and the
    /// sequence number to pass next time
    pub async fn since(&self, seq: u64) -> (Vec<String>, u64) {
        let ring = self.ring.read().await;
        let skip = seq.saturating_sub(ring.first_seq()) as usize;
        let chunks = ring.chunks.iter().skip(skip).cloned().collect();
        (chunks, ring.total)
    }

    /// Sequence number of the next chunk to be appended
    pub async fn next_seq(&self) -> u64 {
        self.ring.read().await.total
    }

    pub async fn len(&self) -> usize {
        self.ring.read().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ring.read().await.chunks.is_empty()
    }

    /// Drop all buffered chunks; sequence numbers keep counting
    pub async fn clear(&self) {
        self.ring.write().await.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_evicts_oldest_first() {
        let buffer = OutputBuffer::new(3);
        for chunk in ["a", "b", "c"] {
            assert_eq!(buffer.push(chunk.to_string()).await, 0);
        }
        assert_eq!(buffer.push("d".to_string()).await, 1);
        assert_eq!(buffer.push("e".to_string()).await, 1);

        assert_eq!(buffer.len().await, 3);
        assert_eq!(buffer.snapshot().await, vec!["c", "d", "e"]);
        assert_eq!(buffer.text().await, "cde");
    }

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let buffer = OutputBuffer::new(10);
        for i in 0..1000 {
            buffer.push(i.to_string()).await;
            assert!(buffer.len().await <= buffer.capacity());
        }
        assert_eq!(buffer.snapshot().await.first().map(String::as_str), Some("990"));
    }

    #[tokio::test]
    async fn test_since_tracks_unseen_chunks() {
        let buffer = OutputBuffer::new(3);
        buffer.push("a".into()).await;
        buffer.push("b".into()).await;

        let (chunks, next) = buffer.since(0).await;
        assert_eq!(chunks, vec!["a", "b"]);
        assert_eq!(next, 2);

        buffer.push("c".into()).await;
        buffer.push("d".into()).await;
        buffer.push("e".into()).await;

        // "c" was the oldest unseen chunk still buffered
        let (chunks, next) = buffer.since(next).await;
        assert_eq!(chunks, vec!["c", "d", "e"]);
        assert_eq!(next, 5);

        let (chunks, _) = buffer.since(next).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_sequence() {
        let buffer = OutputBuffer::new(5);
        buffer.push("a".into()).await;
        buffer.clear().await;
        assert!(buffer.is_empty().await);
        assert_eq!(buffer.next_seq().await, 1);

        buffer.push("b".into()).await;
        assert_eq!(buffer.since(1).await.0, vec!["b"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let buffer = OutputBuffer::new(0);
        buffer.push("a".into()).await;
        buffer.push("b".into()).await;
        assert_eq!(buffer.snapshot().await, vec!["b"]);
    }
}
