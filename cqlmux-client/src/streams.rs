//! Stream id allocation.
//!
//! Stream ids live in an arena indexed by `id - 1` with a free list on the
//! side. Each acquisition gets a fresh oneshot mailbox, so a slot carries
//! exactly one response to exactly one waiter.

use crate::error::ClientError;
use cqlmux_protocol::Frame;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Largest usable stream id (the wire field is a signed 16-bit integer and
/// non-positive ids are reserved for the control stream).
pub const MAX_STREAMS: usize = i16::MAX as usize;

type Mailbox = oneshot::Sender<Result<Frame, ClientError>>;

enum SlotState {
    Free,
    /// Checked out, waiting for its response.
    Awaiting(Mailbox),
    /// Checked out, response (or failure) already handed over.
    Delivered,
    /// Caller went away after the request hit the wire. Parked until the
    /// late response arrives so the id is not reused underneath it.
    Orphaned,
}

struct Arena {
    slots: Vec<SlotState>,
    free: Vec<usize>,
    limit: usize,
    closed: bool,
}

impl Arena {
    fn release(&mut self, index: usize) {
        self.slots[index] = SlotState::Free;
        self.free.push(index);
    }
}

/// Hands out stream ids and routes response frames to their waiters.
#[derive(Clone)]
pub struct StreamAllocator {
    arena: Arc<Mutex<Arena>>,
}

impl StreamAllocator {
    pub fn new() -> Self {
        Self::with_limit(MAX_STREAMS)
    }

    /// Creates an allocator that refuses to hand out more than `limit`
    /// concurrent ids.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            arena: Arc::new(Mutex::new(Arena {
                slots: Vec::new(),
                free: Vec::new(),
                limit: limit.min(MAX_STREAMS),
                closed: false,
            })),
        }
    }

    /// Checks out a stream id, reusing a released one when possible.
    pub fn acquire(&self) -> Result<StreamSlot, ClientError> {
        let mut arena = self.arena.lock();
        if arena.closed {
            return Err(ClientError::ConnectionClosed);
        }

        let index = match arena.free.pop() {
            Some(index) => index,
            None => {
                if arena.slots.len() >= arena.limit {
                    return Err(ClientError::StreamsExhausted(arena.limit));
                }
                arena.slots.push(SlotState::Free);
                arena.slots.len() - 1
            }
        };

        let (tx, rx) = oneshot::channel();
        arena.slots[index] = SlotState::Awaiting(tx);
        drop(arena);

        Ok(StreamSlot {
            id: (index + 1) as i16,
            rx,
            sent: false,
            arena: Arc::clone(&self.arena),
        })
    }

    /// Delivers a response frame to the slot owning `stream`.
    ///
    /// Returns `false` when no request is waiting on that id (never
    /// allocated, already answered, or released).
    pub fn deliver(&self, stream: i16, frame: Frame) -> bool {
        let Some(index) = index_of(stream) else {
            return false;
        };
        let mut arena = self.arena.lock();
        let Some(slot) = arena.slots.get_mut(index) else {
            return false;
        };

        match std::mem::replace(slot, SlotState::Delivered) {
            SlotState::Awaiting(tx) => {
                // The receiver may have been dropped a moment ago; the slot
                // guard frees the id either way.
                let _ = tx.send(Ok(frame));
                true
            }
            SlotState::Orphaned => {
                tracing::debug!("late response on stream {} discarded", stream);
                arena.release(index);
                true
            }
            previous => {
                *slot = previous;
                false
            }
        }
    }

    /// Fails every waiting mailbox with `ConnectionClosed` and refuses
    /// further acquisitions. Returns the number of mailboxes failed.
    pub fn fail_all(&self) -> usize {
        let mut arena = self.arena.lock();
        arena.closed = true;

        let mut failed = 0;
        for index in 0..arena.slots.len() {
            match std::mem::replace(&mut arena.slots[index], SlotState::Delivered) {
                SlotState::Awaiting(tx) => {
                    let _ = tx.send(Err(ClientError::ConnectionClosed));
                    failed += 1;
                }
                SlotState::Orphaned => arena.release(index),
                SlotState::Free => arena.slots[index] = SlotState::Free,
                SlotState::Delivered => {}
            }
        }
        failed
    }

    /// Number of ids currently checked out or parked.
    pub fn in_flight(&self) -> usize {
        let arena = self.arena.lock();
        arena.slots.len() - arena.free.len()
    }

    /// Number of ids ever allocated (the arena never shrinks).
    pub fn capacity(&self) -> usize {
        self.arena.lock().slots.len()
    }

    pub fn is_closed(&self) -> bool {
        self.arena.lock().closed
    }
}

impl Default for StreamAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn index_of(stream: i16) -> Option<usize> {
    if stream > 0 {
        Some(stream as usize - 1)
    } else {
        None
    }
}

/// A checked-out stream id with its mailbox. Dropping it releases the id.
pub struct StreamSlot {
    id: i16,
    rx: oneshot::Receiver<Result<Frame, ClientError>>,
    sent: bool,
    arena: Arc<Mutex<Arena>>,
}

impl StreamSlot {
    pub fn id(&self) -> i16 {
        self.id
    }

    /// Records that the request frame may have reached the wire. From here
    /// on, dropping the slot before its response parks the id instead of
    /// freeing it.
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Waits for the single response on this stream, then releases the id.
    pub async fn recv(mut self) -> Result<Frame, ClientError> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        let index = self.id as usize - 1;
        let mut arena = self.arena.lock();
        let awaiting = matches!(arena.slots[index], SlotState::Awaiting(_));
        if awaiting && self.sent && !arena.closed {
            arena.slots[index] = SlotState::Orphaned;
        } else {
            arena.release(index);
        }
    }
}

impl std::fmt::Debug for StreamSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSlot")
            .field("id", &self.id)
            .field("sent", &self.sent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cqlmux_protocol::Opcode;
    use std::collections::HashSet;

    fn result_frame(stream: i16) -> Frame {
        Frame::response(4, stream, Opcode::Result, Bytes::from_static(&[0, 0, 0, 1]))
    }

    #[test]
    fn test_first_ids_are_sequential() {
        let streams = StreamAllocator::new();
        let a = streams.acquire().unwrap();
        let b = streams.acquire().unwrap();
        let c = streams.acquire().unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (1, 2, 3));
        assert_eq!(streams.in_flight(), 3);
    }

    #[test]
    fn test_released_id_is_reused() {
        let streams = StreamAllocator::new();
        let a = streams.acquire().unwrap();
        let _b = streams.acquire().unwrap();
        drop(a);
        assert_eq!(streams.in_flight(), 1);

        let c = streams.acquire().unwrap();
        assert_eq!(c.id(), 1);
        assert_eq!(streams.capacity(), 2);
    }

    #[tokio::test]
    async fn test_deliver_to_waiter() {
        let streams = StreamAllocator::new();
        let slot = streams.acquire().unwrap();
        let id = slot.id();

        assert!(streams.deliver(id, result_frame(id)));
        let frame = slot.recv().await.unwrap();
        assert_eq!(frame.stream, id);
        assert_eq!(streams.in_flight(), 0);
    }

    #[test]
    fn test_deliver_unknown_or_answered_stream() {
        let streams = StreamAllocator::new();
        assert!(!streams.deliver(7, result_frame(7)));
        assert!(!streams.deliver(0, result_frame(0)));
        assert!(!streams.deliver(-1, result_frame(-1)));

        let slot = streams.acquire().unwrap();
        assert!(streams.deliver(slot.id(), result_frame(slot.id())));
        assert!(!streams.deliver(slot.id(), result_frame(slot.id())));
    }

    #[test]
    fn test_unsent_slot_frees_on_drop() {
        let streams = StreamAllocator::new();
        let slot = streams.acquire().unwrap();
        drop(slot);
        assert_eq!(streams.in_flight(), 0);
        assert!(!streams.deliver(1, result_frame(1)));
    }

    #[test]
    fn test_cancelled_sent_slot_is_parked() {
        let streams = StreamAllocator::new();
        let mut slot = streams.acquire().unwrap();
        slot.mark_sent();
        drop(slot);

        // Id 1 must not be handed out while its response is outstanding.
        assert_eq!(streams.in_flight(), 1);
        let other = streams.acquire().unwrap();
        assert_eq!(other.id(), 2);

        assert!(streams.deliver(1, result_frame(1)));
        assert_eq!(streams.in_flight(), 1);
        drop(other);
        assert_eq!(streams.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let streams = StreamAllocator::new();
        let a = streams.acquire().unwrap();
        let b = streams.acquire().unwrap();
        let mut parked = streams.acquire().unwrap();
        parked.mark_sent();
        drop(parked);

        assert_eq!(streams.fail_all(), 2);
        assert!(matches!(a.recv().await, Err(ClientError::ConnectionClosed)));
        assert!(matches!(b.recv().await, Err(ClientError::ConnectionClosed)));
        assert_eq!(streams.in_flight(), 0);

        assert!(streams.is_closed());
        assert!(matches!(
            streams.acquire(),
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_exhaustion() {
        let streams = StreamAllocator::with_limit(2);
        let _a = streams.acquire().unwrap();
        let b = streams.acquire().unwrap();
        assert!(matches!(
            streams.acquire(),
            Err(ClientError::StreamsExhausted(2))
        ));

        drop(b);
        assert_eq!(streams.acquire().unwrap().id(), 2);
    }

    #[test]
    fn test_limit_capped_at_wire_range() {
        let streams = StreamAllocator::with_limit(usize::MAX);
        assert_eq!(streams.arena.lock().limit, MAX_STREAMS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_distinct_ids() {
        let streams = StreamAllocator::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let streams = streams.clone();
            handles.push(tokio::spawn(async move {
                (0..50)
                    .map(|_| streams.acquire().unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut slots = Vec::new();
        for handle in handles {
            slots.extend(handle.await.unwrap());
        }

        let ids: HashSet<i16> = slots.iter().map(StreamSlot::id).collect();
        assert_eq!(ids.len(), 800);
        assert_eq!(streams.in_flight(), 800);

        drop(slots);
        assert_eq!(streams.in_flight(), 0);
    }
}
