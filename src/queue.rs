//! Unbounded lock-free FIFO queue (Michael & Scott) feeding the reconciliation worker.
//!
//! Nodes form a singly linked list from `head` to `tail`. A sentinel node always
//! sits at `head` and carries no payload, so neither pointer is ever null.
//! Unlinked nodes are retired through `crossbeam_epoch`: a consumer that loaded a
//! stale `head` before losing a CAS may still read it, so nodes are only freed
//! once every pinned thread has moved past the epoch in which they were unlinked.

use crate::domain::payment::Payment;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// The queue the reconciliation worker consumes.
pub type PaymentQueue = ConcurrentQueue<Payment>;

struct Node<T> {
    /// Uninitialized for the sentinel. Moved out exactly once by the consumer
    /// that wins the `head` CAS, so dropping a node never drops its payload.
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }

    fn new(data: T) -> Self {
        Self {
            data: MaybeUninit::new(data),
            next: Atomic::null(),
        }
    }
}

/// Multi-producer, multi-consumer queue without locks.
///
/// Every enqueue also signals a [`Notify`], so an idle consumer can sleep until
/// work arrives instead of polling (see [`ConcurrentQueue::notified`]).
pub struct ConcurrentQueue<T> {
    head: Atomic<Node<T>>,
    tail: Atomic<Node<T>>,
    len: AtomicUsize,
    wake: Notify,
}

// SAFETY: payloads are moved between threads but never shared by reference;
// the list itself is only touched through atomics under an epoch guard.
unsafe impl<T: Send> Send for ConcurrentQueue<T> {}
unsafe impl<T: Send> Sync for ConcurrentQueue<T> {}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentQueue<T> {
    /// Creates an empty queue holding only the sentinel node.
    pub fn new() -> Self {
        let queue = Self {
            head: Atomic::null(),
            tail: Atomic::null(),
            len: AtomicUsize::new(0),
            wake: Notify::new(),
        };
        // SAFETY: the queue is not shared yet, no other thread can observe it.
        let sentinel = unsafe { Owned::new(Node::sentinel()).into_shared(epoch::unprotected()) };
        queue.head.store(sentinel, Ordering::Relaxed);
        queue.tail.store(sentinel, Ordering::Relaxed);
        queue
    }

    /// Appends `item` at the tail. Never blocks and never fails.
    pub fn enqueue(&self, item: T) {
        let guard = &epoch::pin();
        let new = Owned::new(Node::new(item)).into_shared(guard);
        // Counted before the node becomes visible so a racing dequeue can never
        // decrement below zero.
        self.len.fetch_add(1, Ordering::Relaxed);

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: tail always points at a live node, protected by `guard`.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if !next.is_null() {
                // Tail is lagging: help the stalled enqueuer before retrying.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(
                    Shared::null(),
                    new,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                )
                .is_ok()
            {
                // Best effort: whoever loses here gets helped by the next caller.
                let _ = self.tail.compare_exchange(
                    tail,
                    new,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                break;
            }
        }

        self.wake.notify_one();
    }

    /// Enqueues each item in order. Not atomic: every element is visible as
    /// soon as it is linked.
    pub fn enqueue_batch<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.enqueue(item);
        }
    }

    /// Removes and returns the oldest item, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        self.pop(guard)
    }

    fn pop(&self, guard: &Guard) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // SAFETY: head always points at a live node, protected by `guard`.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
            // SAFETY: a non-null `next` was published with Release by its enqueuer.
            let next_ref = unsafe { next.as_ref() }?;

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // Never retire a node that `tail` still points at.
                let tail = self.tail.load(Ordering::Relaxed, guard);
                if tail == head {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                }
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: winning the CAS makes `next` the new sentinel and gives
                // this caller sole ownership of its payload. The old head is
                // unreachable and freed once no pinned reader can hold it.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(next_ref.data.assume_init_read());
                }
            }
        }
    }

    /// Returns `true` if no item is linked after the sentinel.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: head always points at a live node, protected by `guard`.
        unsafe { head.deref() }
            .next
            .load(Ordering::Acquire, guard)
            .is_null()
    }

    /// Approximate number of queued items; exact when no operation is in flight.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Completes once an enqueue happens after (or shortly before) the call.
    ///
    /// A permit is stored when nobody is waiting, so an item enqueued between a
    /// failed `dequeue` and this call still wakes the consumer.
    pub fn notified(&self) -> Notified<'_> {
        self.wake.notified()
    }
}

impl<T> Drop for ConcurrentQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no other thread is using the queue, so
        // nodes can be destroyed immediately.
        unsafe {
            let guard = epoch::unprotected();
            while self.pop(guard).is_some() {}
            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_enqueue_dequeue() {
        let queue = ConcurrentQueue::new();
        queue.enqueue("1234".to_string());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().as_deref(), Some("1234"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_batch_keeps_order() {
        let queue = ConcurrentQueue::new();
        queue.enqueue_batch(vec![1, 2, 3]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_dequeue_from_empty_queue_is_repeatable() {
        let queue: ConcurrentQueue<u32> = ConcurrentQueue::new();
        for _ in 0..3 {
            assert_eq!(queue.dequeue(), None);
        }
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);

        queue.enqueue(7);
        assert_eq!(queue.dequeue(), Some(7));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        let item = Arc::new(());
        {
            let queue = ConcurrentQueue::new();
            queue.enqueue(Arc::clone(&item));
            queue.enqueue(Arc::clone(&item));
            assert_eq!(Arc::strong_count(&item), 3);
            drop(queue.dequeue());
            assert_eq!(Arc::strong_count(&item), 2);
        }
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[tokio::test]
    async fn test_enqueue_before_wait_leaves_a_permit() {
        let queue = ConcurrentQueue::new();
        queue.enqueue(1);

        tokio::time::timeout(std::time::Duration::from_secs(1), queue.notified())
            .await
            .expect("enqueue should have stored a wake-up permit");
    }
}
