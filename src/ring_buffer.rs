use crate::error::{ExchangeError, Result};
use crate::shutdown::ShutdownSignal;
use crate::types::OrderHandle;
use parking_lot::{Condvar, Mutex};

/// Snapshot of the ring buffer's read and write positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferIndices {
    /// Slot of the most recent write
    pub head: usize,
    /// Slot of the most recent read
    pub tail: usize,
}

/// State protected by the buffer lock.
#[derive(Debug)]
struct Slots {
    orders: Box<[Option<OrderHandle>]>,
    head: usize,
    tail: usize,
}

impl Slots {
    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn is_full(&self) -> bool {
        (self.head + 1) % self.orders.len() == self.tail
    }

    fn len(&self) -> usize {
        let capacity = self.orders.len();
        (self.head + capacity - self.tail) % capacity
    }

    /// Writes at the slot after `head`. The caller must have checked `is_full`.
    fn push(&mut self, order: OrderHandle) {
        let next = (self.head + 1) % self.orders.len();
        self.orders[next] = Some(order);
        self.head = next;
    }

    /// Reads the slot after `tail`. The caller must have checked `is_empty`.
    fn pop(&mut self) -> Option<OrderHandle> {
        let next = (self.tail + 1) % self.orders.len();
        let order = self.orders[next].take();
        self.tail = next;
        order
    }
}

/// A fixed-capacity circular buffer of orders shared by every client and trader.
///
/// One slot is always kept free so that `head == tail` unambiguously means
/// empty and `(head + 1) % capacity == tail` means full. A buffer created with
/// capacity `C` therefore holds at most `C - 1` orders.
///
/// ## Thread Safety
///
/// A single mutex guards the slots and both indices. It is held only for the
/// index check, the slot access and the index update, never while an order is
/// built, applied or awaited. Two condition variables let callers block on
/// "not full" and "not empty" instead of spinning.
///
/// With several clients and traders, orders leave the buffer in slot order,
/// which is not necessarily the order in which clients submitted them.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Mutex<Slots>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl RingBuffer {
    /// Creates an empty ring buffer with `capacity` slots.
    ///
    /// ## Errors
    ///
    /// Returns `ExchangeError::InvalidConfig` if `capacity` is below 2, since
    /// such a buffer could never hold an order.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::RingBuffer;
    ///
    /// let buffer = RingBuffer::new(51).unwrap();
    /// assert_eq!(buffer.usable_capacity(), 50);
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(ExchangeError::InvalidConfig(format!(
                "buffer capacity must be at least 2, got {capacity}"
            )));
        }

        Ok(Self {
            slots: Mutex::new(Slots {
                orders: vec![None; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Attempts to enqueue an order without waiting.
    ///
    /// On a full buffer the order is handed back so the caller can retry.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::{Action, Order, OrderId, RingBuffer};
    ///
    /// let buffer = RingBuffer::new(2).unwrap();
    /// let order = |sequence| {
    ///     Order::new(OrderId { client: 0, sequence }, 0, 1, Action::Buy)
    ///         .unwrap()
    ///         .into_handle()
    /// };
    ///
    /// assert!(buffer.try_enqueue(order(0)).is_ok());
    /// assert!(buffer.try_enqueue(order(1)).is_err()); // one slot stays free
    /// ```
    pub fn try_enqueue(&self, order: OrderHandle) -> std::result::Result<(), OrderHandle> {
        let mut slots = self.slots.lock();
        if slots.is_full() {
            return Err(order);
        }
        slots.push(order);
        drop(slots);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Attempts to dequeue the next order without waiting.
    ///
    /// Returns `None` if the buffer is empty.
    pub fn try_dequeue(&self) -> Option<OrderHandle> {
        let mut slots = self.slots.lock();
        if slots.is_empty() {
            return None;
        }
        let order = slots.pop();
        drop(slots);

        self.not_full.notify_one();
        order
    }

    /// Enqueues an order, blocking while the buffer is full.
    pub fn enqueue_blocking(&self, order: OrderHandle) {
        let mut slots = self.slots.lock();
        self.not_full.wait_while(&mut slots, |slots| slots.is_full());
        slots.push(order);
        drop(slots);

        self.not_empty.notify_one();
    }

    /// Dequeues the next order, blocking while the buffer is empty and
    /// `shutdown` has not been raised.
    ///
    /// Returns `None` only once the buffer is empty and shutdown is raised, so
    /// every order queued before shutdown is still handed out.
    pub fn dequeue_blocking(&self, shutdown: &ShutdownSignal) -> Option<OrderHandle> {
        let mut slots = self.slots.lock();
        self.not_empty
            .wait_while(&mut slots, |slots| slots.is_empty() && !shutdown.is_raised());
        if slots.is_empty() {
            return None;
        }
        let order = slots.pop();
        drop(slots);

        self.not_full.notify_one();
        order
    }

    /// Wakes every thread blocked on the buffer.
    ///
    /// Call after raising the shutdown signal. Taking the lock first
    /// guarantees that a trader which checked the signal before it was raised
    /// is already waiting, and therefore receives this notification.
    pub fn wake_all(&self) {
        let _slots = self.slots.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Removes and returns every order still queued.
    pub fn drain(&self) -> Vec<OrderHandle> {
        let mut slots = self.slots.lock();
        let mut drained = Vec::with_capacity(slots.len());
        while !slots.is_empty() {
            drained.extend(slots.pop());
        }
        drop(slots);

        self.not_full.notify_all();
        drained
    }

    /// Returns the number of slots, including the one that is always kept free.
    pub fn capacity(&self) -> usize {
        self.slots.lock().orders.len()
    }

    /// Returns the maximum number of orders the buffer can hold at once.
    pub fn usable_capacity(&self) -> usize {
        self.capacity() - 1
    }

    /// Returns the number of queued orders.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns whether no order is queued.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Returns whether the buffer holds `capacity - 1` orders.
    pub fn is_full(&self) -> bool {
        self.slots.lock().is_full()
    }

    /// Returns the current head and tail positions.
    pub fn indices(&self) -> BufferIndices {
        let slots = self.slots.lock();
        BufferIndices {
            head: slots.head,
            tail: slots.tail,
        }
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        let leftover = slots.len();
        if leftover > 0 {
            tracing::warn!(leftover, "dropping ring buffer with queued orders");
        }
        slots.orders.iter_mut().for_each(|slot| *slot = None);
        slots.head = 0;
        slots.tail = 0;
    }
}
