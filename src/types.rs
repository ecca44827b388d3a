use crate::error::{ExchangeError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Represents the action an order performs on the market.
///
/// - `Buy` adds the order quantity to the stock
/// - `Sell` removes the order quantity from the stock, if enough is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Increase the quantity held for a stock
    Buy,
    /// Decrease the quantity held for a stock
    Sell,
}

/// Identifies an order by the client that created it and its creation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId {
    /// Identity of the creating client worker
    pub client: usize,
    /// Position of the order in its client's creation sequence
    pub sequence: u64,
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client, self.sequence)
    }
}

/// A single order travelling from a client, through the ring buffer, to a trader.
///
/// The completion flag is a small monitor: a boolean behind a mutex plus a
/// condition variable, so the originating client can either poll it or block
/// on it.
#[derive(Debug)]
pub struct Order {
    /// Who created the order and when
    pub id: OrderId,
    /// Index of the stock in the market
    pub stock_id: usize,
    /// Number of units to buy or sell (always positive)
    pub quantity: u64,
    /// Whether this is a buy or a sell
    pub action: Action,
    completed: Mutex<bool>,
    completed_signal: Condvar,
}

/// Shared handle to an order.
///
/// The client keeps one handle, and a clone is handed to the ring buffer and
/// from there to exactly one trader.
pub type OrderHandle = Arc<Order>;

impl Order {
    /// Creates a new, not yet completed order.
    ///
    /// ## Errors
    ///
    /// Returns `ExchangeError::InvalidOrder` if `quantity` is zero.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::{Action, Order, OrderId};
    ///
    /// let id = OrderId { client: 0, sequence: 0 };
    /// let order = Order::new(id, 3, 10, Action::Buy).unwrap();
    /// assert!(!order.is_completed());
    /// ```
    pub fn new(id: OrderId, stock_id: usize, quantity: u64, action: Action) -> Result<Self> {
        if quantity == 0 {
            return Err(ExchangeError::InvalidOrder(format!(
                "order {id} has zero quantity"
            )));
        }

        Ok(Self {
            id,
            stock_id,
            quantity,
            action,
            completed: Mutex::new(false),
            completed_signal: Condvar::new(),
        })
    }

    /// Wraps the order in a shareable handle.
    pub fn into_handle(self) -> OrderHandle {
        Arc::new(self)
    }

    /// Marks the order as completed and wakes the waiting client.
    ///
    /// Returns `true` if this call performed the false to true transition,
    /// `false` if the order had already been completed.
    pub fn complete(&self) -> bool {
        let mut completed = self.completed.lock();
        if *completed {
            return false;
        }
        *completed = true;
        drop(completed);

        self.completed_signal.notify_all();
        true
    }

    /// Returns whether a trader has completed this order.
    pub fn is_completed(&self) -> bool {
        *self.completed.lock()
    }

    /// Blocks the calling thread until the order is completed.
    pub fn wait_completed(&self) {
        let mut completed = self.completed.lock();
        self.completed_signal
            .wait_while(&mut completed, |completed| !*completed);
    }
}

/// Outcome of applying an order to the market.
///
/// Every outcome leaves the order eligible for completion: a rejected sell
/// still unblocks its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The quantity was added to the stock
    Bought,
    /// The quantity was removed from the stock
    Sold,
    /// The sell would have driven the stock below zero; the market is unchanged
    Rejected,
    /// The stock id is outside the market; the market is unchanged
    UnknownStock,
}
