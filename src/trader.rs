use crate::config::WaitStrategy;
use crate::market::Market;
use crate::ring_buffer::RingBuffer;
use crate::shutdown::ShutdownSignal;
use crate::types::{Fill, Order, OrderHandle};
use std::sync::Arc;
use std::thread;

/// Totals reported by a trader once it has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraderStats {
    /// Identity of the trader
    pub trader_id: usize,
    /// Orders taken from the buffer and completed
    pub orders_applied: u64,
    /// Sells left unapplied because the stock held too little
    pub sells_rejected: u64,
    /// Orders naming a stock outside the market
    pub unknown_stocks: u64,
    /// Orders that were already completed when this trader finished them
    pub double_completions: u64,
}

/// A consumer thread: drains the ring buffer into the market until the buffer
/// is empty and shutdown has been raised.
#[derive(Debug)]
pub struct TraderWorker {
    /// Identity of the trader, reported in every log line
    pub id: usize,
    /// How to wait on an empty buffer
    pub strategy: WaitStrategy,
    /// Buffer shared with the clients
    pub buffer: Arc<RingBuffer>,
    /// Ledger the orders are applied to
    pub market: Arc<Market>,
    /// Raised by the coordinator once every client has finished
    pub shutdown: ShutdownSignal,
}

impl TraderWorker {
    /// Runs the trader until it observes an empty buffer after shutdown.
    pub fn run(self) -> TraderStats {
        tracing::debug!(trader = self.id, "trader started");

        let mut stats = TraderStats {
            trader_id: self.id,
            ..TraderStats::default()
        };

        while let Some(order) = self.next_order() {
            self.process(order, &mut stats);
        }

        tracing::debug!(
            trader = self.id,
            applied = stats.orders_applied,
            "trader stopped"
        );
        stats
    }

    /// Returns the next order, or `None` once the buffer is empty and
    /// shutdown is raised. Emptiness is always checked before the signal.
    fn next_order(&self) -> Option<OrderHandle> {
        match self.strategy {
            WaitStrategy::SpinYield => loop {
                if let Some(order) = self.buffer.try_dequeue() {
                    return Some(order);
                }
                if self.shutdown.is_raised() {
                    return None;
                }
                thread::yield_now();
            },
            WaitStrategy::Blocking => self.buffer.dequeue_blocking(&self.shutdown),
        }
    }

    fn process(&self, order: OrderHandle, stats: &mut TraderStats) {
        let _unwind = CompleteOnUnwind(&order);
        let fill = self.market.apply(&order);
        match fill {
            Fill::Rejected => stats.sells_rejected += 1,
            Fill::UnknownStock => {
                stats.unknown_stocks += 1;
                tracing::warn!(trader = self.id, order = %order.id, stock = order.stock_id, "unknown stock");
            }
            Fill::Bought | Fill::Sold => {}
        }

        if !order.complete() {
            stats.double_completions += 1;
            tracing::error!(trader = self.id, order = %order.id, "order was already completed");
        }
        stats.orders_applied += 1;

        tracing::info!(
            trader = self.id,
            order = %order.id,
            stock = order.stock_id,
            quantity = order.quantity,
            ?fill,
            "order processed"
        );
    }
}

/// Completes the held order if the trader unwinds before finishing it, so
/// the waiting client is released.
struct CompleteOnUnwind<'a>(&'a Order);

impl Drop for CompleteOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() && self.0.complete() {
            tracing::error!(order = %self.0.id, "trader panicked, order released unapplied");
        }
    }
}
