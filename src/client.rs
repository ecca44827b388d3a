use crate::config::{OrderPattern, WaitStrategy};
use crate::error::Result;
use crate::ring_buffer::RingBuffer;
use crate::types::{Action, Order, OrderHandle, OrderId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

/// Totals reported by a client once it has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    /// Identity of the client
    pub client_id: usize,
    /// Orders created, submitted and seen completed
    pub orders_submitted: u64,
}

/// Builds the orders of a single client.
#[derive(Debug)]
pub struct OrderGenerator {
    client_id: usize,
    next_sequence: u64,
    pattern: OrderPattern,
    stock_count: usize,
    rng: StdRng,
}

impl OrderGenerator {
    /// Creates a generator for `client_id` over a market of `stock_count` stocks.
    ///
    /// Random patterns mix the client id into the seed, so two clients with
    /// the same seed draw different sequences.
    pub fn new(client_id: usize, pattern: OrderPattern, stock_count: usize) -> Self {
        let seed = match pattern {
            OrderPattern::Random { seed, .. } => seed.wrapping_add(client_id as u64),
            OrderPattern::Fixed { .. } => client_id as u64,
        };

        Self {
            client_id,
            next_sequence: 0,
            pattern,
            stock_count: stock_count.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Builds the next order in this client's sequence.
    pub fn next_order(&mut self) -> Result<Order> {
        let id = OrderId {
            client: self.client_id,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        match self.pattern {
            OrderPattern::Fixed {
                stock_id,
                quantity,
                action,
            } => Order::new(id, stock_id, quantity, action),
            OrderPattern::Random { max_quantity, .. } => {
                let stock_id = self.rng.gen_range(0..self.stock_count);
                let quantity = self.rng.gen_range(1..=max_quantity.max(1));
                let action = if self.rng.gen_bool(0.5) {
                    Action::Buy
                } else {
                    Action::Sell
                };
                Order::new(id, stock_id, quantity, action)
            }
        }
    }
}

/// A producer thread: submits orders one at a time and waits for each to
/// complete before creating the next.
#[derive(Debug)]
pub struct ClientWorker {
    /// Identity of the client, also stamped into every order id
    pub id: usize,
    /// Number of orders to produce before stopping
    pub orders: u64,
    /// How to wait on a full buffer and on completion
    pub strategy: WaitStrategy,
    /// Source of the order contents
    pub generator: OrderGenerator,
    /// Buffer shared with the traders
    pub buffer: Arc<RingBuffer>,
}

impl ClientWorker {
    /// Runs the client to completion.
    ///
    /// ## Errors
    ///
    /// Fails only if the generator produces an invalid order, which a
    /// validated configuration rules out.
    pub fn run(mut self) -> Result<ClientStats> {
        tracing::debug!(client = self.id, orders = self.orders, "client started");

        for _ in 0..self.orders {
            let order = self.generator.next_order()?.into_handle();
            self.submit(Arc::clone(&order));
            self.await_completion(&order);
            // The trader may still hold its clone for a moment after completing.
            drop(order);
        }

        tracing::debug!(client = self.id, "client finished");
        Ok(ClientStats {
            client_id: self.id,
            orders_submitted: self.orders,
        })
    }

    fn submit(&self, order: OrderHandle) {
        match self.strategy {
            WaitStrategy::SpinYield => {
                let mut pending = order;
                while let Err(rejected) = self.buffer.try_enqueue(pending) {
                    pending = rejected;
                    thread::yield_now();
                }
            }
            WaitStrategy::Blocking => self.buffer.enqueue_blocking(order),
        }
    }

    fn await_completion(&self, order: &Order) {
        match self.strategy {
            WaitStrategy::SpinYield => {
                while !order.is_completed() {
                    thread::yield_now();
                }
            }
            WaitStrategy::Blocking => order.wait_completed(),
        }
    }
}
