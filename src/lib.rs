//! A bounded-buffer trading exchange built to benchmark producer/consumer
//! synchronization under contention.
//!
//! ## Architecture
//!
//! Orders flow through three shared structures, each with its own lock:
//!
//! 1. `RingBuffer`: a fixed-capacity circular buffer between clients and traders
//! 2. `Market`: the ledger of stock quantities traders apply orders to
//! 3. `Order`: each order carries its own completion monitor
//!
//! Client threads (producers) create an order, push it into the ring buffer and
//! wait for it to complete. Trader threads (consumers) pop orders, apply them to
//! the market and complete them. Completion travels straight back to the client
//! through the shared order, never through the buffer.
//!
//! The `Exchange` coordinator spawns both populations, joins every client,
//! raises the `ShutdownSignal`, and joins the traders once they have drained
//! the buffer.
//!
//! ## Example Usage
//!
//! ```rust
//! use exchange_bench::{Exchange, ExchangeConfig, WaitStrategy};
//!
//! let config = ExchangeConfig {
//!     buffer_capacity: 51,
//!     clients: 4,
//!     traders: 2,
//!     orders_per_client: 250,
//!     strategy: WaitStrategy::Blocking,
//!     ..ExchangeConfig::default()
//! };
//!
//! let report = Exchange::new(config).unwrap().run().unwrap();
//! assert_eq!(report.orders_completed, 1000);
//! println!("{:.0} orders/s", report.throughput());
//! ```
//!
//! Two wait strategies are available so they can be compared on the same
//! workload: `WaitStrategy::SpinYield` retries with `yield_now`, and
//! `WaitStrategy::Blocking` sleeps on condition variables ("buffer not full",
//! "buffer not empty or shutdown", "order completed").
//!
//! The buffer lock is held only for the index check and slot access, and the
//! market lock only for the quantity update, so no thread ever holds both.

mod client;
mod config;
mod error;
mod exchange;
mod market;
mod ring_buffer;
mod shutdown;
mod trader;
mod types;

// Re-export public API
pub use client::{ClientStats, ClientWorker, OrderGenerator};
pub use config::{ExchangeConfig, OrderPattern, SpawnPolicy, WaitStrategy};
pub use error::{ExchangeError, Result};
pub use exchange::{Exchange, RunReport, SpawnCheck};
pub use market::{Market, MarketSnapshot};
pub use ring_buffer::{BufferIndices, RingBuffer};
pub use shutdown::ShutdownSignal;
pub use trader::{TraderStats, TraderWorker};
pub use types::{Action, Fill, Order, OrderHandle, OrderId};
