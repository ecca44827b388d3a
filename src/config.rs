use crate::error::{ExchangeError, Result};
use crate::types::Action;

/// How workers suspend when they cannot make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Retry the non-blocking operation, yielding the processor between attempts
    SpinYield,
    /// Sleep on a condition variable until the opposite side signals
    #[default]
    Blocking,
}

/// What the coordinator does when a worker thread cannot be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnPolicy {
    /// Stop the run in order and report the failure
    #[default]
    Abort,
    /// Log the failure and continue with the workers that did start
    BestEffort,
}

/// How clients choose the contents of each order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPattern {
    /// Every order is identical
    Fixed {
        stock_id: usize,
        quantity: u64,
        action: Action,
    },
    /// Stock, quantity and action are drawn from a per-client seeded generator
    Random {
        seed: u64,
        /// Largest quantity an order may carry (at least 1)
        max_quantity: u64,
    },
}

impl Default for OrderPattern {
    fn default() -> Self {
        OrderPattern::Fixed {
            stock_id: 0,
            quantity: 10,
            action: Action::Buy,
        }
    }
}

/// Startup configuration for one exchange run.
///
/// ## Examples
///
/// ```
/// use exchange_bench::{ExchangeConfig, WaitStrategy};
///
/// let config = ExchangeConfig {
///     buffer_capacity: 51,
///     clients: 4,
///     traders: 2,
///     strategy: WaitStrategy::SpinYield,
///     ..ExchangeConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.total_orders(), 4000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Number of ring buffer slots; one is always kept free
    pub buffer_capacity: usize,
    /// Number of client (producer) threads
    pub clients: usize,
    /// Number of trader (consumer) threads
    pub traders: usize,
    /// Orders each client produces before it stops
    pub orders_per_client: u64,
    /// Number of distinct stocks in the market
    pub stocks: usize,
    /// Quantity every stock starts with
    pub initial_quantity: u64,
    /// Contents of generated orders
    pub pattern: OrderPattern,
    /// Suspension strategy for clients and traders
    pub strategy: WaitStrategy,
    /// Reaction to a worker thread that fails to start
    pub spawn_policy: SpawnPolicy,
    /// Record the id of every applied order in the market
    pub journal: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 50,
            clients: 1,
            traders: 1,
            orders_per_client: 1000,
            stocks: 500,
            initial_quantity: 1000,
            pattern: OrderPattern::default(),
            strategy: WaitStrategy::default(),
            spawn_policy: SpawnPolicy::default(),
            journal: false,
        }
    }
}

impl ExchangeConfig {
    /// Checks every value is in range.
    ///
    /// ## Errors
    ///
    /// Returns `ExchangeError::InvalidConfig` describing the first offending value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ExchangeError::InvalidConfig(message));

        if self.buffer_capacity < 2 {
            return invalid(format!(
                "buffer_capacity must be at least 2, got {}",
                self.buffer_capacity
            ));
        }
        if self.traders == 0 {
            return invalid("traders must be at least 1".to_string());
        }
        if self.stocks == 0 {
            return invalid("stocks must be at least 1".to_string());
        }

        match self.pattern {
            OrderPattern::Fixed {
                stock_id, quantity, ..
            } => {
                if stock_id >= self.stocks {
                    return invalid(format!(
                        "fixed stock_id {stock_id} is outside a market of {} stocks",
                        self.stocks
                    ));
                }
                if quantity == 0 {
                    return invalid("fixed quantity must be positive".to_string());
                }
            }
            OrderPattern::Random { max_quantity, .. } => {
                if max_quantity == 0 {
                    return invalid("max_quantity must be positive".to_string());
                }
            }
        }

        Ok(())
    }

    /// Returns the number of orders the whole run produces.
    pub fn total_orders(&self) -> u64 {
        self.clients as u64 * self.orders_per_client
    }
}
