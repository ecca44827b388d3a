use crate::error::{ExchangeError, Result};
use crate::types::{Action, Fill, Order, OrderId};
use parking_lot::Mutex;

/// A point-in-time copy of every stock quantity.
pub type MarketSnapshot = Vec<u64>;

#[derive(Debug)]
struct Ledger {
    stocks: Vec<u64>,
    journal: Option<Vec<OrderId>>,
}

/// The shared ledger mapping each stock id to the quantity held.
///
/// All reads and writes go through a single mutex, independent of the ring
/// buffer's lock. Traders never hold both at once.
///
/// A quantity can never go negative: a sell larger than the available
/// quantity leaves the stock untouched and reports `Fill::Rejected`.
#[derive(Debug)]
pub struct Market {
    ledger: Mutex<Ledger>,
}

impl Market {
    /// Creates a market of `stock_count` stocks, each holding `initial_quantity`.
    ///
    /// ## Errors
    ///
    /// Returns `ExchangeError::InvalidConfig` if `stock_count` is zero.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::Market;
    ///
    /// let market = Market::new(500, 1000).unwrap();
    /// assert_eq!(market.quantity(499), Some(1000));
    /// assert_eq!(market.quantity(500), None);
    /// ```
    pub fn new(stock_count: usize, initial_quantity: u64) -> Result<Self> {
        Self::build(stock_count, initial_quantity, None)
    }

    /// Creates a market that also records the id of every order it applies,
    /// in application order.
    pub fn with_journal(stock_count: usize, initial_quantity: u64) -> Result<Self> {
        Self::build(stock_count, initial_quantity, Some(Vec::new()))
    }

    fn build(
        stock_count: usize,
        initial_quantity: u64,
        journal: Option<Vec<OrderId>>,
    ) -> Result<Self> {
        if stock_count == 0 {
            return Err(ExchangeError::InvalidConfig(
                "market needs at least one stock".to_string(),
            ));
        }

        Ok(Self {
            ledger: Mutex::new(Ledger {
                stocks: vec![initial_quantity; stock_count],
                journal,
            }),
        })
    }

    /// Applies an order to the market and reports what happened.
    ///
    /// - `Buy` adds the quantity to the stock
    /// - `Sell` removes it only if the stock holds at least that much
    ///
    /// The caller completes the order whatever the outcome.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::{Action, Fill, Market, Order, OrderId};
    ///
    /// let market = Market::new(1, 5).unwrap();
    /// let id = OrderId { client: 0, sequence: 0 };
    /// let sell = Order::new(id, 0, 10, Action::Sell).unwrap();
    ///
    /// assert_eq!(market.apply(&sell), Fill::Rejected);
    /// assert_eq!(market.quantity(0), Some(5));
    /// ```
    pub fn apply(&self, order: &Order) -> Fill {
        let mut ledger = self.ledger.lock();

        let Some(held) = ledger.stocks.get_mut(order.stock_id) else {
            return Fill::UnknownStock;
        };

        let fill = match order.action {
            Action::Buy => {
                *held = held.saturating_add(order.quantity);
                Fill::Bought
            }
            Action::Sell => match held.checked_sub(order.quantity) {
                Some(remaining) => {
                    *held = remaining;
                    Fill::Sold
                }
                None => Fill::Rejected,
            },
        };

        if let Some(journal) = ledger.journal.as_mut() {
            journal.push(order.id);
        }

        fill
    }

    /// Returns the quantity held for a stock, or `None` if the id is unknown.
    pub fn quantity(&self, stock_id: usize) -> Option<u64> {
        self.ledger.lock().stocks.get(stock_id).copied()
    }

    /// Returns the number of stocks in the market.
    pub fn stock_count(&self) -> usize {
        self.ledger.lock().stocks.len()
    }

    /// Returns the sum of every stock quantity.
    pub fn total_quantity(&self) -> u64 {
        self.ledger.lock().stocks.iter().sum()
    }

    /// Returns a copy of every stock quantity, indexed by stock id.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.ledger.lock().stocks.clone()
    }

    /// Returns the ids of the orders applied so far, in application order.
    ///
    /// Empty unless the market was created with `Market::with_journal`.
    pub fn journal(&self) -> Vec<OrderId> {
        self.ledger.lock().journal.clone().unwrap_or_default()
    }
}
