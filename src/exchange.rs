use crate::client::{ClientStats, ClientWorker, OrderGenerator};
use crate::config::{ExchangeConfig, SpawnPolicy};
use crate::error::{ExchangeError, Result};
use crate::market::{Market, MarketSnapshot};
use crate::ring_buffer::RingBuffer;
use crate::shutdown::ShutdownSignal;
use crate::trader::{TraderStats, TraderWorker};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Totals of every client that ran
    pub clients: Vec<ClientStats>,
    /// Totals of every trader that ran
    pub traders: Vec<TraderStats>,
    /// Orders created by all clients
    pub orders_produced: u64,
    /// Orders completed by all traders
    pub orders_completed: u64,
    /// Sells that left the market unchanged
    pub sells_rejected: u64,
    /// Worker threads that failed to start under `SpawnPolicy::BestEffort`
    pub spawn_failures: usize,
    /// Orders found in the buffer after every trader stopped
    pub stranded_orders: usize,
    /// Wall time from the first spawn to the last join
    pub elapsed: Duration,
    /// Quantities of every stock at the end of the run
    pub market: MarketSnapshot,
}

impl RunReport {
    /// Completed orders per second of wall time.
    pub fn throughput(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.orders_completed as f64 / seconds
        } else {
            0.0
        }
    }
}

/// The coordinator: owns the ring buffer, the market and the shutdown signal,
/// and drives one run of the client/trader pipeline.
///
/// ## Shutdown protocol
///
/// 1. Traders are spawned, then clients
/// 2. Every client is joined, so no further order can be enqueued
/// 3. The shutdown signal is raised and every blocked trader is woken
/// 4. Every trader is joined; each one stops only after seeing an empty buffer
///
/// ## Examples
///
/// ```
/// use exchange_bench::{Exchange, ExchangeConfig};
///
/// let config = ExchangeConfig {
///     clients: 2,
///     traders: 2,
///     orders_per_client: 100,
///     ..ExchangeConfig::default()
/// };
/// let exchange = Exchange::new(config).unwrap();
/// let market = exchange.market();
///
/// let report = exchange.run().unwrap();
/// assert_eq!(report.orders_completed, 200);
/// assert_eq!(market.quantity(0), Some(1000 + 200 * 10));
/// ```
pub struct Exchange {
    config: ExchangeConfig,
    buffer: Arc<RingBuffer>,
    market: Arc<Market>,
    shutdown: ShutdownSignal,
    spawn_check: Option<SpawnCheck>,
}

/// Admission check run before each worker thread is started.
///
/// Receives the worker role (`"trader"` or `"client"`) and its id. An error
/// is treated exactly like a failed `thread::Builder::spawn`.
pub type SpawnCheck = Box<dyn Fn(&'static str, usize) -> io::Result<()> + Send + Sync>;

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("config", &self.config)
            .field("buffer", &self.buffer)
            .field("market", &self.market)
            .field("shutdown", &self.shutdown)
            .field("spawn_check", &self.spawn_check.is_some())
            .finish()
    }
}

struct Spawned<T> {
    handles: Vec<(usize, JoinHandle<T>)>,
    failures: Vec<(usize, io::Error)>,
}

impl Exchange {
    /// Validates the configuration and allocates the buffer and the market.
    ///
    /// ## Errors
    ///
    /// Returns `ExchangeError::InvalidConfig` for out-of-range settings.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        config.validate()?;

        let buffer = RingBuffer::new(config.buffer_capacity)?;
        let market = if config.journal {
            Market::with_journal(config.stocks, config.initial_quantity)?
        } else {
            Market::new(config.stocks, config.initial_quantity)?
        };

        Ok(Self {
            config,
            buffer: Arc::new(buffer),
            market: Arc::new(market),
            shutdown: ShutdownSignal::new(),
            spawn_check: None,
        })
    }

    /// Installs a check that can refuse to start a worker thread.
    ///
    /// Refusals follow the configured `SpawnPolicy`, so this can cap the
    /// number of threads a run may create.
    ///
    /// ## Examples
    ///
    /// ```
    /// use exchange_bench::{Exchange, ExchangeConfig, ExchangeError};
    /// use std::io;
    ///
    /// let config = ExchangeConfig { traders: 2, ..ExchangeConfig::default() };
    /// let exchange = Exchange::new(config).unwrap().with_spawn_check(|role, id| {
    ///     if role == "trader" && id == 1 {
    ///         return Err(io::Error::new(io::ErrorKind::Other, "thread limit"));
    ///     }
    ///     Ok(())
    /// });
    ///
    /// assert!(matches!(exchange.run(), Err(ExchangeError::Spawn { id: 1, .. })));
    /// ```
    pub fn with_spawn_check<C>(mut self, check: C) -> Self
    where
        C: Fn(&'static str, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        self.spawn_check = Some(Box::new(check));
        self
    }

    /// Returns a handle to the shared market, usable after the run.
    pub fn market(&self) -> Arc<Market> {
        Arc::clone(&self.market)
    }

    /// Returns a handle to the shared ring buffer.
    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Runs every client to completion, then shuts the traders down.
    ///
    /// ## Errors
    ///
    /// - `ExchangeError::Spawn` if a thread fails to start under `SpawnPolicy::Abort`
    /// - `ExchangeError::NoTraders` if no trader thread could start
    /// - `ExchangeError::WorkerPanicked` if a worker panicked
    ///
    /// On error the workers that did start are still shut down in protocol
    /// order. A spawn error takes precedence over a worker panic. A trader that
    /// panics completes the order it was holding, so its client still finishes;
    /// if every trader panics while clients still have orders, those clients
    /// never finish and `run` does not return.
    pub fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!(
            capacity = self.config.buffer_capacity,
            clients = self.config.clients,
            traders = self.config.traders,
            orders_per_client = self.config.orders_per_client,
            strategy = ?self.config.strategy,
            "starting exchange run"
        );

        let traders = self.spawn_traders();
        let trader_failures = traders.failures.len();

        if let Some(error) = self.spawn_error("trader", traders.failures) {
            if let Err(panicked) = self.stop_traders(traders.handles) {
                tracing::error!(%panicked, "trader failed while aborting the run");
            }
            return Err(error);
        }
        if traders.handles.is_empty() {
            return Err(ExchangeError::NoTraders {
                failed: trader_failures,
            });
        }

        let clients = self.spawn_clients();
        let spawn_failures = trader_failures + clients.failures.len();
        let client_error = self.spawn_error("client", clients.failures);

        // Clients are joined before shutdown even when a spawn failed, since
        // their in-flight orders still need traders.
        let client_results = join_all("client", clients.handles);
        let trader_stats = self.stop_traders(traders.handles);
        if let Some(error) = client_error {
            if let Err(panicked) = trader_stats {
                tracing::error!(%panicked, "trader failed while aborting the run");
            }
            return Err(error);
        }
        let trader_stats = trader_stats?;
        let client_stats = client_results
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let stranded_orders = self.buffer.drain().len();
        if stranded_orders > 0 {
            tracing::error!(stranded_orders, "orders left in the buffer after shutdown");
        }

        let report = RunReport {
            orders_produced: client_stats.iter().map(|c| c.orders_submitted).sum(),
            orders_completed: trader_stats.iter().map(|t| t.orders_applied).sum(),
            sells_rejected: trader_stats.iter().map(|t| t.sells_rejected).sum(),
            clients: client_stats,
            traders: trader_stats,
            spawn_failures,
            stranded_orders,
            elapsed: started.elapsed(),
            market: self.market.snapshot(),
        };

        tracing::info!(
            produced = report.orders_produced,
            completed = report.orders_completed,
            rejected = report.sells_rejected,
            elapsed_ms = report.elapsed.as_millis() as u64,
            throughput = report.throughput(),
            "exchange run finished"
        );
        Ok(report)
    }

    fn spawn_traders(&self) -> Spawned<TraderStats> {
        spawn_workers("trader", self.config.traders, self.spawn_check.as_ref(), |id| {
            let worker = TraderWorker {
                id,
                strategy: self.config.strategy,
                buffer: Arc::clone(&self.buffer),
                market: Arc::clone(&self.market),
                shutdown: self.shutdown.clone(),
            };
            move || worker.run()
        })
    }

    fn spawn_clients(&self) -> Spawned<Result<ClientStats>> {
        spawn_workers("client", self.config.clients, self.spawn_check.as_ref(), |id| {
            let worker = ClientWorker {
                id,
                orders: self.config.orders_per_client,
                strategy: self.config.strategy,
                generator: OrderGenerator::new(id, self.config.pattern, self.config.stocks),
                buffer: Arc::clone(&self.buffer),
            };
            move || worker.run()
        })
    }

    /// Applies the spawn policy to a batch of failures.
    fn spawn_error(
        &self,
        role: &'static str,
        failures: Vec<(usize, io::Error)>,
    ) -> Option<ExchangeError> {
        match self.config.spawn_policy {
            SpawnPolicy::Abort => failures
                .into_iter()
                .next()
                .map(|(id, source)| ExchangeError::Spawn { role, id, source }),
            SpawnPolicy::BestEffort => {
                for (id, source) in &failures {
                    tracing::warn!(role, id, %source, "worker failed to start, continuing without it");
                }
                None
            }
        }
    }

    /// Raises shutdown, wakes blocked traders and joins them.
    fn stop_traders(
        &self,
        handles: Vec<(usize, JoinHandle<TraderStats>)>,
    ) -> Result<Vec<TraderStats>> {
        self.shutdown.raise();
        self.buffer.wake_all();
        join_all("trader", handles).into_iter().collect()
    }
}

fn spawn_workers<T, F, B>(
    role: &'static str,
    count: usize,
    check: Option<&SpawnCheck>,
    mut build: B,
) -> Spawned<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
    B: FnMut(usize) -> F,
{
    let mut spawned = Spawned {
        handles: Vec::with_capacity(count),
        failures: Vec::new(),
    };

    for id in 0..count {
        let admitted = check.map_or(Ok(()), |check| check(role, id));
        let spawn = admitted.and_then(|()| {
            thread::Builder::new()
                .name(format!("{role}-{id}"))
                .spawn(build(id))
        });
        match spawn {
            Ok(handle) => spawned.handles.push((id, handle)),
            Err(source) => {
                tracing::error!(role, id, %source, "failed to spawn worker thread");
                spawned.failures.push((id, source));
            }
        }
    }

    spawned
}

fn join_all<T>(role: &'static str, handles: Vec<(usize, JoinHandle<T>)>) -> Vec<Result<T>> {
    handles
        .into_iter()
        .map(|(id, handle)| {
            handle
                .join()
                .map_err(|_| ExchangeError::WorkerPanicked { role, id })
        })
        .collect()
}
