use clap::{Parser, ValueEnum};
use exchange_bench::{
    Action, Exchange, ExchangeConfig, OrderPattern, RunReport, SpawnPolicy, WaitStrategy,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Retry with yield_now between attempts
    Spin,
    /// Sleep on condition variables
    Blocking,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnSpawnFailure {
    /// Stop the run and exit with an error
    Abort,
    /// Continue with the workers that started
    BestEffort,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ring buffer slots (one always stays free)
    #[arg(long, default_value_t = 50)]
    capacity: usize,

    /// Number of client threads
    #[arg(long, default_value_t = 1)]
    clients: usize,

    /// Number of trader threads
    #[arg(long, default_value_t = 1)]
    traders: usize,

    /// Orders produced by each client
    #[arg(long, default_value_t = 1000)]
    orders_per_client: u64,

    /// Number of distinct stocks
    #[arg(long, default_value_t = 500)]
    stocks: usize,

    /// Starting quantity of every stock
    #[arg(long, default_value_t = 1000)]
    initial_quantity: u64,

    /// How workers wait on a full or empty buffer
    #[arg(long, value_enum, default_value_t = Strategy::Blocking)]
    strategy: Strategy,

    /// What to do when a worker thread fails to start
    #[arg(long, value_enum, default_value_t = OnSpawnFailure::Abort)]
    spawn_policy: OnSpawnFailure,

    /// Draw stock, quantity and action at random instead of a fixed buy
    #[arg(long)]
    random: bool,

    /// Seed for --random
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Quantity of fixed orders, or the largest quantity with --random
    #[arg(long, default_value_t = 10)]
    quantity: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> ExchangeConfig {
        let pattern = if self.random {
            OrderPattern::Random {
                seed: self.seed,
                max_quantity: self.quantity,
            }
        } else {
            OrderPattern::Fixed {
                stock_id: 0,
                quantity: self.quantity,
                action: Action::Buy,
            }
        };

        ExchangeConfig {
            buffer_capacity: self.capacity,
            clients: self.clients,
            traders: self.traders,
            orders_per_client: self.orders_per_client,
            stocks: self.stocks,
            initial_quantity: self.initial_quantity,
            pattern,
            strategy: match self.strategy {
                Strategy::Spin => WaitStrategy::SpinYield,
                Strategy::Blocking => WaitStrategy::Blocking,
            },
            spawn_policy: match self.spawn_policy {
                OnSpawnFailure::Abort => SpawnPolicy::Abort,
                OnSpawnFailure::BestEffort => SpawnPolicy::BestEffort,
            },
            journal: false,
        }
    }
}

fn print_summary(report: &RunReport) {
    println!("orders produced:  {}", report.orders_produced);
    println!("orders completed: {}", report.orders_completed);
    println!("sells rejected:   {}", report.sells_rejected);
    for trader in &report.traders {
        println!(
            "  trader {}: {} applied, {} rejected",
            trader.trader_id, trader.orders_applied, trader.sells_rejected
        );
    }
    println!("elapsed:          {:?}", report.elapsed);
    println!("throughput:       {:.0} orders/s", report.throughput());
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    let result = Exchange::new(cli.config()).and_then(Exchange::run);
    match result {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "exchange run failed");
            ExitCode::FAILURE
        }
    }
}
