use exchange_bench::{
    Action, Exchange, ExchangeConfig, ExchangeError, Fill, Market, Order, OrderId, OrderPattern,
    RingBuffer, ShutdownSignal, SpawnPolicy, TraderWorker, WaitStrategy,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn order(client: usize, sequence: u64, stock_id: usize, quantity: u64, action: Action) -> Order {
    Order::new(OrderId { client, sequence }, stock_id, quantity, action).unwrap()
}

fn throughput_config(strategy: WaitStrategy) -> ExchangeConfig {
    ExchangeConfig {
        buffer_capacity: 51,
        clients: 4,
        traders: 2,
        orders_per_client: 1000,
        stocks: 10,
        initial_quantity: 100,
        pattern: OrderPattern::Fixed {
            stock_id: 0,
            quantity: 1,
            action: Action::Buy,
        },
        strategy,
        ..ExchangeConfig::default()
    }
}

#[test]
/// Test the throughput scenario: 4 clients x 1000 buys of one unit through 50 usable slots.
fn test_throughput_scenario_blocking() {
    let exchange = Exchange::new(throughput_config(WaitStrategy::Blocking)).unwrap();
    let market = exchange.market();
    assert_eq!(exchange.buffer().usable_capacity(), 50);

    let report = exchange.run().unwrap();

    assert_eq!(report.orders_produced, 4000);
    assert_eq!(report.orders_completed, 4000, "No order may be lost");
    assert_eq!(market.quantity(0), Some(100 + 4000));
    assert_eq!(report.market[0], 4100);
    assert_eq!(report.stranded_orders, 0);
}

#[test]
/// Test the same scenario with spin-yield waiting.
fn test_throughput_scenario_spin_yield() {
    let exchange = Exchange::new(throughput_config(WaitStrategy::SpinYield)).unwrap();
    let market = exchange.market();

    let report = exchange.run().unwrap();

    assert_eq!(report.orders_completed, 4000);
    assert_eq!(market.quantity(0), Some(4100));
    assert!(
        market.snapshot()[1..].iter().all(|&quantity| quantity == 100),
        "Untouched stocks must keep their initial quantity"
    );
}

#[test]
/// Test that the per-trader counts add up to exactly the number of orders produced.
fn test_no_lost_and_no_double_completion() {
    for strategy in [WaitStrategy::SpinYield, WaitStrategy::Blocking] {
        let config = ExchangeConfig {
            buffer_capacity: 4,
            clients: 6,
            traders: 3,
            orders_per_client: 300,
            strategy,
            ..ExchangeConfig::default()
        };
        let expected = config.total_orders();

        let report = Exchange::new(config).unwrap().run().unwrap();

        let applied: u64 = report.traders.iter().map(|t| t.orders_applied).sum();
        let doubles: u64 = report.traders.iter().map(|t| t.double_completions).sum();
        assert_eq!(applied, expected, "{strategy:?}: every order must be applied");
        assert_eq!(doubles, 0, "{strategy:?}: no order may be completed twice");
        assert_eq!(report.clients.len(), 6);
        assert_eq!(report.traders.len(), 3);
    }
}

#[test]
/// Test that a sell larger than the stock leaves it unchanged and still completes.
fn test_sell_floor_policy() {
    let buffer = Arc::new(RingBuffer::new(8).unwrap());
    let market = Arc::new(Market::new(1, 5).unwrap());
    let shutdown = ShutdownSignal::new();

    let sell = order(0, 0, 0, 10, Action::Sell).into_handle();
    buffer.try_enqueue(Arc::clone(&sell)).unwrap();
    shutdown.raise();

    let stats = TraderWorker {
        id: 0,
        strategy: WaitStrategy::Blocking,
        buffer: Arc::clone(&buffer),
        market: Arc::clone(&market),
        shutdown,
    }
    .run();

    assert_eq!(market.quantity(0), Some(5), "Stock must stay at 5");
    assert!(sell.is_completed(), "The rejected sell must still be completed");
    assert_eq!(stats.orders_applied, 1);
    assert_eq!(stats.sells_rejected, 1);
}

#[test]
/// Test market application rules directly.
fn test_market_apply_outcomes() {
    let market = Market::new(3, 5).unwrap();

    assert_eq!(market.apply(&order(0, 0, 0, 3, Action::Buy)), Fill::Bought);
    assert_eq!(market.quantity(0), Some(8));

    assert_eq!(market.apply(&order(0, 1, 0, 8, Action::Sell)), Fill::Sold);
    assert_eq!(market.quantity(0), Some(0), "Selling everything is allowed");

    assert_eq!(market.apply(&order(0, 2, 0, 1, Action::Sell)), Fill::Rejected);
    assert_eq!(market.quantity(0), Some(0));

    assert_eq!(
        market.apply(&order(0, 3, 7, 1, Action::Buy)),
        Fill::UnknownStock
    );
    assert_eq!(market.total_quantity(), 10);
    assert_eq!(market.stock_count(), 3);
}

#[test]
/// Test that random buys and sells never drive a stock negative and keep the books balanced.
fn test_market_non_negativity_under_random_load() {
    let config = ExchangeConfig {
        buffer_capacity: 16,
        clients: 4,
        traders: 4,
        orders_per_client: 500,
        stocks: 5,
        initial_quantity: 20,
        pattern: OrderPattern::Random {
            seed: 7,
            max_quantity: 15,
        },
        ..ExchangeConfig::default()
    };

    let exchange = Exchange::new(config).unwrap();
    let market = exchange.market();
    let report = exchange.run().unwrap();

    assert_eq!(report.orders_completed, 2000);
    assert_eq!(market.snapshot(), report.market);
    // `u64` cannot be negative; the rejection count shows the floor was exercised.
    assert!(report.sells_rejected > 0, "Random load should hit the sell floor");
    assert!(report.orders_completed >= report.sells_rejected);
}

#[test]
/// Test that the market journal records one client's orders in creation order.
fn test_single_client_single_trader_fifo() {
    let config = ExchangeConfig {
        buffer_capacity: 8,
        clients: 1,
        traders: 1,
        orders_per_client: 500,
        stocks: 4,
        pattern: OrderPattern::Random {
            seed: 3,
            max_quantity: 5,
        },
        journal: true,
        ..ExchangeConfig::default()
    };

    let exchange = Exchange::new(config).unwrap();
    let market = exchange.market();
    exchange.run().unwrap();

    let journal = market.journal();
    let expected: Vec<OrderId> = (0..500)
        .map(|sequence| OrderId {
            client: 0,
            sequence,
        })
        .collect();
    assert_eq!(journal, expected);
}

#[test]
/// Test that with one producer and one consumer the buffer preserves enqueue order.
fn test_ring_buffer_fifo_single_producer_single_consumer() {
    let buffer = Arc::new(RingBuffer::new(5).unwrap());
    let total = 2000u64;

    let producer_buffer = Arc::clone(&buffer);
    let producer = thread::spawn(move || {
        for sequence in 0..total {
            producer_buffer.enqueue_blocking(order(0, sequence, 0, 1, Action::Buy).into_handle());
        }
    });

    let shutdown = ShutdownSignal::new();
    let mut received = Vec::with_capacity(total as usize);
    while received.len() < total as usize {
        let next = buffer.dequeue_blocking(&shutdown).unwrap();
        received.push(next.id.sequence);
    }
    producer.join().unwrap();

    assert!(received.iter().copied().eq(0..total));
}

#[test]
/// Test the one-free-slot rule and index wrap-around.
fn test_ring_buffer_full_and_empty() {
    let buffer = RingBuffer::new(4).unwrap();
    assert!(buffer.is_empty());
    assert!(buffer.try_dequeue().is_none());

    for sequence in 0..3 {
        buffer
            .try_enqueue(order(0, sequence, 0, 1, Action::Buy).into_handle())
            .unwrap();
    }
    assert!(buffer.is_full());
    assert_eq!(buffer.len(), 3);

    let rejected = buffer
        .try_enqueue(order(0, 3, 0, 1, Action::Buy).into_handle())
        .unwrap_err();
    assert_eq!(rejected.id.sequence, 3, "A full buffer hands the order back");

    assert_eq!(buffer.try_dequeue().unwrap().id.sequence, 0);
    buffer.try_enqueue(rejected).unwrap();
    assert_eq!(buffer.indices().head, 0, "Head wraps to slot 0");

    let drained: Vec<u64> = std::iter::from_fn(|| buffer.try_dequeue())
        .map(|order| order.id.sequence)
        .collect();
    assert_eq!(drained, vec![1, 2, 3]);
    assert!(buffer.is_empty());
}

#[test]
/// Test that a buffer of fewer than two slots is refused.
fn test_ring_buffer_rejects_tiny_capacity() {
    assert!(matches!(
        RingBuffer::new(1),
        Err(ExchangeError::InvalidConfig(_))
    ));
    assert!(RingBuffer::new(0).is_err());
}

#[test]
/// Test that draining and dropping the buffer releases every queued order.
fn test_ring_buffer_teardown_releases_orders() {
    let buffer = RingBuffer::new(6).unwrap();
    let kept: Vec<_> = (0..5)
        .map(|sequence| order(0, sequence, 0, 1, Action::Buy).into_handle())
        .collect();
    for handle in &kept {
        buffer.try_enqueue(Arc::clone(handle)).unwrap();
    }
    assert!(kept.iter().all(|handle| Arc::strong_count(handle) == 2));

    let drained = buffer.drain();
    assert_eq!(drained.len(), 5);
    assert!(buffer.is_empty());
    drop(drained);
    assert!(kept.iter().all(|handle| Arc::strong_count(handle) == 1));

    for handle in &kept[..3] {
        buffer.try_enqueue(Arc::clone(handle)).unwrap();
    }
    drop(buffer);
    assert!(
        kept.iter().all(|handle| Arc::strong_count(handle) == 1),
        "Dropping the buffer must release queued orders"
    );
}

#[test]
/// Test that a blocked trader wakes and stops once shutdown is raised.
fn test_blocked_trader_wakes_on_shutdown() {
    let buffer = Arc::new(RingBuffer::new(4).unwrap());
    let market = Arc::new(Market::new(1, 0).unwrap());
    let shutdown = ShutdownSignal::new();

    let worker = TraderWorker {
        id: 0,
        strategy: WaitStrategy::Blocking,
        buffer: Arc::clone(&buffer),
        market,
        shutdown: shutdown.clone(),
    };
    let trader = thread::spawn(move || worker.run());

    thread::sleep(Duration::from_millis(50));
    assert!(!trader.is_finished(), "An idle trader must not stop before shutdown");

    shutdown.raise();
    buffer.wake_all();
    let stats = trader.join().unwrap();
    assert_eq!(stats.orders_applied, 0);
}

#[test]
/// Test that orders queued before shutdown are all applied before traders stop.
fn test_shutdown_drains_queued_orders() {
    for strategy in [WaitStrategy::SpinYield, WaitStrategy::Blocking] {
        let buffer = Arc::new(RingBuffer::new(32).unwrap());
        let market = Arc::new(Market::new(1, 0).unwrap());
        let shutdown = ShutdownSignal::new();

        let orders: Vec<_> = (0..31)
            .map(|sequence| order(0, sequence, 0, 2, Action::Buy).into_handle())
            .collect();
        for handle in &orders {
            buffer.try_enqueue(Arc::clone(handle)).unwrap();
        }
        // Raised before any trader runs: the queued orders must still be applied.
        shutdown.raise();

        let traders: Vec<_> = (0..3)
            .map(|id| {
                let worker = TraderWorker {
                    id,
                    strategy,
                    buffer: Arc::clone(&buffer),
                    market: Arc::clone(&market),
                    shutdown: shutdown.clone(),
                };
                thread::spawn(move || worker.run())
            })
            .collect();
        let applied: u64 = traders
            .into_iter()
            .map(|trader| trader.join().unwrap().orders_applied)
            .sum();

        assert_eq!(applied, 31, "{strategy:?}");
        assert!(buffer.is_empty());
        assert_eq!(market.quantity(0), Some(62));
        assert!(orders.iter().all(|order| order.is_completed()));
    }
}

#[test]
/// Test that completion is a one-time transition that wakes a blocked waiter.
fn test_order_completion_handshake() {
    let handle = order(1, 0, 0, 1, Action::Buy).into_handle();
    let waiting = Arc::new(AtomicBool::new(true));

    let waiter_handle = Arc::clone(&handle);
    let waiter_flag = Arc::clone(&waiting);
    let waiter = thread::spawn(move || {
        waiter_handle.wait_completed();
        waiter_flag.store(false, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(20));
    assert!(waiting.load(Ordering::SeqCst));

    assert!(handle.complete(), "First completion performs the transition");
    assert!(!handle.complete(), "Second completion is refused");
    waiter.join().unwrap();
    assert!(!waiting.load(Ordering::SeqCst));
    assert!(handle.is_completed());
}

#[test]
/// Test that zero-quantity orders are refused.
fn test_zero_quantity_order_is_invalid() {
    let result = Order::new(OrderId { client: 0, sequence: 0 }, 0, 0, Action::Buy);
    assert!(matches!(result, Err(ExchangeError::InvalidOrder(_))));
}

#[test]
/// Test configuration validation boundaries.
fn test_config_validation() {
    assert!(ExchangeConfig::default().validate().is_ok());

    let invalid = [
        ExchangeConfig {
            buffer_capacity: 1,
            ..ExchangeConfig::default()
        },
        ExchangeConfig {
            traders: 0,
            ..ExchangeConfig::default()
        },
        ExchangeConfig {
            stocks: 0,
            ..ExchangeConfig::default()
        },
        ExchangeConfig {
            stocks: 5,
            pattern: OrderPattern::Fixed {
                stock_id: 5,
                quantity: 1,
                action: Action::Buy,
            },
            ..ExchangeConfig::default()
        },
        ExchangeConfig {
            pattern: OrderPattern::Random {
                seed: 0,
                max_quantity: 0,
            },
            ..ExchangeConfig::default()
        },
    ];

    for config in invalid {
        assert!(
            matches!(Exchange::new(config.clone()), Err(ExchangeError::InvalidConfig(_))),
            "{config:?} should be rejected"
        );
    }
}

#[test]
/// Test that a run with no clients starts and stops cleanly.
fn test_run_without_clients() {
    let config = ExchangeConfig {
        clients: 0,
        traders: 3,
        spawn_policy: SpawnPolicy::BestEffort,
        ..ExchangeConfig::default()
    };

    let report = Exchange::new(config).unwrap().run().unwrap();
    assert_eq!(report.orders_produced, 0);
    assert_eq!(report.orders_completed, 0);
    assert_eq!(report.spawn_failures, 0);
    assert_eq!(report.market, vec![1000; 500]);
}

/// Builds a spawn check refusing the listed `(role, id)` pairs.
fn refuse(
    refused: &'static [(&'static str, usize)],
) -> impl Fn(&'static str, usize) -> io::Result<()> + Send + Sync + 'static {
    move |role, id| {
        if refused.contains(&(role, id)) {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
        } else {
            Ok(())
        }
    }
}

#[test]
/// Test that a trader failing to start aborts the run after the started traders stop.
fn test_trader_spawn_failure_aborts() {
    let config = ExchangeConfig {
        clients: 2,
        traders: 3,
        orders_per_client: 50,
        spawn_policy: SpawnPolicy::Abort,
        ..ExchangeConfig::default()
    };
    let exchange = Exchange::new(config)
        .unwrap()
        .with_spawn_check(refuse(&[("trader", 1)]));
    let market = exchange.market();
    let buffer = exchange.buffer();

    let result = exchange.run();

    assert!(
        matches!(result, Err(ExchangeError::Spawn { role: "trader", id: 1, .. })),
        "Expected the trader spawn error, got {result:?}"
    );
    assert_eq!(
        Arc::strong_count(&market),
        1,
        "Every started trader must have been joined"
    );
    assert_eq!(Arc::strong_count(&buffer), 1);
    assert_eq!(market.quantity(0), Some(1000), "No client may have run");
}

#[test]
/// Test that a client failing to start aborts only after the started clients finish.
fn test_client_spawn_failure_aborts_after_started_clients() {
    let config = ExchangeConfig {
        clients: 3,
        traders: 2,
        orders_per_client: 200,
        spawn_policy: SpawnPolicy::Abort,
        ..ExchangeConfig::default()
    };
    let exchange = Exchange::new(config)
        .unwrap()
        .with_spawn_check(refuse(&[("client", 2)]));
    let market = exchange.market();
    let buffer = exchange.buffer();

    let result = exchange.run();

    assert!(
        matches!(result, Err(ExchangeError::Spawn { role: "client", id: 2, .. })),
        "Expected the client spawn error, got {result:?}"
    );
    assert_eq!(
        market.quantity(0),
        Some(1000 + 2 * 200 * 10),
        "Clients 0 and 1 must have completed all their orders"
    );
    assert!(buffer.is_empty());
    assert_eq!(Arc::strong_count(&market), 1);
}

#[test]
/// Test that best-effort runs continue with the workers that started.
fn test_best_effort_continues_with_fewer_workers() {
    for strategy in [WaitStrategy::SpinYield, WaitStrategy::Blocking] {
        let config = ExchangeConfig {
            clients: 4,
            traders: 3,
            orders_per_client: 300,
            strategy,
            spawn_policy: SpawnPolicy::BestEffort,
            ..ExchangeConfig::default()
        };
        let exchange = Exchange::new(config)
            .unwrap()
            .with_spawn_check(refuse(&[("trader", 0), ("client", 3)]));
        let market = exchange.market();

        let report = exchange.run().unwrap();

        assert_eq!(report.spawn_failures, 2, "{strategy:?}");
        assert_eq!(report.traders.len(), 2);
        assert!(report.traders.iter().all(|t| t.trader_id != 0));
        assert_eq!(report.clients.len(), 3);
        assert!(report.clients.iter().all(|c| c.client_id != 3));
        assert_eq!(report.orders_produced, 900);
        assert_eq!(report.orders_completed, 900, "Every submitted order must complete");
        assert_eq!(report.stranded_orders, 0);
        assert_eq!(market.quantity(0), Some(1000 + 900 * 10));
    }
}

#[test]
/// Test that a run where no trader starts fails instead of blocking its clients.
fn test_no_traders_started() {
    let config = ExchangeConfig {
        clients: 2,
        traders: 2,
        spawn_policy: SpawnPolicy::BestEffort,
        ..ExchangeConfig::default()
    };
    let exchange = Exchange::new(config)
        .unwrap()
        .with_spawn_check(refuse(&[("trader", 0), ("trader", 1)]));
    let market = exchange.market();

    let result = exchange.run();

    assert!(
        matches!(result, Err(ExchangeError::NoTraders { failed: 2 })),
        "Expected NoTraders, got {result:?}"
    );
    assert_eq!(market.quantity(0), Some(1000), "No client may have started");
}
