use orbbot::backtest::{SessionGenerator, SessionReplay, SessionScenario, MNQ_POINT_VALUE};
use orbbot::config::{BotConfig, ScheduleConfig};
use orbbot::execution::{Broker, DispatchOutcome, Executor, ExecutorSettings, PaperBroker, Scheduler};
use orbbot::risk::{load_performance, AccountKind, ContractSizer};
use orbbot::strategy::{Action, DecisionEngine, OrbConfig, TradeAttemptState};
use chrono::NaiveTime;
use std::io::Write;
use std::sync::Arc;
use tokio_test::assert_ok;

fn settings(client_id: i32) -> ExecutorSettings {
    ExecutorSettings {
        client_id,
        lookback: "1 D".to_string(),
        candle_interval_minutes: 5,
        candle_timezone: None,
        order_id_poll_attempts: 1,
        order_id_poll_interval: std::time::Duration::ZERO,
    }
}

fn executor(broker: Arc<PaperBroker>, client_id: i32, quantity: u32) -> Executor<PaperBroker> {
    Executor::new(
        broker,
        DecisionEngine::new(OrbConfig::default(), "MNQ"),
        settings(client_id),
        quantity,
    )
}

#[tokio::test]
async fn test_e2e_short_target_session() {
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Short breakout to target ===\n");
    let (candles, range) = SessionGenerator::new(21).generate(SessionScenario::ShortTarget);
    println!("   Range {:.2} - {:.2}", range.low, range.high);

    let report = assert_ok!(SessionReplay::new(OrbConfig::default(), "MNQ", 1).run(candles).await);

    assert_eq!(report.initial_placements(), 1);
    assert_eq!(report.reentries(), 0);
    assert_eq!(report.cancels(), 0);
    assert_eq!(report.final_state, TradeAttemptState::ClosedOnTarget);

    let trade = &report.metrics.trades[0];
    assert_eq!(trade.entry_price, range.low);
    assert_eq!(trade.exit_price, range.low - 2.0 * range.width());
    println!("   ✓ Short {:.2} -> {:.2}, ${:.2}", trade.entry_price, trade.exit_price, trade.pnl);

    // First placement happens on the anchor bar
    assert_eq!(
        report.actions[0].time.map(|t| t.time()),
        NaiveTime::from_hms_opt(7, 35, 0)
    );
}

#[tokio::test]
async fn test_e2e_stale_reentry_cancelled_at_cutoff() {
    println!("=== Re-entry that never triggers ===\n");
    let (candles, range) = SessionGenerator::new(13).generate(SessionScenario::StaleReentry);

    let report = assert_ok!(SessionReplay::new(OrbConfig::default(), "MNQ", 1).run(candles).await);

    assert_eq!(report.initial_placements(), 1);
    assert_eq!(report.reentries(), 1);
    assert_eq!(report.cancels(), 1);
    assert_eq!(report.open_orders, 0);
    assert_eq!(report.fills.len(), 2);
    assert_eq!(report.final_state, TradeAttemptState::Cancelled);

    let cancel = report
        .actions
        .iter()
        .find(|a| matches!(a.action, Action::CancelOrder { .. }))
        .unwrap();
    assert_eq!(cancel.time.map(|t| t.time()), NaiveTime::from_hms_opt(13, 30, 0));

    // Only the stop-out loss was realized
    let expected = -range.width() * MNQ_POINT_VALUE;
    assert!((report.metrics.total_pnl - expected).abs() < 1e-9);
    println!("   ✓ Stale bracket cancelled at 13:30, P&L ${:.2}", report.metrics.total_pnl);
}

#[tokio::test]
async fn test_e2e_every_scenario_places_exactly_one_initial_group() {
    for scenario in SessionScenario::all() {
        let (candles, _) = SessionGenerator::new(1).generate(scenario);
        let report = assert_ok!(SessionReplay::new(OrbConfig::default(), "MNQ", 1).run(candles).await);

        assert_eq!(report.initial_placements(), 1, "{:?}", scenario);
        assert!(report.reentries() <= 1, "{:?}", scenario);
        println!("   ✓ {:?}: {} actions, {} fills", scenario, report.actions.len(), report.fills.len());
    }
}

#[tokio::test]
async fn test_e2e_restart_resumes_from_broker_state() {
    println!("=== Process restart after the stop-out ===\n");
    let (candles, _) = SessionGenerator::new(5).generate(SessionScenario::LongStopThenReentry);
    let broker = Arc::new(PaperBroker::new("MNQ", 7).with_feed(candles));

    // First process: runs through the anchor and the first trade
    {
        let mut first = executor(broker.clone(), 7, 1);
        for _ in 0..9 {
            broker.advance().unwrap();
            first.run_cycle().await.unwrap();
        }
    }
    assert_eq!(broker.fills().unwrap().len(), 1);

    // Stop bar trades while nothing is running
    broker.advance().unwrap();
    assert_eq!(broker.fills().unwrap().len(), 2);

    // Fresh process with no memory of the morning
    let mut second = executor(broker.clone(), 7, 1);
    let report = second.run_cycle().await.unwrap();

    assert_eq!(report.decision.state, TradeAttemptState::ClosedStoppedOut);
    assert!(matches!(report.decision.action, Action::PlaceReentryBracket(_)));
    assert!(matches!(report.outcome, DispatchOutcome::Placed { legs: 3, .. }));
    assert_eq!(broker.open_orders().await.unwrap().len(), 3);
    println!("   ✓ Re-entry placed by the restarted process");
}

#[tokio::test]
async fn test_e2e_other_client_fills_do_not_count() {
    let (candles, _) = SessionGenerator::new(5).generate(SessionScenario::LongStopThenReentry);
    let broker = Arc::new(PaperBroker::new("MNQ", 7).with_feed(candles));

    // Another algorithm on the same account already traded twice today
    broker
        .record_foreign_execution(3, "ExecId: a, ClientId: 3, OrderId: 90, AvgPrice: 20500.00")
        .unwrap();
    broker
        .record_foreign_execution(3, "ExecId: b, ClientId: 3, OrderId: 91, AvgPrice: 20510.00")
        .unwrap();

    let mut bot = executor(broker.clone(), 7, 1);
    let mut placed = Vec::new();
    while broker.advance().unwrap().is_some() {
        let report = bot.run_cycle().await.unwrap();
        if let DispatchOutcome::Placed { legs, .. } = report.outcome {
            placed.push(legs);
        }
    }

    assert_eq!(placed, vec![6, 3]);
}

#[tokio::test]
async fn test_e2e_sizing_scales_replay_pnl() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"account": "sim", "gross_profit": 3100.0, "commissions": 40.0}},
            {{"account": "sim", "gross_profit": 1100.0, "commissions": 20.0}},
            {{"account": "live", "gross_profit": -900.0, "commissions": 10.0}}
        ]"#
    )
    .unwrap();

    let records = assert_ok!(load_performance(file.path()));
    let sizer = ContractSizer::default();
    let contracts = sizer.contracts_for(&records, AccountKind::Sim);
    assert_eq!(contracts, 3);
    assert_eq!(sizer.contracts_for(&records, AccountKind::Live), 0);

    let (candles, range) = SessionGenerator::new(42).generate(SessionScenario::LongTarget);
    let report = assert_ok!(
        SessionReplay::new(OrbConfig::default(), "MNQ", contracts)
            .run(candles)
            .await
    );

    assert!(report.fills.iter().all(|f| f.quantity == 3));
    let expected = 3.0 * 2.0 * range.width() * MNQ_POINT_VALUE;
    assert!((report.metrics.total_pnl - expected).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_scheduler_runs_paper_session() {
    println!("=== Scheduler over a paper session ===\n");
    let (candles, _) = SessionGenerator::new(5).generate(SessionScenario::LongStopThenReentry);
    let bars = candles.len() as u64;

    let config = BotConfig {
        client_id: 7,
        order_id_poll_attempts: 1,
        schedule: ScheduleConfig {
            max_cycles: Some(bars),
            ..ScheduleConfig::default()
        },
        ..BotConfig::default()
    };

    let broker = Arc::new(
        PaperBroker::new("MNQ", config.client_id)
            .with_feed(candles)
            .with_auto_advance(),
    );
    let mut bot = Executor::new(
        broker.clone(),
        DecisionEngine::new(config.strategy.clone(), config.symbol.clone()),
        assert_ok!(ExecutorSettings::from_config(&config)),
        1,
    );

    let summary = assert_ok!(
        Scheduler::new(config.schedule.clone())
            .without_trading_hours_gate()
            .run(&mut bot)
            .await
    );

    assert_eq!(summary.cycles, bars);
    assert_eq!(summary.errors, 0);
    assert!(matches!(summary.actions[0], Action::PlaceInitialBracket(_)));
    assert!(matches!(summary.actions[1], Action::PlaceReentryBracket(_)));
    assert_eq!(broker.fills().unwrap().len(), 4);
    assert_eq!(broker.pending_candles().unwrap(), 0);
    println!("   ✓ {} cycles, realized {:.2} points", summary.cycles, broker.realized_points().unwrap());
}
