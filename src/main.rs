// ===============================
// src/main.rs
// ===============================
//
// Console front end for the simulated trading pipeline. Wires config ->
// logging -> metrics -> recorder -> engine, then runs a small select! loop:
// a 2s status heartbeat plus stdin commands (digits toggle strategies by
// index, `b` prints the depth ladder, `q` quits; ctrl-c also stops).
//
// Everything here is a read-only consumer of engine snapshots; the pipeline
// does not depend on this loop for correctness.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::info;

use hftsim::config;
use hftsim::domain::Event;
use hftsim::engine::Engine;
use hftsim::metrics;
use hftsim::recorder;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config & limits ----
    let (args, limits) = config::load();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    // ---- Recorder (optional) ----
    let recorder_tx = args.record_file.clone().map(|path| {
        let (tx, rx) = mpsc::channel::<Event>(8192);
        tokio::spawn(recorder::run(rx, path));
        tx
    });

    let cfg = args.engine_config();
    let strategy_names: Vec<&'static str> = cfg.strategies.iter().map(|k| k.name()).collect();
    info!(
        symbol = %cfg.symbol,
        strategies = ?strategy_names,
        tick_ms = cfg.tick_interval.as_millis() as u64,
        fill_rate = cfg.fill_rate,
        max_position = limits.max_position,
        daily_loss_limit = limits.daily_loss_limit,
        "startup config"
    );

    let mut engine = Engine::new(cfg, limits, recorder_tx);
    engine.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut status = interval(Duration::from_secs(2));

    loop {
        select! {
            _ = status.tick() => log_status(&engine),
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(cmd)) => {
                        if !handle_command(&engine, cmd.trim()) {
                            break;
                        }
                    }
                    // stdin closed (piped input ran out): keep trading
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    engine.stop().await;
}

/// Returns false when the loop should exit.
fn handle_command(engine: &Engine, cmd: &str) -> bool {
    match cmd {
        "q" | "Q" => return false,
        "b" | "B" => println!("{}", engine.book().depth(5)),
        "" => {}
        other => match other.parse::<usize>() {
            Ok(index) => engine.toggle_strategy(index),
            Err(_) => info!("commands: [0-9] toggle strategy, b book, q quit"),
        },
    }
    true
}

fn log_status(engine: &Engine) {
    let (tick_depth, order_depth) = engine.queue_depths();
    let position = engine.risk().position();
    let pnl = engine.risk().pnl();
    let fills = engine.fills().len();

    metrics::QUEUE_DEPTH
        .with_label_values(&["ticks"])
        .set(tick_depth as i64);
    metrics::QUEUE_DEPTH
        .with_label_values(&["orders"])
        .set(order_depth as i64);
    metrics::POSITION.set(position);
    metrics::PNL.set(pnl);

    info!(position, pnl, tick_depth, order_depth, fills, "status");
    for (index, s) in engine.strategies().iter().enumerate() {
        metrics::STRATEGY_PNL
            .with_label_values(&[s.name()])
            .set(s.pnl());
        metrics::STRATEGY_TRADES
            .with_label_values(&[s.name()])
            .set(s.trades() as i64);
        info!(
            index,
            strategy = s.name(),
            active = s.is_active(),
            pnl = s.pnl(),
            trades = s.trades(),
            "strategy"
        );
    }
}
