// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Pipeline counters --------
pub static TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ticks_total", "market data ticks generated").unwrap());

pub static SIGNALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("signals_total", "non-empty signal batches per strategy"),
        &["strategy"],
    )
    .unwrap()
});

pub static ORDERS_ACCEPTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_accepted_total", "orders accepted by risk").unwrap());

pub static ORDERS_REJECTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_rejected_total", "orders rejected by risk").unwrap());

pub static FILLS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("fills_total", "orders filled by the simulator").unwrap());

pub static UNFILLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("orders_unfilled_total", "orders dropped by the fill coin flip").unwrap()
});

// -------- Gauges refreshed by the status loop --------
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("queue_depth", "items waiting per queue"), &["queue"]).unwrap()
});

pub static POSITION: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("position_units", "aggregate net position").unwrap());

pub static PNL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("pnl_quote", "aggregate realized PnL in quote units").unwrap());

pub static STRATEGY_PNL: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("strategy_pnl_quote", "per-strategy notional PnL"),
        &["strategy"],
    )
    .unwrap()
});

pub static STRATEGY_TRADES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("strategy_trades", "per-strategy signal batches emitted"),
        &["strategy"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(SIGNALS.clone())),
        REGISTRY.register(Box::new(ORDERS_ACCEPTED.clone())),
        REGISTRY.register(Box::new(ORDERS_REJECTED.clone())),
        REGISTRY.register(Box::new(FILLS.clone())),
        REGISTRY.register(Box::new(UNFILLED.clone())),
        REGISTRY.register(Box::new(QUEUE_DEPTH.clone())),
        REGISTRY.register(Box::new(POSITION.clone())),
        REGISTRY.register(Box::new(PNL.clone())),
        REGISTRY.register(Box::new(STRATEGY_PNL.clone())),
        REGISTRY.register(Box::new(STRATEGY_TRADES.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .unwrap_or_else(|e| panic!("metrics bind {} failed: {}", addr, e));
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {}", e),
            }
        }
    });
}
