use anyhow::Result;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::thread;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref CONTRACT_READS: IntCounter =
        register(IntCounter::new("bonzi_contract_reads_total", "eth_call reads issued by the facade"));
    pub static ref CONTRACT_READ_FAILURES: IntCounter =
        register(IntCounter::new("bonzi_contract_read_failures_total", "eth_call reads that failed"));
    pub static ref TX_SUBMITTED: IntCounterVec = register(IntCounterVec::new(
        Opts::new("bonzi_tx_submitted_total", "Transactions handed to the wallet"),
        &["kind"],
    ));
    pub static ref TX_CONFIRMED: IntCounter =
        register(IntCounter::new("bonzi_tx_confirmed_total", "Transactions confirmed with status 1"));
    pub static ref TX_FAILED: IntCounter =
        register(IntCounter::new("bonzi_tx_failed_total", "Transactions rejected, reverted or timed out"));
    pub static ref GATE_DECISIONS: IntCounterVec = register(IntCounterVec::new(
        Opts::new("bonzi_gate_decisions_total", "Access gate outcomes"),
        &["outcome"],
    ));
}

// Metric definitions are static; a failure here is a programming error caught by the tests below.
fn register<M>(m: prometheus::Result<M>) -> M
where
    M: prometheus::core::Collector + Clone + 'static,
{
    match m {
        Ok(metric) => {
            if let Err(e) = REGISTRY.register(Box::new(metric.clone())) {
                eprintln!("⚠️  Metric registration failed: {}", e);
            }
            metric
        }
        Err(e) => panic!("invalid metric definition: {e}"),
    }
}

pub fn serve(cfg: crate::config::Metrics) -> Result<()> {
    if !cfg.enabled {
        return Ok(());
    }
    let bind_addr = cfg.bind.clone();
    let content_type: tiny_http::Header = "Content-Type: text/plain; version=0.0.4; charset=utf-8"
        .parse()
        .map_err(|_| anyhow::anyhow!("bad metrics content-type header"))?;

    thread::spawn(move || {
        let server = match tiny_http::Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("🔥 Could not start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };
        crate::stack_log!("📈 Metrics on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = REGISTRY.gather();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                eprintln!("🔥 Could not encode metrics");
                continue;
            }
            let response = tiny_http::Response::from_data(buffer).with_header(content_type.clone());
            let _ = request.respond(response);
        }
    });

    Ok(())
}
