// Prometheus metrics definitions for the economy backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Battles currently running (0 or 1, one lobby at a time).
    pub static ref ACTIVE_BATTLES: IntGauge =
        IntGauge::new("economy_active_battles", "Battle royales currently running").unwrap();

    /// Participants in the open lobby.
    pub static ref LOBBY_PARTICIPANTS: IntGauge =
        IntGauge::new("economy_lobby_participants", "Participants in the open lobby").unwrap();

    /// Live WebSocket connections.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("economy_connected_websockets", "Live WebSocket connections").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    pub static ref BATTLES_STARTED_TOTAL: IntCounter = IntCounter::new(
        "economy_battles_started_total",
        "Battle royale lobbies opened",
    )
    .unwrap();

    pub static ref BATTLES_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "economy_battles_completed_total",
        "Battle royales fought to the end",
    )
    .unwrap();

    /// Lobbies closed without a fight, by reason (cancelled, stopped).
    pub static ref BATTLES_ABANDONED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_battles_abandoned_total", "Lobbies closed without a winner"),
        &["reason"],
    )
    .unwrap();

    /// Eliminations, by kind (kill, suicide).
    pub static ref ELIMINATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_eliminations_total", "Battle royale eliminations"),
        &["kind"],
    )
    .unwrap();

    pub static ref BLOCKS_TOTAL: IntCounter =
        IntCounter::new("economy_blocks_total", "Blocked attacks").unwrap();

    /// Ledger operations that failed, by operation.
    pub static ref LEDGER_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_ledger_failures_total", "Failed ledger operations"),
        &["operation"],
    )
    .unwrap();

    /// Label writes, by action (created, updated, deleted).
    pub static ref LABEL_WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_label_writes_total", "Label writes"),
        &["action"],
    )
    .unwrap();

    /// Total WebSocket messages sent to clients.
    pub static ref WEBSOCKET_MESSAGES_SENT_TOTAL: IntCounter = IntCounter::new(
        "economy_websocket_messages_sent_total",
        "Total WebSocket messages sent",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Rounds needed to finish a battle.
    pub static ref BATTLE_ROUNDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("economy_battle_rounds", "Rounds per battle royale")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0]),
    )
    .unwrap();

    /// Participants per battle.
    pub static ref BATTLE_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("economy_battle_size", "Participants per battle royale")
            .buckets(vec![3.0, 4.0, 6.0, 8.0, 12.0, 16.0, 24.0, 32.0, 64.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_BATTLES.clone()),
        Box::new(LOBBY_PARTICIPANTS.clone()),
        Box::new(CONNECTED_WEBSOCKETS.clone()),
        Box::new(BATTLES_STARTED_TOTAL.clone()),
        Box::new(BATTLES_COMPLETED_TOTAL.clone()),
        Box::new(BATTLES_ABANDONED_TOTAL.clone()),
        Box::new(ELIMINATIONS_TOTAL.clone()),
        Box::new(BLOCKS_TOTAL.clone()),
        Box::new(LEDGER_FAILURES_TOTAL.clone()),
        Box::new(LABEL_WRITES_TOTAL.clone()),
        Box::new(WEBSOCKET_MESSAGES_SENT_TOTAL.clone()),
        Box::new(BATTLE_ROUNDS.clone()),
        Box::new(BATTLE_SIZE.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("Metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        // Registering twice must not panic
        register_metrics();
        register_metrics();
        BATTLES_STARTED_TOTAL.inc();
        let output = gather_metrics();
        assert!(output.contains("economy_battles_started_total"));
    }

    #[test]
    fn test_metric_increments() {
        LOBBY_PARTICIPANTS.set(3);
        assert_eq!(LOBBY_PARTICIPANTS.get(), 3);
        LOBBY_PARTICIPANTS.set(0);

        CONNECTED_WEBSOCKETS.inc();
        CONNECTED_WEBSOCKETS.dec();

        ELIMINATIONS_TOTAL.with_label_values(&["kill"]).inc();
        ELIMINATIONS_TOTAL.with_label_values(&["suicide"]).inc();
        BATTLES_ABANDONED_TOTAL.with_label_values(&["cancelled"]).inc();
        LEDGER_FAILURES_TOTAL.with_label_values(&["pay_winner"]).inc();
        LABEL_WRITES_TOTAL.with_label_values(&["created"]).inc();
        BLOCKS_TOTAL.inc();

        BATTLE_ROUNDS.observe(4.0);
        BATTLE_SIZE.observe(5.0);
    }
}
