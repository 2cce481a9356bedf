//! A small `prometheus`-backed registry, exposed over `/metrics` on the
//! same listener as the DRS surface, mirroring how the teacher's own
//! `libs/metrics` wraps the same crate.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub outbox_objects_removed: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "download_controller_http_requests_total",
                "Total HTTP requests served, by route and status code",
            ),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let outbox_objects_removed = IntCounter::new(
            "download_controller_outbox_objects_removed_total",
            "Total outbox objects removed by the cleanup sweep",
        )?;
        registry.register(Box::new(outbox_objects_removed.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            outbox_objects_removed,
        })
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
