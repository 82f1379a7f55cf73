use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub status_transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub otp_events_total: IntCounterVec,
    pub skip_requests_total: IntCounterVec,
    pub active_driver_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Status transitions by entity and target status",
            ),
            &["entity", "status"],
        )
        .expect("valid status_transitions_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Driver assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let otp_events_total = IntCounterVec::new(
            Opts::new("otp_events_total", "Delivery codes by outcome"),
            &["outcome"],
        )
        .expect("valid otp_events_total metric");

        let skip_requests_total = IntCounterVec::new(
            Opts::new("skip_requests_total", "Skip requests by outcome"),
            &["outcome"],
        )
        .expect("valid skip_requests_total metric");

        let active_driver_orders = IntGauge::new(
            "active_driver_orders",
            "Driver orders currently pending or dispatched",
        )
        .expect("valid active_driver_orders metric");

        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(otp_events_total.clone()))
            .expect("register otp_events_total");
        registry
            .register(Box::new(skip_requests_total.clone()))
            .expect("register skip_requests_total");
        registry
            .register(Box::new(active_driver_orders.clone()))
            .expect("register active_driver_orders");

        Self {
            registry,
            status_transitions_total,
            assignments_total,
            otp_events_total,
            skip_requests_total,
            active_driver_orders,
        }
    }

    pub fn record_transition(&self, entity: &str, status: &str) {
        self.status_transitions_total
            .with_label_values(&[entity, status])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
