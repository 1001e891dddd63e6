use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub order_transitions_total: IntCounterVec,
    pub pump_conflicts_total: IntCounter,
    pub pumps_by_status: IntGaugeVec,
    pub emails_total: IntCounterVec,
    pub emails_in_queue: IntGauge,
    pub workflow_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total delivery orders created")
                .expect("valid orders_created_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions by target status"),
            &["status"],
        )
        .expect("valid order_transitions_total metric");

        let pump_conflicts_total = IntCounter::new(
            "pump_conflicts_total",
            "Order creations rejected because a pump was already booked",
        )
        .expect("valid pump_conflicts_total metric");

        let pumps_by_status = IntGaugeVec::new(
            Opts::new("pumps_by_status", "Registered pumps by status"),
            &["status"],
        )
        .expect("valid pumps_by_status metric");

        let emails_total = IntCounterVec::new(
            Opts::new("emails_total", "Outbound emails by outcome"),
            &["outcome"],
        )
        .expect("valid emails_total metric");

        let emails_in_queue =
            IntGauge::new("emails_in_queue", "Emails waiting for the sender")
                .expect("valid emails_in_queue metric");

        let workflow_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "workflow_latency_seconds",
                "Latency of workflow operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid workflow_latency_seconds metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(pump_conflicts_total.clone()))
            .expect("register pump_conflicts_total");
        registry
            .register(Box::new(pumps_by_status.clone()))
            .expect("register pumps_by_status");
        registry
            .register(Box::new(emails_total.clone()))
            .expect("register emails_total");
        registry
            .register(Box::new(emails_in_queue.clone()))
            .expect("register emails_in_queue");
        registry
            .register(Box::new(workflow_latency_seconds.clone()))
            .expect("register workflow_latency_seconds");

        Self {
            registry,
            orders_created_total,
            order_transitions_total,
            pump_conflicts_total,
            pumps_by_status,
            emails_total,
            emails_in_queue,
            workflow_latency_seconds,
        }
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
