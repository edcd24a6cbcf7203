use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounterVec,
    pub deliveries_total: IntCounterVec,
    pub active_orders: IntGauge,
    pub location_updates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total = IntCounterVec::new(
            Opts::new("orders_created_total", "Order creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid orders_created_total metric");

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Archived deliveries by outcome"),
            &["outcome"],
        )
        .expect("valid deliveries_total metric");

        let active_orders = IntGauge::new("active_orders", "Current number of active order pairs")
            .expect("valid active_orders metric");

        let location_updates_total = IntCounter::new(
            "location_updates_total",
            "Total courier position reports ingested",
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(active_orders.clone()))
            .expect("register active_orders");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            orders_created_total,
            deliveries_total,
            active_orders,
            location_updates_total,
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
