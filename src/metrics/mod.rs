use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref CHANNELS_ALLOCATED: IntGauge =
        IntGauge::new("channels_allocated", "Channels currently held by façade registries")
            .expect("metric can not be created");

    pub static ref PAYLOADS_DELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("payloads_delivered", "Payloads handed to listeners"),
        &["event"]
    )
    .expect("Should succeed to create metric");

    pub static ref PAYLOADS_RAW_FALLBACK: IntCounter = IntCounter::new(
        "payloads_raw_fallback",
        "Payloads that failed structured decoding and were delivered as one string"
    )
    .expect("Should succeed to create metric");

    pub static ref SCHEDULER_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_retries", "Backoff retries by stage"),
        &["stage"]
    )
    .expect("Should succeed to create metric");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("sab".to_string()), None).expect("registry can be created");
}

/// Registers every bus collector into `registry`.
pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(CHANNELS_ALLOCATED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PAYLOADS_DELIVERED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PAYLOADS_RAW_FALLBACK.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SCHEDULER_RETRIES.clone()))
        .expect("collector can be registered");
}

/// Registers the bus collectors into the crate-wide [`REGISTRY`].
///
/// Safe to call more than once.
pub fn init_metrics() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| register_custom_metrics(&REGISTRY));
}
