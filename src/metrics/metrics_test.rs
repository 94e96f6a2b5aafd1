use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("sabtest".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    PAYLOADS_DELIVERED.with_label_values(&["registry-probe"]).inc();
    SCHEDULER_RETRIES.with_label_values(&["lock"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"sabtest_payloads_delivered"),
        "Missing sabtest_payloads_delivered"
    );
    assert!(
        metric_names.contains(&"sabtest_scheduler_retries"),
        "Missing sabtest_scheduler_retries"
    );
}

#[test]
fn test_counter_increment() {
    let before = PAYLOADS_DELIVERED.with_label_values(&["counter-probe"]).get();

    PAYLOADS_DELIVERED.with_label_values(&["counter-probe"]).inc();
    PAYLOADS_DELIVERED.with_label_values(&["counter-probe"]).inc();

    let value = PAYLOADS_DELIVERED.with_label_values(&["counter-probe"]).get();
    assert_eq!(value - before, 2, "Counter should increment correctly");
}

#[test]
fn init_metrics_is_idempotent() {
    init_metrics();
    init_metrics();
    assert!(!REGISTRY.gather().is_empty());
}
