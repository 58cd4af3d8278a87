//! Prometheus metrics for the checker and alert sides

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    Opts, Registry, TextEncoder,
};
use sitewatch::{AlertOutcome, CheckResult, MetricsRecorder};

/// Classify a failed probe for the `error_type` label
fn error_type(result: &CheckResult) -> &'static str {
    if !result.has_error() {
        return "http_status";
    }
    let message = result.error_message.to_lowercase();
    if message.contains("timed out") || message.contains("timeout") {
        "timeout"
    } else if message.contains("dns") || message.contains("resolve") {
        "dns"
    } else if message.contains("connect error") || message.contains("refused") {
        "connection"
    } else if message.contains("builder error") || message.contains("relative url") {
        "invalid_url"
    } else {
        "request"
    }
}

/// Recorder exporting to its own registry, scraped through `/metrics`.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    checks: IntCounterVec,
    check_duration: HistogramVec,
    check_success: GaugeVec,
    check_errors: IntCounterVec,
    cycles: IntCounter,
    cycle_duration: Histogram,
    sites_processed: Gauge,
    api_errors: IntCounter,
    publish_errors: IntCounter,
    alert_decisions: IntCounterVec,
    store_errors: IntCounter,
    malformed_messages: IntCounter,
    notify_errors: IntCounter,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checks = IntCounterVec::new(
            Opts::new("site_check_total", "Total number of site checks"),
            &["url", "status"],
        )?;
        let check_duration = HistogramVec::new(
            HistogramOpts::new("site_check_duration_ms", "Duration of site checks in milliseconds")
                .buckets(vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]),
            &["url", "status"],
        )?;
        let check_success = GaugeVec::new(
            Opts::new("site_check_success", "Whether the last check of a site succeeded (1) or not (0)"),
            &["url"],
        )?;
        let check_errors = IntCounterVec::new(
            Opts::new("site_check_errors_total", "Total number of failed site checks by error type"),
            &["url", "error_type"],
        )?;
        let cycles = IntCounter::new("checker_cycle_total", "Total number of completed check cycles")?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("checker_cycle_duration_seconds", "Duration of a full check cycle")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        let sites_processed =
            Gauge::new("checker_sites_processed", "Number of sites probed in the last cycle")?;
        let api_errors =
            IntCounter::new("checker_api_errors_total", "Failed attempts to fetch the site list")?;
        let publish_errors =
            IntCounter::new("result_publish_errors_total", "Check results that could not be published")?;
        let alert_decisions = IntCounterVec::new(
            Opts::new("alert_decisions_total", "Processed check results by outcome"),
            &["outcome"],
        )?;
        let store_errors =
            IntCounter::new("alert_store_errors_total", "Failed state store reads and writes")?;
        let malformed_messages =
            IntCounter::new("alert_malformed_messages_total", "Dropped messages that failed to decode")?;
        let notify_errors =
            IntCounter::new("alert_notify_errors_total", "Alerts the notifier failed to deliver")?;

        registry.register(Box::new(checks.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;
        registry.register(Box::new(check_success.clone()))?;
        registry.register(Box::new(check_errors.clone()))?;
        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(sites_processed.clone()))?;
        registry.register(Box::new(api_errors.clone()))?;
        registry.register(Box::new(publish_errors.clone()))?;
        registry.register(Box::new(alert_decisions.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;
        registry.register(Box::new(malformed_messages.clone()))?;
        registry.register(Box::new(notify_errors.clone()))?;

        Ok(Self {
            registry,
            checks,
            check_duration,
            check_success,
            check_errors,
            cycles,
            cycle_duration,
            sites_processed,
            api_errors,
            publish_errors,
            alert_decisions,
            store_errors,
            malformed_messages,
            notify_errors,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics are not valid UTF-8: {e}")))
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn check_completed(&self, result: &CheckResult) {
        let status = result.status_code.to_string();
        let labels = [result.url.as_str(), status.as_str()];

        self.checks.with_label_values(&labels).inc();
        self.check_duration.with_label_values(&labels).observe(result.response_time_ms as f64);
        self.check_success
            .with_label_values(&[result.url.as_str()])
            .set(if result.success { 1.0 } else { 0.0 });

        if !result.success {
            self.check_errors.with_label_values(&[result.url.as_str(), error_type(result)]).inc();
        }
    }

    fn cycle_completed(&self, targets: usize, elapsed: Duration) {
        self.cycles.inc();
        self.cycle_duration.observe(elapsed.as_secs_f64());
        self.sites_processed.set(targets as f64);
    }

    fn target_source_failed(&self) {
        self.api_errors.inc();
    }

    fn publish_failed(&self) {
        self.publish_errors.inc();
    }

    fn alert_decided(&self, outcome: AlertOutcome) {
        self.alert_decisions.with_label_values(&[outcome.as_str()]).inc();
    }

    fn state_store_failed(&self) {
        self.store_errors.inc();
    }

    fn malformed_message(&self) {
        self.malformed_messages.inc();
    }

    fn notify_failed(&self) {
        self.notify_errors.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn has_series(text: &str, name: &str, labels: &[&str], value: &str) -> bool {
        text.lines().any(|line| {
            line.starts_with(&format!("{name}{{"))
                && labels.iter().all(|label| line.contains(label))
                && line.ends_with(&format!(" {value}"))
        })
    }

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.check_completed(&CheckResult::from_response("https://a.test", 200, 12, Utc::now()));
        metrics.check_completed(&CheckResult::from_failure(
            "https://b.test",
            "request timed out after 10000 ms: operation timed out",
            10_000,
            Utc::now(),
        ));
        metrics.cycle_completed(2, Duration::from_millis(1500));
        metrics.alert_decided(AlertOutcome::Sent);
        metrics.alert_decided(AlertOutcome::Suppressed);
        metrics.target_source_failed();

        let text = metrics.render().unwrap();

        assert!(has_series(&text, "site_check_total", &[r#"url="https://a.test""#, r#"status="200""#], "1"));
        assert!(has_series(&text, "site_check_success", &[r#"url="https://b.test""#], "0"));
        assert!(has_series(
            &text,
            "site_check_errors_total",
            &[r#"url="https://b.test""#, r#"error_type="timeout""#],
            "1"
        ));
        assert!(text.contains("checker_cycle_total 1"));
        assert!(text.contains("checker_sites_processed 2"));
        assert!(has_series(&text, "alert_decisions_total", &[r#"outcome="sent""#], "1"));
        assert!(text.contains("checker_api_errors_total 1"));
    }

    #[test]
    fn test_error_type() {
        let at = Utc::now();
        assert_eq!(error_type(&CheckResult::from_response("u", 503, 1, at)), "http_status");
        assert_eq!(
            error_type(&CheckResult::from_failure("u", "error trying to connect: Connection refused", 1, at)),
            "connection"
        );
        assert_eq!(error_type(&CheckResult::from_failure("u", "something odd", 1, at)), "request");
    }

    #[test]
    fn test_registries_are_independent() {
        let first = PrometheusMetrics::new().unwrap();
        let second = PrometheusMetrics::new().unwrap();
        first.publish_failed();

        assert!(first.render().unwrap().contains("result_publish_errors_total 1"));
        assert!(second.render().unwrap().contains("result_publish_errors_total 0"));
    }
}
