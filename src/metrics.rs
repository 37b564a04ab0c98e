//! Prometheus metrics collection for whitelistd.
//!
//! - `whitelistd_interactions_total{kind}` - Interactions routed by kind
//! - `whitelistd_applications_started_total` - Application forms shown
//! - `whitelistd_verification_outcomes_total{outcome}` - Verification results
//! - `whitelistd_active_sessions` - Sessions currently in flight (gauge)
//! - `whitelistd_handler_errors_total{code}` - Handler failures by error code
//! - `whitelistd_applications_open` - Capacity gate state, 0 or 1 (gauge)

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Interactions routed, by kind.
pub static INTERACTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Application forms shown.
pub static APPLICATIONS_STARTED: OnceLock<IntCounter> = OnceLock::new();

/// Verification results, by outcome label.
pub static VERIFICATION_OUTCOMES: OnceLock<IntCounterVec> = OnceLock::new();

/// Handler failures, by error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Sessions currently registered.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// 1 while applications are accepted.
pub static APPLICATIONS_OPEN: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded. Recording
/// before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        INTERACTIONS,
        IntCounterVec::new(
            Opts::new(
                "whitelistd_interactions_total",
                "Interactions routed by kind"
            ),
            &["kind"]
        )
    );
    register!(
        APPLICATIONS_STARTED,
        IntCounter::new(
            "whitelistd_applications_started_total",
            "Application forms shown"
        )
    );
    register!(
        VERIFICATION_OUTCOMES,
        IntCounterVec::new(
            Opts::new(
                "whitelistd_verification_outcomes_total",
                "Verification results by outcome"
            ),
            &["outcome"]
        )
    );
    register!(
        HANDLER_ERRORS,
        IntCounterVec::new(
            Opts::new(
                "whitelistd_handler_errors_total",
                "Handler failures by error code"
            ),
            &["code"]
        )
    );
    register!(
        ACTIVE_SESSIONS,
        IntGauge::new(
            "whitelistd_active_sessions",
            "Application sessions in flight"
        )
    );
    register!(
        APPLICATIONS_OPEN,
        IntGauge::new(
            "whitelistd_applications_open",
            "Whether applications are accepted"
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Record a routed interaction.
#[inline]
pub fn record_interaction(kind: &str) {
    if let Some(c) = INTERACTIONS.get() {
        c.with_label_values(&[kind]).inc();
    }
}

/// Record an application form being shown.
#[inline]
pub fn record_application_started() {
    if let Some(c) = APPLICATIONS_STARTED.get() {
        c.inc();
    }
}

/// Record a verification outcome.
#[inline]
pub fn record_outcome(outcome: &str) {
    if let Some(c) = VERIFICATION_OUTCOMES.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record a handler failure.
#[inline]
pub fn record_handler_error(code: &str) {
    if let Some(c) = HANDLER_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

/// Update the in-flight session gauge.
#[inline]
pub fn set_active_sessions(count: usize) {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.set(count as i64);
    }
}

/// Update the capacity gate gauge.
#[inline]
pub fn set_applications_open(open: bool) {
    if let Some(g) = APPLICATIONS_OPEN.get() {
        g.set(i64::from(open));
    }
}
