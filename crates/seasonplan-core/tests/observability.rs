//! Lifecycle events and counters.

use seasonplan_core::obs::{
    emit_allocation_completed, emit_dc_shortfall, emit_markdown_recommended,
    emit_reforecast_applied,
};
use seasonplan_core::{ClusterTier, SeasonSpan};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_allocation_completed() {
    emit_allocation_completed(9600, 5280, 4320, 9);
}

#[traced_test]
#[test]
fn test_emit_warnings_inside_season_span() {
    let _span = SeasonSpan::enter("fw26");
    emit_dc_shortfall("replenishment", 500, 120);
    seasonplan_core::obs::emit_minimum_shortfall(ClusterTier::Value, 900, 600);
}

#[traced_test]
#[test]
fn test_emit_reforecast_and_markdown() {
    emit_reforecast_applied(2, 0.85, 0.4, 0.9);
    emit_markdown_recommended(6, 0.08, 15);
}

#[test]
fn test_metrics_flush_does_not_panic() {
    seasonplan_core::METRICS.inc_allocations();
    seasonplan_core::METRICS.flush();
    assert!(seasonplan_core::METRICS.allocation_runs() >= 1);
}
