use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_submission(late: bool) {
    metrics::counter!("submissions_total", "late" => late.to_string()).increment(1);
}

pub(crate) fn record_grade(status: &'static str) {
    metrics::counter!("grades_total", "status" => status).increment(1);
}

pub(crate) fn record_reminders(students: usize) {
    metrics::counter!("assignment_reminders_total").increment(students as u64);
}

pub(crate) fn record_bulk_grade_items(succeeded: usize, failed: usize) {
    metrics::counter!("bulk_grade_items_total", "outcome" => "succeeded").increment(succeeded as u64);
    metrics::counter!("bulk_grade_items_total", "outcome" => "failed").increment(failed as u64);
}
