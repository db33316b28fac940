use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

pub const TIMING_TARGET: &str = "codebeasts.timing";

#[derive(Debug)]
pub struct RequestTimer {
    route: String,
    username: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl RequestTimer {
    pub fn new(route: &str, username: Option<&str>) -> Self {
        RequestTimer {
            route: route.to_string(),
            username: username.map(str::to_string),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received route={} username={:?} received_at={}",
            self.route,
            self.username,
            self.started_at.to_rfc3339()
        );
    }

    pub fn set_username(&mut self, username: &str) {
        self.username = Some(username.to_string());
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed route={} username={:?} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.route,
            self.username,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.log_completed();
    }
}

pub fn start_request_timer(route: &str, username: Option<&str>) -> RequestTimer {
    let timer = RequestTimer::new(route, username);
    timer.log_received();
    timer
}

/// Wraps one third-party call with start/finish timing events.
pub async fn log_upstream_timing<T, E, F, Fut>(
    provider: &str,
    operation: &str,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=upstream_request provider={} operation={} started_at={}",
        provider,
        operation,
        Utc::now().to_rfc3339()
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    info!(
        target: TIMING_TARGET,
        "event=upstream_response provider={} operation={} completed_at={} duration_s={:.3} status={}",
        provider,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        status
    );

    result
}
