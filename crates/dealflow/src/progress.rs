//! Throttled progress logging for long sync runs.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum spacing between progress lines. The final batch always logs.
const LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Emits run lifecycle logs without flooding the output on fast runs.
/// Purely observational: callers never branch on anything it does.
pub struct ProgressTracker {
    log_interval: Duration,
    started_at: Option<Instant>,
    last_logged: Option<Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            log_interval: LOG_INTERVAL,
            started_at: None,
            last_logged: None,
        }
    }

    #[cfg(test)]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }

    /// Record the run start. Elapsed time and ETA are measured from here,
    /// and the first progress line is throttled against this instant.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started_at = Some(now);
        self.last_logged = Some(now);
    }

    /// Log batch progress if the interval elapsed or this is the last batch.
    pub fn log_progress(
        &mut self,
        current_batch: usize,
        total_batches: usize,
        processed: usize,
        total: usize,
    ) {
        let now = Instant::now();
        if !should_emit(self.last_logged, now, self.log_interval, current_batch, total_batches) {
            return;
        }
        self.last_logged = Some(now);

        let elapsed = self
            .started_at
            .map(|s| now.duration_since(s))
            .unwrap_or_default();
        let eta = eta_seconds(elapsed, current_batch, total_batches);

        tracing::info!(
            batch = current_batch,
            total_batches,
            processed,
            total,
            eta_secs = eta.round() as u64,
            "deal flow sync progress"
        );
    }

    /// Unconditional run summary.
    pub fn log_completion(&self, total: usize, successful: usize, failed: usize, duration_ms: i64) {
        let rate = format!("{:.1}%", success_rate(total, successful));
        tracing::info!(
            total,
            successful,
            failed,
            duration_ms,
            success_rate = %rate,
            "deal flow sync finished"
        );
    }

    /// Unconditional error line with optional context.
    pub fn log_error(&self, message: &str, context: Option<&str>) {
        match context {
            Some(context) => tracing::error!(context, "{message}"),
            None => tracing::error!("{message}"),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn should_emit(
    last_logged: Option<Instant>,
    now: Instant,
    interval: Duration,
    current_batch: usize,
    total_batches: usize,
) -> bool {
    if current_batch >= total_batches {
        return true;
    }
    match last_logged {
        Some(at) => now.duration_since(at) >= interval,
        None => true,
    }
}

/// Projected seconds remaining, assuming batches keep their average pace.
fn eta_seconds(elapsed: Duration, current_batch: usize, total_batches: usize) -> f64 {
    if current_batch == 0 {
        return 0.0;
    }
    let per_batch = elapsed.as_secs_f64() / current_batch as f64;
    per_batch * total_batches.saturating_sub(current_batch) as f64
}

fn success_rate(total: usize, successful: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    successful as f64 / total as f64 * 100.0
}
