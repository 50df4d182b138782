use std::time::{Duration, Instant};

/// Collects timings for the stages of one document's extraction
pub struct StageProfiler {
    enabled: bool,
    document: String,
    timings: Vec<(String, Duration)>,
}

impl StageProfiler {
    pub fn new(enabled: bool, document: impl Into<String>) -> Self {
        Self {
            enabled,
            document: document.into(),
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        tracing::info!(
            document = %self.document,
            "{}: {:.0}ms",
            step_name,
            elapsed.as_millis()
        );
        self.timings.push((step_name.to_string(), elapsed));

        result
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.timings.iter().map(|(name, _)| name.as_str())
    }

    pub fn log_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        let total = self.total();
        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            tracing::info!(
                document = %self.document,
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        tracing::info!(
            document = %self.document,
            "   {:.<35} {:.0}ms",
            "Total",
            total.as_millis()
        );
    }
}
