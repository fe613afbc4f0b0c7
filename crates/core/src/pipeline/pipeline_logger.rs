use std::collections::HashMap;
use std::time::Instant;

pub const STAGE_DETECT: &str = "detect";
pub const STAGE_FILTER: &str = "filter";
pub const STAGE_HASH: &str = "hash";
pub const STAGE_MATCH: &str = "match";
pub const STAGE_TRACK: &str = "track";

/// Cross-cutting logger for recognition pipeline events.
///
/// Decouples the pipeline from specific output mechanisms so each caller can
/// observe per-stage behavior without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report that `frames` frames have been processed so far. `total` is
    /// known for finite sources only.
    fn progress(&mut self, frames: usize, total: Option<usize>);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. candidate or surviving face count).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events. Used by tests and embedders
/// that observe the session through its return value only.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames: usize, _total: Option<usize>) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Count, sum and extremes of a recorded series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStat {
    pub count: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl RunningStat {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            total: value,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// CLI-oriented logger that aggregates per-stage timings and metrics and
/// reports them through `log` when the session ends.
///
/// Progress output is throttled to every `throttle_frames` frames. Only
/// running aggregates are kept, so memory stays flat on endless live sources.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, RunningStat>,
    metrics: HashMap<String, RunningStat>,
    start_time: Instant,
    frames: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Recognition summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stat = &self.timings[stage];
            let total_ms = stat.total;
            let avg_ms = stat.mean();
            let max_ms = stat.max;
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let stat = &self.metrics[name];
            lines.push(format!(
                "  {name}: avg {:.1}  min {:.0}  max {:.0}",
                stat.mean(),
                stat.min,
                stat.max
            ));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&RunningStat> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&RunningStat> {
        self.metrics.get(name)
    }
}

fn record(series: &mut HashMap<String, RunningStat>, key: &str, value: f64) {
    match series.get_mut(key) {
        Some(stat) => stat.push(value),
        None => {
            series.insert(key.to_string(), RunningStat::new(value));
        }
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, frames: usize, total: Option<usize>) {
        self.frames = frames;
        match total {
            Some(total) if total > 0 => {
                if frames % self.throttle_frames == 0 || frames == total {
                    let pct = frames as f64 / total as f64 * 100.0;
                    log::info!("Processing: {frames}/{total} frames ({pct:.1}%)");
                }
            }
            _ => {
                if frames % self.throttle_frames == 0 {
                    log::info!("Processing: {frames} frames");
                }
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
