use std::time::Duration;

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Search/selection counters for the daemon's status surface.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    pub searches_total: IntCounter,
    pub unavailable_total: IntCounter,
    pub superseded_total: IntCounter,
    pub dropped_hits_total: IntCounter,
    pub no_results_total: IntCounter,
    pub selection_errors: IntCounterVec,
    pub selections_total: IntCounter,
    pub active_sessions: IntGauge,
    pub search_latency: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("homematch".into()), None)?;

        let searches_total = IntCounter::new("searches_total", "Searches executed")?;
        let unavailable_total = IntCounter::new(
            "search_unavailable_total",
            "Searches failed because the embedding index was unavailable",
        )?;
        let superseded_total = IntCounter::new(
            "search_superseded_total",
            "Search results discarded because a newer search started",
        )?;
        let dropped_hits_total = IntCounter::new(
            "dropped_hits_total",
            "Index hits dropped because the listing was missing from the catalog",
        )?;
        let no_results_total =
            IntCounter::new("no_results_total", "Searches that returned no listings")?;
        let selections_total = IntCounter::new("selections_total", "Selection events resolved")?;
        let selection_errors = IntCounterVec::new(
            Opts::new("selection_errors_total", "Selection events that failed"),
            &["kind"],
        )?;
        let active_sessions = IntGauge::new("active_sessions", "Live selection sessions")?;
        let search_latency = Histogram::with_opts(
            HistogramOpts::new("search_latency_seconds", "End-to-end search latency").buckets(
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            ),
        )?;

        registry.register(Box::new(searches_total.clone()))?;
        registry.register(Box::new(unavailable_total.clone()))?;
        registry.register(Box::new(superseded_total.clone()))?;
        registry.register(Box::new(dropped_hits_total.clone()))?;
        registry.register(Box::new(no_results_total.clone()))?;
        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(selection_errors.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;
        registry.register(Box::new(search_latency.clone()))?;

        Ok(Self {
            registry,
            searches_total,
            unavailable_total,
            superseded_total,
            dropped_hits_total,
            no_results_total,
            selection_errors,
            selections_total,
            active_sessions,
            search_latency,
        })
    }

    pub fn observe_search(&self, elapsed: Duration) {
        self.searches_total.inc();
        self.search_latency.observe(elapsed.as_secs_f64());
    }

    pub fn record_selection_error(&self, kind: &str) {
        self.selection_errors.with_label_values(&[kind]).inc();
    }

    /// Prometheus text exposition.
    pub fn scrape(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_includes_prefixed_counters() -> Result<()> {
        let m = ServiceMetrics::new()?;
        m.observe_search(Duration::from_millis(3));
        m.dropped_hits_total.inc_by(2);
        m.record_selection_error("out_of_range");

        let text = m.scrape()?;
        assert!(text.contains("homematch_searches_total 1"));
        assert!(text.contains("homematch_dropped_hits_total 2"));
        assert!(text.contains("kind=\"out_of_range\""));
        Ok(())
    }
}
