use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::sync::Mutex;

/// Per-route request counters and latency samples, rendered as plain text
/// by the `/metrics` endpoint.
#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency_ns: Mutex<HashMap<String, Vec<u64>>>,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        let mut latency_map = self.latency_ns.lock().await;
        latency_map
            .entry(route.to_string())
            .or_default()
            .push(latency.as_nanos() as u64);
    }

    pub(crate) async fn render(&self) -> String {
        let mut out = String::new();
        {
            let counts = self.counts.lock().await;
            let mut rows: Vec<(&(String, u16), &u64)> = counts.iter().collect();
            rows.sort();
            for ((route, status), count) in rows {
                out.push_str(&format!(
                    "retrato_requests_total{{route=\"{route}\",status=\"{status}\"}} {count}\n"
                ));
            }
        }
        {
            let latency = self.latency_ns.lock().await;
            let mut rows: Vec<(&String, &Vec<u64>)> = latency.iter().collect();
            rows.sort();
            for (route, samples) in rows {
                if samples.is_empty() {
                    continue;
                }
                let mut sorted = samples.clone();
                sorted.sort_unstable();
                let p50 = sorted[sorted.len() / 2];
                let p95 = sorted[((sorted.len() as f64) * 0.95).ceil() as usize - 1];
                out.push_str(&format!(
                    "retrato_request_latency_ns{{route=\"{route}\",quantile=\"0.5\"}} {p50}\n"
                ));
                out.push_str(&format!(
                    "retrato_request_latency_ns{{route=\"{route}\",quantile=\"0.95\"}} {p95}\n"
                ));
            }
        }
        out
    }
}
