//! Internal `opentelemetry` instrumentation at the Object Manager boundary
//! (`SPEC_FULL.md` §3 "Metrics"), mirroring `garage_block::manager`'s
//! `BlockManagerMetrics` pattern: counters for bytes moved and operation
//! outcomes, a histogram for operation duration. Distinct from the
//! externally-owned `MetricCallbacks` (bucket/tenant accounting) — this is
//! the crate's own observability surface.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};

pub struct ObjectManagerMetrics {
	pub put_bytes: Counter<u64>,
	pub get_bytes: Counter<u64>,
	pub put_duration: Histogram<f64>,
	pub get_duration: Histogram<f64>,
	pub delete_counter: Counter<u64>,
	pub quota_rejections: Counter<u64>,
	pub integrity_corrupted: Counter<u64>,
}

impl ObjectManagerMetrics {
	pub fn new() -> ObjectManagerMetrics {
		let meter: Meter = global::meter("maxiofs_core.object_manager");
		ObjectManagerMetrics {
			put_bytes: meter.u64_counter("maxiofs_object_put_bytes").init(),
			get_bytes: meter.u64_counter("maxiofs_object_get_bytes").init(),
			put_duration: meter.f64_histogram("maxiofs_object_put_duration_seconds").init(),
			get_duration: meter.f64_histogram("maxiofs_object_get_duration_seconds").init(),
			delete_counter: meter.u64_counter("maxiofs_object_delete_total").init(),
			quota_rejections: meter.u64_counter("maxiofs_quota_rejections_total").init(),
			integrity_corrupted: meter.u64_counter("maxiofs_integrity_corrupted_total").init(),
		}
	}
}

impl Default for ObjectManagerMetrics {
	fn default() -> Self {
		ObjectManagerMetrics::new()
	}
}

pub(crate) fn bucket_label(bucket_path: &str) -> [KeyValue; 1] {
	[KeyValue::new("bucket", bucket_path.to_string())]
}
