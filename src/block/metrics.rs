//! Instrumentation for the blob store, mirroring `garage_block::manager`'s
//! `BlockManagerMetrics` (bytes written/read, operation durations, corruption
//! counter).

use opentelemetry::metrics::{Counter, Histogram, Meter};

pub struct BlockManagerMetrics {
	pub bytes_written: Counter<u64>,
	pub bytes_read: Counter<u64>,
	pub put_duration: Histogram<f64>,
	pub get_duration: Histogram<f64>,
	pub corruption_counter: Counter<u64>,
}

impl BlockManagerMetrics {
	pub fn new(meter: &Meter) -> BlockManagerMetrics {
		BlockManagerMetrics {
			bytes_written: meter
				.u64_counter("maxiofs_block_bytes_written")
				.with_description("Number of bytes written to the blob store")
				.init(),
			bytes_read: meter
				.u64_counter("maxiofs_block_bytes_read")
				.with_description("Number of bytes read from the blob store")
				.init(),
			put_duration: meter
				.f64_histogram("maxiofs_block_put_duration")
				.with_description("Duration of blob store put operations, in seconds")
				.init(),
			get_duration: meter
				.f64_histogram("maxiofs_block_get_duration")
				.with_description("Duration of blob store get operations, in seconds")
				.init(),
			corruption_counter: meter
				.u64_counter("maxiofs_block_corruption_detected")
				.with_description("Number of times a stored blob failed integrity verification")
				.init(),
		}
	}
}
