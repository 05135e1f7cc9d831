//! Small `opentelemetry` helper, mirroring `garage_util::metrics::RecordDuration`:
//! wrap a future, record its wall-clock duration to a histogram regardless of
//! whether it succeeded or failed.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use opentelemetry::metrics::Histogram;

pub trait RecordDuration: Future + Sized {
	fn bound_record_duration(
		self,
		histogram: &Histogram<f64>,
	) -> Pin<Box<dyn Future<Output = Self::Output> + Send>>
	where
		Self: Send + 'static,
	{
		let histogram = histogram.clone();
		Box::pin(async move {
			let start = Instant::now();
			let res = self.await;
			histogram.record(start.elapsed().as_secs_f64(), &[]);
			res
		})
	}
}

impl<F: Future + Sized> RecordDuration for F {}
