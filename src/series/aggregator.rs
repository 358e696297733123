use tokio::time::Instant;

use crate::models::{SampleField, SampleValues, TelemetrySample};

/// Append-only series of metric samples for one streaming session.
///
/// Metric frames are sparse: a frame may carry the stroke rate but no
/// landmark heights, or the other way round. Each new sample therefore
/// carries forward the previous sample's value for every field the frame
/// left out, so charted lines stay continuous instead of dropping to zero.
#[derive(Debug, Clone)]
pub struct SeriesAggregator {
    samples: Vec<TelemetrySample>,
    origin: Instant,
}

impl Default for SeriesAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesAggregator {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            origin: Instant::now(),
        }
    }

    /// Drops every sample and restarts the clock. Called once per job,
    /// before its stream starts emitting.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, origin: Instant) {
        self.samples.clear();
        self.origin = origin;
    }

    pub fn append(&mut self, values: &SampleValues) -> TelemetrySample {
        self.append_at(values, Instant::now())
    }

    pub fn append_at(&mut self, values: &SampleValues, received_at: Instant) -> TelemetrySample {
        let previous = self.samples.last();

        let mut merged = SampleValues::default();
        for field in SampleField::ALL {
            let value = values
                .get(field)
                .or_else(|| previous.and_then(|sample| sample.get(field)));
            merged.set(field, value);
        }

        let elapsed = received_at.saturating_duration_since(self.origin).as_secs_f64();
        let t = previous.map_or(elapsed, |sample| elapsed.max(sample.t));

        let sample = TelemetrySample { t, values: merged };
        self.samples.push(sample);
        sample
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&TelemetrySample> {
        self.samples.last()
    }

    /// The most recent `size` samples (fewer if the series is shorter).
    pub fn window(&self, size: usize) -> &[TelemetrySample] {
        let start = self.samples.len().saturating_sub(size);
        &self.samples[start..]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
