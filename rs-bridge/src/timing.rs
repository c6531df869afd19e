use std::time::Instant;

/// Wall-clock stopwatch that compiles to nothing without `perf_timing`.
#[derive(Clone, Copy, Debug)]
pub struct Timing(Option<Instant>);

impl Timing {
    #[inline]
    pub fn start() -> Self {
        #[cfg(feature = "perf_timing")]
        {
            Self(Some(Instant::now()))
        }
        #[cfg(not(feature = "perf_timing"))]
        {
            Self(None)
        }
    }

    #[inline]
    pub fn ms(&self) -> f32 {
        self.0
            .map(|t| t.elapsed().as_secs_f32() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Running cost of movement ticks, reported when a session closes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickCost {
    ticks: u64,
    total_ms: f32,
    worst_ms: f32,
}

impl TickCost {
    pub fn record(&mut self, ms: f32) {
        self.ticks += 1;
        self.total_ms += ms;
        self.worst_ms = self.worst_ms.max(ms);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn average_ms(&self) -> f32 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total_ms / self.ticks as f32
        }
    }

    pub fn worst_ms(&self) -> f32 {
        self.worst_ms
    }
}
