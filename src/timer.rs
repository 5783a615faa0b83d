use instant::Instant;

/// Which pool operation is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolPhase {
    Spawn = 0,
    Release = 1,
}

impl PoolPhase {
    pub const ALL: [PoolPhase; 2] = [Self::Spawn, Self::Release];

    pub fn label(self) -> &'static str {
        match self {
            Self::Spawn => "Spawn",
            Self::Release => "Release",
        }
    }
}

/// Per-operation timing with exponential moving average smoothing.
pub struct SpawnTimers {
    /// EMA-smoothed duration in nanoseconds per phase.
    pub durations_ns: [f64; 2],
    start: Instant,
}

const EMA_ALPHA: f64 = 0.1;

impl SpawnTimers {
    pub fn new() -> Self {
        Self {
            durations_ns: [0.0; 2],
            start: Instant::now(),
        }
    }

    /// Call right before the operation.
    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Call right after. Records elapsed time for `phase`.
    pub fn end(&mut self, phase: PoolPhase) {
        let elapsed_ns = self.start.elapsed().as_secs_f64() * 1_000_000_000.0;
        self.record(phase, elapsed_ns);
    }

    fn record(&mut self, phase: PoolPhase, elapsed_ns: f64) {
        let idx = phase as usize;
        self.durations_ns[idx] = self.durations_ns[idx] * (1.0 - EMA_ALPHA) + elapsed_ns * EMA_ALPHA;
    }

    pub fn summary(&self) -> String {
        PoolPhase::ALL
            .iter()
            .map(|&p| format!("{}: {:.0}ns", p.label(), self.durations_ns[p as usize]))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
