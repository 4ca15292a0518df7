use instant::Instant;

/// Seconds between stats log lines.
const STATS_LOG_INTERVAL: f64 = 5.0;
/// Smoothing factor for per-phase timings.
const EMA_ALPHA: f64 = 0.1;

/// Which part of a render tick is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TickPhase {
    Commands = 0,
    Simulation = 1,
    Overlay = 2,
    Composite = 3,
    Capture = 4,
}

impl TickPhase {
    pub const ALL: [TickPhase; 5] = [
        Self::Commands,
        Self::Simulation,
        Self::Overlay,
        Self::Composite,
        Self::Capture,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Commands => "cmd",
            Self::Simulation => "sim",
            Self::Overlay => "overlay",
            Self::Composite => "draw",
            Self::Capture => "capture",
        }
    }
}

/// Per-phase timing with exponential moving average smoothing.
pub struct PhaseTimers {
    /// EMA-smoothed duration in microseconds per phase.
    pub durations_us: [f64; 5],
    start: Instant,
}

impl PhaseTimers {
    pub fn new() -> Self {
        Self {
            durations_us: [0.0; 5],
            start: Instant::now(),
        }
    }

    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Record time since `begin()` for `phase` and restart the clock.
    pub fn end(&mut self, phase: TickPhase) {
        let elapsed_us = self.start.elapsed().as_secs_f64() * 1_000_000.0;
        let idx = phase as usize;
        self.durations_us[idx] = self.durations_us[idx] * (1.0 - EMA_ALPHA) + elapsed_us * EMA_ALPHA;
        self.start = Instant::now();
    }

    pub fn total_us(&self) -> f64 {
        self.durations_us.iter().sum()
    }

    fn summary(&self) -> String {
        TickPhase::ALL
            .iter()
            .map(|&p| format!("{} {:.0}us", p.label(), self.durations_us[p as usize]))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Default for PhaseTimers {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture and encode counters, sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineLoad {
    pub frames_written: u64,
    /// Completed capture cycles.
    pub cycles: u64,
    /// Newest cycle whose animation reached the output slot.
    pub encoded_cycle: u64,
    /// Cycle signals the busy encoder never saw.
    pub dropped_signals: u64,
}

impl PipelineLoad {
    /// Cycles captured but not yet handed out as animations.
    pub fn backlog(&self) -> u64 {
        self.cycles.saturating_sub(self.encoded_cycle)
    }
}

/// Tick-rate and pipeline statistics, logged every few seconds.
pub struct FrameStats {
    tick_count: u64,
    last_log_time: Instant,
    tick_time_sum: f64,
    tick_time_min: f64,
    tick_time_max: f64,
    ticks_since_log: u32,
    load: PipelineLoad,
    peak_backlog: u64,
    dropped_at_last_log: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            tick_count: 0,
            last_log_time: Instant::now(),
            tick_time_sum: 0.0,
            tick_time_min: f64::MAX,
            tick_time_max: 0.0,
            ticks_since_log: 0,
            load: PipelineLoad::default(),
            peak_backlog: 0,
            dropped_at_last_log: 0,
        }
    }

    /// Record one tick that took `dt` seconds of work.
    pub fn record_tick(&mut self, dt: f64, critters: usize, timers: &PhaseTimers, load: PipelineLoad) {
        self.tick_count += 1;
        self.ticks_since_log += 1;
        self.tick_time_sum += dt;
        self.tick_time_min = self.tick_time_min.min(dt);
        self.tick_time_max = self.tick_time_max.max(dt);
        self.load = load;
        self.peak_backlog = self.peak_backlog.max(load.backlog());

        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed >= STATS_LOG_INTERVAL {
            let avg_ms = (self.tick_time_sum / self.ticks_since_log as f64) * 1000.0;
            let tps = self.ticks_since_log as f64 / elapsed;
            log::info!(
                "TPS: {:.0} | avg: {:.2}ms | min: {:.2}ms | max: {:.2}ms | critters: {} | total ticks: {}",
                tps,
                avg_ms,
                self.tick_time_min * 1000.0,
                self.tick_time_max * 1000.0,
                critters,
                self.tick_count,
            );
            let new_drops = load.dropped_signals.saturating_sub(self.dropped_at_last_log);
            let line = format!(
                "frames: {} | cycles: {} | encoded: {} | backlog: {} (peak {}) | dropped signals: {} (+{})",
                load.frames_written,
                load.cycles,
                load.encoded_cycle,
                load.backlog(),
                self.peak_backlog,
                load.dropped_signals,
                new_drops,
            );
            if new_drops > 0 {
                log::warn!("encoder falling behind: {line}");
            } else {
                log::info!("{line}");
            }
            log::debug!("phases: {}", timers.summary());
            self.dropped_at_last_log = load.dropped_signals;
            self.peak_backlog = load.backlog();
            self.last_log_time = Instant::now();
            self.tick_time_sum = 0.0;
            self.tick_time_min = f64::MAX;
            self.tick_time_max = 0.0;
            self.ticks_since_log = 0;
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Pipeline counters from the latest tick.
    pub fn load(&self) -> PipelineLoad {
        self.load
    }

    /// Largest backlog seen since the last log line.
    pub fn peak_backlog(&self) -> u64 {
        self.peak_backlog
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
