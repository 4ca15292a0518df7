use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use glam::Vec2;
use instant::Instant;

use crate::activity::{ActivityTracker, ActorId, ActorLook, MessageLog, Presence};
use crate::capture::{frame_ring, CaptureScheduler, RingWatch};
use crate::command::{ActorProfile, Command, CommandSender, EventKind, RawImage};
use crate::config::RenderConfig;
use crate::critter::Bounds;
use crate::encode::{panic_message, EncodedOutput, EncoderWorker, GifEncoder, LatestSlot};
use crate::error::HostError;
use crate::overlay::{ImageData, OverlayLayer, DEFAULT_TTL};
use crate::render::canvas::Canvas;
use crate::render::compose;
use crate::simulation::Simulation;
use crate::stats::{FrameStats, PhaseTimers, PipelineLoad, TickPhase};

/// Seconds for the activity scalar to close the gap to its target.
const ACTIVITY_EASE_SECONDS: f32 = 2.0;
/// If the loop falls this many ticks behind, the schedule resets instead of catching up.
const MAX_TICK_LAG: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HostState {
    Created = 0,
    Running = 1,
    /// Shutdown requested, or the render loop quit on its own and the
    /// threads still need joining.
    Stopping = 2,
    Stopped = 3,
}

impl HostState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Lifecycle state visible to both the host and its render thread.
#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: HostState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    fn load(&self) -> HostState {
        HostState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: HostState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from` -> `to`; false if someone else moved it first.
    fn advance(&self, from: HostState, to: HostState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

// ---------------------------------------------------------------------------
// Tick runner
// ---------------------------------------------------------------------------

/// Everything the render thread owns. One `run_tick` is one fixed step:
/// commands, simulation, overlays, composite, capture, output hand-off.
pub struct TickRunner {
    sim: Simulation,
    tracker: ActivityTracker,
    overlays: OverlayLayer,
    messages: MessageLog,
    canvas: Canvas,
    capture: CaptureScheduler,
    commands: Receiver<Command>,
    max_commands: usize,
    /// Filled by the encoder worker.
    ready: LatestSlot,
    /// What `RenderHost::get_latest` drains.
    latest: LatestSlot,
    /// Newest cycle handed to `latest`.
    encoded_cycle: u64,
    timers: PhaseTimers,
    stats: FrameStats,
    /// Tick index at which `run_tick` panics.
    #[cfg(test)]
    panic_at_tick: Option<u64>,
}

impl TickRunner {
    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    pub fn overlays(&self) -> &OverlayLayer {
        &self.overlays
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn capture(&self) -> &CaptureScheduler {
        &self.capture
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn run_tick(&mut self, delta: f32, now: Instant) -> TickOutcome {
        let tick_start = Instant::now();
        self.timers.begin();

        #[cfg(test)]
        if self.panic_at_tick == Some(self.stats.tick_count()) {
            panic!("injected failure at tick {}", self.stats.tick_count());
        }

        if self.drain_commands(now) == TickOutcome::Stop {
            return TickOutcome::Stop;
        }
        self.tracker.sweep(&mut self.sim, now);
        self.messages.evict(now);
        self.timers.end(TickPhase::Commands);

        let activity = if self.sim.interactive() {
            self.sim.activity()
        } else {
            let current = self.sim.activity();
            let target = self.tracker.activity_target();
            current + (target - current) * (delta / ACTIVITY_EASE_SECONDS).min(1.0)
        };
        self.sim.tick(delta, activity);
        self.timers.end(TickPhase::Simulation);

        let sim = &self.sim;
        self.overlays.tick(now, delta, |entity| sim.position(entity));
        self.timers.end(TickPhase::Overlay);

        compose(&mut self.canvas, &self.sim, &self.overlays);
        self.timers.end(TickPhase::Composite);

        self.capture.capture(&self.canvas);
        self.collect_output();
        self.timers.end(TickPhase::Capture);

        let load = self.load();
        self.stats.record_tick(
            tick_start.elapsed().as_secs_f64(),
            self.sim.len(),
            &self.timers,
            load,
        );
        TickOutcome::Continue
    }

    /// Current capture and encode counters.
    pub fn load(&self) -> PipelineLoad {
        PipelineLoad {
            frames_written: self.capture.watch().cursor(),
            cycles: self.capture.cycles(),
            encoded_cycle: self.encoded_cycle,
            dropped_signals: self.capture.dropped_signals(),
        }
    }

    /// Move a finished animation from the encoder to the public slot.
    pub fn collect_output(&mut self) -> bool {
        match self.ready.take() {
            Some(output) => {
                self.encoded_cycle = self.encoded_cycle.max(output.cycle);
                self.latest.publish(output);
                true
            }
            None => false,
        }
    }

    fn drain_commands(&mut self, now: Instant) -> TickOutcome {
        for _ in 0..self.max_commands {
            match self.commands.try_recv() {
                Ok(Command::Stop) => return TickOutcome::Stop,
                Ok(command) => self.dispatch(command, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("command channel closed, stopping");
                    return TickOutcome::Stop;
                }
            }
        }
        TickOutcome::Continue
    }

    fn dispatch(&mut self, command: Command, now: Instant) {
        match command {
            Command::ProcessEvent {
                kind,
                actor,
                content,
                image,
                profile,
            } => {
                let critter = self
                    .tracker
                    .note_activity(&mut self.sim, actor, Presence::Online, now);
                self.apply_profile(actor, profile);
                match kind {
                    EventKind::Message => {
                        self.messages.push(now, &content);
                        let bounds = self.sim.bounds();
                        let anchor_pos = critter
                            .and_then(|e| self.sim.position(e))
                            .unwrap_or(Vec2::new(bounds.width * 0.5, bounds.height * 0.5));
                        let tint = self.tracker.color_of(actor);
                        self.overlays
                            .add_speech(critter, anchor_pos, &content, tint, DEFAULT_TTL, now);
                    }
                    EventKind::Typing => self.sim.nudge(actor),
                    EventKind::Reaction => {
                        if let Some(raw) = image {
                            self.overlays.add_burst(decode_image(raw, "reaction"), DEFAULT_TTL, now);
                        }
                    }
                }
            }
            Command::SetSnapshot(actors) => {
                let roster: Vec<_> = actors.iter().map(|a| (a.actor, a.presence)).collect();
                let spawned = self.tracker.set_known_actors(&mut self.sim, &roster, now);
                for entry in actors {
                    self.apply_profile(entry.actor, entry.profile);
                }
                log::info!("snapshot of {} actors, {spawned} on screen", roster.len());
            }
            Command::Stop => {}
        }
    }

    /// Validate and merge a profile into the actor's look. An unusable avatar
    /// leaves the procedural body in place.
    fn apply_profile(&mut self, actor: ActorId, profile: ActorProfile) {
        if profile.is_empty() {
            return;
        }
        let look = ActorLook {
            avatar: profile.avatar.and_then(|raw| decode_image(raw, "avatar")).map(Arc::new),
            color: profile.color,
        };
        if look.avatar.is_none() && look.color.is_none() {
            return;
        }
        if !self.tracker.set_look(&mut self.sim, actor, look) {
            log::debug!("profile for off-screen actor {actor} ignored");
        }
    }
}

/// Bad pixels fall back to the procedural visual.
fn decode_image(raw: RawImage, what: &str) -> Option<ImageData> {
    match ImageData::from_rgba(raw.width, raw.height, raw.rgba) {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("{what} image unusable, using fallback: {e}");
            None
        }
    }
}

/// Wire up the render side and the encoder side over a fresh frame ring.
pub fn build_pipeline(
    config: &RenderConfig,
    commands: Receiver<Command>,
    latest: LatestSlot,
    fault: Arc<AtomicBool>,
) -> Result<(TickRunner, EncoderWorker), HostError> {
    config.validate()?;
    let (writer, reader) = frame_ring(config.frames_per_cycle(), config.width, config.height)?;
    let encoder = GifEncoder::new(config)?;
    let canvas = Canvas::try_new(config.width, config.height).ok_or(HostError::Allocation {
        slots: 1,
        bytes: config.width as usize * config.height as usize * 3,
    })?;

    let (signal_tx, signal_rx) = crossbeam_channel::bounded(1);
    let ready = LatestSlot::new();
    let bounds = Bounds::new(config.width as f32, config.height as f32);

    let runner = TickRunner {
        sim: Simulation::new(bounds, config.interactive),
        tracker: ActivityTracker::new(),
        overlays: OverlayLayer::new(bounds),
        messages: MessageLog::new(),
        canvas,
        capture: CaptureScheduler::new(writer, signal_tx),
        commands,
        max_commands: config.max_commands_per_tick.max(1),
        ready: ready.clone(),
        latest,
        encoded_cycle: 0,
        timers: PhaseTimers::new(),
        stats: FrameStats::new(),
        #[cfg(test)]
        panic_at_tick: None,
    };
    let worker = EncoderWorker::new(reader, encoder, signal_rx, ready, fault);
    Ok((runner, worker))
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Owns the render and encoder threads.
pub struct RenderHost {
    config: RenderConfig,
    state: SharedState,
    /// Raised by the encoder when it dies; the render loop exits on it.
    fault: Arc<AtomicBool>,
    sender: CommandSender,
    receiver: Option<Receiver<Command>>,
    latest: LatestSlot,
    watch: Option<RingWatch>,
    render: Option<JoinHandle<()>>,
    encoder: Option<JoinHandle<()>>,
}

impl RenderHost {
    pub fn new(config: RenderConfig) -> Result<Self, HostError> {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok(Self {
            config,
            state: SharedState::new(HostState::Created),
            fault: Arc::new(AtomicBool::new(false)),
            sender: CommandSender::new(tx),
            receiver: Some(rx),
            latest: LatestSlot::new(),
            watch: None,
            render: None,
            encoder: None,
        })
    }

    /// Allocate the ring, start both threads and return immediately.
    pub fn start(&mut self) -> Result<(), HostError> {
        let receiver = match (self.state(), self.receiver.take()) {
            (HostState::Created, Some(rx)) => rx,
            (state, rx) => {
                self.receiver = rx;
                return Err(HostError::Lifecycle {
                    action: "start",
                    state,
                });
            }
        };

        // The receiver is consumed either way, so any failure below is terminal
        self.state.store(HostState::Stopped);
        let (runner, worker) = build_pipeline(
            &self.config,
            receiver,
            self.latest.clone(),
            Arc::clone(&self.fault),
        )?;
        let watch = runner.capture.watch();
        let encoder = worker.spawn()?;

        // Running before the thread exists, so an immediate self-exit is not overwritten
        self.state.store(HostState::Running);
        let tick = self.config.tick_seconds();
        let fault = Arc::clone(&self.fault);
        let state = self.state.clone();
        let render = thread::Builder::new()
            .name("terrarium-render".into())
            .spawn(move || render_loop(runner, tick, fault, state));
        let render = match render {
            Ok(handle) => handle,
            Err(source) => {
                // The runner (and its signal sender) was dropped with the closure
                self.state.store(HostState::Stopped);
                if encoder.join().is_err() {
                    log::error!("encoder thread panicked during aborted start");
                }
                return Err(HostError::Spawn {
                    name: "render",
                    source,
                });
            }
        };

        log::info!(
            "render host started: {}x{} @ {} fps, {} frames per animation",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.frames_per_cycle()
        );
        self.watch = Some(watch);
        self.render = Some(render);
        self.encoder = Some(encoder);
        Ok(())
    }

    /// Request shutdown and wait for both threads. No frame is written after this returns.
    /// Also reclaims the threads after the render loop quit on its own.
    pub fn stop(&mut self) -> Result<(), HostError> {
        match self.state() {
            HostState::Created => {
                self.state.store(HostState::Stopped);
                return Ok(());
            }
            HostState::Stopped => return Ok(()),
            HostState::Running | HostState::Stopping => {}
        }
        self.state.store(HostState::Stopping);
        // Fails only if the loop already exited on its own
        self.sender.send(Command::Stop);

        if let Some(render) = self.render.take() {
            if render.join().is_err() {
                log::error!("render thread panicked outside the tick boundary");
            }
        }
        if let Some(encoder) = self.encoder.take() {
            if encoder.join().is_err() {
                log::error!("encoder thread panicked outside the encode boundary");
            }
        }
        self.state.store(HostState::Stopped);
        log::info!("render host stopped after {} frames", self.frames_written());
        Ok(())
    }

    /// Newest animation since the last call, if any.
    pub fn get_latest(&self) -> Option<EncodedOutput> {
        self.latest.take()
    }

    pub fn command_sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Reads `Stopping` as soon as the render loop exits on its own
    /// (tick panic, encoder fault); `stop` then finishes the shutdown.
    pub fn state(&self) -> HostState {
        self.state.load()
    }

    /// True once the encoder worker has died.
    pub fn is_faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    /// False once the render loop has exited, including after a fault.
    pub fn is_running(&self) -> bool {
        self.render.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn frames_written(&self) -> u64 {
        self.watch.as_ref().map_or(0, RingWatch::cursor)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}

impl Drop for RenderHost {
    fn drop(&mut self) {
        if matches!(self.state(), HostState::Running | HostState::Stopping) {
            if let Err(e) = self.stop() {
                log::error!("render host shutdown on drop failed: {e}");
            }
        }
    }
}

/// Fixed-timestep loop on the render thread. Every exit path drops the
/// runner, which closes the signal channel and lets the encoder wind down.
/// Leaving for any reason other than a stop request flips a running host
/// to `Stopping`.
fn render_loop(mut runner: TickRunner, tick: f32, fault: Arc<AtomicBool>, state: SharedState) {
    let step = Duration::from_secs_f32(tick);
    let mut next = Instant::now();
    loop {
        if fault.load(Ordering::Acquire) {
            log::error!("encoder worker failed, shutting down render loop");
            break;
        }

        let now = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| runner.run_tick(tick, now))) {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::Stop) => break,
            Err(payload) => {
                log::error!(
                    "render tick {} panicked: {}",
                    runner.capture.watch().cursor(),
                    panic_message(&*payload)
                );
                break;
            }
        }

        next += step;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else if now - next > step * MAX_TICK_LAG {
            log::debug!("render loop fell behind, resetting schedule");
            next = now;
        }
    }
    log::info!(
        "render loop exited after {} cycles",
        runner.capture.cycles()
    );
    drop(runner);
    if state.advance(HostState::Running, HostState::Stopping) {
        log::warn!("render loop quit without a stop request; call stop() to reclaim the threads");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::KnownActor;
    use crate::critter::CritterKind;
    use crate::overlay::OverlayKind;
    use crate::render::canvas::Rgb;

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 32,
            height: 24,
            fps: 10,
            capture_window_seconds: 1,
            encode_threads: 2,
            ..RenderConfig::default()
        }
    }

    fn pipeline() -> (TickRunner, CommandSender, LatestSlot, JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let latest = LatestSlot::new();
        let fault = Arc::new(AtomicBool::new(false));
        let (runner, worker) =
            build_pipeline(&small_config(), rx, latest.clone(), fault).unwrap();
        let encoder = worker.spawn().unwrap();
        (runner, CommandSender::new(tx), latest, encoder)
    }

    fn frame_count(blob: &[u8]) -> usize {
        let mut decoder = gif::DecodeOptions::new().read_info(blob).unwrap();
        let mut count = 0;
        while decoder.read_next_frame().unwrap().is_some() {
            count += 1;
        }
        count
    }

    /// Poll until the encoder hands over an animation.
    fn wait_for_output(runner: &mut TickRunner, latest: &LatestSlot) -> EncodedOutput {
        let deadline = std::time::Instant::now() + Duration::from_secs(20);
        while std::time::Instant::now() < deadline {
            runner.collect_output();
            if let Some(output) = latest.take() {
                return output;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no animation produced");
    }

    #[test]
    fn twenty_five_ticks_yield_two_ten_frame_animations() {
        let (mut runner, _sender, latest, encoder) = pipeline();
        let now = Instant::now();

        for _ in 0..10 {
            assert_eq!(runner.run_tick(0.1, now), TickOutcome::Continue);
        }
        let first = wait_for_output(&mut runner, &latest);
        assert_eq!(first.cycle, 1);
        assert_eq!(frame_count(&first.blob), 10);

        for _ in 0..10 {
            runner.run_tick(0.1, now);
        }
        let second = wait_for_output(&mut runner, &latest);
        assert_eq!(second.cycle, 2);
        assert_eq!(frame_count(&second.blob), 10);

        for _ in 0..5 {
            runner.run_tick(0.1, now);
        }
        assert_eq!(runner.capture().cycles(), 2);
        assert_eq!(runner.capture().watch().cursor(), 25);
        let load = runner.load();
        assert_eq!((load.frames_written, load.encoded_cycle, load.backlog()), (25, 2, 0));
        assert_eq!(runner.stats().load(), load);

        drop(runner);
        encoder.join().unwrap();
        assert!(latest.take().is_none());
    }

    #[test]
    fn events_bind_critters_and_overlays() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        let now = Instant::now();
        sender.set_roster(vec![
            (1, Presence::Online),
            (2, Presence::Idle),
            (3, Presence::DoNotDisturb),
            (4, Presence::Offline),
        ]);
        sender.message(1, "hello there");
        sender.reaction(2, Some(RawImage { width: 2, height: 2, rgba: vec![255; 16] }));
        sender.reaction(3, Some(RawImage { width: 2, height: 2, rgba: vec![0; 3] }));
        sender.reaction(3, None);
        runner.run_tick(0.1, now);

        assert_eq!(runner.tracker().len(), 3);
        assert!(!runner.tracker().contains(4));
        let frog = runner.tracker().record(1).unwrap().critter;
        assert_eq!(runner.sim().kind_of(frog), Some(CritterKind::Frog));
        assert_eq!(runner.messages().len(), 1);
        // Speech plus two bursts; the image-less reaction adds nothing
        assert_eq!(runner.overlays().len(), 3);
    }

    #[test]
    fn silent_actors_are_swept() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        let start = Instant::now();
        sender.typing(7);
        runner.run_tick(0.1, start);
        let critter = runner.tracker().record(7).unwrap().critter;

        runner.run_tick(0.1, start + Duration::from_secs(59));
        assert!(runner.tracker().contains(7));

        runner.run_tick(0.1, start + Duration::from_secs(60));
        assert!(!runner.tracker().contains(7));
        assert_eq!(runner.sim().bound_critter(7), None);
        runner.run_tick(0.1, start + Duration::from_secs(61));
        assert!(!runner.sim().contains(critter));
    }

    #[test]
    fn stop_command_ends_tick_before_capture() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        sender.send(Command::Stop);
        assert_eq!(runner.run_tick(0.1, Instant::now()), TickOutcome::Stop);
        assert_eq!(runner.capture().watch().cursor(), 0);
    }

    #[test]
    fn activity_eases_toward_population() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        let now = Instant::now();
        runner.run_tick(0.1, now);
        let empty = runner.sim().activity();
        assert!(empty < 1.0);

        sender.set_roster((0..8).map(|id| (id, Presence::Online)));
        for _ in 0..40 {
            runner.run_tick(0.1, now);
        }
        assert!(runner.sim().activity() > empty);
    }

    #[test]
    fn host_lifecycle() {
        let mut host = RenderHost::new(small_config()).unwrap();
        assert_eq!(host.state(), HostState::Created);
        host.start().unwrap();
        assert_eq!(host.state(), HostState::Running);
        assert!(matches!(
            host.start(),
            Err(HostError::Lifecycle { action: "start", state: HostState::Running })
        ));

        host.command_sender().message(5, "hi");
        thread::sleep(Duration::from_millis(300));
        host.stop().unwrap();
        assert_eq!(host.state(), HostState::Stopped);

        let cursor = host.frames_written();
        assert!(cursor > 0);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(host.frames_written(), cursor);
        assert!(!host.is_running());
        host.stop().unwrap();
    }

    #[test]
    fn host_produces_animations() {
        let mut host = RenderHost::new(small_config()).unwrap();
        host.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(20);
        let mut output = None;
        while output.is_none() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
            output = host.get_latest();
        }
        host.stop().unwrap();
        let output = output.expect("host produced no animation");
        assert_eq!(output.frames, 10);
        assert_eq!(frame_count(&output.blob), 10);
    }

    #[test]
    fn stop_before_start_is_terminal() {
        let mut host = RenderHost::new(small_config()).unwrap();
        host.stop().unwrap();
        assert_eq!(host.state(), HostState::Stopped);
        assert!(matches!(host.start(), Err(HostError::Lifecycle { .. })));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RenderConfig {
            fps: 0,
            ..small_config()
        };
        assert!(matches!(RenderHost::new(config), Err(HostError::Config(_))));
    }

    /// Run `runner` on its own thread the way the host does.
    fn spawn_loop(
        runner: TickRunner,
        fault: &Arc<AtomicBool>,
        state: &SharedState,
    ) -> JoinHandle<()> {
        let fault = Arc::clone(fault);
        let state = state.clone();
        thread::spawn(move || render_loop(runner, 0.01, fault, state))
    }

    fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(20);
        while !done() {
            assert!(std::time::Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn encoder_fault_ends_loop_and_freezes_cursor() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let fault = Arc::new(AtomicBool::new(false));
        let (runner, worker) =
            build_pipeline(&small_config(), rx, LatestSlot::new(), Arc::clone(&fault)).unwrap();
        let encoder = worker.spawn().unwrap();
        let watch = runner.capture().watch();
        let state = SharedState::new(HostState::Running);

        let render = spawn_loop(runner, &fault, &state);
        wait_until("first frames", || watch.cursor() >= 3);
        fault.store(true, Ordering::Release);
        render.join().unwrap();

        assert_eq!(state.load(), HostState::Stopping);
        let cursor = watch.cursor();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(watch.cursor(), cursor);
        // Runner is gone, so the encoder sees its signal channel close
        encoder.join().unwrap();
    }

    #[test]
    fn tick_panic_ends_loop_before_capture() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let fault = Arc::new(AtomicBool::new(false));
        let (mut runner, worker) =
            build_pipeline(&small_config(), rx, LatestSlot::new(), Arc::clone(&fault)).unwrap();
        let encoder = worker.spawn().unwrap();
        runner.panic_at_tick = Some(3);
        let watch = runner.capture().watch();
        let state = SharedState::new(HostState::Running);

        spawn_loop(runner, &fault, &state).join().unwrap();

        assert_eq!(state.load(), HostState::Stopping);
        assert_eq!(watch.cursor(), 3);
        encoder.join().unwrap();
    }

    #[test]
    fn loop_exit_leaves_host_driven_state_alone() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let fault = Arc::new(AtomicBool::new(false));
        let (runner, worker) =
            build_pipeline(&small_config(), rx, LatestSlot::new(), Arc::clone(&fault)).unwrap();
        let encoder = worker.spawn().unwrap();
        let state = SharedState::new(HostState::Stopping);

        CommandSender::new(tx).send(Command::Stop);
        spawn_loop(runner, &fault, &state).join().unwrap();
        assert_eq!(state.load(), HostState::Stopping);
        encoder.join().unwrap();
    }

    #[test]
    fn host_reports_fault_exit() {
        let mut host = RenderHost::new(small_config()).unwrap();
        host.start().unwrap();
        wait_until("first frames", || host.frames_written() > 0);

        host.fault.store(true, Ordering::Release);
        wait_until("fault exit", || host.state() == HostState::Stopping);
        assert!(host.is_faulted());
        wait_until("render thread exit", || !host.is_running());
        let cursor = host.frames_written();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(host.frames_written(), cursor);

        host.stop().unwrap();
        assert_eq!(host.state(), HostState::Stopped);
    }

    #[test]
    fn profiles_style_critters_and_bubbles() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        let red = Rgb::new(220, 20, 20);
        let styled = ActorProfile {
            avatar: Some(RawImage { width: 1, height: 1, rgba: vec![0, 0, 255, 255] }),
            color: Some(red),
        };
        let broken = ActorProfile {
            avatar: Some(RawImage { width: 1, height: 1, rgba: vec![0; 3] }),
            color: None,
        };
        sender.set_snapshot(vec![
            KnownActor::new(1, Presence::Online).with_profile(styled),
            KnownActor::new(2, Presence::Idle).with_profile(broken),
        ]);
        sender.message(1, "hi");
        runner.run_tick(0.1, Instant::now());

        let first = runner.tracker().record(1).unwrap().critter;
        let second = runner.tracker().record(2).unwrap().critter;
        assert!(runner.sim().avatar(first).is_some());
        // Invalid avatar falls back to the procedural body
        assert!(runner.sim().avatar(second).is_none());

        let OverlayKind::Speech(bubble) = &runner.overlays().items()[0].kind else {
            panic!("expected speech");
        };
        assert_eq!(bubble.tint, red);
    }

    #[test]
    fn speech_expires_on_event_clock() {
        let (mut runner, sender, _latest, _encoder) = pipeline();
        let t0 = Instant::now();
        sender.message(1, "hello");
        runner.run_tick(0.1, t0);
        assert_eq!(runner.overlays().len(), 1);

        runner.run_tick(0.1, t0 + Duration::from_millis(4_900));
        assert_eq!(runner.overlays().len(), 1);
        runner.run_tick(0.1, t0 + DEFAULT_TTL);
        assert!(runner.overlays().is_empty());
    }
}
