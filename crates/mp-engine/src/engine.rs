//! The engine facade.
//!
//! One [`Engine`] owns everything that makes sound: the node graph and its
//! audio clock, eight track effects chains plus a fallback chain, the synth
//! and sample voice registries, the sequencer grid and the lookahead
//! scheduler. Nothing is global; engines are independent of each other.
//!
//! The host pulls audio with [`Engine::render_frame`]. Each frame first does
//! the timed work due at the current clock (scheduler poll, pending
//! note-offs and replayed gestures, voice timers), then renders the graph.
//! Every parameter write made through the facade is timestamped on the
//! audio clock.

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, info, trace, warn};
use mp_ir::controls;
use mp_ir::{
    Gesture, InstrumentKind, NoteId, NoteInfo, RecordedEvent, Resolution, SampleBuffer, Scale,
    ScaleSettings, SequencerGrid, StepHit, Tempo, TimeSignature, TRACK_COUNT,
};

use crate::effects::{reverb_impulse, ChainSettings, EffectsChain};
use crate::error::EngineError;
use crate::event_queue::EventQueue;
use crate::frame::{Frame, Stereo};
use crate::graph::{Graph, NodeKey};
use crate::instruments::{self, Patch, VoiceParams};
use crate::node::ParamId;
use crate::registry::{RegistryConfig, VoiceRegistry};
use crate::sampler::{build_sample_voice, SampleBank, SampleDecoder, SampleRoute};
use crate::scheduler::{BeatEvent, LookaheadScheduler, SchedulerConfig, StepKey, DEDUP_CAPACITY};
use crate::voice::{Voice, VoiceKind, VoiceState};

/// Highest sample rate an engine accepts.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Metronome clicks are cut this long after they start.
const CLICK_LENGTH: f64 = 0.05;
const CLICK_RELEASE: f64 = 0.01;

/// Timing and level constants for an engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Audio time between scheduler polls.
    pub poll_interval: f64,
    /// How far past the clock each poll commits beats.
    pub schedule_ahead: f64,
    /// Delay between starting the sequencer and its first beat.
    pub start_offset: f64,
    pub max_events_per_poll: usize,
    /// Default voice attack; some instruments swell in more slowly.
    pub attack: f64,
    /// Envelope peak of a full-velocity voice.
    pub voice_level: f32,
    pub safety_timeout: f64,
    pub teardown_guard: f64,
    /// Fixed release of a stopped sample voice.
    pub sample_release: f64,
    /// Time constant for track parameter changes.
    pub smoothing: f64,
    pub master_level: f32,
    /// How long the master stays muted after a panic.
    pub panic_restore_delay: f64,
    /// Length of the generated reverb impulse.
    pub reverb_seconds: f64,
    pub dedup_capacity: usize,
    /// Seed for noise sources and reverb impulses.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            poll_interval: 0.025,
            schedule_ahead: 0.1,
            start_offset: 0.05,
            max_events_per_poll: 32,
            attack: 0.01,
            voice_level: 0.3,
            safety_timeout: 10.0,
            teardown_guard: 0.05,
            sample_release: 0.1,
            smoothing: 0.01,
            master_level: 0.8,
            panic_restore_delay: 0.1,
            reverb_seconds: 2.0,
            dedup_capacity: DEDUP_CAPACITY,
            seed: 0x6d70_6164,
        }
    }
}

/// Whether the audio clock is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Renders silence; the clock is frozen.
    Suspended,
    Running,
}

/// The 0-100 control values of a track, as last set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackControls {
    pub reverb: f32,
    pub delay: f32,
    pub delay_time: f32,
    pub filter: f32,
    pub volume: f32,
    pub decay: f32,
}

impl Default for TrackControls {
    fn default() -> Self {
        Self {
            reverb: 20.0,
            delay: 0.0,
            delay_time: 30.0,
            filter: 100.0,
            volume: 80.0,
            decay: 30.0,
        }
    }
}

impl TrackControls {
    fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            cutoff_hz: controls::filter_cutoff_hz(self.filter),
            delay_mix: controls::wet_mix(self.delay),
            delay_seconds: controls::delay_seconds(self.delay_time),
            reverb_mix: controls::wet_mix(self.reverb),
            gain: controls::volume_gain(self.volume),
        }
    }
}

struct Track {
    instrument: InstrumentKind,
    chain: NodeKey,
    controls: TrackControls,
}

/// Work deferred to a point on the audio clock.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    /// Release the voice under `id`; `None` uses its track's decay.
    NoteOff { id: NoteId, release: Option<f64> },
    /// Replay a recorded gesture.
    Replay(Gesture),
}

struct Recording {
    started_at: f64,
    events: Vec<RecordedEvent>,
}

/// A multipad audio engine.
pub struct Engine {
    config: EngineConfig,
    graph: Graph,
    state: ContextState,
    frames: u64,
    tracks: Vec<Track>,
    fallback: NodeKey,
    voices: VoiceRegistry,
    sample_voices: VoiceRegistry,
    bank: SampleBank,
    scheduler: LookaheadScheduler,
    grid: SequencerGrid,
    tempo: Tempo,
    signature: TimeSignature,
    metronome: bool,
    scale: ScaleSettings,
    pending: EventQueue<Action>,
    recording: Option<Recording>,
    looped: Option<Vec<RecordedEvent>>,
    master_level: f32,
    rng: fastrand::Rng,
}

/// Position along a pad edge as a 0.0..=1.0 fraction.
fn normalize(pos: f32, extent: f32) -> f32 {
    if extent > 0.0 {
        controls::fraction(pos / extent)
    } else {
        0.0
    }
}

/// A 0-100 control value clamped into range, NaN as 0.
fn control(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

impl Engine {
    /// Build the graph: one effects chain per track plus the fallback chain,
    /// all feeding the master output. The context starts suspended.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.sample_rate == 0 || config.sample_rate > MAX_SAMPLE_RATE {
            return Err(EngineError::ContextUnavailable {
                sample_rate: config.sample_rate,
            });
        }
        let sample_rate = config.sample_rate as f32;
        let mut graph = Graph::new(sample_rate);
        let mut rng = fastrand::Rng::with_seed(config.seed);
        let impulse_len = (config.reverb_seconds.max(0.0) * config.sample_rate as f64) as usize;
        let destination = graph.destination();
        graph
            .param_mut(destination, ParamId::Gain)?
            .force(config.master_level, 0.0);

        let mut add_chain = |graph: &mut Graph, settings: ChainSettings| {
            let impulse = reverb_impulse(&mut rng, impulse_len.max(1));
            let chain = graph.add_effects(EffectsChain::new(
                sample_rate,
                settings,
                impulse,
                config.smoothing,
            ));
            graph.connect(chain, destination).map(|_| chain)
        };

        let mut tracks = Vec::with_capacity(TRACK_COUNT);
        for _ in 0..TRACK_COUNT {
            let controls = TrackControls::default();
            let chain = add_chain(&mut graph, controls.chain_settings())?;
            tracks.push(Track {
                instrument: InstrumentKind::default(),
                chain,
                controls,
            });
        }
        let fallback = add_chain(&mut graph, TrackControls::default().chain_settings())?;

        let registry = RegistryConfig {
            safety_timeout: config.safety_timeout,
            teardown_guard: config.teardown_guard,
        };
        let scheduler = LookaheadScheduler::new(SchedulerConfig {
            poll_interval: config.poll_interval,
            schedule_ahead: config.schedule_ahead,
            start_offset: config.start_offset,
            max_events_per_poll: config.max_events_per_poll,
            dedup_capacity: config.dedup_capacity,
            ..SchedulerConfig::default()
        });

        Ok(Self {
            config,
            graph,
            state: ContextState::Suspended,
            frames: 0,
            tracks,
            fallback,
            voices: VoiceRegistry::new(registry),
            sample_voices: VoiceRegistry::new(registry),
            bank: SampleBank::new(),
            scheduler,
            grid: SequencerGrid::default(),
            tempo: Tempo::default(),
            signature: TimeSignature::default(),
            metronome: false,
            scale: ScaleSettings::default(),
            pending: EventQueue::new(),
            recording: None,
            looped: None,
            master_level: config.master_level,
            rng,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Audio clock in seconds.
    pub fn now(&self) -> f64 {
        self.frames as f64 / self.config.sample_rate as f64
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            debug!("audio context resumed at {:.3}s", self.now());
            self.state = ContextState::Running;
        }
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }

    // --- rendering ---

    pub fn render_frame(&mut self) -> Frame {
        Frame::from_stereo(self.render_stereo())
    }

    /// Run the work due at the current clock, render one frame and advance
    /// the clock. Silence while suspended.
    pub fn render_stereo(&mut self) -> Stereo {
        if self.state == ContextState::Suspended {
            return Stereo::SILENCE;
        }
        let now = self.now();
        self.run_due(now);
        let out = self.graph.render(now);
        self.frames += 1;
        out
    }

    pub fn render_block(&mut self, out: &mut [Frame]) {
        for frame in out.iter_mut() {
            *frame = self.render_frame();
        }
    }

    fn run_due(&mut self, now: f64) {
        if self.scheduler.poll_due(now) {
            let beat = self.tempo.quarter_seconds();
            let poll = self.scheduler.poll(now, beat);
            if poll.skipped > 0 {
                debug!("{} late beats skipped at {:.3}s", poll.skipped, now);
            }
            for event in poll.events {
                self.dispatch_beat(event, now);
            }
        }
        while let Some(due) = self.pending.pop_due(now) {
            self.run_action(due.item, now);
        }
        self.voices.advance(&mut self.graph, now);
        self.sample_voices.advance(&mut self.graph, now);
    }

    fn run_action(&mut self, action: Action, now: f64) {
        match action {
            Action::NoteOff { id, release } => {
                let release = release.unwrap_or_else(|| self.release_for_voice(id));
                self.voices.note_off(&mut self.graph, id, now, release);
            }
            Action::Replay(Gesture::NoteOn {
                id,
                x,
                y,
                instrument,
                track,
            }) => {
                if let Err(e) = self.trigger(id.replayed(), x, y, instrument, track, now) {
                    warn!("replayed note {:?} failed: {}", id, e);
                }
            }
            Action::Replay(Gesture::NoteOff { id }) => self.release_note(id.replayed(), now),
        }
    }

    // --- gestures ---

    /// Start a note for a pad gesture at (`x`, `y`) on a `width` x `height`
    /// pad and return the note under the gesture.
    ///
    /// The horizontal position picks the scale note (or, on a sample-mode
    /// track, the playback rate); the vertical position sets velocity.
    /// Resumes a suspended context.
    #[allow(clippy::too_many_arguments)]
    pub fn play_note(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        id: NoteId,
        instrument: Option<InstrumentKind>,
        track: usize,
    ) -> NoteInfo {
        self.resume();
        let (x, y) = (normalize(x, width), normalize(y, height));
        let now = self.now();
        if let Some(rec) = &mut self.recording {
            rec.events.push(RecordedEvent {
                offset: now - rec.started_at,
                gesture: Gesture::NoteOn {
                    id,
                    x,
                    y,
                    instrument,
                    track,
                },
            });
        }
        if let Err(e) = self.trigger(id, x, y, instrument, track, now) {
            warn!("note {:?} on track {} failed: {}", id, track, e);
        }
        self.scale.note_at(x)
    }

    /// Release the note under `id`. Unknown or already releasing notes are
    /// ignored.
    pub fn stop_note(&mut self, id: NoteId) {
        let now = self.now();
        if let Some(rec) = &mut self.recording {
            rec.events.push(RecordedEvent {
                offset: now - rec.started_at,
                gesture: Gesture::NoteOff { id },
            });
        }
        self.release_note(id, now);
    }

    /// Mute the master, silence and remove every voice, drop pending
    /// note-offs and replays, then bring the master back after
    /// `panic_restore_delay`. Returns the number of voices removed.
    pub fn stop_all_notes(&mut self) -> usize {
        let now = self.now();
        let level = self.master_level;
        let restore = now + self.config.panic_restore_delay;
        let destination = self.graph.destination();
        if let Ok(master) = self.graph.param_mut(destination, ParamId::Gain) {
            master.force(0.0, now);
            master.set_value_at_time(level, restore);
        }
        let removed = self.voices.panic(&mut self.graph, now)
            + self.sample_voices.panic(&mut self.graph, now);
        self.pending.clear();
        info!("panic: {} voices stopped", removed);
        removed
    }

    fn release_note(&mut self, id: NoteId, now: f64) {
        let release = self.release_for_voice(id);
        self.voices.note_off(&mut self.graph, id, now, release);
        self.sample_voices
            .note_off(&mut self.graph, id, now, self.config.sample_release);
    }

    fn trigger(
        &mut self,
        id: NoteId,
        x: f32,
        y: f32,
        instrument: Option<InstrumentKind>,
        track: usize,
        when: f64,
    ) -> Result<(), EngineError> {
        let level = self.config.voice_level * controls::velocity(y);
        match self.bank.route(track) {
            SampleRoute::Sample(buffer) => {
                self.start_sample(id, track, buffer, controls::playback_rate(x), level, when)
            }
            SampleRoute::Missing => {
                debug!("track {} is in sample mode with no sample, {:?} dropped", track, id);
                Ok(())
            }
            SampleRoute::Synth => {
                let kind = instrument
                    .or_else(|| self.tracks.get(track).map(|t| t.instrument))
                    .unwrap_or_default();
                let note = self.scale.note_at(x);
                self.start_synth(id, kind, note.frequency, track, level, when)
            }
        }
    }

    fn start_synth(
        &mut self,
        id: NoteId,
        kind: InstrumentKind,
        frequency: f32,
        track: usize,
        level: f32,
        when: f64,
    ) -> Result<(), EngineError> {
        let (output, owner) = self.route(track);
        let params = VoiceParams {
            when,
            level,
            attack: instruments::attack_seconds(kind, self.config.attack),
            seed: self.rng.u64(..),
        };
        let nodes = instruments::build(
            &mut self.graph,
            Patch::Instrument { kind, frequency },
            params,
            output,
        )?;
        let release = self.release_for(owner);
        let voice = Voice::new(id, VoiceKind::Synth(kind), owner, nodes, when, release);
        let now = self.now();
        self.voices.insert(&mut self.graph, voice, now);
        trace!("{} voice {:?} at {:.1} Hz on track {}", kind, id, frequency, track);
        Ok(())
    }

    fn start_sample(
        &mut self,
        id: NoteId,
        track: usize,
        buffer: Arc<SampleBuffer>,
        rate: f32,
        level: f32,
        when: f64,
    ) -> Result<(), EngineError> {
        let (output, owner) = self.route(track);
        let nodes = build_sample_voice(&mut self.graph, buffer, rate, when, level, output)?;
        let voice = Voice::new(
            id,
            VoiceKind::Sample,
            owner,
            nodes,
            when,
            self.config.sample_release,
        )
        .one_shot();
        let now = self.now();
        self.sample_voices.insert(&mut self.graph, voice, now);
        trace!("sample voice {:?} at rate {:.3} on track {}", id, rate, track);
        Ok(())
    }

    /// Effects chain for `track`, or the fallback chain for a bad index.
    fn route(&self, track: usize) -> (NodeKey, Option<usize>) {
        match self.tracks.get(track) {
            Some(t) => (t.chain, Some(track)),
            None => (self.fallback, None),
        }
    }

    fn release_for(&self, track: Option<usize>) -> f64 {
        let decay = track
            .and_then(|t| self.tracks.get(t))
            .map(|t| t.controls.decay)
            .unwrap_or(TrackControls::default().decay);
        controls::decay_seconds(decay) as f64
    }

    fn release_for_voice(&self, id: NoteId) -> f64 {
        let track = self.voices.get(id).and_then(|v| v.track);
        self.release_for(track)
    }

    // --- sequencer ---

    fn dispatch_beat(&mut self, event: BeatEvent, now: f64) {
        if self.metronome {
            self.click(event);
        }
        if event.beat == 0 {
            if let Some(events) = &self.looped {
                for e in events {
                    self.pending.push(event.time + e.offset, Action::Replay(e.gesture));
                }
            }
        }
        let hits = self.grid.hits_for_beat(event.beat, event.time, event.duration);
        for hit in hits {
            if !self.scheduler.claim(StepKey::new(hit.track, hit.step, hit.time)) {
                continue;
            }
            if let Err(e) = self.play_step(hit) {
                warn!("step {} on track {} failed at {:.3}s: {}", hit.step, hit.track, now, e);
            }
        }
    }

    fn click(&mut self, event: BeatEvent) {
        let accent = self.signature.is_downbeat(event.beat);
        let params = VoiceParams {
            when: event.time,
            level: self.config.voice_level,
            attack: self.config.attack,
            seed: 0,
        };
        match instruments::build(&mut self.graph, Patch::Click { accent }, params, self.fallback) {
            Ok(nodes) => {
                let id = NoteId::Metronome { beat: event.beat };
                let voice = Voice::new(id, VoiceKind::Click, None, nodes, event.time, CLICK_RELEASE);
                let now = self.now();
                self.voices.insert(&mut self.graph, voice, now);
                self.pending.push(
                    event.time + CLICK_LENGTH,
                    Action::NoteOff {
                        id,
                        release: Some(CLICK_RELEASE),
                    },
                );
            }
            Err(e) => warn!("metronome click failed: {}", e),
        }
    }

    fn play_step(&mut self, hit: StepHit) -> Result<(), EngineError> {
        let id = NoteId::Step {
            track: hit.track as u8,
            step: hit.step,
        };
        match self.bank.route(hit.track) {
            SampleRoute::Sample(buffer) => {
                let rate = controls::semitone_ratio(hit.pitch_offset as f32);
                let level = self.config.voice_level;
                self.start_sample(id, hit.track, buffer, rate, level, hit.time)
            }
            SampleRoute::Missing => {
                debug!("step {} on track {} has no sample, skipped", hit.step, hit.track);
                Ok(())
            }
            SampleRoute::Synth => {
                let kind = self.tracks[hit.track].instrument;
                let note = self.scale.root_with_offset(hit.pitch_offset);
                let level = self.config.voice_level;
                self.start_synth(id, kind, note.frequency, hit.track, level, hit.time)?;
                self.pending
                    .push(hit.time + hit.gate, Action::NoteOff { id, release: None });
                Ok(())
            }
        }
    }

    /// Start the sequencer at beat 0, resuming the context if needed.
    pub fn start_sequencer(&mut self) {
        self.resume();
        let now = self.now();
        self.scheduler.start(now);
        info!(
            "sequencer started at {:.3}s ({} bpm, {}/{})",
            now,
            self.tempo.bpm(),
            self.signature.numerator,
            self.signature.denominator
        );
    }

    /// Stop polling. Notes already committed still sound.
    pub fn stop_sequencer(&mut self) {
        if self.scheduler.is_running() {
            self.scheduler.stop();
            info!("sequencer stopped at {:.3}s", self.now());
        }
    }

    pub fn is_sequencer_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Next beat the scheduler will commit.
    pub fn current_beat(&self) -> u32 {
        self.scheduler.current_beat()
    }

    /// Set the tempo, clamped into range. Returns the tempo in effect.
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.tempo = Tempo::new(bpm);
        self.tempo.bpm()
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) -> Result<(), EngineError> {
        self.signature = TimeSignature::new(numerator, denominator).ok_or(
            EngineError::InvalidTimeSignature {
                numerator,
                denominator,
            },
        )?;
        Ok(())
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn set_metronome_enabled(&mut self, enabled: bool) {
        self.metronome = enabled;
    }

    /// Set one step of a track's row and switch the row to `resolution`.
    pub fn set_sequencer_beat(
        &mut self,
        track: usize,
        step: usize,
        active: bool,
        resolution: Resolution,
    ) -> Result<(), EngineError> {
        let row = self
            .grid
            .track_mut(track)
            .ok_or(EngineError::InvalidTrack(track))?;
        if step >= resolution.live_steps() {
            return Err(EngineError::InvalidStep { track, step });
        }
        row.resolution = resolution;
        row.set_step(step, active);
        Ok(())
    }

    /// Transpose one step by `semitones` from the scale root.
    pub fn set_step_pitch(
        &mut self,
        track: usize,
        step: usize,
        semitones: i8,
    ) -> Result<(), EngineError> {
        let row = self
            .grid
            .track_mut(track)
            .ok_or(EngineError::InvalidTrack(track))?;
        if !row.set_pitch(step, semitones) {
            return Err(EngineError::InvalidStep { track, step });
        }
        Ok(())
    }

    pub fn is_step_active(&self, track: usize, step: usize) -> bool {
        self.grid.track(track).is_some_and(|row| row.is_active(step))
    }

    pub fn clear_track(&mut self, track: usize) -> Result<(), EngineError> {
        self.grid
            .track_mut(track)
            .ok_or(EngineError::InvalidTrack(track))?
            .clear();
        Ok(())
    }

    pub fn clear_pattern(&mut self) {
        self.grid.clear();
    }

    pub fn grid(&self) -> &SequencerGrid {
        &self.grid
    }

    // --- recording ---

    /// Start capturing gestures, discarding any capture in progress.
    pub fn start_recording(&mut self) {
        self.recording = Some(Recording {
            started_at: self.now(),
            events: Vec::new(),
        });
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Stop capturing and hand back what was recorded.
    pub fn stop_recording(&mut self) -> Vec<RecordedEvent> {
        self.recording.take().map(|r| r.events).unwrap_or_default()
    }

    /// Play recorded gestures under their replay identifiers. While the
    /// sequencer runs they loop from every pattern start; otherwise they
    /// play once, starting `start_offset` from now.
    pub fn play_recording(&mut self, events: &[RecordedEvent]) {
        if events.is_empty() {
            return;
        }
        if self.scheduler.is_running() {
            self.looped = Some(events.to_vec());
            return;
        }
        self.resume();
        let start = self.now() + self.config.start_offset;
        for e in events {
            self.pending.push(start + e.offset.max(0.0), Action::Replay(e.gesture));
        }
    }

    /// Stop looping and drop replayed note-ons that have not fired yet.
    /// Their note-offs stay queued so nothing is left hanging.
    pub fn stop_playback(&mut self) {
        self.looped = None;
        self.pending
            .retain(|a| !matches!(a, Action::Replay(Gesture::NoteOn { .. })));
    }

    pub fn is_looping(&self) -> bool {
        self.looped.is_some()
    }

    // --- samples ---

    /// Decode `bytes` into the sample slot of `track`. On failure the track
    /// keeps its previous sample.
    pub fn load_sample<D: SampleDecoder>(
        &mut self,
        decoder: &D,
        track: usize,
        bytes: &[u8],
        name: &str,
    ) -> Result<(), EngineError> {
        let buffer = self.bank.load(decoder, track, bytes, name)?;
        info!(
            "sample {:?} loaded on track {} ({:.2}s)",
            buffer.name.as_str(),
            track,
            buffer.duration_seconds()
        );
        Ok(())
    }

    /// Store a buffer decoded elsewhere.
    pub fn install_sample(&mut self, track: usize, buffer: Arc<SampleBuffer>) -> Result<(), EngineError> {
        self.bank.install(track, buffer)
    }

    pub fn clear_sample(&mut self, track: usize) -> Result<(), EngineError> {
        self.bank.clear(track)
    }

    pub fn sample_name(&self, track: usize) -> Option<&str> {
        self.bank.name(track)
    }

    pub fn set_sample_mode(&mut self, track: usize, enabled: bool) -> Result<(), EngineError> {
        self.bank.set_mode(track, enabled)
    }

    pub fn is_sample_mode(&self, track: usize) -> bool {
        self.bank.mode(track)
    }

    // --- tracks ---

    fn chain_mut(&mut self, track: usize) -> Result<&mut EffectsChain, EngineError> {
        let chain = self
            .tracks
            .get(track)
            .ok_or(EngineError::InvalidTrack(track))?
            .chain;
        Ok(self.graph.effects_mut(chain)?)
    }

    pub fn set_track_reverb(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let now = self.now();
        self.chain_mut(track)?
            .set_reverb_mix(controls::wet_mix(value), now);
        self.tracks[track].controls.reverb = control(value);
        Ok(())
    }

    pub fn set_track_delay(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let now = self.now();
        self.chain_mut(track)?
            .set_delay_mix(controls::wet_mix(value), now);
        self.tracks[track].controls.delay = control(value);
        Ok(())
    }

    pub fn set_track_delay_time(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let now = self.now();
        self.chain_mut(track)?
            .set_delay_time(controls::delay_seconds(value), now);
        self.tracks[track].controls.delay_time = control(value);
        Ok(())
    }

    pub fn set_track_filter(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let now = self.now();
        self.chain_mut(track)?
            .set_cutoff(controls::filter_cutoff_hz(value), now);
        self.tracks[track].controls.filter = control(value);
        Ok(())
    }

    pub fn set_track_volume(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let now = self.now();
        self.chain_mut(track)?
            .set_gain(controls::volume_gain(value), now);
        self.tracks[track].controls.volume = control(value);
        Ok(())
    }

    /// Release time used by later note-offs on this track.
    pub fn set_track_decay(&mut self, track: usize, value: f32) -> Result<(), EngineError> {
        let t = self
            .tracks
            .get_mut(track)
            .ok_or(EngineError::InvalidTrack(track))?;
        t.controls.decay = control(value);
        Ok(())
    }

    pub fn track_controls(&self, track: usize) -> Result<TrackControls, EngineError> {
        self.tracks
            .get(track)
            .map(|t| t.controls)
            .ok_or(EngineError::InvalidTrack(track))
    }

    pub fn set_track_instrument(
        &mut self,
        track: usize,
        instrument: InstrumentKind,
    ) -> Result<(), EngineError> {
        self.tracks
            .get_mut(track)
            .ok_or(EngineError::InvalidTrack(track))?
            .instrument = instrument;
        Ok(())
    }

    pub fn track_instrument(&self, track: usize) -> Result<InstrumentKind, EngineError> {
        self.tracks
            .get(track)
            .map(|t| t.instrument)
            .ok_or(EngineError::InvalidTrack(track))
    }

    // --- musical settings ---

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale.scale = scale;
    }

    /// Pitch class of the key, taken modulo 12.
    pub fn set_key(&mut self, key: u8) {
        self.scale.key = key % 12;
    }

    pub fn set_octave(&mut self, octave: u8) {
        self.scale.octave = octave.min(8);
    }

    pub fn set_range_octaves(&mut self, octaves: u8) {
        self.scale.range_octaves = octaves.clamp(1, 4);
    }

    pub fn scale_settings(&self) -> ScaleSettings {
        self.scale
    }

    /// Master output level from a 0-100 control.
    pub fn set_master_volume(&mut self, value: f32) {
        let now = self.now();
        self.master_level = controls::volume_gain(value);
        let destination = self.graph.destination();
        if let Ok(master) = self.graph.param_mut(destination, ParamId::Gain) {
            master.cancel_scheduled_values(now);
            master.set_target_at_time(self.master_level, now, self.config.smoothing);
        }
    }

    // --- introspection ---

    /// Synth voices (metronome included) in the registry.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn active_sample_voice_count(&self) -> usize {
        self.sample_voices.len()
    }

    pub fn voice_state(&self, id: NoteId) -> Option<VoiceState> {
        self.voices.state(id)
    }

    pub fn sample_voice_state(&self, id: NoteId) -> Option<VoiceState> {
        self.sample_voices.state(id)
    }

    /// Nodes in the graph, the fixed chains included.
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }
}
