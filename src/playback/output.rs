use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};
use std::collections::VecDeque;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Instant;

use super::scheduler::{Tone, ToneHandle, ToneOutput};
use super::voice::Voice;
use crate::config::PlaybackSettings;
use crate::error::{Error, PlaybackError, Result};

const COMMAND_CAPACITY: usize = 4096;
/// Tones are handed to the audio thread this far ahead of their start.
const LOOKAHEAD_SECONDS: f64 = 0.5;
/// Retry delay when the command ring is full.
const STALL_RETRY_SECONDS: f64 = 0.01;

/// A tone on its way to the audio thread. `generation` ties it to one run;
/// bumping the shared generation discards it wherever it is.
#[derive(Debug, Clone, Copy)]
struct QueuedTone {
    generation: u64,
    handle: u64,
    start_sample: u64,
    stop_sample: u64,
    frequency: f32,
    gain: f32,
}

struct AudioState {
    voices: Vec<(u64, Voice)>,
    consumer: HeapCons<QueuedTone>,
    sample_counter: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    master_gain: f32,
    sample_rate: f32,
    num_channels: usize,
}

/// Engine side of the audio thread. Holds the tones of the current run and
/// feeds them to the ring as their start approaches, so the ring only ever
/// carries the next half second.
struct ToneFeed {
    producer: HeapProd<QueuedTone>,
    backlog: VecDeque<QueuedTone>,
    sample_counter: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    sample_rate: f32,
    next_handle: u64,
    stalled: bool,
}

fn tone_channel(
    capacity: usize,
    sample_rate: f32,
    num_channels: usize,
    master_gain: f32,
) -> (ToneFeed, AudioState) {
    let (producer, consumer) = HeapRb::<QueuedTone>::new(capacity).split();
    let sample_counter = Arc::new(AtomicU64::new(0));
    let generation = Arc::new(AtomicU64::new(0));

    let feed = ToneFeed {
        producer,
        backlog: VecDeque::new(),
        sample_counter: sample_counter.clone(),
        generation: generation.clone(),
        sample_rate,
        next_handle: 0,
        stalled: false,
    };
    let audio = AudioState {
        voices: Vec::with_capacity(64),
        consumer,
        sample_counter,
        generation,
        master_gain,
        sample_rate,
        num_channels,
    };
    (feed, audio)
}

impl ToneFeed {
    fn to_sample(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    #[cfg(test)]
    fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

impl ToneOutput for ToneFeed {
    fn now(&self) -> f64 {
        self.sample_counter.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn start_tone(&mut self, tone: Tone) -> std::result::Result<ToneHandle, PlaybackError> {
        let handle = self.next_handle;
        self.next_handle += 1;
        let queued = QueuedTone {
            generation: self.generation.load(Ordering::Acquire),
            handle,
            start_sample: self.to_sample(tone.start),
            stop_sample: self.to_sample(tone.stop),
            frequency: tone.frequency,
            gain: tone.gain,
        };
        // keep the backlog in start order
        let at = self
            .backlog
            .partition_point(|t| t.start_sample <= queued.start_sample);
        self.backlog.insert(at, queued);
        Ok(ToneHandle(handle))
    }

    fn silence_all(&mut self) {
        self.backlog.clear();
        self.stalled = false;
        let retired = self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("Tone generation {} retired", retired);
    }

    fn service(&mut self) {
        let horizon = self.to_sample(self.now() + LOOKAHEAD_SECONDS);
        self.stalled = false;
        while let Some(&next) = self.backlog.front() {
            if next.start_sample > horizon {
                break;
            }
            if self.producer.try_push(next).is_err() {
                self.stalled = true;
                break;
            }
            self.backlog.pop_front();
        }
    }

    fn next_service(&self) -> Option<f64> {
        let next = self.backlog.front()?;
        if self.stalled {
            return Some(self.now() + STALL_RETRY_SECONDS);
        }
        Some(next.start_sample as f64 / self.sample_rate as f64 - LOOKAHEAD_SECONDS)
    }
}

/// Triangle-wave synth on the default output device. Tones are keyed to the
/// audio callback's sample counter, so `now()` is the clock the listener
/// hears.
pub struct SynthOutput {
    _stream: cpal::Stream,
    feed: ToneFeed,
}

impl SynthOutput {
    pub fn open(settings: &PlaybackSettings) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("No output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let stream_config: cpal::StreamConfig = config.into();

        let sample_rate = stream_config.sample_rate as f32;
        let num_channels = stream_config.channels as usize;
        tracing::info!("Audio output: {} channels, {} Hz", num_channels, sample_rate);

        let (feed, mut audio_state) = tone_channel(
            COMMAND_CAPACITY,
            sample_rate,
            num_channels,
            settings.master_gain,
        );

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback(data, &mut audio_state);
                },
                |err| tracing::error!("Audio error: {}", err),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            feed,
        })
    }
}

impl ToneOutput for SynthOutput {
    fn now(&self) -> f64 {
        self.feed.now()
    }

    fn start_tone(&mut self, tone: Tone) -> std::result::Result<ToneHandle, PlaybackError> {
        self.feed.start_tone(tone)
    }

    fn silence_all(&mut self) {
        self.feed.silence_all();
    }

    fn service(&mut self) {
        self.feed.service();
    }

    fn next_service(&self) -> Option<f64> {
        self.feed.next_service()
    }
}

fn audio_callback(data: &mut [f32], state: &mut AudioState) {
    let live = state.generation.load(Ordering::Acquire);
    state.voices.retain(|(generation, _)| *generation == live);
    while let Some(tone) = state.consumer.try_pop() {
        if tone.generation != live {
            continue;
        }
        state.voices.push((
            tone.generation,
            Voice::new(
                tone.handle,
                tone.start_sample,
                tone.stop_sample,
                tone.frequency,
                tone.gain,
            ),
        ));
    }

    let num_frames = data.len() / state.num_channels.max(1);
    let current_sample = state.sample_counter.load(Ordering::Relaxed);
    data.fill(0.0);

    for frame in 0..num_frames {
        let sample = current_sample + frame as u64;
        let mut mix = 0.0;
        for (_, voice) in state.voices.iter_mut() {
            mix += voice.render_sample(sample, state.sample_rate);
        }
        let mix = mix * state.master_gain;
        for out in &mut data[frame * state.num_channels..(frame + 1) * state.num_channels] {
            *out = mix;
        }
    }

    let buffer_end = current_sample + num_frames as u64;
    state.voices.retain(|(_, v)| !v.is_finished(buffer_end));
    state
        .sample_counter
        .fetch_add(num_frames as u64, Ordering::Relaxed);
}

/// Wall-clock output that makes no sound. Keeps playback highlighting alive
/// on machines without an audio device.
pub struct SilentOutput {
    started: Instant,
    next_handle: u64,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            next_handle: 0,
        }
    }
}

impl Default for SilentOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneOutput for SilentOutput {
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn start_tone(&mut self, _tone: Tone) -> std::result::Result<ToneHandle, PlaybackError> {
        let handle = ToneHandle(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn silence_all(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1000 Hz keeps sample maths readable: one sample per millisecond
    fn channel(capacity: usize) -> (ToneFeed, AudioState) {
        tone_channel(capacity, 1000.0, 2, 0.7)
    }

    fn tone(start: f64, stop: f64) -> Tone {
        Tone {
            frequency: 100.0,
            gain: 0.5,
            start,
            stop,
        }
    }

    fn render(state: &mut AudioState, frames: usize) -> Vec<f32> {
        let mut data = vec![1.0f32; frames * state.num_channels];
        audio_callback(&mut data, state);
        data
    }

    #[test]
    fn callback_advances_the_clock_and_drops_finished_voices() {
        let (mut feed, mut audio) = channel(8);
        feed.start_tone(tone(0.0, 0.01)).unwrap();
        feed.service();

        let data = render(&mut audio, 8);
        assert_eq!(feed.now(), 0.008);
        assert_eq!(audio.voices.len(), 1);
        // both channels carry the same mono mix
        assert_eq!(data[0], data[1]);
        assert!((data[0] - (-1.0 * 0.5 * 0.7)).abs() < 1e-6);

        render(&mut audio, 8);
        assert!(audio.voices.is_empty());
    }

    #[test]
    fn tones_reach_the_ring_only_near_their_start() {
        let (mut feed, mut audio) = channel(8);
        feed.start_tone(tone(0.0, 0.1)).unwrap();
        feed.start_tone(tone(2.0, 2.1)).unwrap();
        feed.service();

        assert_eq!(feed.backlog_len(), 1);
        assert_eq!(feed.next_service(), Some(1.5));

        render(&mut audio, 1600);
        feed.service();
        assert_eq!(feed.backlog_len(), 0);
        assert_eq!(feed.next_service(), None);
    }

    #[test]
    fn pieces_larger_than_the_ring_start_and_stop_completely() {
        let (mut feed, mut audio) = channel(COMMAND_CAPACITY);
        let notes = COMMAND_CAPACITY + 904;
        for i in 0..notes {
            // a dense run: every tone starts inside the lookahead window
            let start = i as f64 * 0.0001;
            feed.start_tone(tone(start, start + 1.0)).unwrap();
        }
        feed.service();
        assert_eq!(feed.backlog_len(), 904);
        assert!(feed.next_service().is_some());

        render(&mut audio, 16);
        assert_eq!(audio.voices.len(), COMMAND_CAPACITY);
        feed.service();
        assert_eq!(feed.backlog_len(), 0);

        feed.silence_all();
        let data = render(&mut audio, 16);
        assert!(audio.voices.is_empty());
        assert!(data.iter().all(|s| *s == 0.0));
        assert_eq!(feed.next_service(), None);
    }

    #[test]
    fn stop_discards_tones_still_in_the_ring() {
        let (mut feed, mut audio) = channel(COMMAND_CAPACITY);
        for _ in 0..3000 {
            feed.start_tone(tone(0.0, 5.0)).unwrap();
        }
        feed.service();
        // the audio thread has not run yet
        feed.silence_all();

        let data = render(&mut audio, 32);
        assert!(audio.voices.is_empty());
        assert!(data.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn next_run_plays_after_a_stop() {
        let (mut feed, mut audio) = channel(8);
        feed.start_tone(tone(0.0, 1.0)).unwrap();
        feed.service();
        feed.silence_all();
        render(&mut audio, 4);

        feed.start_tone(tone(0.004, 1.0)).unwrap();
        feed.service();
        render(&mut audio, 4);
        assert_eq!(audio.voices.len(), 1);
    }

    #[test]
    fn silent_output_hands_out_distinct_handles() {
        let mut out = SilentOutput::new();
        let a = out.start_tone(tone(0.0, 1.0)).unwrap();
        let b = out.start_tone(tone(0.0, 1.0)).unwrap();
        assert_ne!(a, b);
        assert!(out.now() >= 0.0);
    }
}
