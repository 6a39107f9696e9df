//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use log::{info, warn};
use mp_engine::Frame;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioOutput};

/// Ring buffer length in seconds of audio.
const BUFFER_SECONDS: f32 = 0.1;

/// Stereo output on the default device.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    dropped: u64,
}

impl CpalOutput {
    /// Open the default output device, at `sample_rate` if given or at the
    /// device's preferred rate otherwise. The consumer half goes to
    /// [`CpalOutput::build_stream`].
    pub fn new(sample_rate: Option<u32>) -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let preferred = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = preferred.into();
        // The callback interleaves exactly two channels.
        config.channels = 2;
        if let Some(rate) = sample_rate {
            config.sample_rate = SampleRate(rate);
        }

        let capacity = ((config.sample_rate.0 as f32 * BUFFER_SECONDS) as usize).max(256);
        let (producer, consumer) = HeapRb::<Frame>::new(capacity).split();

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
            underruns: Arc::new(AtomicU64::new(0)),
            dropped: 0,
        };
        Ok((output, consumer))
    }

    /// Build and start the device stream, draining `consumer`.
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = Arc::clone(&self.running);
        let underruns = Arc::clone(&self.underruns);
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for chunk in data.chunks_mut(channels) {
                        let (left, right) = match consumer.try_pop() {
                            Some(frame) => to_f32(frame),
                            None => {
                                underruns.fetch_add(1, Ordering::Relaxed);
                                (0.0, 0.0)
                            }
                        };
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => left,
                                1 => right,
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        info!(
            "output stream open at {} Hz",
            self.config.sample_rate.0
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Free slots in the ring buffer.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Device frames filled with silence because no frame was queued.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

fn to_f32(frame: Frame) -> (f32, f32) {
    (frame.left as f32 / 32_768.0, frame.right as f32 / 32_768.0)
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        let accepted = self.producer.push_slice(frames);
        let dropped = frames.len() - accepted;
        if dropped > 0 {
            if self.dropped == 0 {
                warn!("output buffer full, dropping frames");
            }
            self.dropped += dropped as u64;
        }
        accepted
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        if self.dropped > 0 {
            warn!("{} frames dropped while the output buffer was full", self.dropped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_convert_to_unit_range() {
        assert_eq!(to_f32(Frame { left: 16_384, right: -32_768 }), (0.5, -1.0));
        assert_eq!(to_f32(Frame::silence()), (0.0, 0.0));
    }
}
