use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::noise::AudioBuffer;

/// What the warning signal does to the mix: an exogenous volume step of the
/// background noise, or an endogenous separate noise chunk on its own
/// channel.
#[derive(Clone, Debug)]
pub enum SignalSource {
    VolumeBoost(f32),
    Chunk(AudioBuffer),
}

/// Seam to the audio output. The sequencer only ever talks to this trait,
/// so tests and headless runs swap in recorders or a no-op.
pub trait Mixer {
    /// Loads `buf` as the looped background track and starts it at `volume`.
    fn play_background(&mut self, buf: AudioBuffer, volume: f32) -> Result<()>;
    fn set_background_volume(&mut self, volume: f32);
    /// Arms the signal for the upcoming trial.
    fn load_signal(&mut self, signal: SignalSource);
    fn start_signal(&mut self);
    fn stop_signal(&mut self);
    fn stop_all(&mut self);
}

struct LoopTrack {
    samples: Vec<f32>,
    channels: usize,
    pos: f64,
    /// Source frames consumed per device frame; nearest-neighbor
    /// resampling so a 22.05 kHz buffer plays at pitch on a 48 kHz device.
    step: f64,
}

impl LoopTrack {
    fn new(buf: AudioBuffer, device_rate: u32) -> Self {
        let step = if device_rate > 0 {
            f64::from(buf.sample_rate) / f64::from(device_rate)
        } else {
            1.0
        };
        Self {
            samples: buf.samples,
            channels: buf.channels,
            pos: 0.0,
            step,
        }
    }

    /// Next (left, right) frame at the device rate, wrapping at the end
    /// of the buffer.
    fn next_frame(&mut self) -> (f32, f32) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        let frames = (self.samples.len() / self.channels) as f64;
        if self.pos >= frames {
            self.pos %= frames;
        }
        let base = (self.pos as usize) * self.channels;
        let left = self.samples[base];
        let right = if self.channels > 1 {
            self.samples[base + 1]
        } else {
            left
        };
        self.pos += self.step;
        (left, right)
    }
}

#[derive(Default)]
struct MixState {
    background: Option<LoopTrack>,
    background_volume: f32,
    boost: f32,
    signal_chunk: Option<LoopTrack>,
    signal_on: bool,
}

impl MixState {
    fn mix_frame(&mut self) -> (f32, f32) {
        let gain = self.background_volume * if self.signal_on { self.boost.max(1.0) } else { 1.0 };
        let (mut l, mut r) = match &mut self.background {
            Some(track) => {
                let (l, r) = track.next_frame();
                (l * gain, r * gain)
            }
            None => (0.0, 0.0),
        };
        if self.signal_on {
            if let Some(chunk) = &mut self.signal_chunk {
                let (sl, sr) = chunk.next_frame();
                l += sl;
                r += sr;
            }
        }
        (l.clamp(-1.0, 1.0), r.clamp(-1.0, 1.0))
    }
}

/// cpal-backed mixer on the default output device.
pub struct CpalMixer {
    _stream: cpal::Stream,
    state: Arc<Mutex<MixState>>,
    device_rate: u32,
}

impl CpalMixer {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device available"))?;
        let supported = device
            .default_output_config()
            .context("querying default output config")?;
        let channels = supported.channels() as usize;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let state = Arc::new(Mutex::new(MixState {
            background_volume: 0.0,
            boost: 1.0,
            ..MixState::default()
        }));
        let cb_state = Arc::clone(&state);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread; a missed lock is a
                    // frame of silence.
                    let Ok(mut mix) = cb_state.try_lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let (l, r) = mix.mix_frame();
                        for (ch, out) in frame.iter_mut().enumerate() {
                            *out = if ch == 1 { r } else { l };
                        }
                    }
                },
                |err| eprintln!("audio stream error: {err}"),
                None,
            )
            .context("building audio output stream")?;
        stream.play().context("starting audio output stream")?;

        Ok(Self {
            _stream: stream,
            state,
            device_rate: config.sample_rate.0,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MixState> {
        // Poisoning only happens if the audio callback panicked; the mix
        // state itself stays usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Mixer for CpalMixer {
    fn play_background(&mut self, buf: AudioBuffer, volume: f32) -> Result<()> {
        let mut mix = self.lock();
        mix.background = Some(LoopTrack::new(buf, self.device_rate));
        mix.background_volume = volume;
        Ok(())
    }

    fn set_background_volume(&mut self, volume: f32) {
        self.lock().background_volume = volume;
    }

    fn load_signal(&mut self, signal: SignalSource) {
        let mut mix = self.lock();
        mix.signal_on = false;
        match signal {
            SignalSource::VolumeBoost(factor) => {
                mix.boost = factor;
                mix.signal_chunk = None;
            }
            SignalSource::Chunk(buf) => {
                mix.boost = 1.0;
                mix.signal_chunk = Some(LoopTrack::new(buf, self.device_rate));
            }
        }
    }

    fn start_signal(&mut self) {
        let mut mix = self.lock();
        if let Some(chunk) = &mut mix.signal_chunk {
            chunk.pos = 0.0;
        }
        mix.signal_on = true;
    }

    fn stop_signal(&mut self) {
        self.lock().signal_on = false;
    }

    fn stop_all(&mut self) {
        let mut mix = self.lock();
        mix.background = None;
        mix.signal_chunk = None;
        mix.signal_on = false;
        mix.boost = 1.0;
    }
}

/// Silent mixer for headless runs and tests that do not inspect audio.
#[derive(Debug, Default, Clone)]
pub struct NullMixer;

impl Mixer for NullMixer {
    fn play_background(&mut self, _buf: AudioBuffer, _volume: f32) -> Result<()> {
        Ok(())
    }
    fn set_background_volume(&mut self, _volume: f32) {}
    fn load_signal(&mut self, _signal: SignalSource) {}
    fn start_signal(&mut self) {}
    fn stop_signal(&mut self) {}
    fn stop_all(&mut self) {}
}
