use rand::Rng;

/// Interleaved sample buffer, mono or stereo.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub channels: usize,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
            samples,
        }
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        assert_eq!(left.len(), right.len());
        let mut interleaved = Vec::with_capacity(left.len() * 2);
        for (l, r) in left.into_iter().zip(right.into_iter()) {
            interleaved.push(l);
            interleaved.push(r);
        }
        Self {
            channels: 2,
            sample_rate,
            samples: interleaved,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

/// Uniform white noise, same samples in both ears. `amplitude` is the peak
/// level in full-scale units; 0.5 matches the original ±2^14-of-i16 noise.
pub fn white_noise<R: Rng>(
    rng: &mut R,
    duration_s: f32,
    sample_rate: u32,
    amplitude: f32,
) -> AudioBuffer {
    let n = (duration_s * sample_rate as f32) as usize;
    let mono: Vec<f32> = (0..n)
        .map(|_| rng.random_range(-amplitude..amplitude))
        .collect();
    AudioBuffer::stereo(mono.clone(), mono, sample_rate)
}

/// White noise with independent draws per ear.
pub fn dichotic_noise<R: Rng>(
    rng: &mut R,
    duration_s: f32,
    sample_rate: u32,
    amplitude: f32,
) -> AudioBuffer {
    let n = (duration_s * sample_rate as f32) as usize;
    let left: Vec<f32> = (0..n)
        .map(|_| rng.random_range(-amplitude..amplitude))
        .collect();
    let right: Vec<f32> = (0..n)
        .map(|_| rng.random_range(-amplitude..amplitude))
        .collect();
    AudioBuffer::stereo(left, right, sample_rate)
}
