pub mod mixer;
pub mod noise;

pub use mixer::{CpalMixer, Mixer, NullMixer, SignalSource};
pub use noise::{dichotic_noise, white_noise, AudioBuffer};
