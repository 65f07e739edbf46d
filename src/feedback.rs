//! Audio cues
//!
//! Short earcons marking microphone open/close and errors, so a voice
//! session is usable without watching the terminal. Tones are generated
//! programmatically to avoid shipping binary assets.

use crate::config::FeedbackConfig;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;

/// Cue event types
#[derive(Debug, Clone, Copy)]
pub enum SoundCue {
    /// Recognition session started
    MicOpen,
    /// Recognition session ended
    MicClose,
    /// An error notice was surfaced
    Alert,
}

/// Audio cue player
pub struct AudioCues {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    volume: f32,
    mic_open: Vec<u8>,
    mic_close: Vec<u8>,
    alert: Vec<u8>,
}

impl AudioCues {
    /// Create a cue player. Fails when no audio output is available.
    pub fn new(config: &FeedbackConfig) -> Result<Self, String> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;

        Ok(Self {
            _stream: stream,
            stream_handle,
            volume: config.volume,
            // Rising pair for the mic opening, falling pair for it closing,
            // a low pair for errors
            mic_open: two_tone_wav(440.0, 880.0, 150, 20),
            mic_close: two_tone_wav(880.0, 440.0, 150, 20),
            alert: two_tone_wav(300.0, 200.0, 200, 30),
        })
    }

    /// Play a cue. Failures are logged, never propagated.
    pub fn play(&self, cue: SoundCue) {
        let data = match cue {
            SoundCue::MicOpen => &self.mic_open,
            SoundCue::MicClose => &self.mic_close,
            SoundCue::Alert => &self.alert,
        };

        if let Err(e) = self.play_wav(data) {
            tracing::warn!("Failed to play audio cue: {}", e);
        }
    }

    fn play_wav(&self, data: &[u8]) -> Result<(), String> {
        let cursor = Cursor::new(data.to_vec());
        let source = Decoder::new(cursor).map_err(|e| format!("Failed to decode cue: {}", e))?;
        let source = source.amplify(self.volume);

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
        sink.append(source);
        sink.detach();

        Ok(())
    }
}

/// Generate a WAV holding two consecutive sine tones with a fade envelope
fn two_tone_wav(freq1: f32, freq2: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    let sample_rate = 44100u32;
    let num_samples = (sample_rate * duration_ms / 1000) as usize;
    let fade_samples = (sample_rate * fade_ms / 1000) as usize;
    let half = num_samples / 2;

    let mut samples: Vec<i16> = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let freq = if i < half { freq1 } else { freq2 };
        let mut amplitude = (2.0 * std::f32::consts::PI * freq * t).sin();

        if i < fade_samples {
            amplitude *= i as f32 / fade_samples as f32;
        } else if i >= num_samples - fade_samples {
            amplitude *= (num_samples - i) as f32 / fade_samples as f32;
        }

        samples.push((amplitude * 16000.0) as i16);
    }

    encode_wav(&samples, sample_rate)
}

/// Encode mono i16 samples as a WAV byte stream
fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let mut wav = Vec::new();

    wav.extend_from_slice(b"RIFF");
    let file_size = (36 + samples.len() * 2) as u32;
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}
