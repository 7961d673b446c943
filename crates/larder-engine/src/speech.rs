//! Step narration: on-device synthesizer first, Gemini TTS second,
//! silence third. Failure anywhere is logged by the caller, never surfaced.

use std::env;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::{response_json_or_error, ProviderConfig, REQUEST_TIMEOUT};

/// Wire format of Gemini TTS audio: s16le, mono, 24 kHz.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const TTS_VOICE: &str = "Puck";

/// Decode s16le PCM into normalized f32 samples; a trailing odd byte is
/// dropped.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

/// Output seam for decoded narration audio.
pub trait AudioSink: Send + Sync {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Plays mono f32 samples on the default output device, blocking until
/// the buffer drains.
pub struct CpalSink;

impl AudioSink for CpalSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output audio device found")?;

        let desired_rate = SampleRate(sample_rate);
        let config = match device
            .supported_output_configs()
            .context("Cannot query device output configs")?
            .find(|candidate| {
                candidate.channels() >= 1
                    && candidate.min_sample_rate() <= desired_rate
                    && desired_rate <= candidate.max_sample_rate()
            }) {
            Some(range) => range.with_sample_rate(desired_rate).config(),
            None => device
                .default_output_config()
                .context("No default output config")?
                .config(),
        };

        let device_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        let playable: Arc<Vec<f32>> = Arc::new(if device_rate == sample_rate {
            samples.to_vec()
        } else {
            resample_nearest(samples, sample_rate, device_rate)
        });

        let total = playable.len();
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let playable = Arc::clone(&playable);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _| {
                        let mut cursor = match position.lock() {
                            Ok(cursor) => cursor,
                            Err(_) => return,
                        };
                        for frame in data.chunks_mut(channels) {
                            let sample = if *cursor < total {
                                let value = playable[*cursor];
                                *cursor += 1;
                                value
                            } else {
                                finished.store(true, Ordering::Release);
                                0.0
                            };
                            for slot in frame {
                                *slot = sample;
                            }
                        }
                    },
                    |_| {},
                    None,
                )
                .context("Failed to build output stream")?
        };
        stream.play().context("Failed to start playback")?;

        let duration = Duration::from_secs_f64(total as f64 / f64::from(device_rate) + 0.25);
        let deadline = std::time::Instant::now() + duration + Duration::from_secs(2);
        while !finished.load(Ordering::Acquire) && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }
}

fn resample_nearest(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let out_len = (samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    (0..out_len)
        .map(|index| {
            let source = index as u64 * u64::from(from_rate) / u64::from(to_rate);
            samples[(source as usize).min(samples.len() - 1)]
        })
        .collect()
}

/// One narration call. The engine converts errors into events.
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;
    fn speak(&self, text: &str) -> Result<()>;
}

/// Narration resolution, committed once: on-device synthesizer, else
/// Gemini TTS, else a silent no-op.
pub fn resolve_speech_backend(config: &ProviderConfig) -> Box<dyn SpeechBackend> {
    if let Some(local) = LocalSpeech::detect() {
        return Box::new(local);
    }
    if let Some(api_key) = config.gemini_api_key.clone() {
        return Box::new(GeminiSpeech::new(config, api_key, Box::new(CpalSink)));
    }
    Box::new(NoopSpeech)
}

/// The do-nothing backend used when nothing is configured.
pub struct NoopSpeech;

impl SpeechBackend for NoopSpeech {
    fn name(&self) -> &str {
        "silent"
    }

    fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// System speech synthesizer; first match on PATH wins.
pub struct LocalSpeech {
    program: PathBuf,
}

const LOCAL_SYNTHESIZERS: &[&str] = &["say", "espeak", "spd-say"];

impl LocalSpeech {
    pub fn detect() -> Option<Self> {
        LOCAL_SYNTHESIZERS
            .iter()
            .find_map(|name| find_on_path(name))
            .map(|program| Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SpeechBackend for LocalSpeech {
    fn name(&self) -> &str {
        "local"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(text)
            .status()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {status}", self.program.display());
        }
        Ok(())
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Gemini TTS: one generateContent call returning base64 PCM.
pub struct GeminiSpeech {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
    sink: Box<dyn AudioSink>,
}

impl GeminiSpeech {
    pub fn new(config: &ProviderConfig, api_key: String, sink: Box<dyn AudioSink>) -> Self {
        Self {
            api_base: config.gemini_api_base.clone(),
            api_key,
            model: DEFAULT_TTS_MODEL.to_string(),
            http: HttpClient::new(),
            sink,
        }
    }

    fn extract_audio_data(payload: &Value) -> Option<&str> {
        payload
            .get("candidates")?
            .as_array()?
            .first()?
            .get("content")?
            .get("parts")?
            .as_array()?
            .first()?
            .get("inlineData")?
            .get("data")?
            .as_str()
    }
}

impl SpeechBackend for GeminiSpeech {
    fn name(&self) -> &str {
        "gemini-tts"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.api_base, self.model
        );
        let payload = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": TTS_VOICE },
                    },
                },
            },
        });

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini TTS request failed ({endpoint})"))?;
        let parsed = response_json_or_error("Gemini TTS", response)?;

        let Some(data) = Self::extract_audio_data(&parsed) else {
            bail!("Gemini TTS response carried no audio payload");
        };
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("Gemini TTS audio base64 decode failed")?;
        let samples = decode_pcm16(&bytes);
        self.sink.play(&samples, TTS_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::{decode_pcm16, AudioSink, GeminiSpeech, TTS_SAMPLE_RATE};

    struct CollectingSink {
        played: Mutex<Vec<(usize, u32)>>,
    }

    impl AudioSink for CollectingSink {
        fn play(&self, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
            self.played
                .lock()
                .expect("sink lock")
                .push((samples.len(), sample_rate));
            Ok(())
        }
    }

    #[test]
    fn pcm16_normalizes_to_unit_range() {
        let bytes = [
            0x00, 0x00, // 0
            0xff, 0x7f, // i16::MAX
            0x00, 0x80, // i16::MIN
        ];
        let samples = decode_pcm16(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (32767.0 / 32768.0)).abs() < f32::EPSILON);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn pcm16_drops_trailing_odd_byte() {
        assert_eq!(decode_pcm16(&[0x00, 0x00, 0x7f]).len(), 1);
    }

    #[test]
    fn sink_seam_receives_decoded_samples() {
        let sink = CollectingSink {
            played: Mutex::new(Vec::new()),
        };
        let samples = decode_pcm16(&[0x00, 0x10, 0x00, 0xf0]);
        sink.play(&samples, TTS_SAMPLE_RATE).expect("collecting sink");
        assert_eq!(*sink.played.lock().expect("sink lock"), vec![(2, 24_000)]);
    }

    #[test]
    fn audio_extraction_walks_the_candidate_tree() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "data": "AAAA" } }] }
            }]
        });
        assert_eq!(GeminiSpeech::extract_audio_data(&payload), Some("AAAA"));
        assert_eq!(GeminiSpeech::extract_audio_data(&json!({})), None);
    }
}
