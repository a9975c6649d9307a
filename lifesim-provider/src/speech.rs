//! Speech synthesis collaborator (Google Cloud Text-to-Speech REST API)

use crate::provider::{http_client, retry_after, ProviderError};
use base64::Engine;
use lifesim_error::{Error, Result};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// British English voices the narration picks from
pub const DEFAULT_VOICES: [&str; 4] = [
    "en-GB-Journey-D",
    "en-GB-News-K",
    "en-GB-Wavenet-A",
    "en-GB-Wavenet-F",
];

/// The speech synthesis collaborator
#[allow(async_fn_in_trait)]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the encoded audio
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Configuration for the Google adapter
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub base_url: String,
    pub language_code: String,
    /// One voice is drawn at random per call
    pub voices: Vec<String>,
    /// LINEAR16 yields a WAV container
    pub audio_encoding: String,
    pub speaking_rate: f32,
    pub timeout_secs: u64,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://texttospeech.googleapis.com/v1".into(),
            language_code: "en-GB".into(),
            voices: DEFAULT_VOICES.iter().map(|v| v.to_string()).collect(),
            audio_encoding: "LINEAR16".into(),
            speaking_rate: 1.0,
            timeout_secs: 60,
        }
    }

    /// Reads `GOOGLE_TTS_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var("GOOGLE_TTS_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| Error::missing_env("GOOGLE_TTS_API_KEY").with_operation("speech::from_env"))
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voices = vec![voice.into()];
        self
    }
}

/// Google Cloud Text-to-Speech synthesizer
pub struct GoogleSpeechSynthesizer {
    client: Client,
    config: SpeechConfig,
}

impl GoogleSpeechSynthesizer {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        if config.voices.is_empty() {
            return Err(Error::config_invalid("speech config needs at least one voice")
                .with_operation("speech::new"));
        }
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn pick_voice(&self) -> &str {
        self.config
            .voices
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_VOICES[0])
    }

    fn build_request<'a>(&'a self, text: &'a str, voice: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: voice,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.config.audio_encoding,
                speaking_rate: self.config.speaking_rate,
            },
        }
    }
}

impl SpeechSynthesizer for GoogleSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let op = "speech::synthesize";
        if text.trim().is_empty() {
            return Err(Error::invalid_argument("nothing to synthesize").with_operation(op));
        }

        let voice = self.pick_voice();
        debug!(voice, chars = text.len(), "text-to-speech request");

        let response = self
            .client
            .post(format!("{}/text:synthesize", self.config.base_url))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_request(text, voice))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e).into_error("google-tts").with_operation(op))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body, retry)
                .into_error("google-tts")
                .with_operation(op));
        }

        let body: SynthesizeResponse = response.json().await.map_err(|e| {
            ProviderError::Parse(e.to_string()).into_error("google-tts").with_operation(op)
        })?;

        decode_audio(&body.audio_content).map_err(|e| e.with_operation(op))
    }
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| {
            Error::collaborator_failed(format!("audioContent is not valid base64: {}", e)).set_source(e)
        })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifesim_error::ErrorKind;

    #[test]
    fn test_request_shape() {
        let synth = GoogleSpeechSynthesizer::new(SpeechConfig::new("key").with_voice("en-GB-News-K")).unwrap();
        let voice = synth.pick_voice();
        assert_eq!(voice, "en-GB-News-K");

        let value = serde_json::to_value(synth.build_request("I feel great", voice)).unwrap();
        assert_eq!(value["input"]["text"], "I feel great");
        assert_eq!(value["voice"]["languageCode"], "en-GB");
        assert_eq!(value["audioConfig"]["audioEncoding"], "LINEAR16");
    }

    #[test]
    fn test_random_voice_comes_from_config() {
        let synth = GoogleSpeechSynthesizer::new(SpeechConfig::new("key")).unwrap();
        for _ in 0..10 {
            assert!(DEFAULT_VOICES.contains(&synth.pick_voice()));
        }
    }

    #[test]
    fn test_empty_voice_list_is_config_error() {
        let mut config = SpeechConfig::new("key");
        config.voices.clear();
        let err = GoogleSpeechSynthesizer::new(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_decode_audio() {
        assert_eq!(decode_audio("UklGRg==").unwrap(), b"RIFF".to_vec());
        assert_eq!(decode_audio("%%%").unwrap_err().kind(), ErrorKind::CollaboratorFailed);
    }
}
