//! Speech capability backed by a Kokoro TTS server and rodio playback.
//!
//! ```text
//! speak(request) → fetch task: POST /v1/audio/speech, stream PCM
//!     → first samples: UtteranceSource → [play_tx] → playback thread → sink
//!     → source drained after End → SpeechEvents::utterance_ended(ticket)
//!     → no audio at all (HTTP error, empty body) → utterance_failed(ticket)
//! ```
//!
//! Epoch-based cancellation: `speak()` and `cancel()` bump an [`AtomicU64`].
//! Fetches, queued sources and completion hooks from an older epoch are
//! discarded, so only the newest request can reach the speakers or report
//! back. The playback thread re-checks the epoch before appending, which
//! closes the gap between a fetch passing its check and a concurrent stop.
//!
//! Pitch has no Kokoro parameter. It is applied by resampling the PCM in
//! rodio (`speed(pitch)`), with synthesis requested at `rate / pitch` so the
//! net tempo is `rate`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use rodio::{OutputStream, Sink, Source};
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use studycast_core::config::SpeechConfig;
use studycast_core::speech::{SpeechEvents, SpeechSynth, UtteranceRequest, UtteranceTicket};
use studycast_core::voice::Voice;

use crate::utterance_source::{PcmFrame, UtteranceSource};

/// Kokoro PCM streaming format: 24 kHz mono 16-bit signed LE.
const PCM_SAMPLE_RATE: u32 = 24_000;
const PCM_CHANNELS: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("request to Kokoro failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Kokoro returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected voice list: {0}")]
    VoiceList(#[from] serde_json::Error),
}

enum PlayCmd {
    Play {
        epoch: u64,
        source: UtteranceSource,
        pitch: f32,
    },
    Stop,
}

struct SynthesisJob {
    ticket: UtteranceTicket,
    epoch: u64,
    text: String,
    voice: String,
    speed: f32,
    pitch: f32,
}

/// Kokoro-backed [`SpeechSynth`]. Must be created inside a tokio runtime to
/// be able to speak; without one, or without an audio device, it reports
/// itself unavailable.
pub struct KokoroSpeech {
    http: reqwest::Client,
    speech_url: String,
    default_voice: String,
    epoch: Arc<AtomicU64>,
    play_tx: std::sync::mpsc::Sender<PlayCmd>,
    events: Arc<dyn SpeechEvents>,
    runtime: Option<Handle>,
    audio_ok: bool,
}

impl KokoroSpeech {
    /// Open the audio output and start discovering voices in the background.
    pub fn new(config: &SpeechConfig, events: Arc<dyn SpeechEvents>) -> Self {
        let epoch = Arc::new(AtomicU64::new(0));
        let (play_tx, play_rx) = std::sync::mpsc::channel::<PlayCmd>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<bool>();

        let thread_epoch = epoch.clone();
        let spawned = std::thread::Builder::new()
            .name("studycast-playback".into())
            .spawn(move || playback_thread(play_rx, thread_epoch, ready_tx));
        let audio_ok = match spawned {
            Ok(_) => ready_rx.recv().unwrap_or(false),
            Err(e) => {
                error!("playback: failed to spawn thread: {e}");
                false
            }
        };

        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            warn!("kokoro: no tokio runtime, speech disabled");
        }

        let http = reqwest::Client::new();
        let base = config.kokoro_url.trim_end_matches('/').to_string();

        if let Some(rt) = &runtime {
            let http = http.clone();
            let base = base.clone();
            let events = events.clone();
            rt.spawn(async move {
                match fetch_voices(&http, &base).await {
                    Ok(voices) => {
                        info!("kokoro: {} voices available", voices.len());
                        events.voices_changed(voices);
                    }
                    Err(e) => warn!("kokoro: voice list unavailable, using default voice: {e}"),
                }
            });
        }

        Self {
            http,
            speech_url: format!("{base}/v1/audio/speech"),
            default_voice: config.default_voice.clone(),
            epoch,
            play_tx,
            events,
            runtime,
            audio_ok,
        }
    }
}

impl SpeechSynth for KokoroSpeech {
    fn is_available(&self) -> bool {
        self.audio_ok && self.runtime.is_some()
    }

    fn speak(&mut self, request: UtteranceRequest) {
        let Some(rt) = &self.runtime else {
            return;
        };
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let pitch = request.profile.pitch.max(0.1);
        let job = SynthesisJob {
            ticket: request.ticket,
            epoch,
            voice: request
                .voice
                .map(|v| v.name)
                .unwrap_or_else(|| self.default_voice.clone()),
            speed: request.profile.rate / pitch,
            pitch,
            text: request.text,
        };

        debug!(
            "kokoro: speak {:?} ({} chars, epoch {epoch})",
            job.ticket,
            job.text.len()
        );
        let http = self.http.clone();
        let url = self.speech_url.clone();
        let shared_epoch = self.epoch.clone();
        let play_tx = self.play_tx.clone();
        let events = self.events.clone();
        rt.spawn(async move {
            synthesize(job, &http, &url, shared_epoch, play_tx, events).await;
        });
    }

    fn cancel(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _ = self.play_tx.send(PlayCmd::Stop);
    }
}

impl Drop for KokoroSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ─── Synthesis fetch ───────────────────────────────────────────────────────

async fn synthesize(
    job: SynthesisJob,
    http: &reqwest::Client,
    url: &str,
    epoch: Arc<AtomicU64>,
    play_tx: std::sync::mpsc::Sender<PlayCmd>,
    events: Arc<dyn SpeechEvents>,
) {
    let current = |e: &Arc<AtomicU64>| e.load(Ordering::SeqCst) == job.epoch;

    let body = serde_json::json!({
        "input": job.text,
        "voice": job.voice,
        "model": "kokoro",
        "response_format": "pcm",
        "stream": true,
        "speed": job.speed,
    });

    let resp = match http.post(url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("kokoro: {}", SpeechError::Status { status, body: text });
            report_failure(&job, &epoch, events.as_ref());
            return;
        }
        Err(e) => {
            error!("kokoro: {}", SpeechError::Http(e));
            report_failure(&job, &epoch, events.as_ref());
            return;
        }
    };

    if !current(&epoch) {
        debug!("kokoro: stale response for {:?}, discarding", job.ticket);
        return;
    }

    let mut stream = resp.bytes_stream();
    let mut carry: Option<u8> = None;
    let mut pcm_tx: Option<std::sync::mpsc::Sender<PcmFrame>> = None;

    while let Some(chunk) = stream.next().await {
        if !current(&epoch) {
            // Dropping pcm_tx without End stops the source silently.
            return;
        }
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("kokoro: stream error for {:?}: {e}", job.ticket);
                break;
            }
        };

        let samples = decode_pcm_le(&chunk, &mut carry);
        if samples.is_empty() {
            continue;
        }

        match &pcm_tx {
            Some(tx) => {
                if tx.send(PcmFrame::Samples(samples)).is_err() {
                    return;
                }
            }
            None => {
                let (tx, rx) = std::sync::mpsc::channel();
                let _ = tx.send(PcmFrame::Samples(samples));
                let source = UtteranceSource::new(
                    rx,
                    PCM_CHANNELS,
                    PCM_SAMPLE_RATE,
                    completion_hook(job.ticket, job.epoch, epoch.clone(), events.clone()),
                );
                let cmd = PlayCmd::Play {
                    epoch: job.epoch,
                    source,
                    pitch: job.pitch,
                };
                if play_tx.send(cmd).is_err() {
                    return;
                }
                pcm_tx = Some(tx);
            }
        }
    }

    match pcm_tx {
        Some(tx) => {
            let _ = tx.send(PcmFrame::End);
        }
        None => {
            warn!("kokoro: no audio returned for {:?}", job.ticket);
            report_failure(&job, &epoch, events.as_ref());
        }
    }
}

/// Report an utterance that produced no audio, unless it was superseded.
fn report_failure(job: &SynthesisJob, epoch: &AtomicU64, events: &dyn SpeechEvents) {
    if epoch.load(Ordering::SeqCst) == job.epoch {
        events.utterance_failed(job.ticket);
    }
}

fn completion_hook(
    ticket: UtteranceTicket,
    job_epoch: u64,
    epoch: Arc<AtomicU64>,
    events: Arc<dyn SpeechEvents>,
) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        if epoch.load(Ordering::SeqCst) == job_epoch {
            debug!("kokoro: {ticket:?} finished");
            events.utterance_ended(ticket);
        }
    })
}

/// Decode little-endian i16 PCM. A trailing odd byte is kept in `carry` and
/// prepended to the next chunk.
fn decode_pcm_le(bytes: &[u8], carry: &mut Option<u8>) -> Vec<i16> {
    let joined: Vec<u8>;
    let data = match carry.take() {
        Some(first) => {
            joined = std::iter::once(first).chain(bytes.iter().copied()).collect();
            &joined[..]
        }
        None => bytes,
    };

    let pairs = data.chunks_exact(2);
    *carry = pairs.remainder().first().copied();
    pairs.map(|p| i16::from_le_bytes([p[0], p[1]])).collect()
}

// ─── Voices ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum VoiceListBody {
    Wrapped { voices: Vec<String> },
    Bare(Vec<String>),
}

/// Fetch the Kokoro voice list and tag each voice with its language.
pub async fn fetch_voices(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<Voice>, SpeechError> {
    let resp = http
        .get(format!("{base_url}/v1/audio/voices"))
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(SpeechError::Status { status, body });
    }
    Ok(parse_voice_list(&body)?)
}

fn parse_voice_list(body: &str) -> Result<Vec<Voice>, serde_json::Error> {
    let names = match serde_json::from_str::<VoiceListBody>(body)? {
        VoiceListBody::Wrapped { voices } | VoiceListBody::Bare(voices) => voices,
    };
    Ok(names
        .into_iter()
        .map(|name| {
            let language = kokoro_language(&name);
            Voice::new(name, language)
        })
        .collect())
}

/// Kokoro encodes the language in the first letter of the voice id
/// (`ef_dora` is a Spanish female voice).
pub fn kokoro_language(voice: &str) -> &'static str {
    match voice.chars().next() {
        Some('a') => "en-US",
        Some('b') => "en-GB",
        Some('e') => "es",
        Some('f') => "fr",
        Some('h') => "hi",
        Some('i') => "it",
        Some('j') => "ja",
        Some('p') => "pt-BR",
        Some('z') => "zh",
        _ => "und",
    }
}

// ─── Playback OS thread ───────────────────────────────────────────────────

fn playback_thread(
    cmd_rx: std::sync::mpsc::Receiver<PlayCmd>,
    epoch: Arc<AtomicU64>,
    ready_tx: std::sync::mpsc::Sender<bool>,
) {
    // rodio's OutputStream is !Send, so it lives and dies on this thread.
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            warn!("playback: no audio output, speech disabled: {e}");
            let _ = ready_tx.send(false);
            return;
        }
    };
    let mut sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            warn!("playback: failed to create sink: {e}");
            let _ = ready_tx.send(false);
            return;
        }
    };
    let _ = ready_tx.send(true);

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlayCmd::Play {
                epoch: job_epoch,
                source,
                pitch,
            } => {
                if epoch.load(Ordering::SeqCst) != job_epoch {
                    debug!("playback: dropping stale source");
                    continue;
                }
                sink.append(source.speed(pitch));
                sink.play();
            }
            PlayCmd::Stop => {
                sink.stop();
                sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        error!("playback: failed to recreate sink: {e}");
                        return;
                    }
                };
            }
        }
    }
    sink.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEvents {
        ended: Mutex<Vec<UtteranceTicket>>,
        failed: Mutex<Vec<UtteranceTicket>>,
    }

    impl SpeechEvents for RecordingEvents {
        fn utterance_ended(&self, ticket: UtteranceTicket) {
            self.ended.lock().unwrap().push(ticket);
        }

        fn utterance_failed(&self, ticket: UtteranceTicket) {
            self.failed.lock().unwrap().push(ticket);
        }

        fn voices_changed(&self, _voices: Vec<Voice>) {}
    }

    fn job(epoch: u64) -> SynthesisJob {
        SynthesisJob {
            ticket: UtteranceTicket(7),
            epoch,
            text: "Hola.".into(),
            voice: "ef_dora".into(),
            speed: 1.0,
            pitch: 1.0,
        }
    }

    #[test]
    fn completion_hook_reports_current_epoch() {
        let events = Arc::new(RecordingEvents::default());
        let epoch = Arc::new(AtomicU64::new(3));
        completion_hook(UtteranceTicket(7), 3, epoch, events.clone())();
        assert_eq!(*events.ended.lock().unwrap(), vec![UtteranceTicket(7)]);
    }

    #[test]
    fn completion_hook_silent_after_cancel() {
        let events = Arc::new(RecordingEvents::default());
        let epoch = Arc::new(AtomicU64::new(3));
        let hook = completion_hook(UtteranceTicket(7), 3, epoch.clone(), events.clone());
        epoch.fetch_add(1, Ordering::SeqCst);
        hook();
        assert!(events.ended.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_reported_for_current_request() {
        let events = RecordingEvents::default();
        let epoch = AtomicU64::new(5);
        report_failure(&job(5), &epoch, &events);
        assert_eq!(*events.failed.lock().unwrap(), vec![UtteranceTicket(7)]);
        assert!(events.ended.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_of_superseded_request_is_silent() {
        let events = RecordingEvents::default();
        let epoch = AtomicU64::new(6);
        report_failure(&job(5), &epoch, &events);
        assert!(events.failed.lock().unwrap().is_empty());
        assert!(events.ended.lock().unwrap().is_empty());
    }

    #[test]
    fn decode_even_chunk() {
        let mut carry = None;
        assert_eq!(decode_pcm_le(&[0x01, 0x00, 0xFF, 0x7F], &mut carry), vec![1, 32767]);
        assert_eq!(carry, None);
    }

    #[test]
    fn decode_carries_odd_byte() {
        let mut carry = None;
        assert_eq!(decode_pcm_le(&[0x01, 0x00, 0xFF], &mut carry), vec![1]);
        assert_eq!(carry, Some(0xFF));
        assert_eq!(decode_pcm_le(&[0x7F], &mut carry), vec![32767]);
        assert_eq!(carry, None);
    }

    #[test]
    fn decode_empty() {
        let mut carry = None;
        assert!(decode_pcm_le(&[], &mut carry).is_empty());
        assert_eq!(carry, None);
    }

    #[test]
    fn voice_list_wrapped_and_bare() {
        let wrapped = parse_voice_list(r#"{"voices": ["ef_dora", "af_heart"]}"#).unwrap();
        assert_eq!(
            wrapped,
            vec![Voice::new("ef_dora", "es"), Voice::new("af_heart", "en-US")]
        );
        let bare = parse_voice_list(r#"["em_alex"]"#).unwrap();
        assert_eq!(bare, vec![Voice::new("em_alex", "es")]);
    }

    #[test]
    fn voice_list_rejects_other_shapes() {
        assert!(parse_voice_list(r#"{"data": 1}"#).is_err());
    }

    #[test]
    fn language_from_prefix() {
        assert_eq!(kokoro_language("ef_dora"), "es");
        assert_eq!(kokoro_language("bm_george"), "en-GB");
        assert_eq!(kokoro_language(""), "und");
    }
}
