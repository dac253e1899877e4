//! Async narration player: one task owns the controller.
//!
//! ```text
//! NarrationPlayer::play() ──┐
//! speech host callbacks ────┼─▶ [cmd_tx] ─▶ player task ─▶ NarrationController
//! control API / CLI ────────┘                   │
//!                                               └─▶ watch: NarrationStatus, VoiceCatalog
//! ```
//!
//! User commands and host callbacks share one channel, so the controller sees
//! them strictly in arrival order and never needs a lock. Dropping the last
//! handle (or calling `shutdown`) ends the task, which drops the controller
//! and cancels any speech still in flight.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use studycast_core::config::SpeechConfig;
use studycast_core::narrator::NarrationController;
use studycast_core::speech::{SpeechEvents, SpeechSynth, UtteranceTicket};
use studycast_core::types::{NarrationStatus, VoiceCatalog};
use studycast_core::voice::Voice;

/// Cloneable handle to the player task. All methods are non-blocking.
#[derive(Clone)]
pub struct NarrationPlayer {
    cmd_tx: mpsc::UnboundedSender<PlayerCmd>,
    status_rx: watch::Receiver<NarrationStatus>,
    voices_rx: watch::Receiver<VoiceCatalog>,
}

#[derive(Debug)]
enum PlayerCmd {
    Load(String),
    Play,
    Pause,
    Toggle,
    Seek(f32),
    CycleVoice,
    UtteranceEnded(UtteranceTicket),
    UtteranceFailed(UtteranceTicket),
    VoicesChanged(Vec<Voice>),
    Shutdown,
}

/// Routes speech host callbacks into the player's command channel.
struct PlayerEvents {
    cmd_tx: mpsc::UnboundedSender<PlayerCmd>,
}

impl SpeechEvents for PlayerEvents {
    fn utterance_ended(&self, ticket: UtteranceTicket) {
        let _ = self.cmd_tx.send(PlayerCmd::UtteranceEnded(ticket));
    }

    fn utterance_failed(&self, ticket: UtteranceTicket) {
        let _ = self.cmd_tx.send(PlayerCmd::UtteranceFailed(ticket));
    }

    fn voices_changed(&self, voices: Vec<Voice>) {
        let _ = self.cmd_tx.send(PlayerCmd::VoicesChanged(voices));
    }
}

impl NarrationPlayer {
    /// Spawn the player task. `make_synth` receives the callback sink the
    /// speech host must report to. Must be called inside a tokio runtime.
    pub fn spawn<S, F>(config: &SpeechConfig, make_synth: F) -> Self
    where
        S: SpeechSynth + Send + 'static,
        F: FnOnce(Arc<dyn SpeechEvents>) -> S,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let events: Arc<dyn SpeechEvents> = Arc::new(PlayerEvents {
            cmd_tx: cmd_tx.clone(),
        });
        let synth = make_synth(events);
        if !synth.is_available() {
            info!("player: speech output unavailable, playback will be silent");
        }

        let controller = NarrationController::new("", synth, config.voice_selector());
        let (status_tx, status_rx) = watch::channel(idle_status(&controller));
        let (voices_tx, voices_rx) = watch::channel(controller.voice_catalog());

        tokio::spawn(async move {
            player_task(controller, cmd_rx, status_tx, voices_tx).await;
        });

        Self {
            cmd_tx,
            status_rx,
            voices_rx,
        }
    }

    /// Mount a new script, replacing whatever was loaded.
    pub fn load_script(&self, script: &str) {
        let _ = self.cmd_tx.send(PlayerCmd::Load(script.to_string()));
    }

    pub fn play(&self) {
        let _ = self.cmd_tx.send(PlayerCmd::Play);
    }

    pub fn pause(&self) {
        let _ = self.cmd_tx.send(PlayerCmd::Pause);
    }

    pub fn toggle(&self) {
        let _ = self.cmd_tx.send(PlayerCmd::Toggle);
    }

    /// Jump to `percent` (0-100) of the script.
    pub fn seek(&self, percent: f32) {
        let _ = self.cmd_tx.send(PlayerCmd::Seek(percent));
    }

    pub fn cycle_voice(&self) {
        let _ = self.cmd_tx.send(PlayerCmd::CycleVoice);
    }

    /// Stop speech and end the player task.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(PlayerCmd::Shutdown);
    }

    pub fn status(&self) -> NarrationStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<NarrationStatus> {
        self.status_rx.clone()
    }

    pub fn voices(&self) -> VoiceCatalog {
        self.voices_rx.borrow().clone()
    }
}

/// Status before any script is loaded: nothing to play, voice still shown.
fn idle_status<S: SpeechSynth>(controller: &NarrationController<S>) -> NarrationStatus {
    NarrationStatus {
        total_utterances: 0,
        ..controller.status()
    }
}

async fn player_task<S: SpeechSynth>(
    mut controller: NarrationController<S>,
    mut cmd_rx: mpsc::UnboundedReceiver<PlayerCmd>,
    status_tx: watch::Sender<NarrationStatus>,
    voices_tx: watch::Sender<VoiceCatalog>,
) {
    let mut loaded = false;

    while let Some(cmd) = cmd_rx.recv().await {
        debug!("player: {cmd:?}");
        match cmd {
            PlayerCmd::Load(script) => {
                controller.load_script(&script);
                loaded = true;
                info!(
                    "player: loaded script ({} utterances)",
                    controller.utterances().len()
                );
            }
            PlayerCmd::Play if loaded => controller.play(),
            PlayerCmd::Pause => controller.pause(),
            PlayerCmd::Toggle if loaded => controller.toggle(),
            PlayerCmd::Seek(percent) if loaded => controller.seek(percent),
            PlayerCmd::CycleVoice => {
                controller.cycle_voice();
                voices_tx.send_replace(controller.voice_catalog());
            }
            PlayerCmd::UtteranceEnded(ticket) => controller.on_utterance_end(ticket),
            PlayerCmd::UtteranceFailed(ticket) => {
                let was_playing = controller.is_playing();
                controller.on_utterance_failed(ticket);
                if was_playing && !controller.is_playing() {
                    warn!("player: speech failed, paused at {}", controller.position());
                }
            }
            PlayerCmd::VoicesChanged(voices) => {
                controller.refresh_voices(voices);
                voices_tx.send_replace(controller.voice_catalog());
            }
            PlayerCmd::Shutdown => break,
            PlayerCmd::Play | PlayerCmd::Toggle | PlayerCmd::Seek(_) => {
                debug!("player: no script loaded, ignoring");
            }
        }

        let status = if loaded {
            controller.status()
        } else {
            idle_status(&controller)
        };
        status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    info!("player: shutting down");
}
