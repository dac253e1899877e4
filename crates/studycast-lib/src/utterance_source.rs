//! rodio `Source` for one utterance, fed PCM from the synthesis fetch.
//!
//! The source is appended to the sink as soon as the first samples arrive.
//! While the fetch is still streaming it pads underruns with silence (10ms
//! wait per sample request) so rodio keeps pulling.
//!
//! An utterance ends in one of two ways:
//! - the fetch sends [`PcmFrame::End`]: the utterance finished naturally and
//!   the completion hook runs once the last sample has been handed to rodio;
//! - the sender is dropped without `End` (cancelled or failed fetch): the
//!   source just stops, and the hook is dropped without running.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use rodio::Source;

/// Messages from the fetcher to the source.
pub enum PcmFrame {
    /// Interleaved signed 16-bit samples.
    Samples(Vec<i16>),
    /// Synthesis finished; nothing else will be sent.
    End,
}

/// Runs when the utterance has played to its natural end.
pub type CompletionHook = Box<dyn FnOnce() + Send>;

enum Feed {
    Open,
    Ended,
    Dropped,
}

pub struct UtteranceSource {
    rx: Receiver<PcmFrame>,
    pending: VecDeque<i16>,
    channels: u16,
    sample_rate: u32,
    feed: Feed,
    on_complete: Option<CompletionHook>,
}

impl UtteranceSource {
    pub fn new(
        rx: Receiver<PcmFrame>,
        channels: u16,
        sample_rate: u32,
        on_complete: CompletionHook,
    ) -> Self {
        Self {
            rx,
            pending: VecDeque::with_capacity(8192),
            channels,
            sample_rate,
            feed: Feed::Open,
            on_complete: Some(on_complete),
        }
    }

    fn take(&mut self, frame: PcmFrame) {
        match frame {
            PcmFrame::Samples(samples) => self.pending.extend(samples),
            PcmFrame::End => self.feed = Feed::Ended,
        }
    }

    fn pull(&mut self) {
        while let Ok(frame) = self.rx.try_recv() {
            self.take(frame);
            if !matches!(self.feed, Feed::Open) {
                return;
            }
        }

        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(10)) {
                Ok(frame) => self.take(frame),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.feed = Feed::Dropped,
            }
        }
    }

    fn exhausted(&mut self) -> Option<i16> {
        if let Feed::Ended = self.feed {
            if let Some(hook) = self.on_complete.take() {
                hook();
            }
        }
        None
    }
}

impl Iterator for UtteranceSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if let Some(sample) = self.pending.pop_front() {
            return Some(sample);
        }
        if matches!(self.feed, Feed::Open) {
            self.pull();
        }
        if let Some(sample) = self.pending.pop_front() {
            Some(sample)
        } else if matches!(self.feed, Feed::Open) {
            Some(0)
        } else {
            self.exhausted()
        }
    }
}

impl Source for UtteranceSource {
    fn current_frame_len(&self) -> Option<usize> {
        match (self.pending.len(), &self.feed) {
            (0, Feed::Open) => Some(1),
            (0, _) => Some(0),
            (n, _) => Some(n),
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
