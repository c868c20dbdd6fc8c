//! Hysteretic voice activity detection over fixed-size PCM frames (§4.1).

use async_trait::async_trait;
use vce_core::domain::{AudioFrame, VadState};
use vce_core::error::CoreError;
use vce_core::ports::Vad;

use crate::error::VadError;

const START_THRESHOLD_FRAMES: u32 = 5;
const END_THRESHOLD_FRAMES: u32 = 20;

/// Aggressiveness level, 0 (most permissive) to 3 (most conservative),
/// mirroring WebRTC VAD's four-level API. Each level maps to a stricter
/// RMS-energy threshold and, at the highest level, an additional
/// minimum zero-crossing-rate gate — a dependency-free stand-in for the
/// bit-exact WebRTC GMM classifier (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggressiveness(u8);

impl Aggressiveness {
    pub fn new(level: u8) -> Self {
        Self(level.min(3))
    }

    fn energy_threshold(self) -> i64 {
        match self.0 {
            0 => 150,
            1 => 300,
            2 => 500,
            _ => 800,
        }
    }

    fn requires_zcr_gate(self) -> bool {
        self.0 >= 3
    }
}

impl Default for Aggressiveness {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Root-mean-square energy over a frame's samples, as an integer so the
/// threshold table above can stay comparison-only (no float tolerance
/// issues in tests).
fn rms_energy(samples: &[i16]) -> i64 {
    if samples.is_empty() {
        return 0;
    }
    let sum_sq: i64 = samples.iter().map(|&s| (s as i64) * (s as i64)).sum();
    let mean_sq = sum_sq / samples.len() as i64;
    (mean_sq as f64).sqrt() as i64
}

/// Zero-crossing rate, scaled to crossings-per-480-samples so it can be
/// compared against a small integer gate regardless of frame size.
fn zero_crossing_rate(samples: &[i16]) -> u32 {
    samples
        .windows(2)
        .filter(|w| (w[0] >= 0) != (w[1] >= 0))
        .count() as u32
}

/// Per-frame voice/silence classifier: true if the frame looks like
/// speech under the configured aggressiveness.
fn classify_frame(samples: &[i16], aggressiveness: Aggressiveness) -> bool {
    let energy = rms_energy(samples);
    if energy < aggressiveness.energy_threshold() {
        return false;
    }
    if aggressiveness.requires_zcr_gate() && zero_crossing_rate(samples) < 10 {
        return false;
    }
    true
}

/// Hysteretic VAD: flips `speech_active` only once a run of same-class
/// frames crosses the start/end thresholds (§4.1).
pub struct EnergyVad {
    state: VadState,
    aggressiveness: Aggressiveness,
    closed: bool,
}

impl EnergyVad {
    pub fn new(aggressiveness: Aggressiveness) -> Self {
        Self {
            state: VadState::default(),
            aggressiveness,
            closed: false,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(Aggressiveness::default())
    }
}

#[async_trait]
impl Vad for EnergyVad {
    async fn process_frame(&mut self, frame: &AudioFrame) -> Result<bool, CoreError> {
        if self.closed {
            return Err(VadError::Closed.into());
        }
        let is_speech = classify_frame(frame.samples(), self.aggressiveness);
        let mut changed = false;

        if is_speech {
            self.state.consecutive_silence_frames = 0;
            self.state.consecutive_speech_frames += 1;
            if !self.state.speech_active
                && self.state.consecutive_speech_frames >= START_THRESHOLD_FRAMES
            {
                self.state.speech_active = true;
                changed = true;
            }
        } else {
            self.state.consecutive_speech_frames = 0;
            self.state.consecutive_silence_frames += 1;
            if self.state.speech_active
                && self.state.consecutive_silence_frames >= END_THRESHOLD_FRAMES
            {
                self.state.speech_active = false;
                changed = true;
            }
        }

        Ok(changed)
    }

    fn reset(&mut self) {
        self.state = VadState::default();
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_speech_active(&self) -> bool {
        self.state.speech_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_frame() -> AudioFrame {
        AudioFrame::from_bytes(&vec![0u8; vce_core::domain::AUDIO_FRAME_BYTES]).unwrap()
    }

    fn loud_frame() -> AudioFrame {
        let mut bytes = Vec::with_capacity(vce_core::domain::AUDIO_FRAME_BYTES);
        for i in 0..vce_core::domain::AUDIO_FRAME_SAMPLES {
            let sample: i16 = if i % 2 == 0 { 20000 } else { -20000 };
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        AudioFrame::from_bytes(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stays_inactive_below_start_threshold() {
        let mut vad = EnergyVad::default();
        let frame = loud_frame();
        for _ in 0..START_THRESHOLD_FRAMES - 1 {
            let changed = vad.process_frame(&frame).await.unwrap();
            assert!(!changed);
        }
        assert!(!vad.is_speech_active());
    }

    #[tokio::test]
    async fn flips_active_at_start_threshold() {
        let mut vad = EnergyVad::default();
        let frame = loud_frame();
        let mut changed = false;
        for _ in 0..START_THRESHOLD_FRAMES {
            changed = vad.process_frame(&frame).await.unwrap();
        }
        assert!(changed);
        assert!(vad.is_speech_active());
    }

    #[tokio::test]
    async fn flips_inactive_at_end_threshold() {
        let mut vad = EnergyVad::default();
        let speech = loud_frame();
        let silence = silent_frame();
        for _ in 0..START_THRESHOLD_FRAMES {
            vad.process_frame(&speech).await.unwrap();
        }
        assert!(vad.is_speech_active());

        let mut changed = false;
        for _ in 0..END_THRESHOLD_FRAMES {
            changed = vad.process_frame(&silence).await.unwrap();
        }
        assert!(changed);
        assert!(!vad.is_speech_active());
    }

    #[tokio::test]
    async fn rejects_wrong_frame_size() {
        assert!(AudioFrame::from_bytes(&[0u8; 10]).is_none());
    }

    #[tokio::test]
    async fn errors_after_close() {
        let mut vad = EnergyVad::default();
        vad.close();
        let err = vad.process_frame(&loud_frame()).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable(_)));
    }
}
