/// PCM16 mono at 16 kHz, 30 ms per frame: 480 samples, 960 bytes.
///
/// The VAD only ever classifies frames of exactly this size; anything
/// else is a client-violation (`FrameSizeError` in `vce_speech`).
pub const AUDIO_FRAME_SAMPLES: usize = 480;
pub const AUDIO_FRAME_BYTES: usize = AUDIO_FRAME_SAMPLES * 2;

/// One 30 ms slice of 16-bit mono PCM audio at 16 kHz.
///
/// Constructed only via [`AudioFrame::from_bytes`], which enforces the
/// fixed size so malformed input is rejected at the boundary rather than
/// panicking downstream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Build a frame from little-endian PCM16 bytes.
    ///
    /// Returns `None` if `bytes.len() != AUDIO_FRAME_BYTES`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != AUDIO_FRAME_BYTES {
            return None;
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some(Self { samples })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AUDIO_FRAME_BYTES);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

/// Hysteretic VAD bookkeeping, mirroring the per-session state machine in
/// §4.1: `speech_active` only flips once the run-length of consecutive
/// same-class frames crosses the start/end thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VadState {
    pub speech_active: bool,
    pub consecutive_speech_frames: u32,
    pub consecutive_silence_frames: u32,
}
