// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wave stream naming.
//!
//! Stream names are derived from the wave id so that a receiver can find
//! the feedback channel for an inbound propagate stream without any
//! handshake:
//!
//! ```text
//! wavestream:/{wave_id}/propagate/{disambiguator}
//! wavestream:/{wave_id}/feedback/{disambiguator}
//! ```

use crate::define_id;
use crate::id::WaveId;
use std::fmt;

/// Scheme shared by every wave stream.
pub const WAVE_STREAM_SCHEME: &str = "wavestream";

/// Prefix under which the controller registers its inbound callback.
pub const WAVE_STREAM_PREFIX: &str = "wavestream:/";

define_id! {
    /// Name of a message stream, unique per partner.
    pub struct StreamName;
}

impl StreamName {
    pub fn is_wave_stream(&self) -> bool {
        self.0.starts_with(WAVE_STREAM_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Carries the wave downstream.
    Propagate,
    /// Carries echoes back upstream.
    Feedback,
}

impl StreamKind {
    fn segment(self) -> &'static str {
        match self {
            StreamKind::Propagate => "propagate",
            StreamKind::Feedback => "feedback",
        }
    }

    fn from_segment(s: &str) -> Option<Self> {
        match s {
            "propagate" => Some(StreamKind::Propagate),
            "feedback" => Some(StreamKind::Feedback),
            _ => None,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A parsed wave stream name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaveStreamName {
    pub wave_id: WaveId,
    pub kind: StreamKind,
    pub disambiguator: String,
}

impl WaveStreamName {
    pub fn propagate(wave_id: WaveId, disambiguator: impl Into<String>) -> Self {
        Self {
            wave_id,
            kind: StreamKind::Propagate,
            disambiguator: disambiguator.into(),
        }
    }

    /// Parse a stream name. Returns `None` for foreign streams.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(WAVE_STREAM_PREFIX)?;
        // Split from the right so the wave id may itself contain '/'.
        let mut parts = rest.rsplitn(3, '/');
        let disambiguator = parts.next()?;
        let kind = StreamKind::from_segment(parts.next()?)?;
        let wave_id = parts.next()?;
        if wave_id.is_empty() || disambiguator.is_empty() {
            return None;
        }
        Some(Self {
            wave_id: WaveId::new(wave_id),
            kind,
            disambiguator: disambiguator.to_string(),
        })
    }

    /// Feedback name paired with a propagate name. `None` for feedback names.
    pub fn feedback_pair(&self) -> Option<Self> {
        match self.kind {
            StreamKind::Propagate => Some(Self {
                kind: StreamKind::Feedback,
                ..self.clone()
            }),
            StreamKind::Feedback => None,
        }
    }

    pub fn to_stream_name(&self) -> StreamName {
        StreamName::new(self.to_string())
    }
}

impl fmt::Display for WaveStreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            WAVE_STREAM_PREFIX,
            self.wave_id,
            self.kind.segment(),
            self.disambiguator
        )
    }
}

impl From<&WaveStreamName> for StreamName {
    fn from(name: &WaveStreamName) -> Self {
        name.to_stream_name()
    }
}

#[cfg(test)]
#[path = "stream_name_tests.rs"]
mod tests;
