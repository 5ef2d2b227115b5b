// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wave record.
//!
//! A wave is a command travelling through the link graph. Every node that
//! forwards it keeps one record: who sent it, where it went next, and which
//! of those next hops have echoed back. The record is immutable; every
//! mutation returns a new value so a reader holding an older snapshot never
//! sees a half-applied change.

use crate::error::{Classify, ErrorClass};
use crate::id::WaveId;
use crate::link::Link;
use crate::message::WaveEnvelope;
use crate::stream_name::StreamName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a persisted wave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveState {
    /// Sentinel for a record that has not been placed yet. Never persisted.
    #[default]
    Invalid,
    /// Persisted with its outbound streams; not yet sent downstream.
    Created,
    /// Sent on every outbound stream; waiting for echoes.
    Started,
}

impl std::fmt::Display for WaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WaveState::Invalid => "invalid",
            WaveState::Created => "created",
            WaveState::Started => "started",
        };
        f.write_str(s)
    }
}

/// Opaque command carried by a wave.
///
/// `kind` selects the domain processor; `body` is never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveCommand {
    pub kind: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl WaveCommand {
    pub fn new(kind: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            body,
        }
    }
}

/// One downstream hop and whether it has echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLink {
    pub link: Link,
    pub echo_received: bool,
}

/// Violations of the wave record's own invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaveRecordError {
    #[error("wave {wave_id}: inbound link already set")]
    InboundLinkAlreadySet { wave_id: WaveId },
    #[error("wave {wave_id}: echo from unknown link {link}")]
    UnknownLink { wave_id: WaveId, link: Link },
    #[error("wave {wave_id}: duplicate echo from {link}")]
    DuplicateEcho { wave_id: WaveId, link: Link },
}

impl Classify for WaveRecordError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Invariant
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    id: WaveId,
    command: WaveCommand,
    #[serde(default)]
    state: WaveState,
    #[serde(default)]
    inbound_link: Option<Link>,
    #[serde(default)]
    outbound_links: Vec<OutboundLink>,
    #[serde(default)]
    outbound_feedback_stream: Option<StreamName>,
    #[serde(default)]
    is_initiator: bool,
}

impl Wave {
    /// A fresh wave at the node that starts it. The inbound link is the
    /// node itself.
    pub fn initiator(id: WaveId, command: WaveCommand, self_link: Link) -> Self {
        Self {
            id,
            command,
            state: WaveState::Invalid,
            inbound_link: Some(self_link),
            outbound_links: Vec::new(),
            outbound_feedback_stream: None,
            is_initiator: true,
        }
    }

    pub fn id(&self) -> &WaveId {
        &self.id
    }

    pub fn command(&self) -> &WaveCommand {
        &self.command
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    pub fn inbound_link(&self) -> Option<&Link> {
        self.inbound_link.as_ref()
    }

    pub fn outbound_links(&self) -> &[OutboundLink] {
        &self.outbound_links
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.outbound_links.iter().map(|o| &o.link)
    }

    pub fn outbound_feedback_stream(&self) -> Option<&StreamName> {
        self.outbound_feedback_stream.as_ref()
    }

    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    /// Links that have not echoed yet.
    pub fn pending_links(&self) -> impl Iterator<Item = &Link> {
        self.outbound_links
            .iter()
            .filter(|o| !o.echo_received)
            .map(|o| &o.link)
    }

    /// True once every outbound link has echoed.
    pub fn all_echoes_received(&self) -> bool {
        self.outbound_links.iter().all(|o| o.echo_received)
    }

    pub fn with_state(&self, state: WaveState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Set the sender. Only valid while no inbound link is recorded.
    pub fn with_inbound_link(&self, link: Link) -> Result<Self, WaveRecordError> {
        if self.inbound_link.is_some() {
            return Err(WaveRecordError::InboundLinkAlreadySet {
                wave_id: self.id.clone(),
            });
        }
        Ok(Self {
            inbound_link: Some(link),
            ..self.clone()
        })
    }

    /// Replace the outbound set. Duplicates are dropped; every link starts
    /// without an echo.
    pub fn with_outbound_links<I>(&self, links: I) -> Self
    where
        I: IntoIterator<Item = Link>,
    {
        let mut outbound: Vec<OutboundLink> = Vec::new();
        for link in links {
            if outbound.iter().any(|o| o.link == link) {
                continue;
            }
            outbound.push(OutboundLink {
                link,
                echo_received: false,
            });
        }
        Self {
            outbound_links: outbound,
            ..self.clone()
        }
    }

    /// Record the echo from `link`. Each link echoes exactly once.
    pub fn with_echo_received(&self, link: &Link) -> Result<Self, WaveRecordError> {
        let Some(pos) = self.outbound_links.iter().position(|o| &o.link == link) else {
            return Err(WaveRecordError::UnknownLink {
                wave_id: self.id.clone(),
                link: link.clone(),
            });
        };
        if self.outbound_links[pos].echo_received {
            return Err(WaveRecordError::DuplicateEcho {
                wave_id: self.id.clone(),
                link: link.clone(),
            });
        }
        let mut next = self.clone();
        next.outbound_links[pos].echo_received = true;
        Ok(next)
    }

    pub fn with_feedback_stream(&self, name: StreamName) -> Self {
        Self {
            outbound_feedback_stream: Some(name),
            ..self.clone()
        }
    }

    /// The part of the wave that crosses the wire.
    pub fn envelope(&self) -> WaveEnvelope {
        WaveEnvelope {
            id: self.id.clone(),
            command: self.command.clone(),
        }
    }
}

/// A wave seen for the first time on an inbound stream. Its sender is set
/// with [`Wave::with_inbound_link`].
impl From<WaveEnvelope> for Wave {
    fn from(envelope: WaveEnvelope) -> Self {
        Self {
            id: envelope.id,
            command: envelope.command,
            state: WaveState::Invalid,
            inbound_link: None,
            outbound_links: Vec::new(),
            outbound_feedback_stream: None,
            is_initiator: false,
        }
    }
}

#[cfg(test)]
#[path = "wave_tests.rs"]
mod tests;
