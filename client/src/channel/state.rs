//! Lifecycle state machine for a single chat channel.
//!
//! Idle → Connecting → Open → Closing → Closed(reason), with failure edges
//! from Connecting and Open straight to `Closed(Error)`. A channel that is
//! still handshaking can be closed too (`Connecting → Closing`).

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::fmt;

/// Why a channel ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer peer selection replaced the channel. Bookkeeping only.
    Superseded,
    /// Closed by `select_peer(None)` or manager teardown.
    UserInitiated,
    /// Transport failure or remote close.
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed(CloseReason),
}

impl ChannelState {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Whether a state may follow this one.
    #[must_use]
    pub fn can_transition_to(&self, next: &ChannelState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Open | Self::Closing)
                | (Self::Connecting | Self::Open, Self::Closed(CloseReason::Error(_)))
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed(_))
        )
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed(CloseReason::Superseded) => write!(f, "closed(superseded)"),
            Self::Closed(CloseReason::UserInitiated) => write!(f, "closed(user)"),
            Self::Closed(CloseReason::Error(reason)) => write!(f, "closed(error: {reason})"),
        }
    }
}

/// Events that move a channel through its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The transport was asked to open the channel.
    Connect,
    /// The transport reported a completed handshake.
    Handshake,
    /// The transport failed or the remote end closed the channel.
    Failure(String),
    /// The manager started tearing the channel down.
    Close,
    /// Teardown finished.
    Finished(CloseReason),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Handshake => write!(f, "handshake"),
            Self::Failure(_) => write!(f, "failure"),
            Self::Close => write!(f, "close"),
            Self::Finished(_) => write!(f, "finished"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("invalid channel transition from {from} on {trigger}")]
    InvalidTransition { from: String, trigger: String },
}

pub struct ChannelStateMachine;

impl ChannelStateMachine {
    /// Apply a trigger to a state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] when the trigger is not legal
    /// in `current`.
    pub fn transition(current: &ChannelState, trigger: Trigger) -> Result<ChannelState, StateError> {
        let next = match (current, &trigger) {
            (ChannelState::Idle, Trigger::Connect) => ChannelState::Connecting,
            (ChannelState::Connecting, Trigger::Handshake) => ChannelState::Open,
            (ChannelState::Connecting | ChannelState::Open, Trigger::Failure(reason)) => {
                ChannelState::Closed(CloseReason::Error(reason.clone()))
            }
            (ChannelState::Connecting | ChannelState::Open, Trigger::Close) => ChannelState::Closing,
            (ChannelState::Closing, Trigger::Finished(reason)) => ChannelState::Closed(reason.clone()),
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    trigger: trigger.to_string(),
                });
            }
        };
        debug_assert!(current.can_transition_to(&next));
        Ok(next)
    }
}
