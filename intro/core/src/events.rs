//! Sequence Events
//!
//! Observer contract between the controller and everything that renders
//! it. Presentations subscribe and react to these events instead of having
//! callbacks threaded through them; the host only ever needs the
//! completion latch.

use tokio::sync::mpsc;

use crate::transition::ExitTransition;

/// Why a scene ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneEndCause {
    /// The scene's timer elapsed
    Timer,
    /// The scene's presentation reported it was finished
    Animation,
    /// An animation-driven scene never reported and the hard timeout fired
    FallbackTimeout,
}

impl std::fmt::Display for SceneEndCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer => write!(f, "timer"),
            Self::Animation => write!(f, "animation"),
            Self::FallbackTimeout => write!(f, "fallback-timeout"),
        }
    }
}

/// Lifecycle events emitted by a [`SceneController`](crate::SceneController)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceEvent {
    /// The sequence left `Idle` and is playing
    Started {
        /// Number of scenes in the sequence
        scene_count: usize,
    },
    /// A scene became the active scene
    SceneActivated {
        /// Sequence position
        index: usize,
        /// Scene id
        id: String,
    },
    /// The active scene ended naturally
    SceneEnded {
        /// Sequence position
        index: usize,
        /// Scene id
        id: String,
        /// What ended it
        cause: SceneEndCause,
        /// How the scene hands over to the next one
        exit: ExitTransition,
    },
    /// The host or user skipped the rest of the sequence
    Skipped {
        /// Scene that was active when the skip happened
        index: usize,
    },
    /// The sequence reached `Complete`
    Completed,
    /// The controller was disposed
    Disposed,
}

/// Fan-out of sequence events to all live subscribers
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<SequenceEvent>>,
}

impl Subscribers {
    /// Register a new subscriber
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SequenceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Deliver an event, dropping subscribers whose receiver is gone
    pub(crate) fn emit(&mut self, event: &SequenceEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Close every subscription
    pub(crate) fn close(&mut self) {
        self.senders.clear();
    }

    /// Number of live subscribers
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
