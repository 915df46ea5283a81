//! Input interpretation: chords fire now, sequences accumulate over time.
//!
//! The interpreter is a small state machine, `Idle` or `AwaitingNext`, fed
//! one key press at a time. Time never flows inside it: every entry point
//! takes `now` from the caller, so tests drive the timing window with plain
//! `Instant` arithmetic and hosts schedule a single timer against
//! [`Interpreter::pending_deadline`].
//!
//! Interpretation rules, in the order they are applied:
//! - A stale prefix (past its deadline) is discarded before the incoming key
//!   is considered, so the key is read from `Idle`, never against dead state.
//! - While awaiting, a key that completes a candidate sequence wins over one
//!   that merely extends a longer candidate.
//! - While awaiting, a key that does neither abandons the prefix and is then
//!   re-interpreted from `Idle` in the same call. The prefix keys stay
//!   consumed; only the current key gets a second reading.
//! - From `Idle`, starting a sequence wins over matching a chord on the same
//!   keys, so binding `g` as a chord cannot shadow `g>d`.
//!
//! The interpreter decides *what* completed, never *who* runs: picking one
//! binding out of several that match is [`crate::dispatch`]'s job.

use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::keys::{Chord, KeySpec, Platform, RawKeyEvent, MAX_SEQUENCE_HOPS};
use crate::resolve::ResolvedBinding;

type Prefix = SmallVec<[Chord; MAX_SEQUENCE_HOPS]>;

/// Interpreter state. `AwaitingNext` holds the chords consumed so far and
/// the instant at which they expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    AwaitingNext { prefix: Prefix, deadline: Instant },
}

/// What one key press amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A chord or completed sequence is ready for dispatch. The payload is
    /// the concrete input unit; dispatch re-matches it against candidates.
    Dispatch(KeySpec),
    /// The key was consumed as (the start of) a sequence prefix. The host
    /// should arm a timer for `deadline` and call
    /// [`Interpreter::on_timeout`] when it fires.
    Pending { deadline: Instant },
    /// No live binding wants this key; let the host handle it normally.
    Pass,
}

pub struct Interpreter {
    state: SequenceState,
    window: Duration,
    platform: Platform,
}

impl Interpreter {
    pub fn new(window: Duration, platform: Platform) -> Self {
        Interpreter {
            state: SequenceState::Idle,
            window,
            platform,
        }
    }

    /// Feed one key press. `candidates` must already be narrowed to the
    /// bindings allowed to fire for this event (enabled, scope active, text
    /// input rules applied); the interpreter only consults their keys.
    pub fn on_key(
        &mut self,
        event: &RawKeyEvent,
        candidates: &[&ResolvedBinding],
        now: Instant,
    ) -> KeyOutcome {
        let chord = Chord::from_event(event);

        if let SequenceState::AwaitingNext { deadline, .. } = self.state {
            if now > deadline {
                trace!(
                    event_type = "sequence_timeout",
                    "Discarding expired sequence prefix"
                );
                self.state = SequenceState::Idle;
            }
        }

        if let SequenceState::AwaitingNext { prefix, .. } = &self.state {
            let mut run = prefix.clone();
            run.push(chord.clone());

            let completes = candidates
                .iter()
                .any(|b| b.effective_keys.matches_hops(&run, self.platform));
            if completes {
                self.state = SequenceState::Idle;
                return KeyOutcome::Dispatch(KeySpec::Sequence(run));
            }

            let extends = candidates
                .iter()
                .any(|b| b.effective_keys.has_hop_prefix(&run, self.platform));
            if extends {
                let deadline = now + self.window;
                self.state = SequenceState::AwaitingNext {
                    prefix: run,
                    deadline,
                };
                return KeyOutcome::Pending { deadline };
            }

            debug!(
                event_type = "sequence_abandoned",
                key = %chord,
                "Key does not continue the pending sequence, re-reading it from idle"
            );
            self.state = SequenceState::Idle;
        }

        let starts_sequence = candidates.iter().any(|b| {
            b.effective_keys
                .has_hop_prefix(std::slice::from_ref(&chord), self.platform)
        });
        if starts_sequence {
            let deadline = now + self.window;
            debug!(
                event_type = "sequence_start",
                key = %chord,
                window_ms = self.window.as_millis() as u64,
                "Sequence prefix started"
            );
            let mut prefix = Prefix::new();
            prefix.push(chord);
            self.state = SequenceState::AwaitingNext { prefix, deadline };
            return KeyOutcome::Pending { deadline };
        }

        let matches_chord = candidates
            .iter()
            .any(|b| b.effective_keys.matches_chord(&chord, self.platform));
        if matches_chord {
            return KeyOutcome::Dispatch(KeySpec::Chord(chord));
        }

        KeyOutcome::Pass
    }

    /// Expire the pending prefix if its deadline has passed. Returns true
    /// when a prefix was discarded. Safe to call spuriously.
    pub fn on_timeout(&mut self, now: Instant) -> bool {
        match self.state {
            SequenceState::AwaitingNext { deadline, .. } if now >= deadline => {
                debug!(event_type = "sequence_timeout", "Pending sequence expired");
                self.state = SequenceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending prefix unless some candidate sequence still
    /// continues it. Called after scope changes and customization edits,
    /// which can invalidate a prefix mid-flight. Returns true if the prefix
    /// was dropped.
    pub fn revalidate(&mut self, candidates: &[&ResolvedBinding]) -> bool {
        let SequenceState::AwaitingNext { prefix, .. } = &self.state else {
            return false;
        };
        let still_live = candidates
            .iter()
            .any(|b| b.effective_keys.has_hop_prefix(prefix, self.platform));
        if still_live {
            return false;
        }
        debug!(
            event_type = "sequence_abandoned",
            "Pending sequence no longer continues any live binding"
        );
        self.state = SequenceState::Idle;
        true
    }

    /// Unconditionally drop any pending prefix.
    pub fn reset(&mut self) -> bool {
        if matches!(self.state, SequenceState::AwaitingNext { .. }) {
            self.state = SequenceState::Idle;
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SequenceState::AwaitingNext { .. })
    }

    /// Deadline of the pending prefix, if any. Hosts arm their timer from
    /// this; a new value replaces the old timer.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match &self.state {
            SequenceState::AwaitingNext { deadline, .. } => Some(*deadline),
            SequenceState::Idle => None,
        }
    }

    /// Chords consumed so far, oldest first.
    pub fn pending_prefix(&self) -> Option<&[Chord]> {
        match &self.state {
            SequenceState::AwaitingNext { prefix, .. } => Some(prefix),
            SequenceState::Idle => None,
        }
    }

    /// Canonical text of the pending prefix, for "awaiting next key" HUDs.
    pub fn pending_canonical(&self) -> Option<String> {
        self.pending_prefix().map(|prefix| {
            prefix
                .iter()
                .map(Chord::canonical)
                .collect::<Vec<_>>()
                .join(">")
        })
    }
}
