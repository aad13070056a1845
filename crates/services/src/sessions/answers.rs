//! Local answer map, in-flight writes, and the pending-submission set.
//!
//! Pure bookkeeping for the answer pipeline; the session drives the network.
//! Invariants kept here:
//! - at most one write per position is outstanding,
//! - a position is never both outstanding and pending,
//! - at most one pending entry exists per position.

use std::collections::BTreeMap;

use exam_core::model::{OptionId, Position};

/// Answer write that should be sent for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WriteTicket {
    pub position: Position,
    pub option: OptionId,
}

/// An answer that could not be confirmed by the server yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSubmission {
    pub position: Position,
    pub option: OptionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    /// No write was outstanding; this one must be sent.
    Dispatch(WriteTicket),
    /// A write is outstanding; the new answer goes out once it resolves.
    Queued,
    /// The outstanding write already carries this answer.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Confirmed,
    Failed,
    /// A newer answer was selected while the write was outstanding.
    Next(WriteTicket),
    /// The ticket no longer matches the outstanding write for its position.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    option: OptionId,
    queued: Option<OptionId>,
}

impl InFlight {
    fn newest(&self) -> OptionId {
        self.queued.unwrap_or(self.option)
    }
}

#[derive(Debug, Default)]
pub(crate) struct AnswerBook {
    answers: BTreeMap<Position, OptionId>,
    in_flight: BTreeMap<Position, InFlight>,
    pending: BTreeMap<Position, OptionId>,
}

impl AnswerBook {
    /// Seed the local map from answers the server already recorded.
    pub(crate) fn seeded(recorded: impl IntoIterator<Item = (Position, OptionId)>) -> Self {
        Self {
            answers: recorded.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record a selection optimistically and decide whether a write goes out now.
    pub(crate) fn select(&mut self, position: Position, option: OptionId) -> Selection {
        self.answers.insert(position, option);

        if let Some(flight) = self.in_flight.get_mut(&position) {
            if flight.option == option {
                flight.queued = None;
                return Selection::Suppressed;
            }
            flight.queued = Some(option);
            return Selection::Queued;
        }

        self.pending.remove(&position);
        self.in_flight.insert(
            position,
            InFlight {
                option,
                queued: None,
            },
        );
        Selection::Dispatch(WriteTicket { position, option })
    }

    /// Apply the server's answer to a write.
    pub(crate) fn resolve(&mut self, ticket: WriteTicket, succeeded: bool) -> Resolution {
        let Some(flight) = self.in_flight.get_mut(&ticket.position) else {
            return Resolution::Stale;
        };
        if flight.option != ticket.option {
            return Resolution::Stale;
        }

        if let Some(next) = flight.queued.take() {
            flight.option = next;
            return Resolution::Next(WriteTicket {
                position: ticket.position,
                option: next,
            });
        }

        self.in_flight.remove(&ticket.position);
        if succeeded {
            Resolution::Confirmed
        } else {
            self.pending.insert(ticket.position, ticket.option);
            Resolution::Failed
        }
    }

    /// A write was dropped before resolving: its newest answer becomes pending.
    pub(crate) fn abandon(&mut self, ticket: WriteTicket) {
        let matches = self
            .in_flight
            .get(&ticket.position)
            .is_some_and(|flight| flight.option == ticket.option);
        if !matches {
            return;
        }
        if let Some(flight) = self.in_flight.remove(&ticket.position) {
            self.pending.insert(ticket.position, flight.newest());
        }
    }

    /// Move every pending entry back in flight and hand out the writes to resend.
    pub(crate) fn begin_retry(&mut self) -> Vec<WriteTicket> {
        let pending = std::mem::take(&mut self.pending);
        pending
            .into_iter()
            .map(|(position, option)| {
                self.in_flight.insert(
                    position,
                    InFlight {
                        option,
                        queued: None,
                    },
                );
                WriteTicket { position, option }
            })
            .collect()
    }

    pub(crate) fn answer(&self, position: Position) -> Option<OptionId> {
        self.answers.get(&position).copied()
    }

    pub(crate) fn answers(&self) -> &BTreeMap<Position, OptionId> {
        &self.answers
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub(crate) fn pending(&self) -> Vec<PendingSubmission> {
        self.pending
            .iter()
            .map(|(&position, &option)| PendingSubmission { position, option })
            .collect()
    }

    pub(crate) fn pending_positions(&self) -> Vec<Position> {
        self.pending.keys().copied().collect()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.in_flight.is_empty()
    }
}
