//! Work units and the per-unit fetch state machine.
//!
//! The retry loop is driven by the pure [`transition`] function; the
//! worker owns only the side effects (network, sleeps, writes), which
//! keeps the policy testable without a network.

use crate::issues::Issue;

/// One page to fetch: an issue plus a 1-based page index.
#[derive(Debug, Clone, Copy)]
pub struct WorkUnit<'a> {
    pub issue: &'a Issue,
    pub page: u32,
}

impl<'a> WorkUnit<'a> {
    pub fn new(issue: &'a Issue, page: u32) -> Self {
        Self { issue, page }
    }

    /// Stable checkpoint key: `aid|yyyymmdd|page`.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.issue.aid,
            self.issue.date.format("%Y%m%d"),
            self.page
        )
    }

    /// ANNO page-text endpoint for this unit.
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/cgi-content/annoshow?text={}|{}|{}",
            base_url.trim_end_matches('/'),
            self.issue.aid,
            self.issue.date.format("%Y%m%d"),
            self.page
        )
    }
}

/// Why a unit ended `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Permanent transport failure, or transient failures exhausted
    Transport,
    /// Content fetched but required fields could not be extracted
    Extraction,
}

/// Lifecycle of one work unit. `attempt` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Fetching { attempt: u32 },
    Retrying { attempt: u32 },
    Done,
    Failed(FailureKind),
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Observed outcome fed into [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    /// Start (or restart after backoff) a fetch attempt
    Dispatch,
    Success,
    TransientFailure,
    PermanentFailure,
    ExtractionFailure,
}

/// Pure transition function for the unit state machine.
///
/// A transient failure on the final allowed attempt is demoted to
/// `Failed(Transport)`. Terminal states absorb every event.
pub fn transition(state: UnitState, event: UnitEvent, max_attempts: u32) -> UnitState {
    use UnitEvent::*;
    use UnitState::*;

    match (state, event) {
        (Pending, Dispatch) => Fetching { attempt: 1 },
        (Retrying { attempt }, Dispatch) => Fetching {
            attempt: attempt + 1,
        },
        (Fetching { .. }, Success) => Done,
        (Fetching { attempt }, TransientFailure) => {
            if attempt < max_attempts {
                Retrying { attempt }
            } else {
                Failed(FailureKind::Transport)
            }
        }
        (Fetching { .. }, PermanentFailure) => Failed(FailureKind::Transport),
        (Fetching { .. }, ExtractionFailure) => Failed(FailureKind::Extraction),
        // Terminal states and out-of-order events are absorbing
        (s, _) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const MAX: u32 = 4;

    #[test]
    fn happy_path() {
        let s = transition(UnitState::Pending, UnitEvent::Dispatch, MAX);
        assert_eq!(s, UnitState::Fetching { attempt: 1 });
        let s = transition(s, UnitEvent::Success, MAX);
        assert_eq!(s, UnitState::Done);
        assert!(s.is_terminal());
    }

    #[test]
    fn transient_then_success_counts_attempts() {
        let mut s = UnitState::Pending;
        s = transition(s, UnitEvent::Dispatch, MAX);
        s = transition(s, UnitEvent::TransientFailure, MAX);
        assert_eq!(s, UnitState::Retrying { attempt: 1 });
        s = transition(s, UnitEvent::Dispatch, MAX);
        assert_eq!(s, UnitState::Fetching { attempt: 2 });
        s = transition(s, UnitEvent::Success, MAX);
        assert_eq!(s, UnitState::Done);
    }

    #[test]
    fn transient_demoted_at_max_attempts() {
        let mut s = UnitState::Pending;
        for _ in 0..MAX {
            s = transition(s, UnitEvent::Dispatch, MAX);
            s = transition(s, UnitEvent::TransientFailure, MAX);
        }
        assert_eq!(s, UnitState::Failed(FailureKind::Transport));
    }

    #[test]
    fn permanent_failure_short_circuits() {
        let mut s = transition(UnitState::Pending, UnitEvent::Dispatch, MAX);
        s = transition(s, UnitEvent::PermanentFailure, MAX);
        assert_eq!(s, UnitState::Failed(FailureKind::Transport));
    }

    #[test]
    fn extraction_failure_is_not_retried() {
        let s = transition(
            UnitState::Fetching { attempt: 1 },
            UnitEvent::ExtractionFailure,
            MAX,
        );
        assert_eq!(s, UnitState::Failed(FailureKind::Extraction));
        assert_eq!(
            transition(s, UnitEvent::Dispatch, MAX),
            UnitState::Failed(FailureKind::Extraction)
        );
    }

    #[test]
    fn terminal_states_absorb() {
        for event in [
            UnitEvent::Dispatch,
            UnitEvent::Success,
            UnitEvent::TransientFailure,
        ] {
            assert_eq!(transition(UnitState::Done, event, MAX), UnitState::Done);
        }
    }

    #[test]
    fn unit_key_and_url() {
        let issue = Issue {
            aid: "nfp".into(),
            title: "Neue Freie Presse".into(),
            date: NaiveDate::from_ymd_opt(1899, 3, 5).unwrap(),
        };
        let unit = WorkUnit::new(&issue, 4);
        assert_eq!(unit.key(), "nfp|18990305|4");
        assert_eq!(
            unit.url("https://anno.onb.ac.at/"),
            "https://anno.onb.ac.at/cgi-content/annoshow?text=nfp|18990305|4"
        );
    }
}
