use crate::model::{ProblemStatus, Source, Verdict};

/// A status write headed for the store, tagged by who produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    /// A new local submission, made immediately on a user action.
    Optimistic(Verdict),
    /// Value received from the match service.
    Authoritative(Verdict),
    /// Outcome of an in-flight submission: the execution service's verdict
    /// on success, the pre-submission value on failure.
    Resolution(Verdict),
}

impl StatusWrite {
    pub fn verdict(&self) -> Verdict {
        match self {
            StatusWrite::Optimistic(v)
            | StatusWrite::Authoritative(v)
            | StatusWrite::Resolution(v) => *v,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            StatusWrite::Optimistic(_) | StatusWrite::Resolution(_) => Source::Optimistic,
            StatusWrite::Authoritative(_) => Source::Authoritative,
        }
    }
}

/// Resolve a write against the currently stored status.
///
/// Returns the status to store, or `None` to keep the current one.
///
/// Rules, in order:
/// - `Accepted` is terminal for a key; every later write is rejected,
///   authoritative ones included.
/// - A resolution applies only while the key still holds the optimistic
///   `Pending` its submission placed; if an authoritative verdict landed
///   mid-flight, the server already answered and the resolution is dropped.
/// - Optimistic and authoritative writes otherwise always apply, in the
///   order the store receives them. A fresh optimistic `Pending` therefore
///   always lands, including right after an authoritative `WrongAnswer`
///   (a resubmission).
pub fn merge(
    current: Option<&ProblemStatus>,
    write: StatusWrite,
    at_ms: u64,
) -> Option<ProblemStatus> {
    if let Some(cur) = current {
        if cur.verdict.is_accepted() {
            return None;
        }
    }
    if matches!(write, StatusWrite::Resolution(_)) {
        let in_flight = current
            .is_some_and(|cur| cur.verdict == Verdict::Pending && cur.source == Source::Optimistic);
        if !in_flight {
            return None;
        }
    }
    Some(ProblemStatus {
        verdict: write.verdict(),
        source: write.source(),
        last_updated_ms: at_ms,
    })
}
