use quiz_core::model::{ProgressRecord, QuestionBank, SessionStatus, StudyMode};
use storage::repository::SessionSnapshot;

use crate::error::{SelectionError, SessionError};
use super::selector::SequencePlanner;
use super::session::QuizSession;

/// Non-fatal information attached to a successful restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreNotice {
    /// The saved focused sequence could not be regenerated; the session
    /// continued in random mode instead.
    SwitchedToRandom,
    /// Some saved indices no longer exist in the canonical list and were
    /// dropped; the remaining order was kept.
    DroppedInvalidIndices,
    /// The saved sequence was unusable and a fresh one was generated;
    /// cursor and counts restarted.
    Regenerated,
}

/// A session brought back from storage, with any fallback that occurred.
#[derive(Debug)]
pub struct RestoredSession {
    pub session: QuizSession,
    pub notice: Option<RestoreNotice>,
}

/// Rebuild a usable session from a stored snapshot.
///
/// Ordered fallback chain: saved indices filtered to the current
/// canonical range are reused in place when the answered prefix is intact
/// and the cursor still points at a real question; otherwise the sequence
/// is regenerated from current progress, switching focused to random when
/// focused is exhausted; an unconditional shuffle of the full canonical
/// list is the last resort. Restoration never silently returns an
/// unusable session.
///
/// # Errors
///
/// Returns `SessionError::Completed` for snapshots that are not in
/// progress and `SessionError::Empty` when even the last resort has no
/// questions (an empty canonical list).
pub fn restore_session(
    bank: &QuestionBank,
    progress: &ProgressRecord,
    snapshot: &SessionSnapshot,
) -> Result<RestoredSession, SessionError> {
    if snapshot.status != SessionStatus::InProgress {
        return Err(SessionError::Completed);
    }

    let mut valid = Vec::with_capacity(snapshot.sequence.len());
    let mut prefix_dropped = false;
    for (position, index) in snapshot.sequence.iter().copied().enumerate() {
        if bank.contains_index(index) {
            valid.push(index);
        } else if position <= snapshot.cursor {
            prefix_dropped = true;
        }
    }
    let dropped = snapshot.sequence.len() - valid.len();

    // Step 1: reuse the saved order only while every position at or
    // before the cursor survived the filter and the cursor still points
    // at a question. A drop inside the answered prefix would slide later
    // questions under the recorded results; a cursor at or past the end
    // would leave a session no grade can ever finish.
    let reusable = !prefix_dropped
        && snapshot.cursor < valid.len()
        && snapshot.results.len() <= valid.len();
    if reusable {
        if dropped > 0 {
            tracing::debug!(
                dropped,
                kept = valid.len(),
                edition = %snapshot.edition,
                "saved session referenced indices outside the canonical list"
            );
            let patched = SessionSnapshot {
                sequence: valid,
                ..snapshot.clone()
            };
            let session = QuizSession::from_snapshot(&patched)?;
            return Ok(RestoredSession {
                session,
                notice: Some(RestoreNotice::DroppedInvalidIndices),
            });
        }
        let session = QuizSession::from_snapshot(snapshot)?;
        return Ok(RestoredSession {
            session,
            notice: None,
        });
    }

    // Steps 2-4: regenerate from current progress. The old cursor, counts
    // and results no longer describe the new sequence and restart.
    tracing::debug!(
        edition = %snapshot.edition,
        study_mode = %snapshot.study_mode,
        "saved sequence unusable; regenerating"
    );
    let planner = SequencePlanner::new(progress, bank.len());
    let needed = snapshot.edition.session_length();

    let (sequence, switched) = match planner.plan(snapshot.study_mode, needed) {
        Ok(sequence) => (sequence, false),
        Err(SelectionError::Exhausted) => match planner.plan(StudyMode::Random, needed) {
            Ok(sequence) => (sequence, true),
            Err(SelectionError::Exhausted) => (Vec::new(), true),
        },
    };

    let sequence = if sequence.is_empty() {
        planner.full_shuffle()
    } else {
        sequence
    };
    if sequence.is_empty() {
        return Err(SessionError::Empty);
    }

    let study_mode = if switched {
        StudyMode::Random
    } else {
        snapshot.study_mode
    };
    let session = QuizSession::new(snapshot.edition, study_mode, snapshot.style, sequence)?;
    let notice = if switched {
        Some(RestoreNotice::SwitchedToRandom)
    } else {
        Some(RestoreNotice::Regenerated)
    };

    Ok(RestoredSession { session, notice })
}
