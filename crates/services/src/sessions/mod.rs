mod restore;
mod selector;
mod session;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use restore::{RestoreNotice, RestoredSession};
pub use selector::{FOCUSED_SESSION_CAP, SequencePlanner};
pub use session::{GradeApplication, QuizSession};
pub use workflow::{QuizEngine, QuotaStatus, SubmitOutcome};
