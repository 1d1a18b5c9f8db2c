#![forbid(unsafe_code)]

pub mod error;
pub mod grading;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::{EngineSetupError, OracleError, SelectionError, SessionError};
pub use grading::{ChatGradingOracle, GradedAnswer, GradingOracle, OracleConfig};

pub use sessions::{
    FOCUSED_SESSION_CAP, GradeApplication, QuizEngine, QuizSession, QuotaStatus,
    RestoreNotice, RestoredSession, SequencePlanner, SubmitOutcome,
};
