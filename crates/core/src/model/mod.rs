mod answer;
mod edition;
mod ids;
mod progress;
mod question;
mod quota;
mod session;

pub use answer::{AnswerGrade, GradeError, QuestionResult};
pub use edition::{Edition, EditionError};
pub use ids::{AccountId, Identity, ParseAccountIdError};
pub use progress::{ProgressRecord, ProgressStats};
pub use question::{CatalogError, Question, QuestionBank, QuestionCatalog};
pub use quota::{FREE_DAILY_LIMIT, QuotaRecord, Tier, TierError};
pub use session::{QuizStyle, SessionFieldError, SessionStatus, StudyMode};
