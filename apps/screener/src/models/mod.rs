pub mod job;
pub mod resume;
pub mod score;

pub use job::{Job, JobStatus, JobUpdate, JobValidationError};
pub use resume::{Analysis, FileRecord, ResumeSummary};
pub use score::Score;
