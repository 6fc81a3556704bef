pub mod confirm;
pub mod submit;
pub mod watcher;

pub use confirm::ConfirmationMonitor;
pub use submit::{Submission, SubmissionFailure, SubmissionStrategy};
pub use watcher::{PaymentMatchWatcher, WatchHandle, WatchOutcome};
