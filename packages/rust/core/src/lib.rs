//! Collection pipeline and domain logic for newsdesk.
//!
//! Ties the feed adapters, classifier, storage and extraction cascade into
//! the collection cycle, on-demand analysis and the periodic scheduler.

pub mod analysis;
pub mod classifier;
pub mod collect;
pub mod llm;
pub mod notify;
mod prompts;
pub mod scheduler;
pub mod watermark;

#[cfg(test)]
mod testing;

pub use analysis::{AnalyzeReport, Analyzer, parse_annotation};
pub use classifier::{Candidate, Classified, Classifier, ClassifierReply};
pub use collect::{Collector, CycleReport, ProgressReporter, SilentProgress};
pub use llm::{ChatClient, LlmClient};
pub use notify::{LogNotifier, Notifier};
pub use scheduler::{CycleRunner, Scheduler};
pub use watermark::{NewEntries, diff_new_entries};
