//! Brainform - client-side core of the brain emotion detection form
//!
//! Brainform fills the 45-feature prediction form with synthetic test
//! patterns, validates what the user typed, and submits the values (or a CSV
//! file for batch scoring) to the prediction server:
//! pattern generation → form session → validation → submission → result.
//!
//! ## Modules
//!
//! - **Patterns**: range tables and the seedable value generator
//! - **Session**: feature slots and the fill/validate/submit lifecycle
//! - **Submit / Upload**: the server collaborator and CSV batch checks

pub mod commands;
pub mod config;
pub mod error;
pub mod notify;
mod page;
pub mod patterns;
pub mod schema;
pub mod session;
pub mod submit;
pub mod summary;
pub mod types;
pub mod upload;

pub use commands::{CommandOutcome, FormCommand};
pub use config::FormConfig;
pub use error::{FormError, SubmissionError};
pub use notify::{MemoryNotifier, Notifier, TracingNotifier};
pub use patterns::{FixedSequence, PatternGenerator, PatternTable, RandomSource, RngSource};
pub use schema::{FeatureKey, FeatureSchema, SchemaKind, FEATURE_COUNT};
pub use session::{FeatureSlot, FillReport, FormSession, PendingSubmission};
pub use submit::{HttpSubmitter, Submitter};
pub use summary::{compute_summary, PredictedLabel, ValueSummary};
pub use types::{EmotionLabel, RangeSpec, SessionStatus, Severity, SubmissionSummary};
pub use upload::{upload_csv, CsvUpload};

/// Brainform version
pub const BRAINFORM_VERSION: &str = env!("CARGO_PKG_VERSION");
