//! Form session orchestration
//!
//! A [`FormSession`] owns the feature slots of one form and drives the
//! fill / validate / submit lifecycle:
//!
//! ```text
//! Idle --submit--> Validating --valid--> Submitting --sent--> AwaitingResult --answer--> Idle
//!                       |
//!                       +--invalid--> Idle   (no network call)
//! ```
//!
//! At most one submission is outstanding. A second submit while one is in
//! flight is rejected immediately with [`FormError::Busy`]. Slots stay
//! editable during a submission; the submitted snapshot is taken up front.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::FormConfig;
use crate::error::{FormError, SubmissionError};
use crate::notify::Notifier;
use crate::patterns::{PatternGenerator, RandomSource, RngSource};
use crate::schema::{FeatureKey, FeatureSchema};
use crate::submit::{SubmissionFuture, Submitter};
use crate::summary::{compute_summary, ValueSummary};
use crate::types::{EmotionLabel, FeatureValue, SessionStatus, Severity, SubmissionSummary};

/// Visibility of the "analyzing" notice shown while a submission is out
const ANALYZING_NOTICE: Duration = Duration::from_millis(2000);

/// One numeric input of the form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSlot {
    key: FeatureKey,
    input: String,
    value: Option<f64>,
    valid: bool,
}

impl FeatureSlot {
    pub fn new(key: FeatureKey) -> Self {
        Self {
            key,
            input: String::new(),
            value: None,
            valid: true,
        }
    }

    pub fn key(&self) -> &FeatureKey {
        &self.key
    }

    /// Raw text as entered
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Numeric value; empty or invalid slots read as 0.
    pub fn value(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_filled(&self) -> bool {
        !self.input.trim().is_empty()
    }

    /// Store `input` and re-check it. Empty input is valid but absent.
    fn set_input(&mut self, input: &str) -> bool {
        self.input = input.to_string();
        self.revalidate()
    }

    fn revalidate(&mut self) -> bool {
        let trimmed = self.input.trim();
        if trimmed.is_empty() {
            self.value = None;
            self.valid = true;
            return true;
        }

        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => {
                self.value = Some(v);
                self.valid = true;
            }
            _ => {
                self.value = None;
                self.valid = false;
            }
        }
        self.valid
    }
}

/// Outcome of a bulk fill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillReport {
    pub label: EmotionLabel,
    pub filled: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Record of a single submit-and-await-result cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Pattern that produced the values, `None` for manual entry
    pub label: Option<EmotionLabel>,
    pub snapshot: Vec<FeatureValue>,
    pub summary: ValueSummary,
}

/// An outstanding submission. Await [`PendingSubmission::wait`] and hand
/// the outcome back to [`FormSession::finish_submit`].
///
/// Dropping it cancels the call but leaves the session in
/// `AwaitingResult`; a driver that drops it must call
/// [`FormSession::abandon_submit`] before submitting again.
pub struct PendingSubmission {
    id: Uuid,
    future: SubmissionFuture,
}

impl PendingSubmission {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn wait(self) -> SubmissionOutcome {
        SubmissionOutcome {
            id: self.id,
            result: self.future.await,
        }
    }
}

/// Collaborator answer for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub id: Uuid,
    pub result: Result<SubmissionSummary, SubmissionError>,
}

/// Owns the feature slots and the submission lifecycle of one form.
pub struct FormSession {
    schema: FeatureSchema,
    slots: Vec<FeatureSlot>,
    generator: PatternGenerator,
    rng: Box<dyn RandomSource + Send>,
    notifier: Arc<dyn Notifier>,
    submitter: Arc<dyn Submitter>,
    status: SessionStatus,
    active_label: Option<EmotionLabel>,
    in_flight: Option<AnalysisSession>,
    last_result: Option<SubmissionSummary>,
    notify_duration: Duration,
}

impl FormSession {
    pub fn new(
        schema: FeatureSchema,
        generator: PatternGenerator,
        notifier: Arc<dyn Notifier>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        let slots = schema.keys().iter().cloned().map(FeatureSlot::new).collect();
        Self {
            schema,
            slots,
            generator,
            rng: Box::new(RngSource::from_entropy()),
            notifier,
            submitter,
            status: SessionStatus::Idle,
            active_label: None,
            in_flight: None,
            last_result: None,
            notify_duration: crate::notify::DEFAULT_DURATION,
        }
    }

    pub fn from_config(
        config: &FormConfig,
        notifier: Arc<dyn Notifier>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self::new(
            config.feature_schema(),
            PatternGenerator::new(config.pattern_table()),
            notifier,
            submitter,
        )
        .with_notify_duration(config.notify_duration())
    }

    /// Replace the random source, e.g. with a seeded or fixed one.
    pub fn with_random_source(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_notify_duration(mut self, duration: Duration) -> Self {
        self.notify_duration = duration;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn active_label(&self) -> Option<EmotionLabel> {
        self.active_label
    }

    pub fn in_flight(&self) -> Option<&AnalysisSession> {
        self.in_flight.as_ref()
    }

    pub fn last_result(&self) -> Option<&SubmissionSummary> {
        self.last_result.as_ref()
    }

    /// Fill every slot with a synthetic value for `label`.
    ///
    /// Values are rounded to two decimals, as the form displays them.
    pub fn fill_all(&mut self, label: EmotionLabel) -> FillReport {
        for slot in &mut self.slots {
            let v = self.generator.generate(&slot.key, label, self.rng.as_mut());
            slot.set_input(&format!("{:.2}", v));
        }
        self.active_label = Some(label);

        let stats = compute_summary(&self.values());
        let report = FillReport {
            label,
            filled: self.slots.len(),
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
        };

        tracing::debug!(
            label = label.as_str(),
            filled = report.filled,
            min = report.min,
            max = report.max,
            mean = report.mean,
            "pattern generated"
        );
        self.notify(
            &format!(
                "Generated {} {} values ({:.1} to {:.1})",
                report.filled, label, report.min, report.max
            ),
            Severity::Success,
        );
        report
    }

    /// Reset every slot to 0 and forget the active pattern.
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.set_input("0");
        }
        self.active_label = None;
        tracing::debug!("all inputs cleared");
        self.notify("All values cleared", Severity::Info);
    }

    /// Store `input` in the slot named by `slot` (wire name or index) and
    /// check it. Returns whether the input is acceptable; bad input marks
    /// the slot invalid rather than failing.
    pub fn validate_slot(&mut self, slot: &str, input: &str) -> Result<bool, FormError> {
        let pos = self
            .schema
            .position(slot)
            .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))?;
        let valid = self.slots[pos].set_input(input);
        if !valid {
            tracing::debug!(slot = %self.slots[pos].key, input, "invalid number");
        }
        Ok(valid)
    }

    /// Check the whole form. Succeeds with the number of filled slots when
    /// at least one slot holds a number and none holds invalid text.
    pub fn validate_all(&mut self) -> Result<usize, FormError> {
        let mut filled_valid = 0;
        let mut invalid = 0;

        for slot in &mut self.slots {
            let valid = slot.revalidate();
            if slot.is_filled() {
                if valid {
                    filled_valid += 1;
                } else {
                    invalid += 1;
                }
            }
        }

        if filled_valid == 0 {
            let err = FormError::NoValues;
            tracing::warn!("validation failed: no feature values");
            self.notify(&err.to_string(), Severity::Warning);
            return Err(err);
        }

        if invalid > 0 {
            let err = FormError::InvalidValues(invalid);
            tracing::warn!(invalid, "validation failed");
            self.notify(&err.to_string(), Severity::Error);
            return Err(err);
        }

        Ok(filled_valid)
    }

    /// Current values in schema order; empty slots read as 0.
    pub fn snapshot(&self) -> Vec<FeatureValue> {
        self.slots
            .iter()
            .map(|slot| FeatureValue {
                name: slot.key.wire_name(),
                value: slot.value(),
            })
            .collect()
    }

    /// Statistics of the current values
    pub fn summary(&self) -> ValueSummary {
        compute_summary(&self.values())
    }

    /// Validate, snapshot and hand the form to the submitter.
    ///
    /// Returns as soon as the call is out; the session stays in
    /// `AwaitingResult` until [`finish_submit`](Self::finish_submit) or
    /// [`abandon_submit`](Self::abandon_submit).
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, FormError> {
        if self.status != SessionStatus::Idle {
            tracing::warn!(status = ?self.status, "submit rejected while analysis in progress");
            self.notify(&FormError::Busy.to_string(), Severity::Warning);
            return Err(FormError::Busy);
        }

        self.transition(SessionStatus::Validating);
        if let Err(e) = self.validate_all() {
            self.transition(SessionStatus::Idle);
            return Err(e);
        }

        self.transition(SessionStatus::Submitting);
        let snapshot = self.snapshot();
        let values: Vec<f64> = snapshot.iter().map(|fv| fv.value).collect();
        let summary = compute_summary(&values);
        let id = Uuid::new_v4();

        tracing::info!(
            %id,
            features = summary.count,
            non_zero = summary.count - summary.zero_count,
            positive = summary.positive_count,
            negative = summary.negative_count,
            min = summary.min,
            max = summary.max,
            mean = summary.mean,
            pattern = self.active_label.map_or("manual", |l| l.as_str()),
            guess = summary.predicted_label_guess.as_str(),
            "submitting emotion analysis"
        );

        let future = self.submitter.submit_values(snapshot.clone());
        self.in_flight = Some(AnalysisSession {
            id,
            started_at: Utc::now(),
            label: self.active_label,
            snapshot,
            summary,
        });
        self.transition(SessionStatus::AwaitingResult);
        self.notifier
            .notify("Analyzing neural patterns...", Severity::Info, ANALYZING_NOTICE);

        Ok(PendingSubmission { id, future })
    }

    /// Report the collaborator's answer and return to `Idle`.
    pub fn finish_submit(
        &mut self,
        outcome: SubmissionOutcome,
    ) -> Result<SubmissionSummary, FormError> {
        match &self.in_flight {
            Some(analysis) if analysis.id == outcome.id => {}
            _ => {
                tracing::debug!(id = %outcome.id, "ignoring result of abandoned analysis");
                return Err(FormError::StaleSubmission);
            }
        }

        let analysis = self.in_flight.take();
        self.transition(SessionStatus::Idle);

        match outcome.result {
            Ok(result) => {
                tracing::info!(
                    id = %outcome.id,
                    emotion = %result.emotion,
                    confidence = ?result.confidence,
                    elapsed_ms = analysis
                        .map(|a| (Utc::now() - a.started_at).num_milliseconds())
                        .unwrap_or_default(),
                    "analysis complete"
                );
                self.notify(&result.headline(), Severity::Success);
                self.last_result = Some(result.clone());
                Ok(result)
            }
            Err(e) => {
                let err = FormError::from(e);
                tracing::error!(id = %outcome.id, "analysis failed: {}", err);
                self.notify(&err.to_string(), Severity::Error);
                Err(err)
            }
        }
    }

    /// Drop the outstanding submission, if any, and return to `Idle`.
    /// A late answer for it is refused by `finish_submit`.
    pub fn abandon_submit(&mut self) -> Option<AnalysisSession> {
        let abandoned = self.in_flight.take();
        if let Some(analysis) = &abandoned {
            tracing::debug!(id = %analysis.id, "analysis abandoned");
        }
        self.transition(SessionStatus::Idle);
        abandoned
    }

    /// Validate, submit and wait for the answer.
    ///
    /// Cancel-safe: dropping the returned future before the answer arrives
    /// abandons the submission and leaves the session `Idle`.
    pub async fn submit(&mut self) -> Result<SubmissionSummary, FormError> {
        let pending = self.begin_submit()?;
        let guard = AbandonOnDrop {
            session: self,
            armed: true,
        };
        let outcome = pending.wait().await;
        guard.finish(outcome)
    }

    fn values(&self) -> Vec<f64> {
        self.slots.iter().map(FeatureSlot::value).collect()
    }

    fn transition(&mut self, next: SessionStatus) {
        if self.status != next {
            tracing::debug!(from = ?self.status, to = ?next, "session status");
            self.status = next;
        }
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.notifier.notify(message, severity, self.notify_duration);
    }
}

/// Abandons the in-flight submission unless an outcome was delivered.
struct AbandonOnDrop<'a> {
    session: &'a mut FormSession,
    armed: bool,
}

impl AbandonOnDrop<'_> {
    fn finish(mut self, outcome: SubmissionOutcome) -> Result<SubmissionSummary, FormError> {
        self.armed = false;
        self.session.finish_submit(outcome)
    }
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("submission cancelled before an answer arrived");
            self.session.abandon_submit();
        }
    }
}
