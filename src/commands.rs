//! Explicit command dispatch
//!
//! Every user action maps to one [`FormCommand`], and every command to
//! exactly one [`FormSession`] method. Drivers (the CLI's line mode, a UI
//! event loop) translate their input into commands instead of calling
//! session internals.

use serde::Serialize;
use std::str::FromStr;

use crate::error::FormError;
use crate::session::{FillReport, FormSession};
use crate::summary::ValueSummary;
use crate::types::{EmotionLabel, SubmissionSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum FormCommand {
    Fill(EmotionLabel),
    Clear,
    Edit { slot: String, input: String },
    Validate,
    Submit,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Filled(FillReport),
    Cleared,
    Edited { slot: String, valid: bool },
    Validated { filled: usize },
    Submitted(SubmissionSummary),
    Summary(ValueSummary),
}

impl FromStr for FormCommand {
    type Err = FormError;

    /// Parse one command line: `fill <label>`, `clear`, `set <slot> [value]`,
    /// `validate`, `submit` or `summary`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| FormError::UnknownCommand(String::new()))?
            .to_ascii_lowercase();

        let command = match verb.as_str() {
            "fill" => {
                let label = parts
                    .next()
                    .ok_or_else(|| FormError::UnknownCommand("fill needs a label".to_string()))?;
                FormCommand::Fill(label.parse()?)
            }
            "clear" => FormCommand::Clear,
            "set" => {
                let slot = parts
                    .next()
                    .ok_or_else(|| FormError::UnknownCommand("set needs a slot".to_string()))?
                    .to_string();
                let input = parts.collect::<Vec<_>>().join(" ");
                return Ok(FormCommand::Edit { slot, input });
            }
            "validate" => FormCommand::Validate,
            "submit" | "analyze" => FormCommand::Submit,
            "summary" | "stats" => FormCommand::Summary,
            _ => return Err(FormError::UnknownCommand(line.trim().to_string())),
        };

        if let Some(extra) = parts.next() {
            return Err(FormError::UnknownCommand(format!(
                "unexpected argument '{}' in '{}'",
                extra,
                line.trim()
            )));
        }
        Ok(command)
    }
}

impl FormSession {
    /// Run one command against the session.
    pub async fn dispatch(&mut self, command: FormCommand) -> Result<CommandOutcome, FormError> {
        tracing::debug!(?command, "dispatch");
        match command {
            FormCommand::Fill(label) => Ok(CommandOutcome::Filled(self.fill_all(label))),
            FormCommand::Clear => {
                self.clear_all();
                Ok(CommandOutcome::Cleared)
            }
            FormCommand::Edit { slot, input } => {
                let valid = self.validate_slot(&slot, &input)?;
                Ok(CommandOutcome::Edited { slot, valid })
            }
            FormCommand::Validate => {
                let filled = self.validate_all()?;
                Ok(CommandOutcome::Validated { filled })
            }
            FormCommand::Submit => self.submit().await.map(CommandOutcome::Submitted),
            FormCommand::Summary => Ok(CommandOutcome::Summary(self.summary())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::notify::MemoryNotifier;
    use crate::patterns::{PatternGenerator, RngSource};
    use crate::schema::FeatureSchema;
    use crate::submit::{BatchFuture, SubmissionFuture, Submitter};
    use crate::types::FeatureValue;
    use crate::upload::CsvUpload;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Neutral;

    impl Submitter for Neutral {
        fn submit_values(&self, _values: Vec<FeatureValue>) -> SubmissionFuture {
            Box::pin(async { Ok(SubmissionSummary::from_class(1, vec![0.2, 0.6, 0.2])) })
        }

        fn submit_batch(&self, _upload: CsvUpload) -> BatchFuture {
            Box::pin(async { Err(SubmissionError::Transport("offline".to_string())) })
        }
    }

    fn session() -> FormSession {
        FormSession::new(
            FeatureSchema::positional(),
            PatternGenerator::default(),
            Arc::new(MemoryNotifier::new()),
            Arc::new(Neutral),
        )
        .with_random_source(RngSource::seeded(3))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "fill positive".parse::<FormCommand>().unwrap(),
            FormCommand::Fill(EmotionLabel::Positive)
        );
        assert_eq!(
            "FILL smart_random".parse::<FormCommand>().unwrap(),
            FormCommand::Fill(EmotionLabel::SmartRandom)
        );
        assert_eq!("clear".parse::<FormCommand>().unwrap(), FormCommand::Clear);
        assert_eq!(
            "set f3 -1.25".parse::<FormCommand>().unwrap(),
            FormCommand::Edit {
                slot: "f3".to_string(),
                input: "-1.25".to_string(),
            }
        );
        assert_eq!(
            "set mean_0_a".parse::<FormCommand>().unwrap(),
            FormCommand::Edit {
                slot: "mean_0_a".to_string(),
                input: String::new(),
            }
        );
        assert_eq!("analyze".parse::<FormCommand>().unwrap(), FormCommand::Submit);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("".parse::<FormCommand>(), Err(FormError::UnknownCommand(_))));
        assert!(matches!("jump".parse::<FormCommand>(), Err(FormError::UnknownCommand(_))));
        assert!("fill".parse::<FormCommand>().is_err());
        assert!("fill happy".parse::<FormCommand>().is_err());
        assert!("clear now".parse::<FormCommand>().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_runs_one_method_per_command() {
        let mut session = session();

        let filled = session
            .dispatch(FormCommand::Fill(EmotionLabel::ExtremeNegative))
            .await
            .unwrap();
        assert!(matches!(filled, CommandOutcome::Filled(ref r) if r.filled == 45));

        let edited = session
            .dispatch("set f0 oops".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(
            edited,
            CommandOutcome::Edited {
                slot: "f0".to_string(),
                valid: false,
            }
        );

        let invalid = session.dispatch(FormCommand::Validate).await;
        assert!(matches!(invalid, Err(FormError::InvalidValues(1))));

        session.dispatch(FormCommand::Clear).await.unwrap();
        let validated = session.dispatch(FormCommand::Validate).await.unwrap();
        assert_eq!(validated, CommandOutcome::Validated { filled: 45 });

        let submitted = session.dispatch(FormCommand::Submit).await.unwrap();
        match submitted {
            CommandOutcome::Submitted(summary) => assert_eq!(summary.emotion, "NEUTRAL"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        match session.dispatch(FormCommand::Summary).await.unwrap() {
            CommandOutcome::Summary(summary) => assert_eq!(summary.zero_count, 45),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(CommandOutcome::Validated { filled: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "validated", "filled": 3}));
    }
}
