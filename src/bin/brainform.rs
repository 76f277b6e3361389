//! Brainform CLI - command-line driver for the brain emotion detection form
//!
//! Commands:
//! - fill: Generate synthetic feature values for an emotion pattern
//! - summary: Client-side statistics and label guess for a value set
//! - validate: Check form input the way the form does before submitting
//! - submit: Fill (or load) the form and send it for prediction
//! - upload: Send a CSV file for batch scoring
//! - run: Read form commands from stdin, one per line
//! - schema: Print the feature schema
//! - doctor: Diagnose configuration and server health

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use brainform::patterns::RngSource;
use brainform::{
    compute_summary, upload_csv, CsvUpload, EmotionLabel, FeatureSchema, FormCommand, FormConfig,
    FormError, FormSession, HttpSubmitter, PatternTable, SchemaKind, TracingNotifier,
    BRAINFORM_VERSION,
};

/// Brainform - test-pattern synthesis and submission for the emotion form
#[derive(Parser)]
#[command(name = "brainform")]
#[command(version = BRAINFORM_VERSION)]
#[command(about = "Fill, validate and submit the brain emotion detection form", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic feature values for an emotion pattern
    Fill {
        /// Emotion pattern (positive, negative, neutral, random, smart-random, ...)
        #[arg(short, long)]
        label: EmotionLabel,

        /// Seed for reproducible values
        #[arg(long)]
        seed: Option<u64>,

        /// Number of records to generate
        #[arg(long, default_value = "1")]
        rows: usize,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Client-side statistics and label guess for a value set
    Summary {
        /// JSON array of numbers or object of name -> number (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check form input the way the form does before submitting
    Validate {
        /// JSON object of slot -> input text (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fill (or load) the form and send it for prediction
    Submit {
        /// Emotion pattern used to fill the form
        #[arg(short, long, conflicts_with = "input")]
        label: Option<EmotionLabel>,

        /// JSON object of slot -> input text (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Seed for reproducible values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Send a CSV file for batch scoring
    Upload {
        /// CSV file to upload
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Read form commands from stdin, one per line
    Run {
        /// Seed for reproducible values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the feature schema
    Schema {
        /// Schema to print (defaults to the configured one)
        #[arg(value_enum)]
        kind: Option<SchemaArg>,

        /// Print the range table instead of the feature list
        #[arg(long)]
        ranges: bool,
    },

    /// Diagnose configuration and server health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One JSON object of name -> value per record
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// CSV with a header row, ready for batch upload
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaArg {
    Positional,
    Named,
}

impl From<SchemaArg> for SchemaKind {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Positional => SchemaKind::Positional,
            SchemaArg::Named => SchemaKind::Named,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brainform=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BrainformCliError> {
    let config = match &cli.config {
        Some(path) => FormConfig::load(path)?,
        None => FormConfig::default(),
    };

    match cli.command {
        Commands::Fill {
            label,
            seed,
            rows,
            output,
            output_format,
        } => cmd_fill(&config, label, seed, rows, &output, output_format),

        Commands::Summary { input, json } => cmd_summary(&input, json),

        Commands::Validate { input, json } => cmd_validate(&config, &input, json),

        Commands::Submit { label, input, seed } => {
            cmd_submit(&config, label, input.as_deref(), seed)
        }

        Commands::Upload { file } => cmd_upload(&config, &file),

        Commands::Run { seed } => cmd_run(&config, seed),

        Commands::Schema { kind, ranges } => cmd_schema(&config, kind, ranges),

        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

fn build_session(config: &FormConfig, seed: Option<u64>) -> Result<FormSession, BrainformCliError> {
    let submitter = HttpSubmitter::new(
        &config.endpoint,
        &config.batch_path,
        config.request_timeout(),
    )?;
    let session = FormSession::from_config(config, Arc::new(TracingNotifier), Arc::new(submitter));

    Ok(match seed {
        Some(seed) => session.with_random_source(RngSource::seeded(seed)),
        None => session,
    })
}

fn runtime() -> Result<tokio::runtime::Runtime, BrainformCliError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn cmd_fill(
    config: &FormConfig,
    label: EmotionLabel,
    seed: Option<u64>,
    rows: usize,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), BrainformCliError> {
    let mut session = build_session(config, seed)?;
    let mut records = Vec::with_capacity(rows);

    for _ in 0..rows {
        session.fill_all(label);
        records.push(session.snapshot());
    }

    let output_data = match output_format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let objects: Vec<serde_json::Map<String, Value>> = records
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .map(|fv| (fv.name.clone(), Value::from(fv.value)))
                        .collect()
                })
                .collect();
            let value = if objects.len() == 1 {
                Value::Object(objects.into_iter().next().unwrap_or_default())
            } else {
                Value::Array(objects.into_iter().map(Value::Object).collect())
            };
            if matches!(output_format, OutputFormat::JsonPretty) {
                serde_json::to_string_pretty(&value)? + "\n"
            } else {
                serde_json::to_string(&value)? + "\n"
            }
        }
        OutputFormat::Csv => {
            let mut lines: Vec<String> = Vec::new();
            lines.push(
                session
                    .schema()
                    .keys()
                    .iter()
                    .map(|k| k.wire_name())
                    .collect::<Vec<_>>()
                    .join(","),
            );
            for record in &records {
                lines.push(
                    record
                        .iter()
                        .map(|fv| format!("{:.2}", fv.value))
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
            lines.join("\n") + "\n"
        }
    };

    write_output(output, &output_data)
}

fn cmd_summary(input: &Path, json: bool) -> Result<(), BrainformCliError> {
    let value: Value = serde_json::from_str(&read_input(input)?)?;

    let values: Vec<f64> = match &value {
        Value::Array(items) => items.iter().map(number_of).collect::<Result<_, _>>()?,
        Value::Object(map) => map.values().map(number_of).collect::<Result<_, _>>()?,
        _ => {
            return Err(BrainformCliError::ParseError(
                "expected a JSON array or object of numbers".to_string(),
            ))
        }
    };

    let summary = compute_summary(&values);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Features: {}", summary.count);
        println!("Range:    {:.2} to {:.2}", summary.min, summary.max);
        println!("Mean:     {:.2}", summary.mean);
        println!("Median:   {:.2}", summary.median);
        println!(
            "Signs:    {} positive, {} negative, {} zero",
            summary.positive_count, summary.negative_count, summary.zero_count
        );
        println!("Guess:    {}", summary.predicted_label_guess.as_str());
    }

    Ok(())
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    filled: usize,
    invalid_slots: Vec<String>,
    message: Option<String>,
}

fn cmd_validate(config: &FormConfig, input: &Path, json: bool) -> Result<(), BrainformCliError> {
    let mut session = build_session(config, None)?;
    let invalid_slots = load_form_input(&mut session, input)?;

    let result = session.validate_all();
    let report = ValidationReport {
        valid: result.is_ok(),
        filled: result.as_ref().copied().unwrap_or(0),
        invalid_slots,
        message: result.as_ref().err().map(|e| e.to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.valid {
        println!("[OK] {} filled values, form can be submitted", report.filled);
    } else {
        println!("[ERR] {}", report.message.as_deref().unwrap_or("invalid form"));
        for slot in &report.invalid_slots {
            println!("  invalid: {}", slot);
        }
    }

    match result {
        Ok(_) => Ok(()),
        Err(FormError::InvalidValues(count)) => Err(BrainformCliError::ValidationFailed(count)),
        Err(e) => Err(e.into()),
    }
}

fn cmd_submit(
    config: &FormConfig,
    label: Option<EmotionLabel>,
    input: Option<&Path>,
    seed: Option<u64>,
) -> Result<(), BrainformCliError> {
    let mut session = build_session(config, seed)?;

    match (label, input) {
        (Some(label), _) => {
            session.fill_all(label);
        }
        (None, Some(path)) => {
            load_form_input(&mut session, path)?;
        }
        (None, None) => return Err(BrainformCliError::NothingToSubmit),
    }

    let summary = runtime()?.block_on(session.submit())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_upload(config: &FormConfig, file: &Path) -> Result<(), BrainformCliError> {
    let submitter = HttpSubmitter::new(
        &config.endpoint,
        &config.batch_path,
        config.request_timeout(),
    )?;
    let upload = CsvUpload::from_path(file)?;

    let summary = runtime()?.block_on(upload_csv(
        &submitter,
        &TracingNotifier,
        upload,
        config.max_upload_bytes,
    ))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_run(config: &FormConfig, seed: Option<u64>) -> Result<(), BrainformCliError> {
    let mut session = build_session(config, seed)?;
    let rt = runtime()?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let response = match trimmed.parse::<FormCommand>() {
            Ok(command) => match rt.block_on(session.dispatch(command)) {
                Ok(outcome) => serde_json::to_value(&outcome)?,
                Err(e) => error_line(&e),
            },
            Err(e) => error_line(&e),
        };

        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn error_line(e: &FormError) -> Value {
    serde_json::json!({ "outcome": "error", "message": e.to_string() })
}

fn cmd_schema(
    config: &FormConfig,
    kind: Option<SchemaArg>,
    ranges: bool,
) -> Result<(), BrainformCliError> {
    let kind = kind.map(SchemaKind::from).unwrap_or(config.schema);

    if ranges {
        let table = if kind == config.schema {
            config.pattern_table()
        } else {
            PatternTable::for_kind(kind)
        };
        println!("{}", table.to_json()?);
        return Ok(());
    }

    let schema = FeatureSchema::for_kind(kind);
    println!("Feature schema: {:?} ({} features)", kind, schema.len());
    println!();
    for (pos, key) in schema.keys().iter().enumerate() {
        match schema.description(pos) {
            Some(desc) => println!("  {:>2}  {:<14} {}", pos, key.wire_name(), desc),
            None => println!("  {:>2}  {}", pos, key.wire_name()),
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    endpoint: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

fn cmd_doctor(
    config: &FormConfig,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), BrainformCliError> {
    let mut checks = Vec::new();

    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: match config_path {
            Some(path) => format!("Loaded {}", path.display()),
            None => "Using built-in defaults".to_string(),
        },
    });

    let schema = config.feature_schema();
    checks.push(if schema.len() == brainform::FEATURE_COUNT {
        DoctorCheck {
            name: "schema".to_string(),
            status: CheckStatus::Ok,
            message: format!("{:?} schema with {} features", schema.kind(), schema.len()),
        }
    } else {
        DoctorCheck {
            name: "schema".to_string(),
            status: CheckStatus::Error,
            message: format!(
                "Schema has {} features, the model expects {}",
                schema.len(),
                brainform::FEATURE_COUNT
            ),
        }
    });

    let table = config.pattern_table();
    checks.push(DoctorCheck {
        name: "patterns".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} prefix rules, {} custom table",
            table.rules.len(),
            if config.patterns.is_some() { "using" } else { "no" }
        ),
    });

    let submitter = HttpSubmitter::new(
        &config.endpoint,
        &config.batch_path,
        config.request_timeout(),
    )?;
    let health = runtime()?.block_on(submitter.health());
    checks.push(match health {
        Ok(report) if report.is_healthy() => DoctorCheck {
            name: "server".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Healthy, model {}",
                report.model_type.as_deref().unwrap_or("unknown")
            ),
        },
        Ok(report) => DoctorCheck {
            name: "server".to_string(),
            status: CheckStatus::Error,
            message: format!("Server reports '{}', model loaded: {}", report.status, report.model_loaded),
        },
        Err(e) => DoctorCheck {
            name: "server".to_string(),
            status: CheckStatus::Warning,
            message: format!("Health check failed: {}", e),
        },
    });

    // stdin check for `run`
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "stdin is a TTY (interactive mode)".to_string()
        } else {
            "stdin is a pipe (command stream ready)".to_string()
        },
    });

    let report = DoctorReport {
        version: BRAINFORM_VERSION.to_string(),
        endpoint: config.endpoint.clone(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Brainform Doctor Report");
        println!("=======================");
        println!("Version:  {}", report.version);
        println!("Endpoint: {}", report.endpoint);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BrainformCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, BrainformCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), BrainformCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn number_of(value: &Value) -> Result<f64, BrainformCliError> {
    value
        .as_f64()
        .ok_or_else(|| BrainformCliError::ParseError(format!("not a number: {}", value)))
}

/// Apply a JSON object of slot -> input to the session. Returns the slots
/// whose input was rejected.
fn load_form_input(session: &mut FormSession, input: &Path) -> Result<Vec<String>, BrainformCliError> {
    let value: Value = serde_json::from_str(&read_input(input)?)?;
    let map = value.as_object().ok_or_else(|| {
        BrainformCliError::ParseError("expected a JSON object of slot -> value".to_string())
    })?;

    let mut invalid = Vec::new();
    for (slot, raw) in map {
        let text = match raw {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        if !session.validate_slot(slot, &text)? {
            invalid.push(slot.clone());
        }
    }
    Ok(invalid)
}

// Error handling

#[derive(Debug)]
enum BrainformCliError {
    Io(io::Error),
    Form(FormError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    NothingToSubmit,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BrainformCliError {
    fn from(e: io::Error) -> Self {
        BrainformCliError::Io(e)
    }
}

impl From<FormError> for BrainformCliError {
    fn from(e: FormError) -> Self {
        BrainformCliError::Form(e)
    }
}

impl From<serde_json::Error> for BrainformCliError {
    fn from(e: serde_json::Error) -> Self {
        BrainformCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BrainformCliError> for CliError {
    fn from(e: BrainformCliError) -> Self {
        match e {
            BrainformCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BrainformCliError::Form(e) => {
                let (code, hint) = match &e {
                    FormError::NoValues | FormError::InvalidValues(_) => (
                        "VALIDATION_ERROR",
                        "Run 'brainform validate' for details",
                    ),
                    FormError::Transport(_) => (
                        "TRANSPORT_ERROR",
                        "Check that the prediction server is running ('brainform doctor')",
                    ),
                    FormError::Application(_) => {
                        ("SERVER_ERROR", "The server rejected the request")
                    }
                    FormError::UploadRejected(_) => {
                        ("UPLOAD_REJECTED", "Upload a .csv file within the size limit")
                    }
                    FormError::Config(_) | FormError::InvalidRange { .. } => {
                        ("CONFIG_ERROR", "Check the configuration file")
                    }
                    _ => ("FORM_ERROR", "See the message for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            BrainformCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BrainformCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} invalid values detected", count),
                hint: Some("Fix the listed slots and retry".to_string()),
            },
            BrainformCliError::NothingToSubmit => CliError {
                code: "NOTHING_TO_SUBMIT".to_string(),
                message: "No values to submit".to_string(),
                hint: Some("Pass --label to fill a pattern or --input with form values".to_string()),
            },
            BrainformCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor output above".to_string()),
            },
            BrainformCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: None,
            },
        }
    }
}
