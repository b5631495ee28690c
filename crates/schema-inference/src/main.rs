//! CLI entry point (§2.1, §6): `profile`, `generate`, and `run` subcommands,
//! wired the way `connector_proxy`'s `main.rs` wires its subcommands —
//! `clap` derive parsing, a flattened `LogArgs`, and a fatal error mapped to
//! a process exit code rather than a panic.

use clap::{Parser, Subcommand, ValueEnum};
use schema_inference::emit::EmitFormat;
use schema_inference::error::Error;
use schema_inference::generate::GenerateConfig;
use schema_inference::logging::{init_logging, LogArgs};
use schema_inference::source::DocumentSource;
use schema_inference::{artifacts, config::Config, pipeline, validate};
use std::path::PathBuf;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(about = "Profiles a document collection and synthesizes representative sample data.")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    log_args: LogArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profiles an NDJSON document stream and writes the three artifacts
    /// of §6 (`inferred.schema.json`, `generation.schema.json`,
    /// `constraints.json`) to `--out`.
    Profile {
        /// NDJSON input; reads stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
        /// JSON/YAML run configuration; uses every default from §6 when
        /// omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "./artifacts")]
        out: PathBuf,
    },
    /// Generates synthetic documents from a previously synthesized
    /// generation schema.
    Generate {
        /// Path to a `generation.schema.json` artifact.
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        count: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value = "_id")]
        key_field: String,
        #[arg(long, default_value_t = 1)]
        workers: usize,
        #[arg(long, value_enum, default_value_t = CliEmitFormat::Ndjson)]
        format: CliEmitFormat,
        /// Writes to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Validates every generated document against `schema` before
        /// emitting it (§4.9); a schema violation exits with code 4.
        #[arg(long)]
        validate: bool,
    },
    /// Profiles `--input` and immediately generates `--count` documents
    /// from the resulting schema, end to end.
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "./artifacts")]
        out: PathBuf,
        #[arg(long)]
        count: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 1)]
        workers: usize,
        #[arg(long, value_enum, default_value_t = CliEmitFormat::Ndjson)]
        format: CliEmitFormat,
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEmitFormat {
    Ndjson,
    JsonArray,
}

impl std::fmt::Display for CliEmitFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CliEmitFormat::Ndjson => "ndjson",
            CliEmitFormat::JsonArray => "json-array",
        };
        f.write_str(s)
    }
}

impl From<CliEmitFormat> for EmitFormat {
    fn from(value: CliEmitFormat) -> Self {
        match value {
            CliEmitFormat::Ndjson => EmitFormat::Ndjson,
            CliEmitFormat::JsonArray => EmitFormat::JsonArray,
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_args);

    tokio::task::spawn(signal_handler());

    if let Err(err) = async_main(args.command).await {
        tracing::error!(error = %err, "schema-inference run failed");
        std::process::exit(err.exit_code());
    }
    Ok(())
}

async fn signal_handler() {
    if let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    } else {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::warn!("received shutdown signal");
    std::process::exit(130);
}

async fn async_main(command: Command) -> Result<(), Error> {
    match command {
        Command::Profile { input, config, out } => run_profile_command(input, config, out).await,
        Command::Generate {
            schema,
            count,
            seed,
            key_field,
            workers,
            format,
            out,
            validate,
        } => run_generate_command(schema, count, seed, key_field, workers, format, out, validate).await,
        Command::Run {
            input,
            config,
            out,
            count,
            seed,
            workers,
            format,
            validate,
        } => run_end_to_end(input, config, out, count, seed, workers, format, validate).await,
    }
}

async fn load_config(path: Option<PathBuf>) -> Result<Config, Error> {
    let config = match path {
        Some(p) => Config::from_file(&p)?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

async fn open_source(
    input: Option<PathBuf>,
) -> Result<DocumentSource<BufReader<Box<dyn tokio::io::AsyncRead + Unpin + Send>>>, Error> {
    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match input {
        Some(path) => Box::new(tokio::fs::File::open(&path).await.map_err(|e| {
            Error::Source(format!("failed to open {}: {e}", path.display()))
        })?),
        None => Box::new(tokio::io::stdin()),
    };
    Ok(DocumentSource::ndjson(BufReader::new(reader)))
}

async fn run_profile_command(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    out: PathBuf,
) -> Result<(), Error> {
    let config = load_config(config_path).await?;
    let source = open_source(input).await?;
    let (_tx, rx) = pipeline::cancellation();
    let outcome = pipeline::run_profile(source, &config, rx).await?;

    tokio::fs::create_dir_all(&out).await?;
    let paths = artifacts::ArtifactPaths::in_dir(&out);
    let inferred_json = artifacts::inferred_schema_to_json(&outcome.inferred_schema);
    let constraints_json = artifacts::constraints_profile_to_json(
        &outcome.constraints_profile,
        config.profiler.size_proxy.into(),
        &config.key_field,
    );
    artifacts::write_pretty(&paths.inferred_schema, &inferred_json)?;
    artifacts::write_pretty(&paths.generation_schema, &outcome.generation_schema)?;
    artifacts::write_pretty(&paths.constraints, &constraints_json)?;

    for warning in &outcome.report.warnings {
        tracing::warn!(%warning, "profile run warning");
    }
    tracing::info!(
        docs = outcome.inferred_schema.total_docs,
        out = %out.display(),
        "profile complete"
    );
    Ok(())
}

async fn run_generate_command(
    schema_path: PathBuf,
    count: usize,
    seed: u64,
    key_field: String,
    workers: usize,
    format: CliEmitFormat,
    out: Option<PathBuf>,
    validate_output: bool,
) -> Result<(), Error> {
    let schema = artifacts::read_json(&schema_path)?;
    let config = GenerateConfig { seed, key_field: key_field.clone() };
    let (_tx, rx) = pipeline::cancellation();
    let (docs, report) = pipeline::run_generate(schema.clone(), count, config, workers, rx).await;
    for warning in &report.warnings {
        tracing::warn!(%warning, "generate run warning");
    }

    if validate_output {
        let mut validator = validate::Validator::compile(&schema, key_field.as_str())?;
        for doc in &docs {
            let outcome = validator.validate_one(doc);
            if !outcome.is_valid() {
                return Err(Error::Validation(format!(
                    "generated document failed schema validation: {:?}",
                    outcome.schema_errors
                )));
            }
        }
    }

    write_documents(docs, out, format.into()).await
}

async fn write_documents(
    docs: Vec<serde_json::Value>,
    out: Option<PathBuf>,
    format: EmitFormat,
) -> Result<(), Error> {
    match out {
        Some(path) => {
            let file = tokio::fs::File::create(&path).await?;
            pipeline::emit_documents(&docs, file, format).await?;
        }
        None => {
            pipeline::emit_documents(&docs, tokio::io::stdout(), format).await?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_end_to_end(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    out: PathBuf,
    count: usize,
    seed: u64,
    workers: usize,
    format: CliEmitFormat,
    validate_output: bool,
) -> Result<(), Error> {
    let config = load_config(config_path).await?;
    let source = open_source(input).await?;
    let (_tx, rx) = pipeline::cancellation();
    let outcome = pipeline::run_profile(source, &config, rx.clone()).await?;

    tokio::fs::create_dir_all(&out).await?;
    let paths = artifacts::ArtifactPaths::in_dir(&out);
    let inferred_json = artifacts::inferred_schema_to_json(&outcome.inferred_schema);
    let constraints_json = artifacts::constraints_profile_to_json(
        &outcome.constraints_profile,
        config.profiler.size_proxy.into(),
        &config.key_field,
    );
    artifacts::write_pretty(&paths.inferred_schema, &inferred_json)?;
    artifacts::write_pretty(&paths.generation_schema, &outcome.generation_schema)?;
    artifacts::write_pretty(&paths.constraints, &constraints_json)?;

    let gen_config = GenerateConfig { seed, key_field: config.key_field.clone() };
    let (docs, report) =
        pipeline::run_generate(outcome.generation_schema.clone(), count, gen_config, workers, rx).await;
    for warning in report.warnings.iter().chain(outcome.report.warnings.iter()) {
        tracing::warn!(%warning, "run warning");
    }

    if validate_output {
        let mut validator =
            validate::Validator::compile(&outcome.generation_schema, config.key_field.as_str())?;
        for doc in &docs {
            let result = validator.validate_one(doc);
            if !result.is_valid() {
                return Err(Error::Validation(format!(
                    "generated document failed schema validation: {:?}",
                    result.schema_errors
                )));
            }
        }
    }

    let docs_path = out.join(match format {
        CliEmitFormat::Ndjson => "sample.ndjson",
        CliEmitFormat::JsonArray => "sample.json",
    });
    let file = tokio::fs::File::create(&docs_path).await?;
    pipeline::emit_documents(&docs, file, format.into()).await?;
    tracing::info!(count = docs.len(), out = %docs_path.display(), "run complete");
    Ok(())
}
