mod registry;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use graphseed_core::{Error as CoreError, MODEL_VERSION, TypeModel, model_json_schema};
use graphseed_import::{
    ImportError, ImportReport, Importer, MemoryStore, RecordSource, discover_sources,
    export_memory_store,
};
use graphseed_plan::{
    ImportPlan, PlanError, ValidationIssue, ValidationReport, load_plan_value,
    plan_json_schema, validate_plan,
};
use registry::{
    RunContext, RunOptions, init_console_logging, init_run_logging, start_run, write_report,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("model error: {0}")]
    Core(#[from] CoreError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plan validation failed with {0} error(s)")]
    InvalidPlan(usize),
}

#[derive(Parser, Debug)]
#[command(name = "graphseed", version, about = "Hierarchical record importer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every `*.csv` file of a directory.
    Import(ImportArgs),
    /// Validate a plan against a model.
    Validate(ValidateArgs),
    /// Print a JSON Schema.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Type model (model.json).
    #[arg(long)]
    model: PathBuf,
    /// Import plan (.json or .toml).
    #[arg(long)]
    plan: Option<PathBuf>,
    /// Directory holding one `<Type>.csv` per source.
    #[arg(long)]
    data: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Override the plan's flush interval.
    #[arg(long)]
    flush_interval: Option<usize>,
    /// Skip writing imported rows as CSV.
    #[arg(long, default_value_t = false)]
    no_export: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    model: PathBuf,
    #[arg(long)]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[arg(value_enum)]
    target: SchemaTarget,
    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaTarget {
    Plan,
    Model,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Import(args) => run_import(args),
        Command::Validate(args) => {
            init_console_logging()?;
            run_validate(args)
        }
        Command::Schema(args) => run_schema(args),
    }
}

fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let model = TypeModel::from_path(&args.model)?;
    let (plan, warnings) = match &args.plan {
        Some(path) => load_validated_plan(path, &model)?,
        None => (ImportPlan::default(), Vec::new()),
    };

    let mut importer_options = graphseed_import::ImportOptions::default();
    if let Some(flush_interval) = args.flush_interval.or(plan.flush_interval) {
        importer_options.flush_interval = flush_interval;
    }

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        model_version: MODEL_VERSION.to_string(),
        run_dir: args.run_dir,
        model_path: args.model,
        plan_path: args.plan,
        data_dir: args.data,
        options: RunOptions {
            flush_interval: importer_options.flush_interval,
            export: !args.no_export,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, run_root = %run_paths.run_root.display());
    for issue in &warnings {
        tracing::warn!(event = "plan_warning", code = %issue.code, path = %issue.path, message = %issue.message);
    }

    let timer = Instant::now();
    let mut report = ImportReport::new(run_id);
    let export_dir = run_ctx.options.export.then_some(run_paths.export_dir.as_path());
    let outcome = execute(
        &model,
        &plan,
        importer_options,
        &run_ctx.data_dir,
        export_dir,
        &mut report,
    );

    report.duration_ms = timer.elapsed().as_millis() as u64;
    if let Err(err) = &outcome {
        report.error = Some(err.to_string());
        tracing::error!(event = "run_finished", status = "failed", error = %err);
    } else {
        tracing::info!(
            event = "run_finished",
            status = "success",
            records = report.records_total,
            duration_ms = report.duration_ms
        );
    }

    write_report(&run_paths, &report)?;
    println!("run_dir={}", run_paths.run_root.display());
    outcome.map_err(CliError::from)
}

fn execute(
    model: &TypeModel,
    plan: &ImportPlan,
    options: graphseed_import::ImportOptions,
    data_dir: &Path,
    export_dir: Option<&Path>,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    let mut importer =
        Importer::new(model, plan, MemoryStore::new(model)).with_options(options);
    for source in discover_sources(data_dir)? {
        tracing::info!(
            event = "source_registered",
            type_name = %source.target_type_name(),
            fields = source.field_names().len()
        );
        importer.register(source)?;
    }

    let outcome = importer.generate_all().map(|_| ());
    report.record_ledger(importer.ledger());
    let store = importer.into_store();
    report.saves = store.saves();
    report.flushes = store.flushes();
    outcome?;

    if let Some(dir) = export_dir {
        for export in export_memory_store(&store, dir)? {
            tracing::info!(
                event = "type_exported",
                type_name = %export.type_name,
                rows = export.rows,
                path = %export.path.display()
            );
            report.bytes_written += export.bytes;
        }
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    let model = TypeModel::from_path(&args.model)?;
    let (_, warnings) = load_validated_plan(&args.plan, &model)?;

    if warnings.is_empty() {
        println!("plan validated successfully");
    } else {
        eprintln!("plan validated with warnings:");
        print_issues(&warnings);
    }
    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = match args.target {
        SchemaTarget::Plan => serde_json::to_string_pretty(&plan_json_schema())?,
        SchemaTarget::Model => serde_json::to_string_pretty(&model_json_schema())?,
    };

    match args.out {
        Some(path) => std::fs::write(path, schema)?,
        None => println!("{schema}"),
    }
    Ok(())
}

/// Structural and semantic validation; errors are printed and fail the
/// command.
fn load_validated_plan(
    path: &Path,
    model: &TypeModel,
) -> Result<(ImportPlan, Vec<ValidationIssue>), CliError> {
    let plan_json = load_plan_value(path)?;
    let plan_schema = serde_json::to_value(plan_json_schema())?;

    match validate_plan(&plan_json, &plan_schema, model) {
        Ok(validated) => Ok((validated.plan, validated.warnings)),
        Err(report) => {
            eprintln!("plan validation failed");
            print_report(&report);
            Err(CliError::InvalidPlan(report.errors.len()))
        }
    }
}

fn print_report(report: &ValidationReport) {
    print_issues(&report.errors);
    print_issues(&report.warnings);
}

fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        eprintln!("{:?} {} {}: {}", issue.severity, issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}
