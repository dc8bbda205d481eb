use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::{Table, Tabled, settings::Style};
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobboard_schema::{
    BootstrapConfig, Bootstrapper, Catalog, DriftDetector, DriftPolicy, Error, MigrationState,
    Mode, PlanDecision, SqliteCatalog, format_ddl_diff, has_changes,
};
use jobboard_schema::bootstrap::open_existing;

#[derive(Parser)]
#[command(name = "jobboard-schema")]
#[command(about = "Verify and repair the job board database schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, env = "JOBBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Primary storage directory
    #[arg(short, long, env = "JOBBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Secondary storage directory used when the primary cannot be created
    #[arg(long, env = "JOBBOARD_FALLBACK_DIR")]
    fallback_dir: Option<PathBuf>,

    /// Process mode (development or production)
    #[arg(short, long, env = "JOBBOARD_ENV")]
    mode: Option<Mode>,

    /// What to do with drifted tables (rebuild, refuse, report-only)
    #[arg(long, env = "JOBBOARD_DRIFT_POLICY")]
    drift_policy: Option<DriftPolicy>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full verify-and-repair pass
    Bootstrap {
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Report drift without changing anything
    Check {
        /// Show declared vs live DDL for drifted tables
        #[arg(long)]
        diff: bool,

        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Show the migration plans a bootstrap would execute
    Plan {
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Print declared DDL in creation order with each table's cascade
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Reasons")]
    reasons: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Decision")]
    decision: String,
    #[tabled(rename = "Steps")]
    steps: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("jobboard_schema=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobboard_schema=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "✗ Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<BootstrapConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => BootstrapConfig::load(path)?,
        None => BootstrapConfig {
            mode: Mode::from_env(),
            ..BootstrapConfig::default()
        },
    };

    if let Some(dir) = &cli.data_dir {
        config.primary_dir = dir.clone();
    }
    if let Some(dir) = &cli.fallback_dir {
        config.fallback_dir = Some(dir.clone());
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(policy) = cli.drift_policy {
        config.drift_policy = policy;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let bootstrapper = Bootstrapper::new(config)?;

    match cli.command {
        Commands::Bootstrap { output } => cmd_bootstrap(&bootstrapper, output),
        Commands::Check { diff, output } => cmd_check(&bootstrapper, diff, output),
        Commands::Plan { output } => cmd_plan(&bootstrapper, output),
        Commands::Schema => cmd_schema(&bootstrapper),
    }
}

fn print_serialized<T: serde::Serialize>(value: &T, output: OutputFormat) -> Result<bool, Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(value)?);
            Ok(true)
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(true)
        }
        OutputFormat::Table => Ok(false),
    }
}

fn cmd_bootstrap(bootstrapper: &Bootstrapper, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = MigrationState::for_config(bootstrapper.config());
    let (database, report) = bootstrapper.bootstrap(&mut state)?;

    if print_serialized(&report, output)? {
        return Ok(());
    }

    println!("\nSchema Bootstrap ({} mode, policy: {})\n", report.mode.as_str(), report.drift_policy.as_str());
    println!("Storage: {}", database.location());
    for fallback in &report.fallbacks {
        println!("  {} {}", "⚠".yellow(), fallback);
    }

    if let Some(pass) = &report.pass {
        let rows: Vec<TableRow> = pass
            .tables
            .iter()
            .map(|t| TableRow {
                table: t.table.clone(),
                status: t.status.as_str().to_string(),
                action: t.action.as_str().to_string(),
                reasons: t.reasons.join("; "),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::markdown());
        println!("\n{}", table);

        println!("\nSummary:");
        println!("  {} dropped", pass.log.drops());
        println!("  {} created", pass.log.creates());
        println!("  {} indexes ensured", pass.log.indexes());
    }

    let elapsed = report.finished_at - report.started_at;
    println!("\n{} Schema ready in {}ms", "✓".green(), elapsed.num_milliseconds());
    Ok(())
}

fn cmd_check(bootstrapper: &Bootstrapper, show_diff: bool, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let (conn, location) = open_existing(bootstrapper.config())?;
    info!("Checking schema at {}", location);

    let catalog = SqliteCatalog::new(&conn);
    let detector = DriftDetector::new(&catalog);
    let report = detector.detect_all(bootstrapper.registry());

    if print_serialized(&report, output)? {
        return Ok(());
    }

    println!("\nSchema Drift Report\n");
    let rows: Vec<TableRow> = report
        .tables
        .iter()
        .map(|r| TableRow {
            table: r.table.clone(),
            status: r.status.as_str().to_string(),
            action: if r.needs_reindex() {
                format!("reindex: {}", r.missing_indexes.join(", "))
            } else {
                String::new()
            },
            reasons: r.reason_messages().join("; "),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::markdown());
    println!("{}", table);

    if show_diff {
        for drifted in report.drifted() {
            let Some(definition) = bootstrapper.registry().get(&drifted.table) else {
                continue;
            };
            let live = catalog.table_sql(&drifted.table)?.unwrap_or_default();
            let declared = definition.create_sql();
            if has_changes(&live, &declared) {
                println!("\n{}:", drifted.table.bold());
                println!("{}", format_ddl_diff(&live, &declared));
            }
        }
    }

    if report.is_stable() {
        println!("\n{} No drift detected", "✓".green());
    } else {
        println!("\n{} {} table(s) drifted", "⚠".yellow(), report.drifted().len());
    }
    Ok(())
}

fn cmd_plan(bootstrapper: &Bootstrapper, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let (conn, _) = open_existing(bootstrapper.config())?;
    let catalog = SqliteCatalog::new(&conn);
    let planned = bootstrapper.dry_run(&catalog)?;

    if print_serialized(&planned, output)? {
        return Ok(());
    }

    println!("\nMigration Plan (dry run, policy: {})\n", bootstrapper.config().drift_policy.as_str());
    let rows: Vec<PlanRow> = planned
        .iter()
        .map(|p| {
            let (decision, steps) = match &p.decision {
                PlanDecision::Unchanged => ("unchanged".to_string(), String::new()),
                PlanDecision::Inconclusive => ("skip (introspection failed)".to_string(), String::new()),
                PlanDecision::Covered => ("rebuilt with cascade".to_string(), String::new()),
                PlanDecision::Leave => ("leave drifted".to_string(), String::new()),
                PlanDecision::Refuse(reasons) => (format!("refuse: {}", reasons.join("; ")), String::new()),
                PlanDecision::Reindex(plan) | PlanDecision::Apply(plan) => (
                    p.drift.status.as_str().to_string(),
                    plan.steps.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", "),
                ),
            };
            PlanRow {
                table: p.drift.table.clone(),
                decision,
                steps,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::markdown());
    println!("{}", table);
    Ok(())
}

fn cmd_schema(bootstrapper: &Bootstrapper) -> Result<(), Box<dyn std::error::Error>> {
    let graph = bootstrapper.graph();

    for name in graph.creation_order() {
        let Some(table) = bootstrapper.registry().get(&name) else {
            continue;
        };
        println!("{};", table.create_sql());
        for sql in table.index_sql() {
            println!("{};", sql);
        }

        let cascade = graph.cascade_for(&name)?;
        if cascade.is_empty() {
            println!("-- no dependents\n");
        } else {
            println!("-- cascade: {}\n", cascade.join(" -> "));
        }
    }
    Ok(())
}
