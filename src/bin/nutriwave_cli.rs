use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nutriwave::{
    about,
    catalog::RecordKind,
    config::NutriWaveConfig,
    engine::{Engine, NutriWaveEngine, Operation, ProfileInput, Workflow},
    profile::{ProfileColumns, NONE_COLUMN},
    GenerationPack, Lang, Texture,
};
use serde::Serialize;
use std::{fs, path::PathBuf, str::FromStr};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "nutriwave_cli",
    about = "Fermented-food formulation recommender",
    disable_version_flag = true,
    after_help = "Tip: pass @file.json instead of inline JSON"
)]
struct Cli {
    /// Directory holding data.json, overlays and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file (default: ./nutriwave.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short = 'V', long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Default)]
struct ColumnArgs {
    /// Column with beany-flavor scores
    #[arg(long)]
    beany_col: Option<String>,
    #[arg(long)]
    sweet_col: Option<String>,
    #[arg(long)]
    texture_col: Option<String>,
    #[arg(long)]
    overall_col: Option<String>,
}

impl ColumnArgs {
    /// Unset flags become the "(none)" selection.
    fn into_columns(self) -> ProfileColumns {
        let pick = |c: Option<String>| Some(c.unwrap_or_else(|| NONE_COLUMN.to_string()));
        ProfileColumns {
            beany: pick(self.beany_col),
            sweet: pick(self.sweet_col),
            texture: pick(self.texture_col),
            overall: pick(self.overall_col),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Supported operations and record kinds
    Capabilities,
    /// Counts and ids of the loaded catalog
    CatalogSummary,
    /// Rank strains against goal tags
    Shortlist {
        #[arg(long = "goal")]
        goals: Vec<String>,
        /// Infer goals from a free-text brief
        #[arg(long)]
        brief: Option<String>,
        #[arg(long, default_value = "soft")]
        texture: String,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Generate candidate formulations and a mini test plan
    Generate {
        /// Base id (default: first catalog base)
        #[arg(long)]
        base: Option<String>,
        #[arg(long, default_value = "soft")]
        texture: String,
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long)]
        product_type: Option<String>,
        #[arg(long)]
        brief: Option<String>,
        #[arg(long = "goal")]
        goals: Vec<String>,
        /// Consumer survey CSV used to bias levels
        #[arg(long)]
        profile: Option<String>,
        #[command(flatten)]
        columns: ColumnArgs,
        #[arg(short = 'n', long)]
        candidates: Option<usize>,
        /// Write the generation pack to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the mini test plan
    Plan {
        #[arg(long, default_value = "en")]
        lang: String,
    },
    /// Aggregate a consumer survey CSV
    Profile {
        path: String,
        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// Append one record: strain, ingredient, rheo-method, base or supplier
    Add { kind: String, record: String },
    /// Import records from a CSV or JSON file
    Import { kind: String, path: String },
    /// Append an experimental run
    LogRun { run: String },
    /// Register a model
    LogModel { model: String },
    /// Recent runs
    Runs {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Recent model registry entries
    Models {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Apply one operation given as JSON
    Op { operation: String },
    /// Apply a workflow given as JSON
    Workflow { workflow: String },
}

fn load_json_arg(value: &str) -> Result<String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).with_context(|| format!("Could not read JSON file '{path}'"))
    } else {
        Ok(value.to_string())
    }
}

fn parse_json_arg<T: serde::de::DeserializeOwned>(value: &str, what: &str) -> Result<T> {
    let json = load_json_arg(value)?;
    serde_json::from_str(&json).with_context(|| format!("Invalid {what} JSON"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn log_level(verbose: u8, configured: &str) -> Level {
    match verbose {
        0 => Level::from_str(configured).unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Could not install logger")
}

fn profile_input(path: Option<String>, columns: ColumnArgs) -> Option<ProfileInput> {
    path.map(|path| ProfileInput::Table {
        path,
        columns: columns.into_columns(),
    })
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    let Some(command) = cli.command else {
        bail!("Missing command, see --help");
    };

    let mut config = NutriWaveConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    init_logging(log_level(cli.verbose, &config.log_level))?;

    // capabilities must work even when the catalog is broken
    if let Command::Capabilities = command {
        return print_json(&NutriWaveEngine::capabilities());
    }
    let engine = NutriWaveEngine::open(config).context("Could not load catalog")?;
    dispatch(engine, command)
}

fn dispatch(mut engine: NutriWaveEngine, command: Command) -> Result<()> {
    match command {
        Command::Capabilities => print_json(&NutriWaveEngine::capabilities()),
        Command::CatalogSummary => print_json(&engine.summary()),
        Command::Shortlist {
            mut goals,
            brief,
            texture,
            k,
        } => {
            if let Some(brief) = brief {
                goals.extend(nutriwave::brief::infer_goals(&brief, Texture::parse(&texture)));
            }
            let result = engine.apply(Operation::ShortlistStrains { goals, k })?;
            print_json(&result)
        }
        Command::Generate {
            base,
            texture,
            lang,
            product_type,
            brief,
            goals,
            profile,
            columns,
            candidates,
            out,
        } => {
            let result = engine.apply(Operation::Generate {
                base_id: base,
                texture: Texture::parse(&texture),
                lang,
                product_type,
                brief,
                goals,
                profile: profile_input(profile, columns),
                candidates,
            })?;
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            match out {
                Some(path) => {
                    let pack: GenerationPack = serde_json::from_value(result.output)
                        .context("Engine returned an unexpected generation pack")?;
                    let text = pack.to_pretty_json()?;
                    fs::write(&path, text)
                        .with_context(|| format!("Could not write '{}'", path.display()))?;
                    println!(
                        "Wrote {} candidate(s) to '{}'",
                        pack.candidates.len(),
                        path.display()
                    );
                    Ok(())
                }
                None => print_json(&result.output),
            }
        }
        Command::Plan { lang } => {
            let result = engine.apply(Operation::BuildMiniPlan {
                lang: Lang::parse(&lang),
            })?;
            print_json(&result.output)
        }
        Command::Profile { path, columns } => {
            let result = engine.apply(Operation::ExtractProfile {
                path,
                columns: columns.into_columns(),
            })?;
            print_json(&result)
        }
        Command::Add { kind, record } => {
            let kind = RecordKind::parse(&kind)?;
            let record = parse_json_arg(&record, kind.as_str())?;
            let result = engine.apply(Operation::add_record(kind, record))?;
            print_json(&result)
        }
        Command::Import { kind, path } => {
            let kind = RecordKind::parse(&kind)?;
            let result = engine.apply(Operation::ImportRecords { kind, path })?;
            print_json(&result)
        }
        Command::LogRun { run } => {
            let run = parse_json_arg(&run, "run")?;
            print_json(&engine.apply(Operation::LogRun { run })?)
        }
        Command::LogModel { model } => {
            let model = parse_json_arg(&model, "model")?;
            print_json(&engine.apply(Operation::LogModel { model })?)
        }
        Command::Runs { limit } => {
            print_json(&engine.apply(Operation::ListRuns { limit })?.output)
        }
        Command::Models { limit } => {
            print_json(&engine.apply(Operation::ListModels { limit })?.output)
        }
        Command::Op { operation } => {
            let op: Operation = parse_json_arg(&operation, "operation")?;
            print_json(&engine.apply(op)?)
        }
        Command::Workflow { workflow } => {
            let workflow: Workflow = parse_json_arg(&workflow, "workflow")?;
            print_json(&engine.apply_workflow(workflow)?)
        }
    }
}
