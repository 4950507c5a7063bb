//! ddlshift CLI
//!
//! Generates SQL migrations by diffing a declared schema against the last
//! recorded snapshot.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ddlshift_cli::{FileConfig, GenerateOptions, GenerateOutcome, Overrides};
use ddlshift_core::interim::Casing;
use ddlshift_core::DialectKind;

/// Schema diffing and SQL migration generation.
#[derive(Parser)]
#[command(name = "ddlshift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./ddlshift.toml when present).
    #[arg(short, long, env = "DDLSHIFT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override `ddlshift.toml`.
#[derive(Args)]
struct Settings {
    /// Target database: postgresql, dsql, mysql, sqlite or mssql.
    #[arg(short, long, env = "DDLSHIFT_DIALECT", global = true)]
    dialect: Option<DialectKind>,

    /// Declared schema JSON.
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    /// Migrations folder.
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Column name casing: preserve, snake_case or camel_case.
    #[arg(long, global = true)]
    casing: Option<Casing>,

    /// Refuse to write destructive statements without --force.
    #[arg(long, global = true)]
    strict: bool,

    /// Do not separate statements with breakpoint markers.
    #[arg(long, global = true)]
    no_breakpoints: bool,
}

impl Settings {
    fn overrides(&self) -> Overrides {
        Overrides {
            dialect: self.dialect,
            schema: self.schema.clone(),
            out: self.out.clone(),
            casing: self.casing,
            strict: self.strict.then_some(true),
            breakpoints: self.no_breakpoints.then_some(false),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a migration for the changes since the last snapshot.
    Generate {
        /// Migration name, used as the tag suffix.
        #[arg(short, long)]
        name: Option<String>,

        /// Rename hint `old->new`, by entity key. May be repeated.
        #[arg(short, long = "rename")]
        renames: Vec<String>,

        /// Write destructive statements even in strict mode.
        #[arg(short, long)]
        force: bool,
    },

    /// Print the SQL that creates the declared schema.
    Export,

    /// Validate the migration history.
    Check,

    /// Upgrade snapshots written by older versions.
    Up,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let file = FileConfig::discover(cli.config.as_deref())?;
    let config = ddlshift_cli::Config::resolve(file, cli.settings.overrides())?;

    match cli.command {
        Commands::Generate {
            name,
            renames,
            force,
        } => {
            let options = GenerateOptions {
                name,
                renames,
                force,
            };
            match ddlshift_cli::generate(&config, &options).await? {
                GenerateOutcome::NoChanges => println!("No schema changes."),
                GenerateOutcome::Written {
                    tag,
                    statements,
                    destructive,
                    renames,
                } => {
                    println!(
                        "Wrote {}/{tag}.sql ({statements} statements, {destructive} destructive)",
                        config.out.display()
                    );
                    for rename in renames {
                        println!("  renamed {rename}");
                    }
                }
            }
        }

        Commands::Export => {
            let out = ddlshift_cli::export(&config).await?;
            for sql in &out.sql_statements {
                println!("{sql};");
            }
        }

        Commands::Check => {
            let report = ddlshift_cli::check(&config)?;
            for hint in &report.hints {
                println!("hint: {hint}");
            }
            println!("{} migrations, history is consistent.", report.migrations);
        }

        Commands::Up => {
            let upgraded = ddlshift_cli::up(&config)?;
            for snapshot in &upgraded {
                println!("{}: upgraded from v{}", snapshot.tag, snapshot.from_version);
                for hint in &snapshot.hints {
                    println!("  hint: {hint}");
                }
            }
            info!(upgraded = upgraded.len(), "done");
        }
    }

    Ok(())
}
