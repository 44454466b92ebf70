use ckh_core::{Config, ConfigOverrides, HarvesterCall};
use ckh_runner::HarvestRunner;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "ckh")]
#[command(about = "Developer shortcuts for the CKAN harvesting plugin CLI", long_about = None)]
struct Cli {
    /// CKAN virtualenv directory
    #[arg(long, global = true)]
    venv: Option<PathBuf>,

    /// CKAN ini appended to every harvester invocation
    #[arg(long, global = true)]
    ckan_ini: Option<PathBuf>,

    /// Plugin providing the harvester CLI
    #[arg(long, global = true)]
    plugin: Option<String>,

    /// paster executable to spawn
    #[arg(long, global = true)]
    paster: Option<String>,

    /// Print the invocation record as JSON after the run
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the shell line that activates the CKAN virtualenv
    Env,

    /// Launch the development server and wait for it to exit
    Serve,

    /// Forward a harvester subcommand verbatim
    Run {
        /// Arguments passed through to the harvester
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Start the gather consumer
    Gather {
        /// Extra arguments for the consumer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Start the fetch consumer
    Fetch {
        /// Extra arguments for the consumer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Test a harvest source, teeing output to <NAME>_test.log
    Test {
        /// Harvest source name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let runner = HarvestRunner::new(config.clone());
    let record = match cli.command {
        Commands::Env => {
            // for `eval "$(ckh env)"`
            println!(". {}", config.activate_script().display());
            return Ok(());
        }
        Commands::Serve => runner.serve().await?,
        Commands::Run { args } => runner.execute(&HarvesterCall::new(args)).await?,
        Commands::Gather { args } => {
            runner
                .execute(&HarvesterCall::gather_consumer().append(args))
                .await?
        }
        Commands::Fetch { args } => {
            runner
                .execute(&HarvesterCall::fetch_consumer().append(args))
                .await?
        }
        Commands::Test { name } => runner.execute_test(&name).await?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    process::exit(record.shell_exit_code());
}

fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let cwd = std::env::current_dir()?;
    let mut config = Config::load(&cwd)?;
    config.apply(ConfigOverrides {
        venv_dir: cli.venv.clone(),
        ckan_ini: cli.ckan_ini.clone(),
        plugin: cli.plugin.clone(),
        paster_bin: cli.paster.clone(),
    });
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_forwards_hyphenated_args() {
        let cli = Cli::try_parse_from(["ckh", "run", "source", "list", "--all"]).unwrap();
        match cli.command {
            Commands::Run { args } => {
                assert_eq!(args, vec!["source", "list", "--all"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_gather_accepts_extra_args() {
        let cli = Cli::try_parse_from(["ckh", "gather", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::Gather { args } => {
                assert_eq!(args, vec!["--limit", "5"]);
            }
            _ => panic!("expected gather"),
        }
    }

    #[test]
    fn test_test_requires_a_name() {
        assert!(Cli::try_parse_from(["ckh", "test"]).is_err());
        let cli = Cli::try_parse_from(["ckh", "test", "job1"]).unwrap();
        match cli.command {
            Commands::Test { name } => assert_eq!(name, "job1"),
            _ => panic!("expected test"),
        }
    }

    #[test]
    fn test_global_overrides_parse_before_subcommand() {
        let cli =
            Cli::try_parse_from(["ckh", "--plugin", "ckanext-nextgeossharvest", "gather"]).unwrap();
        assert_eq!(cli.plugin.as_deref(), Some("ckanext-nextgeossharvest"));
    }
}
