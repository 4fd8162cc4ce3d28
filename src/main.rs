use quest_lang::{tokenize_line, Config, Interpreter, QuestError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use clap::{ArgAction, Parser as ClapParser, Subcommand};
use log::debug;

#[derive(ClapParser)]
#[command(author, version, about = "Quest Lang interpreter")]
struct Cli {
    /// Log more (-v for debug, -vv for trace). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Read settings from this file instead of ~/.qlang/<env>/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Quest Lang script
    Run {
        /// Path to the .qlang script
        script: PathBuf,
        /// Seed for dice and rewards, for repeatable runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the tokens of every line of a script as JSON
    Tokens {
        /// Path to the .qlang script
        script: PathBuf,
    },
    /// Manage Quest Lang configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the active configuration
    Show,
    /// Write a config file with defaults
    Init,
    /// Print where the config file lives
    Path,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<Config, QuestError> {
    match path {
        Some(path) if !path.exists() => Err(QuestError::FileNotFound(format!(
            "Config file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(Config::load_from(path)?.with_env_overrides()),
        None => Ok(Config::load()),
    }
}

fn read_script(path: &Path) -> Result<String, QuestError> {
    if !path.is_file() {
        return Err(QuestError::FileNotFound(format!("Script not found: {}", path.display())));
    }
    fs::read_to_string(path).map_err(QuestError::IO)
}

fn run_script(path: &Path, config: Config) -> Result<(), QuestError> {
    let source = read_script(path)?;
    debug!("running {} with {:?}", path.display(), config);

    println!("Time to go on an adventure...");
    let mut interpreter = Interpreter::new(io::stdout(), path, config);
    interpreter.run_source(&source)?;
    debug!(
        "finished with {} gold, {} quest(s), variables {:?}",
        interpreter.ledger().gold,
        interpreter.quests().len(),
        interpreter.variables()
    );
    println!("All journeys must come to an end. Farewell!");
    Ok(())
}

fn print_tokens(path: &Path) -> Result<(), QuestError> {
    let source = read_script(path)?;

    for (index, line) in source.lines().enumerate() {
        let tokens = tokenize_line(line, path, index + 1)?;
        if tokens.is_empty() {
            continue;
        }
        let json = serde_json::to_string(&tokens).map_err(io::Error::from)?;
        println!("{}: {}", index + 1, json);
    }

    Ok(())
}

fn manage_config(command: ConfigCommands, path: Option<&Path>) -> Result<(), QuestError> {
    let config_path = path.map_or_else(Config::get_config_path, Path::to_path_buf);

    match command {
        ConfigCommands::Show => {
            let config = load_config(path)?;
            let json = serde_json::to_string_pretty(&config).map_err(io::Error::from)?;
            println!("{}", json);
        }
        ConfigCommands::Init => {
            if config_path.exists() {
                println!("Config file already exists at: {}", config_path.display());
                println!("Remove it first to reinitialize.");
            } else {
                Config::default().save_to(&config_path)?;
                println!("Initialized new config file at: {}", config_path.display());
            }
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), QuestError> {
    match cli.command {
        Commands::Run { script, seed } => {
            let config = load_config(cli.config.as_deref())?;
            let config = Config {
                seed: seed.or(config.seed),
                ..config
            };
            run_script(&script, config)
        }
        Commands::Tokens { script } => print_tokens(&script),
        Commands::Config { command } => manage_config(command, cli.config.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{}", err);
        process::exit(1);
    }
}
