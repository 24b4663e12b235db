// mii - tells you which module to load for the command you just typed
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mii_lib::{
    core::{ranking::compare_codes, Indexer},
    db::{ModuleEntry, SearchResult, SearchRow},
    shell::{HookInstaller, Integration, Shell},
    Config, MiiError, ModuleTable,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Module inverted index
///
/// Finds the environment modules that provide a command.
#[derive(Parser, Debug)]
#[command(name = "mii", version, about, long_about = None)]
struct Cli {
    /// Use <DATADIR> to store index data
    #[arg(short, long, global = true)]
    datadir: Option<PathBuf>,

    /// Use <MODULEPATH> instead of $MODULEPATH
    #[arg(short, long, global = true)]
    modulepath: Option<String>,

    /// Output results in JSON encoding
    #[arg(short, long, global = true)]
    json: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate the module index
    Build {
        /// Import Lmod spider JSON instead of scanning MODULEPATH
        #[arg(long)]
        spider: Option<PathBuf>,
    },
    /// Update the module index
    Sync,
    /// Find modules which provide <COMMAND>
    Exact { command: String },
    /// Search for commands similar to <COMMAND>
    Search {
        command: String,
        /// Show at most this many results
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show commands provided by <MODULE>
    Show { module: String },
    /// Pick a module providing <COMMAND> and print the line to load it
    Select {
        command: String,
        /// Suggest at most this many similar commands when nothing matches
        #[arg(default_value_t = 3)]
        maximum: usize,
    },
    /// List all cached module files
    List,
    /// Install mii into your shell
    Install {
        /// Shell to install for, instead of the one in $SHELL
        #[arg(long)]
        shell: Option<String>,
    },
    /// Remove mii from your shell
    Uninstall,
    /// Enable mii integration (default)
    Enable,
    /// Disable mii integration
    Disable,
    /// Get database and integration status
    Status,
    /// Show mii build version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<MiiError>() {
                Some(err) => eprintln!("[mii] {}", err.user_message()),
                None => eprintln!("[mii] {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Command::Version = cli.command {
        println!("mii {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_env(cli.datadir, cli.modulepath)
        .context("Failed to initialize mii")?;
    let json = cli.json;

    match cli.command {
        Command::Build { spider } => handle_build(&config, spider)?,
        Command::Sync => handle_sync(&config)?,
        Command::Exact { command } => handle_exact(&config, &command, json)?,
        Command::Search { command, limit } => handle_search(&config, &command, limit, json)?,
        Command::Show { module } => handle_show(&config, &module, json)?,
        Command::Select { command, maximum } => return handle_select(&config, &command, maximum),
        Command::List => handle_list(&config, json)?,
        Command::Install { shell } => handle_install(&config, shell.as_deref())?,
        Command::Uninstall => handle_uninstall(&config)?,
        Command::Enable => handle_enable(&config)?,
        Command::Disable => handle_disable(&config)?,
        Command::Status => handle_status(&config)?,
        Command::Version => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_build(config: &Config, spider: Option<PathBuf>) -> Result<()> {
    let indexer = Indexer::new(config);

    let count = match spider {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            indexer.build_from_spider(&json)?
        }
        None => indexer.build()?,
    };

    if count > 0 {
        eprintln!("Finished analysis on {} modules", count);
    } else {
        eprintln!("Didn't analyze any modules. Is the MODULEPATH correct?");
    }

    Ok(())
}

fn handle_sync(config: &Config) -> Result<()> {
    let report = Indexer::new(config).sync()?;

    if report.up_to_date() {
        println!("All modules up to date :)");
    } else {
        println!(
            "Finished analysis on {} modules ({} unchanged)",
            report.analyzed, report.reused
        );
    }

    Ok(())
}

fn handle_exact(config: &Config, command: &str, json: bool) -> Result<()> {
    let table = load_table(config)?;
    let result = table.search_exact(command, &config.loaded_modules)?;

    if json {
        return print_json(&result);
    }

    println!("Modules providing {}:{}", result.query, total(&result));

    if result.is_empty() {
        println!("    empty result set :(");
        return Ok(());
    }

    let code_width = column_width(result.rows.iter().map(|r| r.code.as_str()), "MODULE");

    println!("    {:<code_width$}    PARENT(S)", "MODULE");
    for row in &result.rows {
        println!("    {:<code_width$}    {}", row.code, row.parent);
    }

    Ok(())
}

fn handle_search(config: &Config, command: &str, limit: usize, json: bool) -> Result<()> {
    let table = load_table(config)?;
    let mut result = table.search_fuzzy(command, &config.loaded_modules)?;
    let num_results = result.len();
    result.rows.truncate(limit);

    if json {
        return print_json(&result);
    }

    println!("Results for \"{}\":{}", result.query, total(&result));

    if result.is_empty() {
        println!("    empty result set :(");
        return Ok(());
    }

    let code_width = column_width(result.rows.iter().map(|r| r.code.as_str()), "MODULE");
    let bin_width = column_width(result.rows.iter().map(|r| r.bin.as_str()), "COMMAND");
    let parent_width = column_width(result.rows.iter().map(|r| r.parent.as_str()), "PARENT(S)");

    println!(
        "    {:<code_width$}    {:<bin_width$}    {:<parent_width$}    RELEVANCE",
        "MODULE", "COMMAND", "PARENT(S)"
    );
    for row in &result.rows {
        println!(
            "    {:<code_width$}    {:<bin_width$}    {:<parent_width$}    {}",
            row.code,
            row.bin,
            row.parent,
            row.relevance()
        );
    }

    if num_results > result.len() {
        println!("    ... {} more (use --limit)", num_results - result.len());
    }

    Ok(())
}

fn handle_show(config: &Config, module: &str, json: bool) -> Result<()> {
    let table = load_table(config)?;
    let result = table.search_by_code(module)?;

    if json {
        return print_json(&result);
    }

    println!("Commands provided by {}:{}", result.query, total(&result));

    if result.is_empty() {
        println!("    empty result set :(");
    }

    for row in &result.rows {
        println!("    {}", row.bin);
    }

    Ok(())
}

/// Used by the shell init scripts. Prints `<parents> <code>` on stdout for
/// the chosen module; everything else goes to stderr.
///
/// Exit codes: 0 selected, 1 nothing selected, 2 nothing similar found,
/// 3 integration disabled.
fn handle_select(config: &Config, command: &str, maximum: usize) -> Result<ExitCode> {
    if !Integration::new(config).is_enabled() {
        return Ok(ExitCode::from(3));
    }

    let table = load_table(config)?;
    let result = table.search_exact(command, &config.loaded_modules)?;

    match result.rows.as_slice() {
        [row] => {
            println!("{}", load_line(row));
            Ok(ExitCode::SUCCESS)
        }
        [] => suggest_similar(&table, config, command, maximum),
        rows => prompt_selection(command, rows),
    }
}

fn prompt_selection(command: &str, rows: &[SearchRow]) -> Result<ExitCode> {
    let code_width = column_width(rows.iter().map(|r| r.code.as_str()), "MODULE");

    eprintln!("[mii] Please select a module to run {}:", command);
    eprintln!("       {:<code_width$} PARENT(S)", "MODULE");
    for (i, row) in rows.iter().enumerate() {
        eprintln!("    {:<2} {:<code_width$} {}", i + 1, row.code, row.parent);
    }
    eprint!("Make a selection (1-{}, q aborts) [1]: ", rows.len());
    io::stderr().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        eprintln!("[mii] No selection made!");
        return Ok(ExitCode::FAILURE);
    }

    let line = line.trim();
    let choice = if line.is_empty() { "1" } else { line };

    let Ok(choice) = choice.parse::<usize>() else {
        eprintln!("[mii] Aborted by user!");
        return Ok(ExitCode::FAILURE);
    };

    match choice.checked_sub(1).and_then(|i| rows.get(i)) {
        Some(row) => {
            println!("{}", load_line(row));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("[mii] Selection out of range! Aborting.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn suggest_similar(
    table: &ModuleTable,
    config: &Config,
    command: &str,
    maximum: usize,
) -> Result<ExitCode> {
    let result = table.search_fuzzy(command, &config.loaded_modules)?;

    let Some(best) = result.rows.first() else {
        return Ok(ExitCode::from(2));
    };

    if best.distance == 0 || result.len() == 1 {
        // usually a case mistake
        eprintln!("[mii] Did you mean \"{}\"? (from {})", best.bin, best.code);
    } else {
        let similar: Vec<String> = result
            .unique_bins(maximum)
            .into_iter()
            .map(|bin| format!("\"{}\"", bin))
            .collect();
        eprintln!(
            "[mii] {} not found! Similar commands: {}",
            command,
            similar.join(", ")
        );
    }

    Ok(ExitCode::FAILURE)
}

fn handle_list(config: &Config, json: bool) -> Result<()> {
    let table = load_table(config)?;
    let mut entries: Vec<&ModuleEntry> = table.entries().collect();
    entries.sort_by(|a, b| compare_codes(&a.code, &b.code));

    if json {
        let listing: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| serde_json::json!({ "code": e.code, "path": e.path }))
            .collect();
        return print_json(&listing);
    }

    let code_width = column_width(entries.iter().map(|e| e.code.as_str()), "");

    println!("Indexed modules (total {}):", entries.len());
    for entry in entries {
        println!("    {:<code_width$}    {}", entry.code, entry.path.display());
    }

    Ok(())
}

fn handle_install(config: &Config, shell: Option<&str>) -> Result<()> {
    if std::env::var_os("MII").is_some() {
        println!("Mii is already enabled on your shell!");
        return Ok(());
    }

    let installer = HookInstaller::new(&config.datadir)?;

    let shell = match shell {
        Some(name) => {
            let shell = Shell::from_name(name).ok_or_else(|| {
                MiiError::Config(format!(
                    "Unsupported shell {}! Supported shells are 'bash', 'zsh'",
                    name
                ))
            })?;
            installer.install(shell)?;
            shell
        }
        None => installer.install_auto()?,
    };

    println!("Detected shell: {}", shell);
    println!("Wrote {}! Mii integration is now enabled.", installer.rc_file_path(shell).display());
    println!("Restart your shell or run:");
    println!("   source ~/{}", shell.rc_file_name());

    Ok(())
}

fn handle_uninstall(config: &Config) -> Result<()> {
    let installer = HookInstaller::new(&config.datadir)?;

    for shell in Shell::ALL {
        match installer.uninstall(shell) {
            Ok(()) => println!("Uninstalled {} hook", shell),
            Err(e) => eprintln!("  (skipped {}: {})", shell, e),
        }
    }

    println!("Note: the index ({}) was not removed.", config.index_file.display());

    Ok(())
}

fn handle_enable(config: &Config) -> Result<()> {
    if Integration::new(config).enable()? {
        eprintln!("Re-enabled shell integration!");
    } else {
        eprintln!("Shell integration is already enabled.");
    }

    Ok(())
}

fn handle_disable(config: &Config) -> Result<()> {
    Integration::new(config)
        .disable()
        .context("couldn't write disable lock")?;
    eprintln!("Disabled shell integration!");

    Ok(())
}

fn handle_status(config: &Config) -> Result<()> {
    let integration = Integration::new(config);

    println!("mii {}", env!("CARGO_PKG_VERSION"));
    println!(
        "status: {}",
        if integration.is_enabled() { "enabled" } else { "disabled" }
    );

    println!("index:  {}", config.index_file.display());
    match ModuleTable::import(&config.index_file) {
        Ok(table) => {
            println!("        {} modules", table.len());
            if let Some(age) = index_age(config) {
                println!("        built {}", age);
            }
        }
        Err(e) => println!("        unusable ({})", e),
    }

    if let Ok(installer) = HookInstaller::new(&config.datadir) {
        for shell in Shell::ALL {
            let state = if installer.is_installed(shell) {
                "installed"
            } else {
                "not installed"
            };
            println!("{:<7} {}", format!("{}:", shell), state);
        }
    }

    Ok(())
}

fn load_table(config: &Config) -> Result<ModuleTable> {
    Indexer::new(config)
        .load()
        .context("failed to load the module index")
}

fn load_line(row: &SearchRow) -> String {
    if row.parent.is_empty() {
        row.code.clone()
    } else {
        format!("{} {}", row.parent, row.code)
    }
}

fn index_age(config: &Config) -> Option<String> {
    let modified = fs::metadata(&config.index_file).ok()?.modified().ok()?;
    let built = chrono::DateTime::<chrono::Local>::from(modified);
    let age = chrono::Local::now().signed_duration_since(built);

    let ago = if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else {
        format!("{} minutes ago", age.num_minutes())
    };

    Some(format!("{} ({})", built.format("%Y-%m-%d %H:%M"), ago))
}

fn total(result: &SearchResult) -> String {
    if result.is_empty() {
        String::new()
    } else {
        format!(" (total {})", result.len())
    }
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values.map(str::len).max().unwrap_or(0).max(header.len())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
