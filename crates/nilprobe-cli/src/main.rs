use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use nilprobe_core::config::{self, Config, OutputFormat, CONFIG_FILE_NAME, DEFAULT_CONFIG_TOML};
use nilprobe_core::orchestrator::{self, AnalysisOutput};
use nilprobe_diagnostics::{human, json, sarif};

/// Build a long version string: "0.1.0 (abc12345)"
fn long_version() -> &'static str {
    let s = format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));
    Box::leak(s.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "nilprobe")]
#[command(about = "Interprocedural nil pointer dereference analyzer for Go SSA")]
#[command(version, long_version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze IR documents produced by the Go frontend
    Check(CheckArgs),
    /// Write a default nilprobe.toml in the current directory
    Init,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// IR JSON files; all are analyzed as one program
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Output format (default: from nilprobe.toml, else text)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Drop traces that repeat an earlier trace step for step
    #[arg(long)]
    dedupe: bool,
    /// Max traces to report (0 = unlimited)
    #[arg(long)]
    max_traces: Option<usize>,
    /// Max call nesting followed below an analyzed function
    #[arg(long)]
    max_call_depth: Option<usize>,
    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
    Sarif,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Sarif => OutputFormat::Sarif,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let debug = matches!(&cli.command, Commands::Check(args) if args.debug);
    init_tracing(debug);

    let result = match cli.command {
        Commands::Check(args) => run_check(args),
        Commands::Init => run_init().map(|()| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Log to stderr so stdout stays clean for machine output.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = config::load_config(&cwd)?;
    apply_overrides(&mut config, &args);
    tracing::debug!(?config, "effective configuration");

    let output = orchestrator::analyze_files(&args.files, &config)?;
    print_output(&output, config.output.format)?;

    Ok(if output.summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn apply_overrides(config: &mut Config, args: &CheckArgs) {
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if args.dedupe {
        config.output.dedupe = true;
    }
    if let Some(max) = args.max_traces {
        config.output.max_traces = max;
    }
    if let Some(depth) = args.max_call_depth {
        config.analysis.max_call_depth = depth;
    }
}

fn print_output(output: &AnalysisOutput, format: OutputFormat) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let rendered = match format {
        OutputFormat::Text => human::format_text(&output.diagnostics),
        OutputFormat::Json => {
            let mut s = json::to_json(&output.diagnostics, &output.summary, version)?;
            s.push('\n');
            s
        }
        OutputFormat::Sarif => {
            let mut s = sarif::to_sarif(&output.diagnostics, version)?;
            s.push('\n');
            s
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes()).context("writing report")?;
    stdout.flush().context("writing report")?;

    eprint!("{}", human::format_summary(&output.summary));
    Ok(())
}

fn run_init() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() {
        bail!("{CONFIG_FILE_NAME} already exists");
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("failed to write {CONFIG_FILE_NAME}"))?;
    println!("Created {CONFIG_FILE_NAME}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_check(argv: &[&str]) -> CheckArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Check(args) => args,
            Commands::Init => panic!("expected check"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse_check(&[
            "nilprobe",
            "check",
            "a.json",
            "--format",
            "sarif",
            "--dedupe",
            "--max-traces",
            "5",
            "--max-call-depth",
            "3",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.output.format, OutputFormat::Sarif);
        assert!(config.output.dedupe);
        assert_eq!(config.output.max_traces, 5);
        assert_eq!(config.analysis.max_call_depth, 3);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let args = parse_check(&["nilprobe", "check", "a.json", "b.json"]);
        assert_eq!(args.files.len(), 2);

        let mut config = Config::default();
        config.output.format = OutputFormat::Json;
        config.output.dedupe = true;
        config.output.max_traces = 7;
        let before = config.clone();
        apply_overrides(&mut config, &args);
        assert_eq!(config, before);
    }

    #[test]
    fn test_check_requires_files() {
        assert!(Cli::try_parse_from(["nilprobe", "check"]).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["nilprobe", "check", "a.json", "--format", "html"]).is_err());
    }
}
