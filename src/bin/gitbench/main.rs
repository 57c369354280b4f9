//! Command-line driver for the global index table benchmarks.
#![forbid(unsafe_code)]

mod ui;

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gitable_bench::{
    config::BenchConfig,
    driver::{Driver, DriverEvent},
    executor::ProcessExecutor,
    invocation::Invocation,
    logging::init_logging,
    matrix::{GitVariant, ReadPattern},
    plot::{render_chart, ChartSpec, PlotDataset, Series, TimingDimension},
    report::{self, ResultsFile},
};
use serde::Serialize;

use crate::ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "gitbench",
    version,
    about = "Runs the db_bench global index table matrix and plots its results",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "GITBENCH_CONFIG",
        help = "Path to the TOML config (defaults to <config dir>/gitable-bench/bench.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "GITBENCH_LOG",
        default_value = "warn",
        help = "Tracing filter, e.g. info or gitable_bench=debug"
    )]
    log_level: String,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Color theme for status output"
    )]
    theme: ThemeArg,

    #[arg(long, short, global = true, help = "Suppress status output and progress")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every configuration of the matrix and print the averaged report
    Run(RunCmd),
    /// Print the db_bench command line of every configuration
    Matrix,
    /// Draw a grouped bar chart of build or search times
    Plot(PlotCmd),
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(long, help = "Runs per configuration")]
    repetitions: Option<usize>,

    #[arg(long, help = "Kill an invocation after this many seconds")]
    timeout_secs: Option<u64>,

    #[arg(long, help = "Path to the db_bench binary")]
    binary: Option<PathBuf>,

    #[arg(long, help = "Run db_bench directly instead of through sudo")]
    no_elevate: bool,

    #[arg(long, value_name = "FILE", help = "Also write the results as JSON")]
    json_out: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Also write the results as CSV")]
    csv_out: Option<PathBuf>,
}

impl RunCmd {
    fn apply(&self, config: &mut BenchConfig) {
        if let Some(repetitions) = self.repetitions {
            config.repetitions = repetitions;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(binary) = &self.binary {
            config.params.binary = binary.clone();
        }
        if self.no_elevate {
            config.params.elevate_with = None;
        }
    }
}

#[derive(Args, Debug)]
struct PlotCmd {
    #[arg(long, value_enum, default_value_t = ReadArg::Readhot, help = "Read workload to chart")]
    read: ReadArg,

    #[arg(long, value_enum, default_value_t = TimeArg::Search, help = "Measurement to chart")]
    time: TimeArg,

    #[arg(
        long,
        value_name = "FILE",
        help = "Chart a JSON file written by `run --json-out` instead of the captured numbers"
    )]
    results: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "SVG path (defaults to git_<time>_<read>.svg)")]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to the config path
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ReadArg {
    Readrandom,
    Readhot,
}

impl From<ReadArg> for ReadPattern {
    fn from(read: ReadArg) -> Self {
        match read {
            ReadArg::Readrandom => ReadPattern::ReadRandom,
            ReadArg::Readhot => ReadPattern::ReadHot,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TimeArg {
    Build,
    Search,
}

impl From<TimeArg> for TimingDimension {
    fn from(time: TimeArg) -> Self {
        match time {
            TimeArg::Build => TimingDimension::Build,
            TimeArg::Search => TimingDimension::Search,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let Cli {
        config,
        format,
        log_level,
        theme,
        quiet,
        command,
    } = Cli::parse();
    init_logging(&log_level)?;
    let ui = Ui::new(theme.into(), quiet);

    match command {
        Command::Run(cmd) => run_matrix(config, format, &cmd, &ui),
        Command::Matrix => show_matrix(config, format),
        Command::Plot(cmd) => plot(format, &cmd, &ui),
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let config = BenchConfig::load(config)?;
                if let Some(path) = &config.path {
                    ui.info(&format!("config path: {}", path.display()));
                }
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigAction::Init { force } => {
                let defaults = BenchConfig {
                    path: config,
                    ..BenchConfig::default()
                };
                let written = defaults.persist(force)?;
                ui.success(&format!("wrote {}", written.display()));
                Ok(())
            }
        },
    }
}

fn run_matrix(
    config_path: Option<PathBuf>,
    format: OutputFormat,
    cmd: &RunCmd,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let mut config = BenchConfig::load(config_path)?;
    cmd.apply(&mut config);
    config.validate()?;

    let driver = Driver::new(
        config.matrix.clone(),
        config.driver_options(),
        ProcessExecutor::new(),
    );
    if config.params.elevate_with.is_some() {
        ui.warn("db_bench runs through sudo; pass --no-elevate to run it directly");
    }
    ui.heading(&format!(
        "running {} configurations x {} repetitions",
        config.matrix.len(),
        config.repetitions
    ));

    let progress = ui.progress(driver.planned_invocations() as u64, "matrix run");
    let table = driver.run(&mut |event| match event {
        DriverEvent::ConfigStarted {
            index,
            total,
            configuration,
        } => progress.set_message(format!("[{}/{}] {configuration}", index + 1, total)),
        DriverEvent::RunFinished { .. } => progress.inc(),
        DriverEvent::ConfigFinished { .. } => {}
    })?;
    let elapsed = progress.finish();

    let results = ResultsFile::new(&table, config.repetitions, config.params.reads);
    if let Some(path) = &cmd.json_out {
        results.save(path)?;
        ui.info(&format!("wrote {}", path.display()));
    }
    if let Some(path) = &cmd.csv_out {
        report::write_csv(&table, BufWriter::new(File::create(path)?))?;
        ui.info(&format!("wrote {}", path.display()));
    }

    emit(format, &results, || print!("{}", report::render_text(&table)))?;
    ui.success(&format!(
        "{} configurations finished in {}",
        table.len(),
        format_duration(elapsed)
    ));
    Ok(())
}

#[derive(Serialize)]
struct PlannedInvocation {
    database: String,
    read: ReadPattern,
    variant: GitVariant,
    command: String,
    #[serde(flatten)]
    invocation: Invocation,
}

fn show_matrix(config_path: Option<PathBuf>, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    let config = BenchConfig::load(config_path)?;
    let planned: Vec<PlannedInvocation> = config
        .matrix
        .configurations()
        .iter()
        .map(|cfg| {
            let invocation = Invocation::for_configuration(&config.params, cfg);
            PlannedInvocation {
                database: cfg.database.label.clone(),
                read: cfg.read,
                variant: cfg.variant,
                command: invocation.display(),
                invocation,
            }
        })
        .collect();

    emit(format, &planned, || {
        for entry in &planned {
            println!(
                "{} {} {}: {}",
                entry.database, entry.read, entry.variant, entry.command
            );
        }
    })
}

#[derive(Serialize)]
struct ChartReport<'a> {
    title: String,
    x_label: &'static str,
    y_label: &'static str,
    groups: &'a [String],
    series: &'a [Series],
    output: PathBuf,
}

fn plot(format: OutputFormat, cmd: &PlotCmd, ui: &Ui) -> Result<(), Box<dyn Error>> {
    let dataset = match &cmd.results {
        Some(path) => PlotDataset::from_results(&ResultsFile::load(path)?),
        None => PlotDataset::captured(),
    };
    let spec = ChartSpec {
        read: cmd.read.into(),
        dimension: cmd.time.into(),
    };
    let series = dataset.series(spec.read, spec.dimension)?;
    let output = cmd
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(spec.default_file_name()));
    render_chart(&output, &spec, dataset.databases(), &series)?;

    let chart = ChartReport {
        title: spec.title(),
        x_label: spec.x_label(),
        y_label: spec.y_label(),
        groups: dataset.databases(),
        series: &series,
        output: output.clone(),
    };
    emit(format, &chart, || print_chart_text(&chart))?;
    ui.success(&format!("wrote chart to {}", output.display()));
    Ok(())
}

fn print_chart_text(chart: &ChartReport<'_>) {
    println!("{}", chart.title);
    print!("{:<18}", "variant");
    for group in chart.groups {
        print!("{group:>12}");
    }
    println!();
    for series in chart.series {
        print!("{:<18}", series.label);
        for value in &series.values {
            print!("{value:>12.2}");
        }
        println!();
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
