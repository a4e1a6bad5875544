use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use sha2::{Digest, Sha256};

use spike2h5::config::Config;
use spike2h5::error::WranglingError;
use spike2h5::pipeline;
use spike2h5::split::SplitRatios;

#[derive(Parser, Debug)]
#[command(name = "spike2h5", version, about = "Convert MATLAB spike recordings into HDF5 train/valid/test datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// The directory of the log files
    #[arg(long, global = true, default_value = "log")]
    log_dir: PathBuf,
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a session into an HDF5 dataset
    Convert(RunArgs),
    /// Check an HDF5 dataset against its session
    Verify(RunArgs),
    /// Write the default configuration as JSON
    InitConfig {
        /// The path of the configuration file
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// A JSON configuration file, overridden by the other options
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// The directory of the session files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// The glob pattern of the session files
    #[arg(long)]
    pattern: Option<String>,
    /// The index of the session among the sorted session files
    #[arg(long)]
    session_index: Option<usize>,
    /// An explicit session file, bypassing the pattern and index
    #[arg(long)]
    session: Option<PathBuf>,
    /// The cell-analysis file, relative to the data directory
    #[arg(long)]
    cell_analysis: Option<PathBuf>,
    /// The output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// The output file name
    #[arg(long)]
    output_file: Option<String>,
    /// The seed used for the split
    #[arg(long)]
    seed: Option<u64>,
    /// The fraction of trials in the train subset
    #[arg(long)]
    train_ratio: Option<f64>,
    /// The fraction of trials in the validation subset
    #[arg(long)]
    valid_ratio: Option<f64>,
    /// The fraction of trials in the test subset
    #[arg(long)]
    test_ratio: Option<f64>,
    /// Also write the test subset
    #[arg(long)]
    persist_test: bool,
}

impl RunArgs {
    fn resolve(&self) -> Result<Config, WranglingError> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.session_pattern = pattern.clone();
        }
        if let Some(index) = self.session_index {
            config.session_index = index;
        }
        if let Some(session) = &self.session {
            config.session_file = Some(session.clone());
        }
        if let Some(cell_analysis) = &self.cell_analysis {
            config.cell_analysis_file = Some(cell_analysis.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(output_file) = &self.output_file {
            config.output_file = output_file.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.train_ratio.is_some() || self.valid_ratio.is_some() || self.test_ratio.is_some() {
            config.ratios = SplitRatios::build(
                self.train_ratio.unwrap_or(config.ratios.train),
                self.valid_ratio.unwrap_or(config.ratios.valid),
                self.test_ratio.unwrap_or(config.ratios.test),
            )?;
        }
        config.persist_test |= self.persist_test;

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(cli: &Cli, config: &Config) -> Result<PathBuf, WranglingError> {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", config));
    let hash = hasher.finalize();
    let log_path = cli.log_dir.join(format!("{:x}.log", hash));

    let pattern = "{d(%Y-%m-%d %H:%M:%S)} {l} - {m}{n}";
    // Stdout carries the JSON summary
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}{n}")))
        .target(Target::Stderr)
        .build();
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build(&log_path)
        .map_err(|e| WranglingError::IOError(e.to_string()))?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(
            Root::builder()
                .appender("stderr")
                .appender("logfile")
                .build(level),
        )
        .map_err(|e| WranglingError::IOError(e.to_string()))?;

    log4rs::init_config(log_config).map_err(|e| WranglingError::IOError(e.to_string()))?;
    Ok(log_path)
}

fn main() -> Result<(), WranglingError> {
    let cli = Cli::parse();

    match &cli.command {
        Command::InitConfig { path } => {
            Config::default().save_to(path)?;
            println!("{}", path.display());
        }
        Command::Convert(args) => {
            let config = args.resolve()?;
            let log_path = init_logging(&cli, &config)?;
            log::info!("{:?}", config);
            log::debug!("Logging to {}", log_path.display());

            let summary = pipeline::convert(&config)?;
            let summary = serde_json::to_string_pretty(&summary)
                .map_err(|e| WranglingError::IOError(e.to_string()))?;
            println!("{}", summary);
        }
        Command::Verify(args) => {
            let config = args.resolve()?;
            init_logging(&cli, &config)?;
            log::info!("{:?}", config);

            let report = pipeline::verify_output(&config)?;
            let report = serde_json::to_string_pretty(&report)
                .map_err(|e| WranglingError::IOError(e.to_string()))?;
            println!("{}", report);
        }
    }
    Ok(())
}
