use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use simview::ViewerConfig;

/// Interactive viewer for rigid-body simulations
#[derive(Parser)]
#[command(name = "simview", version)]
#[command(about = "Step an MJCF model and view it in the terminal", long_about = None)]
struct Cli {
    /// Path to the model description file
    model: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .try_init();

    let config = ViewerConfig::from_env();
    if let Err(e) = simview::simulate(&cli.model, &config) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
