// SPDX-License-Identifier: GPL-2.0
//! handheld-wrapd - virtual gamepad for handheld input devices

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use handheld_wrapd::WrapperConfig;

#[derive(Parser)]
#[command(name = "handheld-wrapd")]
#[command(version, about = "Merge handheld input devices into one virtual gamepad")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = WrapperConfig::default();
    match handheld_wrapd::run(&config) {
        Ok(never) => match never {},
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_status())
        }
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt().with_env_filter(filter).with_target(false).init();
}
