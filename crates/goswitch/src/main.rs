mod app;
mod cache;
mod cli;
mod error;
mod logging;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use log::info;

use goswitch_platform::AppPaths;

use crate::app::App;
use crate::cli::Cli;
use crate::settings::AppSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };
    let settings = AppSettings::load(&paths);
    let paths = settings.apply_to_paths(paths);

    logging::init_logging(
        &paths,
        settings.debug_logging,
        cli.verbose,
        settings.max_log_size_bytes,
    );
    info!("goswitch {} using {}", env!("CARGO_PKG_VERSION"), paths.root_dir.display());

    if !paths.settings_file().exists()
        && let Err(error) = settings.save(&paths)
    {
        log::warn!("Could not write default settings: {error}");
    }

    let app = match App::new(settings, paths) {
        Ok(app) => app,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };
    app.start().await;

    cli::run(cli, &app).await
}
