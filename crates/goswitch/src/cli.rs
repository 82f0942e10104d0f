use std::io::Write as _;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use goswitch_backend::{InstalledVersion, ReleaseClassification, RemoteRelease};
use goswitch_shell::{ShellType, VerificationResult, detect_shells};

use crate::app::{App, AppEvent};
use crate::error::{AppError, SUCCESS};

#[derive(Debug, Parser)]
#[command(name = "goswitch", version, about = "Install and switch between Go SDK versions")]
pub struct Cli {
    /// Print debug logs to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Installed versions, managed and system-wide
    #[command(alias = "ls")]
    List,
    /// Versions published upstream
    Remote {
        /// Hide release candidates and betas
        #[arg(long)]
        stable: bool,
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Make a version (or an SDK directory) the active one
    Use { target: String },
    /// Download and install a version
    Install { version: String },
    /// Remove a version goswitch installed
    #[command(alias = "rm")]
    Uninstall { version: String },
    /// Print shell code that puts the active Go on PATH
    Env {
        #[arg(long)]
        shell: Option<ShellType>,
    },
    /// Load `goswitch env` from your shell profile
    SetupShell {
        #[arg(long)]
        shell: Option<ShellType>,
        /// Take the init line back out
        #[arg(long, conflicts_with = "check")]
        remove: bool,
        /// Only report whether the shell is set up
        #[arg(long)]
        check: bool,
    },
}

pub async fn run(cli: Cli, app: &App) -> ExitCode {
    let json = cli.json;
    let result = match cli.command {
        Command::List => app.list_versions().await.map(|versions| {
            if json {
                print_json(&versions);
            } else {
                print_installed(&versions);
            }
        }),
        Command::Remote { stable, limit } => {
            app.fetch_remote_versions().await.map(|mut releases| {
                if stable {
                    releases.retain(|r| r.classification == ReleaseClassification::Stable);
                }
                if let Some(limit) = limit {
                    releases.truncate(limit);
                }
                if json {
                    print_json(&releases);
                } else {
                    print_remote(&releases);
                }
            })
        }
        Command::Use { target } => return finish(&app.switch_version(&target).await),
        Command::Install { version } => return finish(&install(app, &version, json).await),
        Command::Uninstall { version } => {
            return finish(&app.uninstall_version(&version).await);
        }
        Command::Env { shell } => {
            resolve_shell(shell).and_then(|shell| app.env_snippet(shell)).map(|snippet| {
                print!("{snippet}");
            })
        }
        Command::SetupShell {
            shell,
            remove,
            check,
        } => setup_shell(app, shell, remove, check).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn finish(outcome: &str) -> ExitCode {
    println!("{outcome}");
    if outcome == SUCCESS {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn install(app: &App, version: &str, json: bool) -> String {
    let mut events = app.subscribe();
    let install = app.install_version(version);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(install, interrupted);
    let mut cancelling = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut install => break outcome,
            _ = &mut interrupted, if !cancelling => {
                cancelling = true;
                eprintln!("\nCancelling install of {version}...");
                app.cancel_install();
            }
            event = events.recv() => {
                if let Ok(event) = event {
                    show_event(&event, json);
                }
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        show_event(&event, json);
    }
    if !json {
        eprintln!();
    }
    outcome
}

fn show_event(event: &AppEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
        return;
    }
    let AppEvent::DownloadProgress(progress) = event;
    eprint!("\rDownloading Go {}: {:>3}%", progress.version, progress.progress);
    let _ = std::io::stderr().flush();
}

async fn setup_shell(
    app: &App,
    shell: Option<ShellType>,
    remove: bool,
    check: bool,
) -> Result<(), AppError> {
    let shell = resolve_shell(shell)?;

    if check {
        let status = match app.verify_shell(shell).await? {
            VerificationResult::Configured => "configured".to_string(),
            VerificationResult::NotConfigured => "not configured".to_string(),
            VerificationResult::ConfigFileNotFound => "no profile found".to_string(),
            VerificationResult::FunctionalButNotInConfig => {
                "working, but not through a goswitch profile line".to_string()
            }
            VerificationResult::Error(message) => format!("could not check: {message}"),
        };
        println!("{shell}: {status}");
        return Ok(());
    }

    let edit = app.setup_shell(shell, remove)?;
    println!("{}", edit.diff_preview().trim_end());
    if edit.has_changes() && !remove {
        println!("Open a new {shell} session to pick it up.");
    }
    Ok(())
}

fn resolve_shell(shell: Option<ShellType>) -> Result<ShellType, AppError> {
    shell
        .or_else(ShellType::from_env)
        .or_else(|| detect_shells().into_iter().next())
        .ok_or(AppError::UnknownShell)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(error) => eprintln!("Error: {error}"),
    }
}

fn print_installed(versions: &[InstalledVersion]) {
    if versions.is_empty() {
        println!("No Go versions installed. Try `goswitch install <version>`.");
        return;
    }
    for version in versions {
        let marker = if version.active { "*" } else { " " };
        let origin = if version.managed { "goswitch" } else { "system" };
        let installed = version
            .install_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "{marker} {:<12} {origin:<9} {installed:<10} {}",
            version.version,
            version.path.display()
        );
    }
}

fn print_remote(releases: &[RemoteRelease]) {
    for release in releases {
        let note = match release.classification {
            ReleaseClassification::Stable => "",
            ReleaseClassification::PreRelease => " (pre-release)",
        };
        let unavailable = if release.artifact.is_none() {
            " [no build for this platform]"
        } else {
            ""
        };
        println!("{}{note}{unavailable}", release.version);
    }
}
