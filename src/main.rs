//! machtweak - patch and inject dylibs into Mach-O application bundles.
//!
//! Reads the installed application version, selects the matching patch
//! config entry, applies the byte patches, injects the companion plugin
//! dylib, and re-signs the bundle.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use machtweak::{config, inject_dylib, patch_binary, Arch};

/// Default file name of the companion plugin dylib, looked up next to the
/// running executable.
const DEFAULT_PLUGIN_NAME: &str = "TweakPlugin.dylib";

/// A command-line tool for patching and tweaking Mach-O application bundles.
#[derive(Parser, Debug)]
#[command(name = "machtweak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    #[arg(short, long, global = true, default_value = "2")]
    verbosity: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the installed app version and all versions the config supports
    Versions {
        #[command(flatten)]
        options: Options,
    },

    /// Patch the app: apply byte patches, inject the plugin dylib, re-sign
    Patch {
        #[command(flatten)]
        options: Options,

        /// Plugin dylib to copy into the bundle and inject.
        /// Defaults to TweakPlugin.dylib next to this executable; skipped if absent.
        #[arg(short, long)]
        dylib: Option<PathBuf>,

        /// Architecture to inject into for fat binaries ("arm64" or "x86_64", repeatable)
        #[arg(long = "inject-arch", default_value = "arm64")]
        inject_archs: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct Options {
    /// Path of the target .app bundle
    #[arg(short, long)]
    app: PathBuf,

    /// Local path of the patch config JSON
    #[arg(short, long)]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match cli.command {
        Commands::Versions { options } => cmd_versions(options),
        Commands::Patch {
            options,
            dylib,
            inject_archs,
        } => cmd_patch(options, dylib, inject_archs),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn cmd_versions(options: Options) -> Result<()> {
    let version = bundle_value(&options.app, "CFBundleVersion")?;
    println!("------ Current version ------");
    println!("{}", version);

    println!("------ Supported versions ------");
    for target in config::load(&options.config)? {
        println!("{}", target.version);
    }
    Ok(())
}

fn cmd_patch(options: Options, dylib: Option<PathBuf>, inject_archs: Vec<String>) -> Result<()> {
    let archs = parse_archs(&inject_archs)?;

    let version = bundle_value(&options.app, "CFBundleVersion")?;
    info!("App version: {}", version);

    let targets = config::load(&options.config)?;
    let target = targets
        .into_iter()
        .find(|t| t.version == version)
        .with_context(|| format!("no patch config matches version '{}'", version))?;
    info!(
        "Matched config for {} ({} patch groups)",
        target.version,
        target.targets.len()
    );

    let binary = app_binary(&options.app)?;
    patch_binary(&binary, &target)
        .with_context(|| format!("failed to patch {}", binary.display()))?;
    info!("Patched {}", binary.display());

    match plugin_source(dylib)? {
        Some(source) => {
            let name = source
                .file_name()
                .context("plugin dylib has no file name")?
                .to_string_lossy()
                .into_owned();
            let dest = binary
                .parent()
                .context("app binary has no parent directory")?
                .join(&name);
            if dest.exists() {
                fs::remove_file(&dest)?;
            }
            fs::copy(&source, &dest)
                .with_context(|| format!("failed to copy plugin to {}", dest.display()))?;
            info!("Plugin copied to {}", dest.display());

            let install_path = format!("@executable_path/{}", name);
            inject_dylib(&binary, &install_path, &archs)
                .with_context(|| format!("failed to inject {}", install_path))?;
            info!("Plugin injected");
        }
        None => warn!("plugin dylib not found, skipping injection"),
    }

    resign(&options.app)?;
    info!("Done");
    Ok(())
}

fn parse_archs(names: &[String]) -> Result<Vec<Arch>> {
    names
        .iter()
        .map(|name| match name.as_str() {
            "arm64" => Ok(Arch::Arm64),
            "x86_64" => Ok(Arch::X86_64),
            other => bail!("unsupported architecture '{}'", other),
        })
        .collect()
}

/// Resolves the plugin dylib: an explicit path must exist; the default (next
/// to the running executable) may be absent, which skips the plugin steps.
fn plugin_source(dylib: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match dylib {
        Some(path) => {
            if !path.is_file() {
                bail!("plugin dylib not found: {}", path.display());
            }
            Ok(Some(path))
        }
        None => {
            let exe = env::current_exe()?;
            let default = exe
                .parent()
                .map(|dir| dir.join(DEFAULT_PLUGIN_NAME))
                .filter(|p| p.is_file());
            Ok(default)
        }
    }
}

/// Reads a key from the bundle's Info.plist via `defaults`.
fn bundle_value(app: &Path, key: &str) -> Result<String> {
    let plist = app.join("Contents/Info.plist");
    run("defaults", &["read", &plist.to_string_lossy(), key])
}

/// Locates the main executable under Contents/MacOS.
fn app_binary(app: &Path) -> Result<PathBuf> {
    let name = bundle_value(app, "CFBundleExecutable")?;
    let binary = app.join("Contents/MacOS").join(&name);
    if !binary.is_file() {
        bail!("app binary not found: {}", binary.display());
    }
    Ok(binary)
}

/// Strips the existing signature, ad-hoc re-signs, and clears extended
/// attributes. Run after every successful mutation.
fn resign(app: &Path) -> Result<()> {
    let app = app.to_string_lossy();
    run("codesign", &["--remove-sign", &app])?;
    run("codesign", &["--force", "--deep", "--sign", "-", &app])?;
    run("xattr", &["-cr", &app])?;
    info!("Re-signed {}", app);
    Ok(())
}

/// Runs an external command, returning its trimmed stdout.
fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Process::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {}", program))?;

    if !output.status.success() {
        bail!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
