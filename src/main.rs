use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use apigw_upload::{Config, HttpTransport, Uploader};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "apigw-upload")]
#[command(version, about = "Upload an image to an AWS API Gateway endpoint, signed with AWS SigV4", long_about = None)]
struct Cli {
    /// Image file to upload, relative to the base directory
    #[arg(value_name = "FILE")]
    file: String,

    /// Directory holding the image and the optional .env file.
    ///
    /// Defaults to the current working directory, not the directory the
    /// executable is installed in.
    #[arg(long, env = "UPLOAD_BASE_DIR")]
    base_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries the upload report.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to determine the current directory")?,
    };

    // One upload per process: a single-threaded runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let config = Config::load(&base_dir);
    debug!(?config, mode = %config.signing_mode(), "configuration loaded");

    let uploader = Uploader::new(config, base_dir, HttpTransport::new()?);
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(uploader.run(&cli.file, &mut stdout))?;

    Ok(())
}
