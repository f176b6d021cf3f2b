use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use espresso::{Error, Runtime};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const CLASS_PATH: &str = "./support/Main.class";
const CLASS: &str = "Main";
const METHOD: &str = "main";
const DESCRIPTOR: &str = "([Ljava/lang/String;)V";

fn run() -> anyhow::Result<()> {
    let mut runtime = Runtime::new();
    // Keep going so the missing class shows up as a failed invocation.
    if let Err(err) = runtime.load(Path::new(CLASS_PATH)) {
        warn!(path = CLASS_PATH, %err, "could not load class");
    }

    match runtime.invoke(CLASS, METHOD, DESCRIPTOR) {
        Err(Error::Uncaught(uncaught)) => {
            eprintln!("Exception in thread \"main\" {uncaught}");
            anyhow::bail!("{CLASS}.{METHOD} terminated by an uncaught exception")
        }
        result => {
            result.with_context(|| format!("running {CLASS}.{METHOD}{DESCRIPTOR}"))?;
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
