//! Command-line entry point: run a parameter script against the engine.

mod error;
mod io;
mod script;
mod snapshot;

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("usage: gaussic [--single] <paramfile>");
    eprintln!();
    eprintln!("Runs the command script and writes particle snapshot and");
    eprintln!("power-spectrum outputs next to it. --single selects");
    eprintln!("single-precision fields.");
    std::process::exit(2);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut single_precision = false;
    let mut paramfile: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--single" => single_precision = true,
            "--help" | "-h" => usage(),
            other if paramfile.is_none() => paramfile = Some(PathBuf::from(other)),
            _ => usage(),
        }
    }
    let Some(paramfile) = paramfile else { usage() };

    let outcome = if single_precision {
        script::run_script::<f32>(&paramfile)
    } else {
        script::run_script::<f64>(&paramfile)
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fatal: {error}");
            ExitCode::FAILURE
        }
    }
}
