use std::process;

use prose_editor::EditorError;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match prose_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("prose-md error: {err:#}");
            let code = err
                .downcast_ref::<EditorError>()
                .map_or(1, |err| err.exit_code() as i32);
            process::exit(code);
        }
    }
}
