//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Default filter directive for the given flags. `--quiet` wins over `--verbose`.
fn default_directive(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` overrides the level chosen by the flags.
pub fn init(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(global)));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(global.color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = installed {
        eprintln!("warning: logging already initialized: {e}");
    }
}
