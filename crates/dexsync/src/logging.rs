use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` is honored unless `-v` or `-q` pins the level.
pub fn init(verbose: bool, quiet: bool) {
    INIT.get_or_init(|| {
        let filter = if quiet {
            EnvFilter::new("error")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy()
        };

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
