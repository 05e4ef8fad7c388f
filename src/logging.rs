use tracing_subscriber::EnvFilter;

/// Filter directive for the verbosity flags. `--silent` wins over `--debug`.
pub fn default_directive(debug: bool, silent: bool) -> &'static str {
    if silent {
        "chatcat=error"
    } else if debug {
        "chatcat=debug"
    } else {
        "chatcat=info"
    }
}

/// Install the global subscriber, logging to stderr.
///
/// `RUST_LOG` is honoured unless a verbosity flag was given.
pub fn init(debug: bool, silent: bool) {
    let directive = default_directive(debug, silent);
    let filter = if debug || silent {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
