//! Log output for the demo tool and for debugging tests.

use tracing_subscriber::EnvFilter;

/// Installs a subscriber printing the resolver's events to stderr.
///
/// What gets printed is picked through RUST_LOG. Some useful settings:
///
/// - `RUST_LOG=debug` shows every query sent and every SIP step,
/// - `RUST_LOG=sipresolv::sip=debug` only follows the SIP lookups,
/// - `RUST_LOG=trace,sipresolv::resolv::cache=off` shows everything
///   except the cache.
///
/// A second call does nothing.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

//============ Testing =======================================================
