//! Tracing setup for the actions-usage binary.
//!
//! The report owns stdout, so the binary hands [`init_tracing`] a stderr
//! writer. Only the first call installs a subscriber; later calls are
//! no-ops.

use tracing::Level;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. `json` switches the output to
/// newline-delimited JSON.
pub fn init_tracing<W>(json: bool, level: Level, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let lines = fmt::layer().with_target(false).with_writer(writer);
    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        lines.json().boxed()
    } else {
        lines.boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}
