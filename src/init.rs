use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::ShipperError;
use crate::layer::IngestLayer;
use crate::pipeline::LogShipper;

/// How the global subscriber is assembled around the [`IngestLayer`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is added
///   next to the ingest layer so events (including the shipper's own side
///   channel diagnostics) are also printed locally. If `false`, the ingest
///   layer prints side channel warnings and errors to stderr itself, so
///   rejected or failed batches are never silent.
/// - `stdout_filter`: directives for the fmt layer, e.g.
///   `"info,log_shipper=debug"`. `None` reads `RUST_LOG`, falling back to
///   `info`. Does not affect what is shipped.
/// - `extra_ignored_targets`: target prefixes the ingest layer must skip on
///   top of its defaults.
#[derive(Clone, Debug)]
pub struct InitConfig {
    pub enable_stdout: bool,
    pub stdout_filter: Option<String>,
    pub extra_ignored_targets: Vec<String>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            stdout_filter: None,
            extra_ignored_targets: Vec::new(),
        }
    }
}

/// Build the ingest layer for `shipper` according to `config`, for hosts
/// that assemble their own subscriber.
///
/// With `enable_stdout` off the layer reports side channel warnings to
/// stderr; a host that adds its own `fmt` layer can turn that back off with
/// [`IngestLayer::report_side_channel`].
pub fn ingest_layer(shipper: &LogShipper, config: &InitConfig) -> IngestLayer {
    let layer = IngestLayer::new(shipper.emitter()).report_side_channel(!config.enable_stdout);
    config
        .extra_ignored_targets
        .iter()
        .fold(layer, |layer, target| layer.ignore_target(target.clone()))
}

/// Install a global `tracing` subscriber that forwards events into
/// `shipper`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`IngestLayer`] (and optionally a
/// filtered `fmt` layer) as the global default, so all `tracing` events in
/// the process are observed. The shipper itself still has to be started.
///
/// **Returns**
/// - `Err(ShipperError::SetGlobalDefault(..))` if a global subscriber is
///   already installed.
pub fn init_tracing_with_config(shipper: &LogShipper, config: InitConfig) -> Result<(), ShipperError> {
    let ingest = ingest_layer(shipper, &config);

    let fmt_layer = config.enable_stdout.then(|| {
        let filter = match &config.stdout_filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        tracing_subscriber::fmt::layer().with_filter(filter)
    });

    let subscriber = Registry::default().with(ingest).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Install the global subscriber with [`InitConfig::default`].
pub fn init_tracing(shipper: &LogShipper) -> Result<(), ShipperError> {
    init_tracing_with_config(shipper, InitConfig::default())
}
