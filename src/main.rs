use acinfinity_ble::cli::{render, Action, Cli};
use acinfinity_ble::domain::settings::SettingsService;
use acinfinity_ble::infrastructure::bluetooth::connection::BleConnection;
use acinfinity_ble::infrastructure::bluetooth::transport::BleTransport;
use acinfinity_ble::infrastructure::bluetooth::FanService;
use acinfinity_ble::infrastructure::link_reset::{ControlUtilityReset, LinkReset, NoLinkReset};
use acinfinity_ble::infrastructure::logging::init_logger;
use acinfinity_ble::infrastructure::resilience::RetryPolicy;
use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let invocation = match cli.resolve() {
        Ok(invocation) => invocation,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let mut settings_service = SettingsService::new(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings_service.get_mut().log_settings.level = level.as_str().to_string();
    }
    let settings = settings_service.get().clone();
    let _logging_guard = init_logger(&settings.log_settings)?;
    debug!("Settings path: {:?}", settings_service.path());

    let transport: Arc<dyn BleTransport> = Arc::new(
        BleConnection::new(settings.ble.scan_duration())
            .await
            .context("Failed to open Bluetooth adapter")?,
    );
    let link_reset: Arc<dyn LinkReset> = if settings.link_reset.enabled {
        Arc::new(ControlUtilityReset::locate(&settings.link_reset.program).await)
    } else {
        Arc::new(NoLinkReset)
    };

    let service = FanService::new(
        transport,
        link_reset,
        settings.ble.clone(),
        RetryPolicy::from(&settings.retry),
    );

    // Some stacks only resolve a peripheral after it has been seen in a scan
    service.check_presence(&invocation.address).await;

    match invocation.action {
        Action::Get(reading) => {
            let readings = service.read_sensors(&invocation.address).await?;
            println!("{}", render(&readings, reading)?);
        }
        Action::Set(command) => {
            service.set_fan(&invocation.address, command).await?;
        }
    }

    Ok(())
}
