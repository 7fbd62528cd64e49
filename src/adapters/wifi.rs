//! WiFi station bring-up.
//!
//! Thin blocking glue over `esp-idf-svc`; connection management beyond the
//! initial association (reconnects, roaming) stays with the IDF event loop.

use anyhow::{anyhow, Context};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;

/// Associate with the configured network and wait for an address.
pub fn connect(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    ssid: &str,
    password: &str,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sys_loop.clone(), Some(nvs)).context("wifi driver init")?,
        sys_loop,
    )?;

    let mut client = ClientConfiguration {
        auth_method: if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    };
    client.ssid = ssid.try_into().map_err(|()| anyhow!("SSID too long"))?;
    client.password = password.try_into().map_err(|()| anyhow!("passphrase too long"))?;
    wifi.set_configuration(&Configuration::Client(client))?;

    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;
    info!(
        "wifi up: {:?}",
        wifi.wifi().sta_netif().get_ip_info()?
    );
    Ok(wifi)
}
