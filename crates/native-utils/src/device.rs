use anyhow::{Context, anyhow};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

// Finds the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    let Some(target) = device_name else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device"));
    };
    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow!("No input device named {target}"))
}

// Same as above, for output devices.
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    let Some(target) = device_name else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default output device"));
    };
    host.output_devices()
        .context("Failed to enumerate output devices")?
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow!("No output device named {target}"))
}

fn describe(device: &Device, config: cpal::SupportedStreamConfig, default_name: &str) -> String {
    let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    let mut d = format!(
        " * {}({}ch, {}hz)",
        name,
        config.channels(),
        config.sample_rate().0
    );
    if name == default_name {
        d.push_str(" [default]");
    }
    d
}

/// One line per input device, marking the default.
pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();
    let mut device_names = Vec::new();
    for device in host.input_devices()? {
        match device.default_input_config() {
            Ok(cfg) => device_names.push(describe(&device, cfg, &default_device)),
            Err(e) => tracing::debug!("Skipping input device without config: {}", e),
        }
    }
    Ok(device_names.join("\n"))
}

/// One line per output device, marking the default.
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();
    let mut device_names = Vec::new();
    for device in host.output_devices()? {
        match device.default_output_config() {
            Ok(cfg) => device_names.push(describe(&device, cfg, &default_device)),
            Err(e) => tracing::debug!("Skipping output device without config: {}", e),
        }
    }
    Ok(device_names.join("\n"))
}
