//! List available audio input devices.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::gateway::{input_devices, with_quiet_alsa};

/// Lists all available audio input devices on the system.
///
/// The printed IDs and names are the values accepted by `audio.device`
/// in the configuration file.
///
/// # Errors
/// - If the audio host cannot be initialized
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (host, devices) = with_quiet_alsa(|| {
        let host = cpal::default_host();
        let devices = input_devices(&host)?;
        Ok((host, devices))
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();

    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    for (index, (device_name, device)) in devices.iter().enumerate() {
        let default_indicator = if default_device.as_ref() == Some(device_name) {
            " [DEFAULT]"
        } else {
            ""
        };

        let config_info = match device.default_input_config() {
            Ok(config) => format!(
                " ({}Hz, {} channels, {:?})",
                config.sample_rate().0,
                config.channels(),
                config.sample_format()
            ),
            Err(_) => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {device_name}{default_indicator}");
        println!("    Config:{config_info}");
        println!();
    }

    Ok(())
}
