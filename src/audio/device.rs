use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, StreamConfig};
use serde::{Deserialize, Serialize};

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device identifier (unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this is the default input device
    pub is_default: bool,
}

/// List all available input devices
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if no input devices are found.
///
/// # Example
/// ```no_run
/// use voxline::audio::device::list_input_devices;
///
/// let devices = list_input_devices().unwrap();
/// for device in devices {
///     println!("Device: {}", device.name);
/// }
/// ```
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let devices: Vec<Device> = host.input_devices()?.collect();

    if devices.is_empty() {
        return Err(AudioError::DeviceNotFound);
    }

    let default_name = host
        .default_input_device()
        .as_ref()
        .and_then(|d| d.name().ok());

    let mut audio_devices = Vec::new();

    for device in devices {
        let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;
        let is_default = default_name.as_ref().is_some_and(|dn| dn == &name);

        audio_devices.push(AudioDevice {
            id: name.clone(),
            name,
            is_default,
        });
    }

    Ok(audio_devices)
}

/// Get the configuration for a specific input device
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if the device is not found.
pub fn get_device_config(device_id: &str) -> AudioResult<StreamConfig> {
    let host = cpal::default_host();
    let device = find_device_by_id(&host, device_id)?;

    let config = device.default_input_config()?;

    Ok(StreamConfig {
        channels: config.channels(),
        sample_rate: config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}

/// Find an input device by its ID (name)
pub(crate) fn find_device_by_id(host: &Host, device_id: &str) -> AudioResult<Device> {
    let devices: Vec<Device> = host.input_devices().map_err(AudioError::CpalError)?.collect();

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_id {
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound)
}

/// Get the default output device for playback
pub(crate) fn default_output_device(host: &Host) -> AudioResult<Device> {
    host.default_output_device()
        .ok_or(AudioError::OutputDeviceNotFound)
}
