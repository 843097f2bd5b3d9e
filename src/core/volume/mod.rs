//! # Volume Module
//!
//! Enumerates the storage volumes a device exposes and classifies
//! them for the mirror layout.
//!
//! Some firmware omits the hidden internal volume from its enumeration
//! answer even though the volume exists and holds media. The
//! enumerator compensates by probing the known ref directly and
//! appending it when the probe confirms a hidden volume.

use tracing::{debug, error, warn};

use crate::core::device::{DeviceVfs, MediaType, VolumeInfo, VolumeRef};
use crate::core::sync::SyncConfig;
use crate::error::VolumeError;
use crate::events::{Event, EventSender, VolumeEvent};

/// One usable storage volume for the duration of a sync pass.
#[derive(Debug, Clone)]
pub struct Volume {
    pub volume_ref: VolumeRef,
    pub info: VolumeInfo,
}

impl Volume {
    /// Directory name this volume contributes to the mirror layout.
    pub fn label(&self) -> String {
        card_label(&self.info)
    }
}

/// Classify a volume for the mirror layout.
///
/// Built-in flash becomes `Device`, SD cards become `SDCard`, and
/// anything else gets a numbered card directory.
pub fn card_label(info: &VolumeInfo) -> String {
    match info.media_type {
        MediaType::INTERNAL => "Device".to_string(),
        MediaType::SD_CARD => "SDCard".to_string(),
        _ => format!("card{}", info.slot),
    }
}

/// List the device's volumes, working around firmware that hides one.
///
/// A failing enumeration primitive is treated as an empty answer, the
/// configured hidden ref is probed and appended when confirmed, and
/// the result is clamped to `max_volumes`. Info queries that fail
/// leave the volume in place with default metadata. Errors only when
/// no volume at all is available.
pub fn enumerate_volumes(
    device: &dyn DeviceVfs,
    config: &SyncConfig,
    events: &EventSender,
) -> Result<Vec<Volume>, VolumeError> {
    events.send(Event::Volume(VolumeEvent::Started));

    let mut refs = match device.volumes() {
        Ok(refs) => refs,
        Err(e) => {
            warn!("volume enumeration failed, continuing with none: {}", e);
            Vec::new()
        }
    };
    debug!("device reported {} volume(s)", refs.len());

    if config.probe_hidden_volume && !refs.contains(&config.hidden_volume_ref) {
        let hidden = config.hidden_volume_ref;
        match device.volume_info(hidden) {
            Ok(info) if info.is_hidden() => {
                debug!("volume {} is present but unlisted, appending", hidden);
                events.send(Event::Volume(VolumeEvent::HiddenProbed {
                    volume: hidden.0,
                    present: true,
                }));
                refs.push(hidden);
            }
            Ok(_) => {
                debug!("volume {} probe found a non-hidden volume, ignoring", hidden);
                events.send(Event::Volume(VolumeEvent::HiddenProbed {
                    volume: hidden.0,
                    present: false,
                }));
            }
            Err(e) => {
                debug!("volume {} probe came back empty: {}", hidden, e);
                events.send(Event::Volume(VolumeEvent::HiddenProbed {
                    volume: hidden.0,
                    present: false,
                }));
            }
        }
    }

    if refs.len() > config.max_volumes {
        error!(
            "device reported {} volumes, keeping the first {}",
            refs.len(),
            config.max_volumes
        );
        refs.truncate(config.max_volumes);
    }

    if refs.is_empty() {
        return Err(VolumeError::NoVolumes);
    }

    let volumes: Vec<Volume> = refs
        .into_iter()
        .map(|volume_ref| {
            let info = match device.volume_info(volume_ref) {
                Ok(info) => info,
                Err(e) => {
                    warn!(
                        "info query failed for volume {}, using defaults: {}",
                        volume_ref, e
                    );
                    VolumeInfo::default()
                }
            };
            let volume = Volume { volume_ref, info };
            events.send(Event::Volume(VolumeEvent::Found {
                volume: volume_ref.0,
                label: volume.label(),
            }));
            volume
        })
        .collect();

    events.send(Event::Volume(VolumeEvent::Completed {
        total_volumes: volumes.len(),
    }));

    Ok(volumes)
}
