use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

const CLIENT_NAME: &str = "saavy-poly";

/// An input port as offered to the device picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiDevice {
    pub id: String,
    pub name: String,
}

/// Enumerates MIDI inputs and keeps at most one of them connected.
///
/// Every message from the connected port is forwarded as raw bytes; decoding
/// happens on the control thread.
pub struct MidiInputs {
    connection: Option<MidiInputConnection<()>>,
    selected: Option<MidiDevice>,
}

impl MidiInputs {
    pub fn new() -> Self {
        Self {
            connection: None,
            selected: None,
        }
    }

    /// Available input ports. Access failures degrade to an empty list.
    pub fn list() -> Vec<MidiDevice> {
        match Self::try_list() {
            Ok(devices) => devices,
            Err(err) => {
                log::error!("could not connect to MIDI devices: {err}");
                Vec::new()
            }
        }
    }

    fn try_list() -> Result<Vec<MidiDevice>> {
        let midi_in = open_client()?;
        let devices = midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiDevice {
                id: port.id(),
                name: midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {index}")),
            })
            .collect();
        Ok(devices)
    }

    /// Connect to the port with `id`, dropping any previous connection.
    pub fn select(&mut self, id: &str, sender: Sender<Vec<u8>>) -> Result<MidiDevice> {
        self.disconnect();

        let midi_in = open_client()?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| port.id() == id)
            .ok_or_else(|| SynthError::MidiAccess(format!("no MIDI input with id '{id}'")))?;
        let device = MidiDevice {
            id: id.to_string(),
            name: midi_in
                .port_name(&port)
                .unwrap_or_else(|_| id.to_string()),
        };

        let connection = midi_in
            .connect(
                &port,
                "saavy-poly-input",
                move |_stamp, bytes, _| {
                    log::trace!("midi message received: {bytes:?}");
                    let _ = sender.send(bytes.to_vec());
                },
                (),
            )
            .map_err(|err| SynthError::MidiAccess(err.to_string()))?;

        log::info!("listening to MIDI input '{}'", device.name);
        self.connection = Some(connection);
        self.selected = Some(device.clone());
        Ok(device)
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&MidiDevice> {
        self.selected.as_ref()
    }
}

impl Default for MidiInputs {
    fn default() -> Self {
        Self::new()
    }
}

fn open_client() -> Result<MidiInput> {
    MidiInput::new(CLIENT_NAME).map_err(|err| SynthError::MidiAccess(err.to_string()))
}

/// Pick the device to listen to at startup: the remembered one if it is still
/// present, otherwise the first available.
pub fn choose_device<'a>(devices: &'a [MidiDevice], remembered: Option<&str>) -> Option<&'a MidiDevice> {
    remembered
        .and_then(|id| devices.iter().find(|device| device.id == id))
        .or_else(|| devices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<MidiDevice> {
        vec![
            MidiDevice {
                id: "a".into(),
                name: "Keys".into(),
            },
            MidiDevice {
                id: "b".into(),
                name: "Pads".into(),
            },
        ]
    }

    #[test]
    fn remembered_device_wins() {
        let devices = devices();
        assert_eq!(choose_device(&devices, Some("b")).map(|d| d.name.as_str()), Some("Pads"));
    }

    #[test]
    fn falls_back_to_first_device() {
        let devices = devices();
        assert_eq!(choose_device(&devices, Some("gone")).map(|d| d.id.as_str()), Some("a"));
        assert_eq!(choose_device(&devices, None).map(|d| d.id.as_str()), Some("a"));
        assert!(choose_device(&[], Some("a")).is_none());
    }
}
