//! Hardware channel map.

use super::value::{Section, Value};
use crate::error::{AppResult, DaqError};
use std::fmt;

/// Named hardware channel slots a measurement can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelSlot {
    /// DAC generating the readout (resonator) tone.
    Readout,
    /// DAC generating the drive (qubit) tone.
    Drive,
    /// ADC digitizing the readout signal.
    Adc,
    /// DAC driving the laser.
    Laser,
}

impl ChannelSlot {
    /// Every slot.
    pub const ALL: [ChannelSlot; 4] = [
        ChannelSlot::Readout,
        ChannelSlot::Drive,
        ChannelSlot::Adc,
        ChannelSlot::Laser,
    ];

    /// Key under which the slot is stored.
    pub fn key(&self) -> &'static str {
        match self {
            ChannelSlot::Readout => "readout_channel",
            ChannelSlot::Drive => "drive_channel",
            ChannelSlot::Adc => "adc_channel",
            ChannelSlot::Laser => "laser_channel",
        }
    }

    /// Slot stored under `key`.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Assignment of channel indices to slots. Unassigned slots are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareMap {
    readout: Option<u32>,
    drive: Option<u32>,
    adc: Option<u32>,
    laser: Option<u32>,
}

impl HardwareMap {
    /// Map with every slot unassigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style assignment.
    pub fn with(mut self, slot: ChannelSlot, channel: u32) -> Self {
        self.set(slot, Some(channel));
        self
    }

    /// Channel assigned to `slot`.
    pub fn get(&self, slot: ChannelSlot) -> Option<u32> {
        match slot {
            ChannelSlot::Readout => self.readout,
            ChannelSlot::Drive => self.drive,
            ChannelSlot::Adc => self.adc,
            ChannelSlot::Laser => self.laser,
        }
    }

    /// Assign or clear a slot.
    pub fn set(&mut self, slot: ChannelSlot, channel: Option<u32>) {
        let entry = match slot {
            ChannelSlot::Readout => &mut self.readout,
            ChannelSlot::Drive => &mut self.drive,
            ChannelSlot::Adc => &mut self.adc,
            ChannelSlot::Laser => &mut self.laser,
        };
        *entry = channel;
    }

    /// True if `slot` has a channel.
    pub fn is_assigned(&self, slot: ChannelSlot) -> bool {
        self.get(slot).is_some()
    }

    /// Assigned slots only.
    pub fn assignments(&self) -> impl Iterator<Item = (ChannelSlot, u32)> + '_ {
        ChannelSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|ch| (slot, ch)))
    }

    /// Flatten into a section. Unassigned slots are omitted.
    pub fn to_section(&self) -> Section {
        self.assignments()
            .map(|(slot, ch)| (slot.key().to_string(), Value::from(ch)))
            .collect()
    }

    /// Rebuild from a stored section. Unknown keys are rejected.
    pub fn from_section(section: &Section) -> AppResult<Self> {
        let mut map = Self::new();
        for (key, value) in section {
            let slot = ChannelSlot::from_key(key)
                .ok_or_else(|| DaqError::configuration(key, "unknown hardware channel slot"))?;
            let channel = value
                .as_i64()
                .and_then(|ch| u32::try_from(ch).ok())
                .ok_or_else(|| {
                    DaqError::configuration(key, format!("invalid channel index {value}"))
                })?;
            map.set(slot, Some(channel));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_slots_are_omitted() {
        let map = HardwareMap::new()
            .with(ChannelSlot::Readout, 6)
            .with(ChannelSlot::Adc, 0);
        let section = map.to_section();
        assert_eq!(section.len(), 2);
        assert!(!section.contains_key("drive_channel"));
        assert_eq!(HardwareMap::from_section(&section).unwrap(), map);
    }

    #[test]
    fn rejects_unknown_and_negative_channels() {
        let mut section = Section::new();
        section.insert("bias_channel".into(), Value::Int(4));
        assert!(HardwareMap::from_section(&section).is_err());

        let mut section = Section::new();
        section.insert("adc_channel".into(), Value::Int(-1));
        let err = HardwareMap::from_section(&section).unwrap_err();
        assert_eq!(err.offending_field(), Some("adc_channel"));
    }
}
