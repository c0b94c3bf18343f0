//! Descriptors decoded from host replies.

use serde::{Deserialize, Serialize};

/// A plugin the host found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub is_instrument: bool,
    /// Stable plugin type id
    pub uid: u32,
    pub num_inputs: u32,
    pub num_outputs: u32,
    pub name: String,
    pub descriptive_name: String,
    /// "VST3", "AudioUnit", "LV2", ...
    pub format_name: String,
    pub category: String,
    pub manufacturer: String,
    pub version: String,
    pub file_or_identifier: String,
    /// Host-formatted modification time of the plugin file
    pub last_modified: String,
    pub path: String,
}

impl PluginDescriptor {
    /// Minimal descriptor, mostly useful for tests and fixtures.
    pub fn new(uid: u32, name: impl Into<String>) -> Self {
        Self {
            is_instrument: false,
            uid,
            num_inputs: 0,
            num_outputs: 2,
            name: name.into(),
            descriptive_name: String::new(),
            format_name: String::new(),
            category: String::new(),
            manufacturer: String::new(),
            version: String::new(),
            file_or_identifier: String::new(),
            last_modified: String::new(),
            path: String::new(),
        }
    }
}

/// Numeric range of a plugin parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub interval: f32,
    pub skew: f32,
}

impl Default for ParameterRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            default: 0.0,
            interval: 0.0,
            skew: 1.0,
        }
    }
}

impl ParameterRange {
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFlags {
    pub discrete: bool,
    pub boolean: bool,
    pub orientation_inverted: bool,
    pub automatable: bool,
    pub meta: bool,
}

/// Parameter metadata as reported by `get_params_info`.
///
/// `original_index` is the host-stable index used by every parameter command;
/// the host skips invalid parameters, so it is not the position in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub original_index: u32,
    pub name: String,
    pub range: ParameterRange,
    pub value: f32,
    pub num_steps: u32,
    pub flags: ParameterFlags,
}

/// One input or output bus of a loaded processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusDescriptor {
    pub num_channels: u32,
    pub channel_types: Vec<String>,
    pub enabled: bool,
    pub layout: String,
}

/// Reply of `get_channels_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsInfo {
    pub accepts_midi: bool,
    pub produces_midi: bool,
    pub inputs: Vec<BusDescriptor>,
    pub outputs: Vec<BusDescriptor>,
}

impl ChannelsInfo {
    pub fn total_input_channels(&self) -> u32 {
        self.inputs.iter().map(|b| b.num_channels).sum()
    }

    pub fn total_output_channels(&self) -> u32 {
        self.outputs.iter().map(|b| b.num_channels).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_bounds() {
        let range = ParameterRange {
            min: -1.0,
            max: 1.0,
            ..Default::default()
        };
        assert!(range.contains(-1.0));
        assert!(range.contains(1.0));
        assert!(!range.contains(1.5));
    }

    #[test]
    fn channel_totals_sum_buses() {
        let bus = |n| BusDescriptor {
            num_channels: n,
            channel_types: vec![],
            enabled: true,
            layout: String::new(),
        };
        let info = ChannelsInfo {
            accepts_midi: true,
            produces_midi: false,
            inputs: vec![bus(2), bus(1)],
            outputs: vec![bus(2)],
        };
        assert_eq!(info.total_input_channels(), 3);
        assert_eq!(info.total_output_channels(), 2);
    }
}
