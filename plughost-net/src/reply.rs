//! Reply layouts for the command pipe.
//!
//! Which layout follows which command is fixed by the tag table; the session
//! picks the type, the channel reads it.

use std::io::{self, Read};

use plughost_types::{
    BusDescriptor, ChannelsInfo, ParameterDescriptor, ParameterFlags, ParameterRange,
    PluginDescriptor,
};

use crate::protocol::WireMessage;
use crate::wire::{WireReader, WireWriter};

/// Upper bound on pre-allocation for counted lists read off the wire.
const MAX_PREALLOC: usize = 1024;

fn read_list<T: WireMessage, R: Read>(r: &mut WireReader<R>, count: u32) -> io::Result<Vec<T>> {
    let mut items = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
    for _ in 0..count {
        items.push(T::decode(r)?);
    }
    Ok(items)
}

/// `success:u32, errmsg:str`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReply {
    pub success: bool,
    pub message: String,
}

impl StatusReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl WireMessage for StatusReply {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.success).str(&self.message);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        Ok(Self {
            success: r.flag()?,
            message: r.str()?,
        })
    }
}

/// Reply to both load commands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadReply {
    pub success: bool,
    pub name: String,
    pub uid: u32,
    pub message: String,
}

impl WireMessage for LoadReply {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.success)
            .str(&self.name)
            .u32(self.uid)
            .str(&self.message);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        Ok(Self {
            success: r.flag()?,
            name: r.str()?,
            uid: r.u32()?,
            message: r.str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueReply {
    pub success: bool,
    pub value: f32,
    pub message: String,
}

impl WireMessage for ValueReply {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.success).f32(self.value).str(&self.message);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        Ok(Self {
            success: r.flag()?,
            value: r.f32()?,
            message: r.str()?,
        })
    }
}

/// The error text precedes the descriptors on this one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamsReply {
    pub success: bool,
    pub params: Vec<ParameterDescriptor>,
    pub message: String,
}

impl WireMessage for ParamsReply {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.success)
            .u32(self.params.len() as u32)
            .str(&self.message);
        for p in &self.params {
            p.encode(w);
        }
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let success = r.flag()?;
        let count = r.u32()?;
        let message = r.str()?;
        let params = read_list(r, count)?;
        Ok(Self {
            success,
            params,
            message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelsReply {
    pub success: bool,
    pub info: ChannelsInfo,
    pub message: String,
}

impl WireMessage for ChannelsReply {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.success)
            .flag(self.info.accepts_midi)
            .flag(self.info.produces_midi);
        w.u32(self.info.inputs.len() as u32);
        for bus in &self.info.inputs {
            bus.encode(w);
        }
        w.u32(self.info.outputs.len() as u32);
        for bus in &self.info.outputs {
            bus.encode(w);
        }
        w.str(&self.message);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let success = r.flag()?;
        let accepts_midi = r.flag()?;
        let produces_midi = r.flag()?;
        let n = r.u32()?;
        let inputs = read_list(r, n)?;
        let m = r.u32()?;
        let outputs = read_list(r, m)?;
        let message = r.str()?;
        Ok(Self {
            success,
            info: ChannelsInfo {
                accepts_midi,
                produces_midi,
                inputs,
                outputs,
            },
            message,
        })
    }
}

impl WireMessage for PluginDescriptor {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(self.is_instrument)
            .u32(self.uid)
            .u32(self.num_inputs)
            .u32(self.num_outputs)
            .str(&self.name)
            .str(&self.descriptive_name)
            .str(&self.format_name)
            .str(&self.category)
            .str(&self.manufacturer)
            .str(&self.version)
            .str(&self.file_or_identifier)
            .str(&self.last_modified)
            .str(&self.path);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        Ok(Self {
            is_instrument: r.flag()?,
            uid: r.u32()?,
            num_inputs: r.u32()?,
            num_outputs: r.u32()?,
            name: r.str()?,
            descriptive_name: r.str()?,
            format_name: r.str()?,
            category: r.str()?,
            manufacturer: r.str()?,
            version: r.str()?,
            file_or_identifier: r.str()?,
            last_modified: r.str()?,
            path: r.str()?,
        })
    }
}

impl WireMessage for ParameterDescriptor {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.original_index)
            .str(&self.name)
            .f32(self.range.min)
            .f32(self.range.max)
            .f32(self.range.interval)
            .f32(self.range.default)
            .f32(self.range.skew)
            .f32(self.value)
            .u32(self.num_steps)
            .flag(self.flags.discrete)
            .flag(self.flags.boolean)
            .flag(self.flags.orientation_inverted)
            .flag(self.flags.automatable)
            .flag(self.flags.meta);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let original_index = r.u32()?;
        let name = r.str()?;
        let min = r.f32()?;
        let max = r.f32()?;
        let interval = r.f32()?;
        let default = r.f32()?;
        let skew = r.f32()?;
        Ok(Self {
            original_index,
            name,
            range: ParameterRange {
                min,
                max,
                default,
                interval,
                skew,
            },
            value: r.f32()?,
            num_steps: r.u32()?,
            flags: ParameterFlags {
                discrete: r.flag()?,
                boolean: r.flag()?,
                orientation_inverted: r.flag()?,
                automatable: r.flag()?,
                meta: r.flag()?,
            },
        })
    }
}

impl WireMessage for BusDescriptor {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.num_channels)
            .strs(&self.channel_types)
            .flag(self.enabled)
            .str(&self.layout);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        Ok(Self {
            num_channels: r.u32()?,
            channel_types: r.str_list()?,
            enabled: r.flag()?,
            layout: r.str()?,
        })
    }
}

/// `list_plugins`: count-prefixed descriptors.
impl WireMessage for Vec<PluginDescriptor> {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.len() as u32);
        for d in self {
            d.encode(w);
        }
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let count = r.u32()?;
        read_list(r, count)
    }
}

/// `list_bad_paths`
impl WireMessage for Vec<String> {
    fn encode(&self, w: &mut WireWriter) {
        w.strs(self);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        r.str_list()
    }
}

/// Bare `success:u32` or toggle state.
impl WireMessage for bool {
    fn encode(&self, w: &mut WireWriter) {
        w.flag(*self);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        r.flag()
    }
}

/// Counts: plugins found, ordered notes accepted.
impl WireMessage for u32 {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(*self);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        r.u32()
    }
}

/// Audio player id, `-1` on failure.
impl WireMessage for i32 {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(*self);
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        r.i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bytes_of<T: WireMessage>(msg: &T) -> Vec<u8> {
        let mut w = WireWriter::new();
        msg.encode(&mut w);
        w.into_bytes()
    }

    fn decode<T: WireMessage>(bytes: Vec<u8>) -> io::Result<T> {
        T::decode(&mut WireReader::new(Cursor::new(bytes)))
    }

    #[test]
    fn load_reply_layout() {
        let reply = LoadReply {
            success: true,
            name: "Synth".into(),
            uid: 7,
            message: String::new(),
        };
        let bytes = bytes_of(&reply);
        assert_eq!(bytes.len(), 4 + (4 + 5) + 4 + 4);
        assert_eq!(decode::<LoadReply>(bytes).unwrap(), reply);
    }

    #[test]
    fn params_reply_puts_message_before_descriptors() {
        let param = ParameterDescriptor {
            original_index: 3,
            name: "Cutoff".into(),
            range: ParameterRange::default(),
            value: 0.5,
            num_steps: 0x7fff_ffff,
            flags: ParameterFlags {
                automatable: true,
                ..Default::default()
            },
        };
        let reply = ParamsReply {
            success: true,
            params: vec![param],
            message: "warn".into(),
        };
        let bytes = bytes_of(&reply);
        // success, count, then the message string
        assert_eq!(&bytes[8..12], &4u32.to_le_bytes());
        assert_eq!(&bytes[12..16], b"warn");
        assert_eq!(decode::<ParamsReply>(bytes).unwrap(), reply);
    }

    #[test]
    fn channels_reply_roundtrip() {
        let bus = BusDescriptor {
            num_channels: 2,
            channel_types: vec!["L".into(), "R".into()],
            enabled: true,
            layout: "Stereo".into(),
        };
        let reply = ChannelsReply {
            success: true,
            info: ChannelsInfo {
                accepts_midi: true,
                produces_midi: false,
                inputs: vec![],
                outputs: vec![bus],
            },
            message: String::new(),
        };
        let decoded = decode::<ChannelsReply>(bytes_of(&reply)).unwrap();
        assert_eq!(decoded.info.total_output_channels(), 2);
        assert_eq!(decoded, reply);
    }

    #[test]
    fn truncated_descriptor_list_is_eof() {
        let list = vec![PluginDescriptor::new(1, "A"), PluginDescriptor::new(2, "B")];
        let mut bytes = bytes_of(&list);
        bytes.truncate(bytes.len() - 3);
        let err = decode::<Vec<PluginDescriptor>>(bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn player_id_is_signed() {
        assert_eq!(decode::<i32>(bytes_of(&-1i32)).unwrap(), -1);
    }
}
