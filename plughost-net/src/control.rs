use plughost_types::{AudioConnection, CcRoute, OrderedNoteEntry, PluginDescriptor, ProcessorHandle, Timebase};

use crate::error::Result;
use crate::protocol::{ScheduledCc, ScheduledNote, ScheduledParam};

/// The slice of the host API a song push needs.
///
/// [`Session`](crate::Session) is the real implementation; tests substitute a
/// recorder.
pub trait HostControl {
    fn timebase(&self) -> Timebase;

    fn clear_param_schedule(&mut self) -> Result<()>;
    fn schedule_param_change(&mut self, change: ScheduledParam) -> Result<()>;

    fn clear_midi_cc_schedule(&mut self) -> Result<()>;
    fn schedule_midi_cc(&mut self, cc: ScheduledCc) -> Result<()>;

    fn clear_midi_schedule(&mut self) -> Result<()>;
    fn schedule_midi_note(&mut self, note: ScheduledNote) -> Result<()>;

    fn clear_ordered_notes(&mut self) -> Result<()>;
    /// Returns the number of entries the host accepted.
    fn schedule_ordered_notes(&mut self, entries: &[OrderedNoteEntry]) -> Result<u32>;

    fn clear_all_plugins(&mut self) -> Result<()>;
    /// Plugin list from the last `list_plugins`, if any.
    fn cached_plugins(&self) -> Option<&[PluginDescriptor]>;
    fn list_plugins(&mut self) -> Result<Vec<PluginDescriptor>>;
    fn load_plugin_by_uid(&mut self, uid: u32, key: u32) -> Result<ProcessorHandle>;

    fn connect_audio(&mut self, connection: &AudioConnection) -> Result<()>;
    fn route_cc_to_param(&mut self, route: &CcRoute) -> Result<()>;
}
