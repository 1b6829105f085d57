//! Owned CLAP events and the input/output event lists handed to `process()`.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_note, clap_event_param_value,
    clap_input_events, clap_output_events, CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_MIDI,
    CLAP_EVENT_NOTE_OFF, CLAP_EVENT_NOTE_ON, CLAP_EVENT_PARAM_VALUE,
};
use clap_sys::id::clap_id;

/// An event owned by the validator. The payloads are the actual C structs with
/// the header in first position, so handing the plug-in a pointer to the
/// header hands it the whole event in its ABI layout.
pub enum PluginEvent {
    Note(clap_event_note),
    Midi(clap_event_midi),
    ParamValue(clap_event_param_value),
}

impl PluginEvent {
    pub fn note_on(time: u32, port_index: i16, channel: i16, key: i16, velocity: f64) -> Self {
        Self::note(CLAP_EVENT_NOTE_ON, time, port_index, channel, key, velocity)
    }

    pub fn note_off(time: u32, port_index: i16, channel: i16, key: i16, velocity: f64) -> Self {
        Self::note(CLAP_EVENT_NOTE_OFF, time, port_index, channel, key, velocity)
    }

    fn note(type_: u16, time: u32, port_index: i16, channel: i16, key: i16, velocity: f64) -> Self {
        Self::Note(clap_event_note {
            header: clap_event_header {
                size: mem::size_of::<clap_event_note>() as u32,
                time,
                space_id: CLAP_CORE_EVENT_SPACE_ID,
                type_,
                flags: 0,
            },
            note_id: -1,
            port_index,
            channel,
            key,
            velocity,
        })
    }

    pub fn midi(time: u32, port_index: u16, data: [u8; 3]) -> Self {
        Self::Midi(clap_event_midi {
            header: clap_event_header {
                size: mem::size_of::<clap_event_midi>() as u32,
                time,
                space_id: CLAP_CORE_EVENT_SPACE_ID,
                type_: CLAP_EVENT_MIDI,
                flags: 0,
            },
            port_index,
            data,
        })
    }

    /// A `PARAM_VALUE` event. The event space and the cookie are explicit so
    /// tests can send events from a bogus namespace or strip the cookies the
    /// plug-in handed out.
    pub fn param_value(
        time: u32,
        space_id: u16,
        param_id: clap_id,
        cookie: *mut c_void,
        value: f64,
    ) -> Self {
        Self::ParamValue(clap_event_param_value {
            header: clap_event_header {
                size: mem::size_of::<clap_event_param_value>() as u32,
                time,
                space_id,
                type_: CLAP_EVENT_PARAM_VALUE,
                flags: 0,
            },
            param_id,
            cookie,
            note_id: -1,
            port_index: -1,
            channel: -1,
            key: -1,
            value,
        })
    }

    pub fn time(&self) -> u32 {
        self.header().time
    }

    fn header(&self) -> &clap_event_header {
        match self {
            Self::Note(event) => &event.header,
            Self::Midi(event) => &event.header,
            Self::ParamValue(event) => &event.header,
        }
    }
}

struct InputEventsCtx {
    events: *const PluginEvent,
    len: usize,
}

/// A `clap_input_events` list over a borrowed slice of events. The function
/// table lives on the heap so its address stays valid for as long as the
/// wrapper does.
pub struct InputEvents<'a> {
    raw: Box<clap_input_events>,
    _ctx: Box<InputEventsCtx>,
    _events: PhantomData<&'a [PluginEvent]>,
}

impl<'a> InputEvents<'a> {
    pub fn new(events: &'a [PluginEvent]) -> Self {
        let ctx = Box::new(InputEventsCtx {
            events: events.as_ptr(),
            len: events.len(),
        });
        let raw = Box::new(clap_input_events {
            ctx: &*ctx as *const InputEventsCtx as *mut c_void,
            size: Some(input_events_size),
            get: Some(input_events_get),
        });

        Self {
            raw,
            _ctx: ctx,
            _events: PhantomData,
        }
    }

    pub fn as_raw(&self) -> *const clap_input_events {
        &*self.raw
    }
}

unsafe extern "C" fn input_events_size(list: *const clap_input_events) -> u32 {
    let ctx = &*((*list).ctx as *const InputEventsCtx);
    ctx.len as u32
}

unsafe extern "C" fn input_events_get(
    list: *const clap_input_events,
    index: u32,
) -> *const clap_event_header {
    let ctx = &*((*list).ctx as *const InputEventsCtx);
    if index as usize >= ctx.len {
        return ptr::null();
    }
    (*ctx.events.add(index as usize)).header()
}

/// A `clap_output_events` list that records the events a plug-in pushes.
/// Recognized event types are copied out; everything else is accepted and
/// dropped.
pub struct OutputEvents {
    raw: Box<clap_output_events>,
    events: Box<UnsafeCell<Vec<PluginEvent>>>,
}

impl OutputEvents {
    pub fn new() -> Self {
        let events: Box<UnsafeCell<Vec<PluginEvent>>> = Box::default();
        let raw = Box::new(clap_output_events {
            ctx: events.get() as *mut c_void,
            try_push: Some(output_events_try_push),
        });

        Self { raw, events }
    }

    pub fn as_raw(&self) -> *const clap_output_events {
        &*self.raw
    }

    pub fn len(&self) -> usize {
        unsafe { &*self.events.get() }.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_events(self) -> Vec<PluginEvent> {
        let Self { events, .. } = self;
        (*events).into_inner()
    }
}

impl Default for OutputEvents {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "C" fn output_events_try_push(
    list: *const clap_output_events,
    event: *const clap_event_header,
) -> bool {
    if list.is_null() || event.is_null() {
        return false;
    }

    let events = &mut *((*list).ctx as *mut Vec<PluginEvent>);
    let header = &*event;
    match header.type_ {
        CLAP_EVENT_NOTE_ON | CLAP_EVENT_NOTE_OFF => {
            events.push(PluginEvent::Note(*(event as *const clap_event_note)));
        }
        CLAP_EVENT_MIDI => {
            events.push(PluginEvent::Midi(*(event as *const clap_event_midi)));
        }
        CLAP_EVENT_PARAM_VALUE => {
            events.push(PluginEvent::ParamValue(
                *(event as *const clap_event_param_value),
            ));
        }
        _ => (),
    }

    true
}
