pub mod event;

pub use event::{
    ButtonEvent, DeviceEvent, Event, EventSequence, KeyEvent, ModifierMask, MotionEvent,
    ScrollEvent, TouchEvent,
};
