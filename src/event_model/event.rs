use std::rc::Rc;

use crate::device_model::InputDevice;

bitflags::bitflags! {
    /// X 风格的 modifier 位掩码, 键位与按键状态共用一个掩码
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModifierMask: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
    }
}

/// 触摸接触点标识, 同一根手指从按下到抬起保持不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSequence(pub i32);

#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
}

#[derive(Debug, Clone)]
pub struct MotionEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
    pub x: f32,
    pub y: f32,
    pub modifiers: ModifierMask,
}

#[derive(Debug, Clone)]
pub struct ButtonEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
    pub button: u32,
    pub pressed: bool,
    pub modifiers: ModifierMask,
}

#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
    pub key: u32,
    pub pressed: bool,
    pub modifiers: ModifierMask,
}

#[derive(Debug, Clone)]
pub struct ScrollEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone)]
pub struct TouchEvent {
    pub device: Rc<InputDevice>,
    pub time_ms: u32,
    pub sequence: EventSequence,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone)]
pub enum Event {
    DeviceAdded(DeviceEvent),
    DeviceRemoved(DeviceEvent),
    Motion(MotionEvent),
    Button(ButtonEvent),
    Key(KeyEvent),
    Scroll(ScrollEvent),
    TouchBegin(TouchEvent),
    TouchUpdate(TouchEvent),
    TouchEnd(TouchEvent),
}

impl Event {
    pub fn source_device(&self) -> &Rc<InputDevice> {
        match self {
            Event::DeviceAdded(e) | Event::DeviceRemoved(e) => &e.device,
            Event::Motion(e) => &e.device,
            Event::Button(e) => &e.device,
            Event::Key(e) => &e.device,
            Event::Scroll(e) => &e.device,
            Event::TouchBegin(e) | Event::TouchUpdate(e) | Event::TouchEnd(e) => &e.device,
        }
    }

    pub fn time_ms(&self) -> u32 {
        match self {
            Event::DeviceAdded(e) | Event::DeviceRemoved(e) => e.time_ms,
            Event::Motion(e) => e.time_ms,
            Event::Button(e) => e.time_ms,
            Event::Key(e) => e.time_ms,
            Event::Scroll(e) => e.time_ms,
            Event::TouchBegin(e) | Event::TouchUpdate(e) | Event::TouchEnd(e) => e.time_ms,
        }
    }

    /// 只有触摸事件携带接触点标识
    pub fn sequence(&self) -> Option<EventSequence> {
        match self {
            Event::TouchBegin(e) | Event::TouchUpdate(e) | Event::TouchEnd(e) => Some(e.sequence),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_model::{DeviceId, DeviceMode, DeviceType};

    fn touchscreen() -> Rc<InputDevice> {
        Rc::new(InputDevice::new(
            DeviceId(7),
            "test touchscreen",
            DeviceType::Touchscreen,
            DeviceMode::Physical,
        ))
    }

    #[test]
    fn source_device_is_total() {
        let device = touchscreen();
        let event = Event::TouchBegin(TouchEvent {
            device: device.clone(),
            time_ms: 10,
            sequence: EventSequence(3),
            x: 100.0,
            y: 200.0,
        });
        assert!(Rc::ptr_eq(event.source_device(), &device));
        assert_eq!(event.time_ms(), 10);
    }

    #[test]
    fn sequence_only_on_touch() {
        let device = touchscreen();
        let touch = Event::TouchUpdate(TouchEvent {
            device: device.clone(),
            time_ms: 0,
            sequence: EventSequence(1),
            x: 0.0,
            y: 0.0,
        });
        let added = Event::DeviceAdded(DeviceEvent { device, time_ms: 0 });
        assert_eq!(touch.sequence(), Some(EventSequence(1)));
        assert_eq!(added.sequence(), None);
    }
}
