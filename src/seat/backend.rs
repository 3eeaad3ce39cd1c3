use std::cell::Ref;
use std::rc::Rc;

use crate::device_model::{DeviceType, InputDevice, Keymap, VirtualDeviceTypes, VirtualInputDevice};
use crate::event_model::{Event, EventSequence, ModifierMask};
use crate::seat::keyboard_a11y::KeyboardA11ySettings;

bitflags::bitflags! {
    /// grab 实际拿到的输入类别, empty 表示什么都没拿到
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GrabState: u32 {
        const POINTER = 1 << 0;
        const KEYBOARD = 1 << 1;
        const ALL = Self::POINTER.bits() | Self::KEYBOARD.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub x: f32,
    pub y: f32,
    pub modifiers: ModifierMask,
}

/// 平台后端要实现的能力集, 每个 display/input 栈一个实现
///
/// 设备由后端持有, seat 每次现场读取, 所以 `devices` 返回借用视图.
/// 只有 grab/ungrab 和两个钩子是可选的, 其余缺一个 seat 就没法工作
pub trait SeatBackend {
    fn pointer(&self) -> Option<Rc<InputDevice>>;

    fn keyboard(&self) -> Option<Rc<InputDevice>>;

    fn devices(&self) -> Ref<'_, [Rc<InputDevice>]>;

    fn keymap(&self) -> Rc<Keymap>;

    fn bell_notify(&self);

    fn create_virtual_device(&self, kind: DeviceType) -> Option<Box<dyn VirtualInputDevice>>;

    fn supported_virtual_device_types(&self) -> VirtualDeviceTypes;

    fn warp_pointer(&self, x: i32, y: i32);

    fn init_pointer_position(&self, x: f32, y: f32);

    fn query_state(
        &self,
        device: &Rc<InputDevice>,
        sequence: Option<EventSequence>,
    ) -> Option<DeviceState>;

    fn touch_mode(&self) -> bool;

    /// 每个事件后处理时的后端钩子, 在设备生命周期通知之前调用
    fn handle_event_post(&self, _event: &Event) {}

    fn apply_kbd_a11y_settings(&self, _settings: &KeyboardA11ySettings) {}

    /// None 表示后端不支持显式 grab
    fn grab(&self, _time_ms: u32) -> Option<GrabState> {
        None
    }

    fn ungrab(&self, _time_ms: u32) {}

    fn dispose(&self) {}
}

/// 把后端事件抽到 seat 事件模型的泵, 由宿主事件循环驱动
pub trait SeatEventSource {
    fn dispatch(&mut self) -> anyhow::Result<Vec<Event>>;
}
