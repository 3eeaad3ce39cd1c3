use std::rc::Rc;

use num_enum::FromPrimitive;

use crate::device_model::InputDevice;
use crate::seat::Seat;

bitflags::bitflags! {
    /// 指针无障碍功能开关, 全 0 即整体关闭
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct A11yControls: u32 {
        const SECONDARY_CLICK = 1 << 0;
        const DWELL = 1 << 1;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct A11yTimeoutType: u32 {
        const SECONDARY_CLICK = 1 << 0;
        const DWELL = 1 << 1;
    }
}

/// 配置里用整数表示, 未知值回落到 None
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum DwellClickType {
    #[default]
    None,
    Primary,
    Secondary,
    Middle,
    Double,
    Drag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellMode {
    Window,
    Gesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellDirection {
    None,
    Left,
    Right,
    Up,
    Down,
}

/// 指针无障碍配置值, 整体按值比较, 任何单字段变化都算 "变了"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerA11ySettings {
    pub controls: A11yControls,
    pub dwell_click_type: DwellClickType,
    pub dwell_mode: DwellMode,
    pub dwell_gesture_single: DwellDirection,
    pub dwell_gesture_double: DwellDirection,
    pub dwell_gesture_drag: DwellDirection,
    pub dwell_gesture_secondary: DwellDirection,
    pub secondary_click_delay_ms: u32,
    pub dwell_delay_ms: u32,
    pub dwell_threshold: u32,
}

impl Default for PointerA11ySettings {
    fn default() -> Self {
        Self {
            controls: A11yControls::empty(),
            dwell_click_type: DwellClickType::None,
            dwell_mode: DwellMode::Window,
            dwell_gesture_single: DwellDirection::None,
            dwell_gesture_double: DwellDirection::None,
            dwell_gesture_drag: DwellDirection::None,
            dwell_gesture_secondary: DwellDirection::None,
            secondary_click_delay_ms: 1200,
            dwell_delay_ms: 1200,
            dwell_threshold: 10,
        }
    }
}

/// dwell/secondary-click 计时引擎, seat 只负责把核心指针和它关联/解除关联
///
/// `add_device` 必须幂等: 设置转换和 [`Seat::ensure_a11y_state`] 两条路径
/// 都可能对同一个设备调用它, seat 不做去重
pub trait PointerA11yHandler {
    fn add_device(&self, seat: &Seat, device: &Rc<InputDevice>);

    fn remove_device(&self, seat: &Seat, device: &Rc<InputDevice>);
}
