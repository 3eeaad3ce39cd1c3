use evdev_rs::DeviceWrapper;
use evdev_rs::enums::{EV_ABS, EV_KEY, EV_REL, EventCode, InputProp};

use crate::device_model::DeviceType;

/// 从内核节点探出的能力位, 与最终分类解耦, 方便单测
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCaps {
    pub rel_xy: bool,
    pub abs_xy: bool,
    pub multitouch: bool,
    pub touch: bool,
    pub finger_tool: bool,
    pub pen_tool: bool,
    pub eraser_tool: bool,
    pub stylus_button: bool,
    pub pointer_buttons: bool,
    pub keyboard_keys: bool,
    pub joystick_buttons: bool,
    pub pad_buttons: bool,
    pub prop_direct: bool,
    pub prop_pointer: bool,
}

impl DeviceCaps {
    pub fn probe(dev: &impl DeviceWrapper) -> DeviceCaps {
        DeviceCaps {
            rel_xy: dev.has(EventCode::EV_REL(EV_REL::REL_X))
                && dev.has(EventCode::EV_REL(EV_REL::REL_Y)),
            abs_xy: dev.has(EventCode::EV_ABS(EV_ABS::ABS_X))
                && dev.has(EventCode::EV_ABS(EV_ABS::ABS_Y)),
            multitouch: dev.has(EventCode::EV_ABS(EV_ABS::ABS_MT_POSITION_X)),
            touch: dev.has(EventCode::EV_KEY(EV_KEY::BTN_TOUCH)),
            finger_tool: dev.has(EventCode::EV_KEY(EV_KEY::BTN_TOOL_FINGER)),
            pen_tool: dev.has(EventCode::EV_KEY(EV_KEY::BTN_TOOL_PEN)),
            eraser_tool: dev.has(EventCode::EV_KEY(EV_KEY::BTN_TOOL_RUBBER)),
            stylus_button: dev.has(EventCode::EV_KEY(EV_KEY::BTN_STYLUS)),
            pointer_buttons: dev.has(EventCode::EV_KEY(EV_KEY::BTN_LEFT)),
            keyboard_keys: dev.has(EventCode::EV_KEY(EV_KEY::KEY_A))
                && dev.has(EventCode::EV_KEY(EV_KEY::KEY_Z)),
            joystick_buttons: dev.has(EventCode::EV_KEY(EV_KEY::BTN_TRIGGER))
                || dev.has(EventCode::EV_KEY(EV_KEY::BTN_SOUTH)),
            pad_buttons: dev.has(EventCode::EV_KEY(EV_KEY::BTN_0)),
            prop_direct: dev.has(InputProp::INPUT_PROP_DIRECT),
            prop_pointer: dev.has(InputProp::INPUT_PROP_POINTER),
        }
    }
}

/// 能力位到设备类别, 判断顺序从最具体到最宽泛.
/// 笔+橡皮在同一个节点时按笔算, 工具区分留给事件流; None = 不认识, 不接管
pub fn classify(caps: &DeviceCaps) -> Option<DeviceType> {
    if caps.eraser_tool && !caps.pen_tool {
        return Some(DeviceType::TabletEraser);
    }
    if caps.pen_tool || (caps.stylus_button && caps.abs_xy) {
        return Some(DeviceType::TabletPen);
    }
    if caps.finger_tool && caps.abs_xy && (caps.prop_pointer || !caps.prop_direct) {
        return Some(DeviceType::Touchpad);
    }
    if (caps.multitouch || (caps.abs_xy && caps.touch)) && (caps.prop_direct || !caps.finger_tool) {
        return Some(DeviceType::Touchscreen);
    }
    if caps.joystick_buttons {
        return Some(DeviceType::Joystick);
    }
    if caps.rel_xy && caps.pointer_buttons {
        return Some(DeviceType::Pointer);
    }
    if caps.keyboard_keys {
        return Some(DeviceType::Keyboard);
    }
    if caps.pad_buttons {
        return Some(DeviceType::TabletPad);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse() {
        let caps = DeviceCaps {
            rel_xy: true,
            pointer_buttons: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::Pointer));
    }

    #[test]
    fn keyboard() {
        let caps = DeviceCaps {
            keyboard_keys: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::Keyboard));
    }

    #[test]
    fn touchscreen() {
        let caps = DeviceCaps {
            abs_xy: true,
            multitouch: true,
            touch: true,
            prop_direct: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::Touchscreen));
    }

    #[test]
    fn touchpad_wins_over_touchscreen() {
        let caps = DeviceCaps {
            abs_xy: true,
            multitouch: true,
            touch: true,
            finger_tool: true,
            pointer_buttons: true,
            prop_pointer: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::Touchpad));
    }

    #[test]
    fn pen_with_eraser_tool_is_a_pen() {
        let caps = DeviceCaps {
            abs_xy: true,
            pen_tool: true,
            eraser_tool: true,
            stylus_button: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::TabletPen));
    }

    #[test]
    fn standalone_eraser_node() {
        let caps = DeviceCaps {
            abs_xy: true,
            eraser_tool: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::TabletEraser));
    }

    #[test]
    fn gamepad_with_analog_sticks_is_a_joystick() {
        let caps = DeviceCaps {
            abs_xy: true,
            joystick_buttons: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::Joystick));
    }

    #[test]
    fn pad_buttons_only() {
        let caps = DeviceCaps {
            pad_buttons: true,
            ..DeviceCaps::default()
        };
        assert_eq!(classify(&caps), Some(DeviceType::TabletPad));
    }

    #[test]
    fn unknown_node_is_left_alone() {
        assert_eq!(classify(&DeviceCaps::default()), None);
    }
}
