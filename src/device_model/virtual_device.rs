use crate::device_model::DeviceType;

bitflags::bitflags! {
    /// 后端能合成的虚拟设备类别
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VirtualDeviceTypes: u32 {
        const KEYBOARD = 1 << 0;
        const POINTER = 1 << 1;
        const TOUCHSCREEN = 1 << 2;
    }
}

impl VirtualDeviceTypes {
    pub fn for_device_type(kind: DeviceType) -> VirtualDeviceTypes {
        match kind {
            DeviceType::Keyboard => VirtualDeviceTypes::KEYBOARD,
            DeviceType::Pointer => VirtualDeviceTypes::POINTER,
            DeviceType::Touchscreen => VirtualDeviceTypes::TOUCHSCREEN,
            _ => VirtualDeviceTypes::empty(),
        }
    }
}

/// 按需合成的输入源, 所有权归调用者, drop 即释放
///
/// 注入方法不返回错误: 注入失败属于后端内部问题, 记日志后丢弃
pub trait VirtualInputDevice {
    fn device_type(&self) -> DeviceType;

    fn notify_key(&self, time_ms: u32, key: u32, pressed: bool);

    fn notify_button(&self, time_ms: u32, button: u32, pressed: bool);

    fn notify_relative_motion(&self, time_ms: u32, dx: f32, dy: f32);

    fn notify_absolute_motion(&self, time_ms: u32, x: f32, y: f32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_mapping() {
        assert_eq!(
            VirtualDeviceTypes::for_device_type(DeviceType::Pointer),
            VirtualDeviceTypes::POINTER
        );
        assert_eq!(
            VirtualDeviceTypes::for_device_type(DeviceType::TabletPen),
            VirtualDeviceTypes::empty()
        );
    }
}
