use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Pointer,
    Keyboard,
    Touchpad,
    Touchscreen,
    TabletPen,
    TabletEraser,
    TabletPad,
    Joystick,
}

/// Logical 是后端合成的聚合设备 ("那个"指针/键盘), Physical 是真实硬件,
/// Floating 是暂时不参与聚合的物理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Logical,
    Physical,
    Floating,
}

/// seat 上的一个输入设备, 由后端持有, seat 只引用
#[derive(Debug)]
pub struct InputDevice {
    id: DeviceId,
    name: String,
    kind: DeviceType,
    mode: DeviceMode,
    vendor_id: u16,
    product_id: u16,
    devnode: Option<PathBuf>,
    disposed: Cell<bool>,
}

impl InputDevice {
    pub(crate) fn new(
        id: DeviceId,
        name: impl Into<String>,
        kind: DeviceType,
        mode: DeviceMode,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            mode,
            vendor_id: 0,
            product_id: 0,
            devnode: None,
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub(crate) fn with_devnode(mut self, devnode: PathBuf) -> Self {
        self.devnode = Some(devnode);
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceType {
        self.kind
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn devnode(&self) -> Option<&Path> {
        self.devnode.as_deref()
    }

    /// 设备被移除通知送达之后才会置位, 之后设备只剩下一个可读的壳
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn dispose(&self) {
        self.disposed.set(true);
    }
}

impl fmt::Display for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_is_observable() {
        let device = InputDevice::new(
            DeviceId(1),
            "mouse",
            DeviceType::Pointer,
            DeviceMode::Physical,
        );
        assert!(!device.is_disposed());
        device.dispose();
        assert!(device.is_disposed());
        assert_eq!(device.name(), "mouse");
    }

    #[test]
    fn builder_fields() {
        let device = InputDevice::new(
            DeviceId(4),
            "pen",
            DeviceType::TabletPen,
            DeviceMode::Physical,
        )
        .with_ids(0x056a, 0x0357)
        .with_devnode(PathBuf::from("/dev/input/event4"));
        assert_eq!(device.vendor_id(), 0x056a);
        assert_eq!(device.devnode(), Some(Path::new("/dev/input/event4")));
        assert_eq!(format!("{device}"), "pen (#4)");
    }
}
