pub mod device;
pub mod keymap;
pub mod virtual_device;

pub use device::{DeviceId, DeviceMode, DeviceType, InputDevice};
pub use keymap::Keymap;
pub use virtual_device::{VirtualDeviceTypes, VirtualInputDevice};
