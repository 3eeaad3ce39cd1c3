//! # Headless seat backend
//!
//! 不碰任何真实输入栈的后端, 给测试/演示/CI 用.
//! 热插拔和注入都通过 [`HeadlessHandle`] 模拟, 设备生命周期事件由调用方
//! 自己喂给 `Seat::handle_event_post`, 和真实后端走同一条管线

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use crate::device_model::{
    DeviceId, DeviceMode, DeviceType, InputDevice, Keymap, VirtualDeviceTypes, VirtualInputDevice,
};
use crate::event_model::{DeviceEvent, Event, EventSequence, ModifierMask};
use crate::seat::backend::{DeviceState, GrabState, SeatBackend, SeatEventSource};

/// 虚拟设备注入的记录, 供测试断言
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VirtualEvent {
    Key { time_ms: u32, key: u32, pressed: bool },
    Button { time_ms: u32, button: u32, pressed: bool },
    RelativeMotion { time_ms: u32, dx: f32, dy: f32 },
    AbsoluteMotion { time_ms: u32, x: f32, y: f32 },
}

struct HeadlessShared {
    devices: Vec<Rc<InputDevice>>,
    keymap: Rc<Keymap>,
    pointer_x: f32,
    pointer_y: f32,
    modifiers: ModifierMask,
    touch_points: HashMap<EventSequence, (f32, f32)>,
    tablet_mode_switch: Option<bool>,
    grab_supported: bool,
    grab_state: Option<GrabState>,
    bell_count: u32,
    injected: Vec<(DeviceType, VirtualEvent)>,
    next_device_id: u32,
    clock_ms: u32,
}

impl HeadlessShared {
    fn new() -> Self {
        let core_pointer = Rc::new(InputDevice::new(
            DeviceId(1),
            "virtual core pointer",
            DeviceType::Pointer,
            DeviceMode::Logical,
        ));
        let core_keyboard = Rc::new(InputDevice::new(
            DeviceId(2),
            "virtual core keyboard",
            DeviceType::Keyboard,
            DeviceMode::Logical,
        ));
        Self {
            devices: vec![core_pointer, core_keyboard],
            keymap: Rc::new(Keymap::new("headless")),
            pointer_x: 0.0,
            pointer_y: 0.0,
            modifiers: ModifierMask::empty(),
            touch_points: HashMap::new(),
            tablet_mode_switch: None,
            grab_supported: false,
            grab_state: None,
            bell_count: 0,
            injected: Vec::new(),
            next_device_id: 3,
            clock_ms: 0,
        }
    }

    fn tick(&mut self) -> u32 {
        self.clock_ms += 1;
        self.clock_ms
    }

    fn find_logical(&self, kind: DeviceType) -> Option<Rc<InputDevice>> {
        self.devices
            .iter()
            .find(|d| d.mode() == DeviceMode::Logical && d.kind() == kind)
            .cloned()
    }

    fn has_physical_touchscreen(&self) -> bool {
        self.devices
            .iter()
            .any(|d| d.mode() != DeviceMode::Logical && d.kind() == DeviceType::Touchscreen)
    }
}

pub struct HeadlessBackend {
    shared: Rc<RefCell<HeadlessShared>>,
}

/// 后端的 "另一只手": 模拟热插拔, 切平板模式开关, 读取注入记录
pub struct HeadlessHandle {
    shared: Rc<RefCell<HeadlessShared>>,
}

impl HeadlessBackend {
    pub fn new() -> (HeadlessBackend, HeadlessHandle) {
        let shared = Rc::new(RefCell::new(HeadlessShared::new()));
        (
            HeadlessBackend {
                shared: shared.clone(),
            },
            HeadlessHandle { shared },
        )
    }
}

impl HeadlessHandle {
    /// 插入一个物理设备, 返回要喂给 `Seat::handle_event_post` 的事件
    pub fn plug(&self, kind: DeviceType, name: &str) -> Event {
        self.plug_with_mode(kind, DeviceMode::Physical, name)
    }

    pub fn plug_with_mode(&self, kind: DeviceType, mode: DeviceMode, name: &str) -> Event {
        let mut shared = self.shared.borrow_mut();
        let id = DeviceId(shared.next_device_id);
        shared.next_device_id += 1;
        let device = Rc::new(InputDevice::new(id, name, kind, mode));
        shared.devices.push(device.clone());
        let time_ms = shared.tick();
        Event::DeviceAdded(DeviceEvent { device, time_ms })
    }

    /// 拔出设备; 设备先从列表消失, dispose 要等移除通知送达后由 seat 执行
    pub fn unplug(&self, id: DeviceId) -> Option<Event> {
        let mut shared = self.shared.borrow_mut();
        let index = shared.devices.iter().position(|d| d.id() == id)?;
        let device = shared.devices.remove(index);
        let time_ms = shared.tick();
        Some(Event::DeviceRemoved(DeviceEvent { device, time_ms }))
    }

    /// None = 没有平板模式开关硬件
    pub fn set_tablet_mode_switch(&self, state: Option<bool>) {
        self.shared.borrow_mut().tablet_mode_switch = state;
    }

    pub fn set_grab_supported(&self, supported: bool) {
        self.shared.borrow_mut().grab_supported = supported;
    }

    pub fn grab_state(&self) -> Option<GrabState> {
        self.shared.borrow().grab_state
    }

    pub fn bell_count(&self) -> u32 {
        self.shared.borrow().bell_count
    }

    pub fn injected(&self) -> Vec<(DeviceType, VirtualEvent)> {
        self.shared.borrow().injected.clone()
    }

    pub fn begin_touch(&self, sequence: EventSequence, x: f32, y: f32) {
        self.shared.borrow_mut().touch_points.insert(sequence, (x, y));
    }

    pub fn end_touch(&self, sequence: EventSequence) {
        self.shared.borrow_mut().touch_points.remove(&sequence);
    }
}

impl SeatEventSource for HeadlessHandle {
    fn dispatch(&mut self) -> anyhow::Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

struct HeadlessVirtualDevice {
    kind: DeviceType,
    shared: Rc<RefCell<HeadlessShared>>,
}

impl VirtualInputDevice for HeadlessVirtualDevice {
    fn device_type(&self) -> DeviceType {
        self.kind
    }

    fn notify_key(&self, time_ms: u32, key: u32, pressed: bool) {
        let mut shared = self.shared.borrow_mut();
        shared
            .injected
            .push((self.kind, VirtualEvent::Key { time_ms, key, pressed }));
    }

    fn notify_button(&self, time_ms: u32, button: u32, pressed: bool) {
        let mut shared = self.shared.borrow_mut();
        shared
            .injected
            .push((self.kind, VirtualEvent::Button { time_ms, button, pressed }));
    }

    fn notify_relative_motion(&self, time_ms: u32, dx: f32, dy: f32) {
        let mut shared = self.shared.borrow_mut();
        shared.pointer_x += dx;
        shared.pointer_y += dy;
        shared
            .injected
            .push((self.kind, VirtualEvent::RelativeMotion { time_ms, dx, dy }));
    }

    fn notify_absolute_motion(&self, time_ms: u32, x: f32, y: f32) {
        let mut shared = self.shared.borrow_mut();
        shared.pointer_x = x;
        shared.pointer_y = y;
        shared
            .injected
            .push((self.kind, VirtualEvent::AbsoluteMotion { time_ms, x, y }));
    }
}

impl SeatBackend for HeadlessBackend {
    fn pointer(&self) -> Option<Rc<InputDevice>> {
        self.shared.borrow().find_logical(DeviceType::Pointer)
    }

    fn keyboard(&self) -> Option<Rc<InputDevice>> {
        self.shared.borrow().find_logical(DeviceType::Keyboard)
    }

    fn devices(&self) -> Ref<'_, [Rc<InputDevice>]> {
        Ref::map(self.shared.borrow(), |shared| shared.devices.as_slice())
    }

    fn keymap(&self) -> Rc<Keymap> {
        self.shared.borrow().keymap.clone()
    }

    fn bell_notify(&self) {
        self.shared.borrow_mut().bell_count += 1;
    }

    fn create_virtual_device(&self, kind: DeviceType) -> Option<Box<dyn VirtualInputDevice>> {
        let wanted = VirtualDeviceTypes::for_device_type(kind);
        if wanted.is_empty() {
            return None;
        }
        Some(Box::new(HeadlessVirtualDevice {
            kind,
            shared: self.shared.clone(),
        }))
    }

    fn supported_virtual_device_types(&self) -> VirtualDeviceTypes {
        VirtualDeviceTypes::KEYBOARD | VirtualDeviceTypes::POINTER | VirtualDeviceTypes::TOUCHSCREEN
    }

    fn warp_pointer(&self, x: i32, y: i32) {
        let mut shared = self.shared.borrow_mut();
        shared.pointer_x = x as f32;
        shared.pointer_y = y as f32;
    }

    fn init_pointer_position(&self, x: f32, y: f32) {
        let mut shared = self.shared.borrow_mut();
        shared.pointer_x = x;
        shared.pointer_y = y;
    }

    fn query_state(
        &self,
        _device: &Rc<InputDevice>,
        sequence: Option<EventSequence>,
    ) -> Option<DeviceState> {
        let shared = self.shared.borrow();
        match sequence {
            Some(sequence) => shared.touch_points.get(&sequence).map(|&(x, y)| DeviceState {
                x,
                y,
                modifiers: shared.modifiers,
            }),
            None => Some(DeviceState {
                x: shared.pointer_x,
                y: shared.pointer_y,
                modifiers: shared.modifiers,
            }),
        }
    }

    fn touch_mode(&self) -> bool {
        let shared = self.shared.borrow();
        shared.has_physical_touchscreen() && shared.tablet_mode_switch.unwrap_or(true)
    }

    fn grab(&self, _time_ms: u32) -> Option<GrabState> {
        let mut shared = self.shared.borrow_mut();
        if !shared.grab_supported {
            return None;
        }
        shared.grab_state = Some(GrabState::ALL);
        shared.grab_state
    }

    fn ungrab(&self, _time_ms: u32) {
        let mut shared = self.shared.borrow_mut();
        if shared.grab_state.take().is_none() && shared.grab_supported {
            warn!("ungrab without an active grab");
        }
    }

    fn dispose(&self) {
        let mut shared = self.shared.borrow_mut();
        shared.devices.clear();
        shared.touch_points.clear();
        shared.grab_state = None;
    }
}
