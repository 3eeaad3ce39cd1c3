//! # wayland seat backend
//!
//! 以普通客户端身份观察合成器的 wl_seat:
//! https://wayland.app/protocols/wayland#wl_seat
//!
//! 能看到的只有能力位/seat 名字/keymap/modifier 状态, 能力位映射成三个
//! 逻辑聚合设备. 没有 surface 就没有指针坐标流, 也没有任何注入与独占协议,
//! 所以 query_state 给不出坐标, grab 走门面的宽松默认

use std::cell::{Ref, RefCell};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::OwnedFd;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context as _;
use tracing::{debug, info, warn};
use wayland_client::{
    Connection, Dispatch, EventQueue, QueueHandle, WEnum, delegate_noop,
    protocol::{wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_touch},
};

use crate::device_model::{
    DeviceId, DeviceMode, DeviceType, InputDevice, Keymap, VirtualDeviceTypes, VirtualInputDevice,
};
use crate::event_model::{DeviceEvent, Event, EventSequence};
use crate::seat::backend::{DeviceState, SeatBackend, SeatEventSource};

const POINTER_ID: DeviceId = DeviceId(1);
const KEYBOARD_ID: DeviceId = DeviceId(2);
const TOUCH_ID: DeviceId = DeviceId(3);

struct WaylandShared {
    devices: Vec<Rc<InputDevice>>,
    keymap: Rc<Keymap>,
    pending: Vec<Event>,
    seat_name: Option<String>,
    started: Instant,
}

impl WaylandShared {
    fn new() -> Self {
        Self {
            devices: Vec::new(),
            keymap: Rc::new(Keymap::new("unknown")),
            pending: Vec::new(),
            seat_name: None,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn add_device(&mut self, id: DeviceId, name: &str, kind: DeviceType) {
        if self.devices.iter().any(|d| d.id() == id) {
            return;
        }
        let device = Rc::new(InputDevice::new(id, name, kind, DeviceMode::Logical));
        self.devices.push(device.clone());
        let time_ms = self.now_ms();
        self.pending
            .push(Event::DeviceAdded(DeviceEvent { device, time_ms }));
    }

    fn remove_device(&mut self, id: DeviceId) {
        if let Some(index) = self.devices.iter().position(|d| d.id() == id) {
            let device = self.devices.remove(index);
            let time_ms = self.now_ms();
            self.pending
                .push(Event::DeviceRemoved(DeviceEvent { device, time_ms }));
        }
    }
}

pub struct WaylandBackend {
    shared: Rc<RefCell<WaylandShared>>,
}

pub struct WaylandEventSource {
    event_queue: EventQueue<WaylandState>,
    state: WaylandState,
}

struct WaylandState {
    shared: Rc<RefCell<WaylandShared>>,
    seat: Option<wl_seat::WlSeat>,
    seat_global: Option<u32>,
    keyboard: Option<wl_keyboard::WlKeyboard>,
    pointer: Option<wl_pointer::WlPointer>,
    touch: Option<wl_touch::WlTouch>,
}

impl WaylandBackend {
    /// 连上 $WAYLAND_DISPLAY 并把 seat 能力同步进来.
    /// 启动时已有的设备不算热插拔, 不会产生 added 事件
    pub fn connect() -> anyhow::Result<(WaylandBackend, WaylandEventSource)> {
        let conn = Connection::connect_to_env().context("connecting to the wayland compositor")?;
        let mut event_queue = conn.new_event_queue();
        let qhandle = event_queue.handle();
        let display = conn.display();
        display.get_registry(&qhandle, ());

        let shared = Rc::new(RefCell::new(WaylandShared::new()));
        let mut state = WaylandState {
            shared: shared.clone(),
            seat: None,
            seat_global: None,
            keyboard: None,
            pointer: None,
            touch: None,
        };

        // 两轮往返: 第一轮收 globals, 第二轮收 seat 能力和 keymap
        event_queue
            .roundtrip(&mut state)
            .context("initial wayland roundtrip")?;
        event_queue
            .roundtrip(&mut state)
            .context("seat capability roundtrip")?;

        {
            let mut shared = shared.borrow_mut();
            shared.pending.clear();
            info!(
                seat = shared.seat_name.as_deref().unwrap_or("unnamed"),
                devices = shared.devices.len(),
                "wayland backend ready"
            );
        }

        Ok((
            WaylandBackend { shared },
            WaylandEventSource { event_queue, state },
        ))
    }
}

impl SeatEventSource for WaylandEventSource {
    fn dispatch(&mut self) -> anyhow::Result<Vec<Event>> {
        self.event_queue
            .blocking_dispatch(&mut self.state)
            .context("wayland dispatch")?;
        Ok(std::mem::take(
            &mut self.state.shared.borrow_mut().pending,
        ))
    }
}

impl WaylandState {
    fn sync_capabilities(
        &mut self,
        seat: &wl_seat::WlSeat,
        capabilities: wl_seat::Capability,
        qhandle: &QueueHandle<Self>,
    ) {
        debug!(?capabilities, "seat capabilities changed");

        if capabilities.contains(wl_seat::Capability::Pointer) {
            if self.pointer.is_none() {
                self.pointer = Some(seat.get_pointer(qhandle, ()));
                self.shared
                    .borrow_mut()
                    .add_device(POINTER_ID, "wayland pointer", DeviceType::Pointer);
            }
        } else if let Some(pointer) = self.pointer.take() {
            pointer.release();
            self.shared.borrow_mut().remove_device(POINTER_ID);
        }

        if capabilities.contains(wl_seat::Capability::Keyboard) {
            if self.keyboard.is_none() {
                self.keyboard = Some(seat.get_keyboard(qhandle, ()));
                self.shared.borrow_mut().add_device(
                    KEYBOARD_ID,
                    "wayland keyboard",
                    DeviceType::Keyboard,
                );
            }
        } else if let Some(keyboard) = self.keyboard.take() {
            keyboard.release();
            self.shared.borrow_mut().remove_device(KEYBOARD_ID);
        }

        if capabilities.contains(wl_seat::Capability::Touch) {
            if self.touch.is_none() {
                self.touch = Some(seat.get_touch(qhandle, ()));
                self.shared.borrow_mut().add_device(
                    TOUCH_ID,
                    "wayland touch",
                    DeviceType::Touchscreen,
                );
            }
        } else if let Some(touch) = self.touch.take() {
            touch.release();
            self.shared.borrow_mut().remove_device(TOUCH_ID);
        }
    }

    fn drop_seat(&mut self) {
        if let Some(pointer) = self.pointer.take() {
            pointer.release();
            self.shared.borrow_mut().remove_device(POINTER_ID);
        }
        if let Some(keyboard) = self.keyboard.take() {
            keyboard.release();
            self.shared.borrow_mut().remove_device(KEYBOARD_ID);
        }
        if let Some(touch) = self.touch.take() {
            touch.release();
            self.shared.borrow_mut().remove_device(TOUCH_ID);
        }
        if let Some(seat) = self.seat.take() {
            seat.release();
        }
        self.seat_global = None;
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                // 只跟第一个 wl_seat, 多 seat 合成器的其余 seat 不管
                if interface == "wl_seat" && state.seat.is_none() {
                    let seat =
                        registry.bind::<wl_seat::WlSeat, _, _>(name, version.min(7), qhandle, ());
                    state.seat = Some(seat);
                    state.seat_global = Some(name);
                }
            }
            wl_registry::Event::GlobalRemove { name } if state.seat_global == Some(name) => {
                info!("wl_seat global went away");
                state.drop_seat();
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => {
                state.sync_capabilities(seat, capabilities, qhandle);
            }
            wl_seat::Event::Name { name } => {
                state.shared.borrow_mut().seat_name = Some(name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _keyboard: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap {
                format: WEnum::Value(wl_keyboard::KeymapFormat::XkbV1),
                fd,
                size,
            } => match read_keymap(fd, size as usize) {
                Ok(text) => {
                    if let Some(layout) = extract_layout(&text) {
                        state.shared.borrow().keymap.set_layout(layout);
                    }
                }
                Err(error) => warn!(%error, "reading the compositor keymap failed"),
            },
            wl_keyboard::Event::Modifiers { mods_locked, .. } => {
                // 实修饰键的位序是固定的: Lock 在 bit1, NumLock 惯例挂在 Mod2
                let caps_lock = mods_locked & (1 << 1) != 0;
                let num_lock = mods_locked & (1 << 4) != 0;
                state.shared.borrow().keymap.set_lock_state(caps_lock, num_lock);
            }
            _ => {}
        }
    }
}

// 没有 surface 就收不到指针/触摸事件流, 有也直接丢
delegate_noop!(WaylandState: ignore wl_pointer::WlPointer);
delegate_noop!(WaylandState: ignore wl_touch::WlTouch);

fn read_keymap(fd: OwnedFd, size: usize) -> io::Result<String> {
    let mut file = File::from(fd);
    let mut buf = vec![0u8; size];
    file.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf)
        .trim_end_matches('\0')
        .to_string())
}

/// 从 xkb keymap 文本抠出 symbols 段名, 只为展示, 不做完整解析
fn extract_layout(keymap: &str) -> Option<String> {
    let section = &keymap[keymap.find("xkb_symbols")?..];
    let open = section.find('"')? + 1;
    let close = section[open..].find('"')? + open;
    Some(section[open..close].to_string())
}

impl SeatBackend for WaylandBackend {
    fn pointer(&self) -> Option<Rc<InputDevice>> {
        self.shared
            .borrow()
            .devices
            .iter()
            .find(|d| d.kind() == DeviceType::Pointer)
            .cloned()
    }

    fn keyboard(&self) -> Option<Rc<InputDevice>> {
        self.shared
            .borrow()
            .devices
            .iter()
            .find(|d| d.kind() == DeviceType::Keyboard)
            .cloned()
    }

    fn devices(&self) -> Ref<'_, [Rc<InputDevice>]> {
        Ref::map(self.shared.borrow(), |shared| shared.devices.as_slice())
    }

    fn keymap(&self) -> Rc<Keymap> {
        self.shared.borrow().keymap.clone()
    }

    fn bell_notify(&self) {
        debug!("wl_seat has no bell request");
    }

    fn create_virtual_device(&self, _kind: DeviceType) -> Option<Box<dyn VirtualInputDevice>> {
        None
    }

    fn supported_virtual_device_types(&self) -> VirtualDeviceTypes {
        VirtualDeviceTypes::empty()
    }

    // TODO: wayland-protocols 收编 wp_pointer_warp_v1 之后把 warp 接上
    fn warp_pointer(&self, _x: i32, _y: i32) {
        debug!("pointer warping is not available to wayland clients");
    }

    fn init_pointer_position(&self, _x: f32, _y: f32) {
        debug!("initial pointer position is owned by the compositor");
    }

    fn query_state(
        &self,
        _device: &Rc<InputDevice>,
        _sequence: Option<EventSequence>,
    ) -> Option<DeviceState> {
        debug!("no surface, no coordinate stream");
        None
    }

    fn touch_mode(&self) -> bool {
        false
    }

    fn dispose(&self) {
        let mut shared = self.shared.borrow_mut();
        shared.devices.clear();
        shared.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_pulled_from_symbols_section() {
        let keymap = concat!(
            "xkb_keymap {\n",
            "    xkb_keycodes \"evdev+aliases(qwerty)\" { include \"evdev\" };\n",
            "    xkb_symbols \"pc+us+inet(evdev)\" { include \"pc\" };\n",
            "};\n"
        );
        assert_eq!(extract_layout(keymap).as_deref(), Some("pc+us+inet(evdev)"));
        assert_eq!(extract_layout("no symbols here"), None);
    }

    #[test]
    fn capability_devices_queue_lifecycle_events() {
        let mut shared = WaylandShared::new();
        shared.add_device(POINTER_ID, "wayland pointer", DeviceType::Pointer);
        shared.add_device(POINTER_ID, "wayland pointer", DeviceType::Pointer);
        assert_eq!(shared.devices.len(), 1);

        shared.remove_device(POINTER_ID);
        shared.remove_device(POINTER_ID);
        assert!(shared.devices.is_empty());

        assert_eq!(shared.pending.len(), 2);
        assert!(matches!(shared.pending[0], Event::DeviceAdded(_)));
        assert!(matches!(shared.pending[1], Event::DeviceRemoved(_)));
    }
}
