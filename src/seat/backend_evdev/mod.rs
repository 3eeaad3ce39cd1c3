//! # evdev seat backend
//!
//! 直接吃 /dev/input/event* 的后端, 需要节点读权限 (input 组或 root).
//! 热插拔靠周期性重扫目录, 不挂 udev; 多触点按单触点简化, 不跟踪 MT slot.
//! 坐标一律是设备原始单位, 这一层没有屏幕信息可做归一化.
//! 经 uinput 合成的虚拟设备会被下一轮重扫当成普通节点捡回来

pub mod classify;

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use evdev_rs::enums::{
    BusType, EV_ABS, EV_KEY, EV_LED, EV_REL, EV_SW, EV_SYN, EventCode, EventType,
};
use evdev_rs::util::int_to_event_code;
use evdev_rs::{
    Device, DeviceWrapper, GrabMode, InputEvent, ReadFlag, ReadStatus, TimeVal, UInputDevice,
    UninitDevice,
};
use tracing::{debug, info, warn};

use crate::device_model::{
    DeviceId, DeviceMode, DeviceType, InputDevice, Keymap, VirtualDeviceTypes, VirtualInputDevice,
};
use crate::event_model::{
    ButtonEvent, DeviceEvent, Event, EventSequence, KeyEvent, ModifierMask, MotionEvent,
    ScrollEvent, TouchEvent,
};
use crate::seat::backend::{DeviceState, GrabState, SeatBackend, SeatEventSource};
use crate::seat::backend_evdev::classify::{DeviceCaps, classify};
use crate::seat::keyboard_a11y::KeyboardA11ySettings;

const INPUT_DIR: &str = "/dev/input";
const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// 跨节点聚合的指针/触摸/modifier 状态
struct InputState {
    pointer_x: f32,
    pointer_y: f32,
    modifiers: ModifierMask,
    touch_points: HashMap<EventSequence, (f32, f32)>,
    tablet_mode: Option<bool>,
    next_contact_id: i32,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            pointer_x: 0.0,
            pointer_y: 0.0,
            modifiers: ModifierMask::empty(),
            touch_points: HashMap::new(),
            tablet_mode: None,
            next_contact_id: 1,
        }
    }
}

/// 单节点在一个 SYN_REPORT 帧内的合帧状态
#[derive(Default)]
struct DecodeState {
    rel_x: f32,
    rel_y: f32,
    scroll_x: f32,
    scroll_y: f32,
    abs_x: Option<f32>,
    abs_y: Option<f32>,
    touch_down: bool,
    touch_up: bool,
    contact: Option<EventSequence>,
}

struct EvdevNode {
    device: Rc<InputDevice>,
    handle: RefCell<Device>,
    decode: RefCell<DecodeState>,
}

struct EvdevShared {
    nodes: Vec<EvdevNode>,
    devices: Vec<Rc<InputDevice>>,
    keymap: Rc<Keymap>,
    state: InputState,
    grabbed: bool,
    next_device_id: u32,
}

impl EvdevShared {
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
            nodes: Vec::new(),
            devices: vec![core_pointer, core_keyboard],
            keymap: Rc::new(Keymap::new("us")),
            state: InputState::default(),
            grabbed: false,
            next_device_id: 3,
        }
    }
}

pub struct EvdevBackend {
    shared: Rc<RefCell<EvdevShared>>,
}

pub struct EvdevEventSource {
    shared: Rc<RefCell<EvdevShared>>,
    input_dir: PathBuf,
    ignored: HashSet<PathBuf>,
    started: Instant,
    last_scan: Instant,
}

impl EvdevBackend {
    /// 打开 /dev/input 下所有能认出来的节点. 启动时已有的设备不算热插拔,
    /// 不会产生 added 事件
    pub fn open() -> anyhow::Result<(EvdevBackend, EvdevEventSource)> {
        let shared = Rc::new(RefCell::new(EvdevShared::new()));
        let mut source = EvdevEventSource {
            shared: shared.clone(),
            input_dir: PathBuf::from(INPUT_DIR),
            ignored: HashSet::new(),
            started: Instant::now(),
            last_scan: Instant::now(),
        };
        let mut discarded = Vec::new();
        source.rescan(&mut discarded)?;
        let count = shared.borrow().nodes.len();
        info!(devices = count, "evdev backend ready");
        Ok((EvdevBackend { shared }, source))
    }
}

impl EvdevEventSource {
    fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn rescan(&mut self, out: &mut Vec<Event>) -> anyhow::Result<()> {
        let mut present = std::fs::read_dir(&self.input_dir)
            .with_context(|| format!("listing {}", self.input_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("event"))
            })
            .collect::<Vec<_>>();
        present.sort();

        // 拔掉再插回来的路径要重新尝试
        self.ignored.retain(|path| present.contains(path));

        let time_ms = self.now_ms();
        let shared = &mut *self.shared.borrow_mut();

        let mut index = 0;
        while index < shared.nodes.len() {
            let gone = shared.nodes[index]
                .device
                .devnode()
                .is_some_and(|path| !present.iter().any(|p| p == path));
            if gone {
                let node = shared.nodes.remove(index);
                shared.devices.retain(|d| !Rc::ptr_eq(d, &node.device));
                debug!(device = %node.device, "input node disappeared");
                out.push(Event::DeviceRemoved(DeviceEvent {
                    device: node.device,
                    time_ms,
                }));
            } else {
                index += 1;
            }
        }

        for path in present {
            if self.ignored.contains(&path)
                || shared
                    .nodes
                    .iter()
                    .any(|node| node.device.devnode() == Some(path.as_path()))
            {
                continue;
            }
            match open_node(&path) {
                Ok(Some((handle, kind))) => {
                    let device = register_node(shared, handle, kind, &path);
                    info!(device = %device, ?kind, "input node attached");
                    out.push(Event::DeviceAdded(DeviceEvent { device, time_ms }));
                }
                Ok(None) => {
                    self.ignored.insert(path);
                }
                Err(error) => {
                    debug!(path = %path.display(), %error, "skipping input node");
                    self.ignored.insert(path);
                }
            }
        }
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<Event>) {
        let shared = &mut *self.shared.borrow_mut();
        let mut dead = Vec::new();

        for (index, node) in shared.nodes.iter().enumerate() {
            let mut handle = node.handle.borrow_mut();
            let mut decode = node.decode.borrow_mut();
            loop {
                match handle.next_event(ReadFlag::NORMAL) {
                    Ok((ReadStatus::Success, event)) => translate(
                        &event,
                        &node.device,
                        &mut decode,
                        &mut shared.state,
                        &shared.keymap,
                        out,
                    ),
                    Ok((ReadStatus::Sync, _)) => {
                        // SYN_DROPPED: 把重同步队列吃完再回到正常读取
                        while handle.next_event(ReadFlag::SYNC).is_ok() {}
                    }
                    Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                    Err(error) => {
                        debug!(device = %node.device, %error, "input node read failed");
                        dead.push(index);
                        break;
                    }
                }
            }
        }

        let time_ms = self.now_ms();
        for index in dead.into_iter().rev() {
            let node = shared.nodes.remove(index);
            shared.devices.retain(|d| !Rc::ptr_eq(d, &node.device));
            warn!(device = %node.device, "input node died, removing");
            out.push(Event::DeviceRemoved(DeviceEvent {
                device: node.device,
                time_ms,
            }));
        }
    }
}

impl SeatEventSource for EvdevEventSource {
    fn dispatch(&mut self) -> anyhow::Result<Vec<Event>> {
        let mut out = Vec::new();
        if self.last_scan.elapsed() >= RESCAN_INTERVAL {
            self.rescan(&mut out)?;
            self.last_scan = Instant::now();
        }
        self.drain(&mut out);
        Ok(out)
    }
}

fn open_node(path: &Path) -> anyhow::Result<Option<(Device, DeviceType)>> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let handle =
        Device::new_from_file(file).with_context(|| format!("initializing {}", path.display()))?;
    let caps = DeviceCaps::probe(&handle);
    match classify(&caps) {
        Some(kind) => Ok(Some((handle, kind))),
        None => {
            debug!(
                path = %path.display(),
                name = handle.name().unwrap_or(""),
                "unclassifiable input node"
            );
            Ok(None)
        }
    }
}

fn register_node(
    shared: &mut EvdevShared,
    handle: Device,
    kind: DeviceType,
    path: &Path,
) -> Rc<InputDevice> {
    let id = DeviceId(shared.next_device_id);
    shared.next_device_id += 1;
    let name = handle.name().unwrap_or("unnamed").to_string();
    let device = Rc::new(
        InputDevice::new(id, name, kind, DeviceMode::Physical)
            .with_ids(handle.vendor_id() as u16, handle.product_id() as u16)
            .with_devnode(path.to_path_buf()),
    );

    // 锁定键与平板模式开关的初始状态直接从节点读出来
    if let Some(caps) = handle.event_value(&EventCode::EV_LED(EV_LED::LED_CAPSL)) {
        let num = handle
            .event_value(&EventCode::EV_LED(EV_LED::LED_NUML))
            .unwrap_or(0);
        shared.keymap.set_lock_state(caps != 0, num != 0);
    }
    if let Some(value) = handle.event_value(&EventCode::EV_SW(EV_SW::SW_TABLET_MODE)) {
        shared.state.tablet_mode = Some(value != 0);
    }

    let mut handle = handle;
    if shared.grabbed {
        if let Err(error) = handle.grab(GrabMode::Grab) {
            warn!(device = %device, %error, "grab on hotplugged node failed");
        }
    }

    shared.devices.push(device.clone());
    shared.nodes.push(EvdevNode {
        device: device.clone(),
        handle: RefCell::new(handle),
        decode: RefCell::new(DecodeState::default()),
    });
    device
}

fn translate(
    raw: &InputEvent,
    device: &Rc<InputDevice>,
    decode: &mut DecodeState,
    state: &mut InputState,
    keymap: &Keymap,
    out: &mut Vec<Event>,
) {
    let time_ms = timeval_to_ms(&raw.time);
    match raw.event_code.clone() {
        EventCode::EV_REL(EV_REL::REL_X) => decode.rel_x += raw.value as f32,
        EventCode::EV_REL(EV_REL::REL_Y) => decode.rel_y += raw.value as f32,
        EventCode::EV_REL(EV_REL::REL_WHEEL) => decode.scroll_y += raw.value as f32,
        EventCode::EV_REL(EV_REL::REL_HWHEEL) => decode.scroll_x += raw.value as f32,
        EventCode::EV_ABS(EV_ABS::ABS_X | EV_ABS::ABS_MT_POSITION_X) => {
            decode.abs_x = Some(raw.value as f32);
        }
        EventCode::EV_ABS(EV_ABS::ABS_Y | EV_ABS::ABS_MT_POSITION_Y) => {
            decode.abs_y = Some(raw.value as f32);
        }
        EventCode::EV_KEY(key) => handle_key(key, raw.value, device, time_ms, decode, state, out),
        EventCode::EV_LED(EV_LED::LED_CAPSL) => {
            keymap.set_lock_state(raw.value != 0, keymap.num_lock_state());
            state.modifiers.set(ModifierMask::LOCK, raw.value != 0);
        }
        EventCode::EV_LED(EV_LED::LED_NUML) => {
            keymap.set_lock_state(keymap.caps_lock_state(), raw.value != 0);
        }
        EventCode::EV_SW(EV_SW::SW_TABLET_MODE) => state.tablet_mode = Some(raw.value != 0),
        EventCode::EV_SYN(EV_SYN::SYN_REPORT) => flush(device, time_ms, decode, state, out),
        _ => {}
    }
}

fn handle_key(
    key: EV_KEY,
    value: i32,
    device: &Rc<InputDevice>,
    time_ms: u32,
    decode: &mut DecodeState,
    state: &mut InputState,
    out: &mut Vec<Event>,
) {
    let pressed = value != 0;
    if key == EV_KEY::BTN_TOUCH {
        if pressed {
            decode.touch_down = true;
        } else {
            decode.touch_up = true;
        }
        return;
    }

    let raw = key as u32;
    // BTN_TOOL_*: 工具在场标志, 不是按键
    if (0x140..=0x14f).contains(&raw) {
        return;
    }
    if let Some((button, bit)) = button_number(key) {
        state.modifiers.set(bit, pressed);
        out.push(Event::Button(ButtonEvent {
            device: device.clone(),
            time_ms,
            button,
            pressed,
            modifiers: state.modifiers,
        }));
        return;
    }
    if (0x100..=0x15f).contains(&raw) {
        out.push(Event::Button(ButtonEvent {
            device: device.clone(),
            time_ms,
            button: raw,
            pressed,
            modifiers: state.modifiers,
        }));
        return;
    }

    if let Some(bit) = modifier_bit(key) {
        state.modifiers.set(bit, pressed);
    }
    out.push(Event::Key(KeyEvent {
        device: device.clone(),
        time_ms,
        key: raw,
        pressed,
        modifiers: state.modifiers,
    }));
}

fn flush(
    device: &Rc<InputDevice>,
    time_ms: u32,
    decode: &mut DecodeState,
    state: &mut InputState,
    out: &mut Vec<Event>,
) {
    let abs_moved = decode.abs_x.is_some() || decode.abs_y.is_some();

    if decode.touch_down {
        let sequence = EventSequence(state.next_contact_id);
        state.next_contact_id = state.next_contact_id.wrapping_add(1);
        let x = decode.abs_x.unwrap_or(state.pointer_x);
        let y = decode.abs_y.unwrap_or(state.pointer_y);
        decode.contact = Some(sequence);
        state.touch_points.insert(sequence, (x, y));
        out.push(Event::TouchBegin(TouchEvent {
            device: device.clone(),
            time_ms,
            sequence,
            x,
            y,
        }));
    } else if abs_moved {
        if let Some(sequence) = decode.contact {
            let (last_x, last_y) = state
                .touch_points
                .get(&sequence)
                .copied()
                .unwrap_or((state.pointer_x, state.pointer_y));
            let x = decode.abs_x.unwrap_or(last_x);
            let y = decode.abs_y.unwrap_or(last_y);
            state.touch_points.insert(sequence, (x, y));
            out.push(Event::TouchUpdate(TouchEvent {
                device: device.clone(),
                time_ms,
                sequence,
                x,
                y,
            }));
        } else {
            // 悬停的笔和其它绝对定位设备直接驱动指针
            state.pointer_x = decode.abs_x.unwrap_or(state.pointer_x);
            state.pointer_y = decode.abs_y.unwrap_or(state.pointer_y);
            out.push(Event::Motion(MotionEvent {
                device: device.clone(),
                time_ms,
                x: state.pointer_x,
                y: state.pointer_y,
                modifiers: state.modifiers,
            }));
        }
    }

    if decode.touch_up {
        if let Some(sequence) = decode.contact.take() {
            let (x, y) = state
                .touch_points
                .remove(&sequence)
                .unwrap_or((state.pointer_x, state.pointer_y));
            out.push(Event::TouchEnd(TouchEvent {
                device: device.clone(),
                time_ms,
                sequence,
                x,
                y,
            }));
        }
    }

    if decode.rel_x != 0.0 || decode.rel_y != 0.0 {
        state.pointer_x += decode.rel_x;
        state.pointer_y += decode.rel_y;
        out.push(Event::Motion(MotionEvent {
            device: device.clone(),
            time_ms,
            x: state.pointer_x,
            y: state.pointer_y,
            modifiers: state.modifiers,
        }));
    }
    if decode.scroll_x != 0.0 || decode.scroll_y != 0.0 {
        out.push(Event::Scroll(ScrollEvent {
            device: device.clone(),
            time_ms,
            dx: decode.scroll_x,
            dy: decode.scroll_y,
        }));
    }

    decode.rel_x = 0.0;
    decode.rel_y = 0.0;
    decode.scroll_x = 0.0;
    decode.scroll_y = 0.0;
    decode.abs_x = None;
    decode.abs_y = None;
    decode.touch_down = false;
    decode.touch_up = false;
}

fn button_number(key: EV_KEY) -> Option<(u32, ModifierMask)> {
    match key {
        EV_KEY::BTN_LEFT => Some((1, ModifierMask::BUTTON1)),
        EV_KEY::BTN_MIDDLE => Some((2, ModifierMask::BUTTON2)),
        EV_KEY::BTN_RIGHT => Some((3, ModifierMask::BUTTON3)),
        _ => None,
    }
}

fn modifier_bit(key: EV_KEY) -> Option<ModifierMask> {
    match key {
        EV_KEY::KEY_LEFTSHIFT | EV_KEY::KEY_RIGHTSHIFT => Some(ModifierMask::SHIFT),
        EV_KEY::KEY_LEFTCTRL | EV_KEY::KEY_RIGHTCTRL => Some(ModifierMask::CONTROL),
        EV_KEY::KEY_LEFTALT | EV_KEY::KEY_RIGHTALT => Some(ModifierMask::MOD1),
        EV_KEY::KEY_LEFTMETA | EV_KEY::KEY_RIGHTMETA => Some(ModifierMask::MOD4),
        _ => None,
    }
}

fn timeval_to_ms(time: &TimeVal) -> u32 {
    (time.tv_sec as u64)
        .wrapping_mul(1000)
        .wrapping_add(time.tv_usec as u64 / 1000) as u32
}

fn timeval_from_ms(time_ms: u32) -> TimeVal {
    TimeVal::new(i64::from(time_ms / 1000), i64::from(time_ms % 1000) * 1000)
}

struct EvdevVirtualDevice {
    kind: DeviceType,
    uinput: UInputDevice,
}

fn create_uinput_device(kind: DeviceType) -> anyhow::Result<EvdevVirtualDevice> {
    let template = UninitDevice::new().context("allocating a uinput device template")?;
    let label = match kind {
        DeviceType::Keyboard => "keyboard",
        _ => "pointer",
    };
    template.set_name(&format!("inputd virtual {label}"));
    template.set_bustype(BusType::BUS_VIRTUAL as u16);

    match kind {
        DeviceType::Keyboard => {
            template.enable(EventType::EV_KEY)?;
            for code in 1..=248u32 {
                template.enable(int_to_event_code(EventType::EV_KEY as u32, code))?;
            }
        }
        _ => {
            template.enable(EventType::EV_KEY)?;
            template.enable(EventCode::EV_KEY(EV_KEY::BTN_LEFT))?;
            template.enable(EventCode::EV_KEY(EV_KEY::BTN_MIDDLE))?;
            template.enable(EventCode::EV_KEY(EV_KEY::BTN_RIGHT))?;
            template.enable(EventType::EV_REL)?;
            template.enable(EventCode::EV_REL(EV_REL::REL_X))?;
            template.enable(EventCode::EV_REL(EV_REL::REL_Y))?;
            template.enable(EventCode::EV_REL(EV_REL::REL_WHEEL))?;
        }
    }
    template.enable(EventCode::EV_SYN(EV_SYN::SYN_REPORT))?;

    let uinput = UInputDevice::create_from_device(&template)
        .context("creating the uinput device, is /dev/uinput writable?")?;
    if let Some(devnode) = uinput.devnode() {
        info!(?kind, devnode, "virtual input device created");
    }
    Ok(EvdevVirtualDevice { kind, uinput })
}

impl EvdevVirtualDevice {
    fn write_raw(&self, time: &TimeVal, code: &EventCode, value: i32) -> io::Result<()> {
        self.uinput.write_event(&InputEvent::new(time, code, value))
    }

    fn frame(&self, time_ms: u32, events: &[(EventCode, i32)]) {
        let time = timeval_from_ms(time_ms);
        let mut result = Ok(());
        for (code, value) in events {
            result = result.and_then(|()| self.write_raw(&time, code, *value));
        }
        let result =
            result.and_then(|()| self.write_raw(&time, &EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0));
        if let Err(error) = result {
            warn!(%error, "dropping virtual input frame");
        }
    }
}

impl VirtualInputDevice for EvdevVirtualDevice {
    fn device_type(&self) -> DeviceType {
        self.kind
    }

    fn notify_key(&self, time_ms: u32, key: u32, pressed: bool) {
        self.frame(
            time_ms,
            &[(
                int_to_event_code(EventType::EV_KEY as u32, key),
                i32::from(pressed),
            )],
        );
    }

    fn notify_button(&self, time_ms: u32, button: u32, pressed: bool) {
        let code = match button {
            1 => EV_KEY::BTN_LEFT,
            2 => EV_KEY::BTN_MIDDLE,
            3 => EV_KEY::BTN_RIGHT,
            other => {
                warn!(button = other, "virtual button out of range");
                return;
            }
        };
        self.frame(time_ms, &[(EventCode::EV_KEY(code), i32::from(pressed))]);
    }

    fn notify_relative_motion(&self, time_ms: u32, dx: f32, dy: f32) {
        self.frame(
            time_ms,
            &[
                (EventCode::EV_REL(EV_REL::REL_X), dx.round() as i32),
                (EventCode::EV_REL(EV_REL::REL_Y), dy.round() as i32),
            ],
        );
    }

    fn notify_absolute_motion(&self, _time_ms: u32, _x: f32, _y: f32) {
        debug!("absolute motion needs an abs-capable virtual device, dropping");
    }
}

impl SeatBackend for EvdevBackend {
    fn pointer(&self) -> Option<Rc<InputDevice>> {
        self.shared
            .borrow()
            .devices
            .iter()
            .find(|d| d.mode() == DeviceMode::Logical && d.kind() == DeviceType::Pointer)
            .cloned()
    }

    fn keyboard(&self) -> Option<Rc<InputDevice>> {
        self.shared
            .borrow()
            .devices
            .iter()
            .find(|d| d.mode() == DeviceMode::Logical && d.kind() == DeviceType::Keyboard)
            .cloned()
    }

    fn devices(&self) -> Ref<'_, [Rc<InputDevice>]> {
        Ref::map(self.shared.borrow(), |shared| shared.devices.as_slice())
    }

    fn keymap(&self) -> Rc<Keymap> {
        self.shared.borrow().keymap.clone()
    }

    fn bell_notify(&self) {
        debug!("no bell sink on the evdev path");
    }

    fn create_virtual_device(&self, kind: DeviceType) -> Option<Box<dyn VirtualInputDevice>> {
        match kind {
            DeviceType::Keyboard | DeviceType::Pointer => match create_uinput_device(kind) {
                Ok(device) => Some(Box::new(device)),
                Err(error) => {
                    warn!(%error, "virtual device creation failed");
                    None
                }
            },
            _ => None,
        }
    }

    fn supported_virtual_device_types(&self) -> VirtualDeviceTypes {
        VirtualDeviceTypes::KEYBOARD | VirtualDeviceTypes::POINTER
    }

    fn warp_pointer(&self, x: i32, y: i32) {
        let shared = &mut *self.shared.borrow_mut();
        shared.state.pointer_x = x as f32;
        shared.state.pointer_y = y as f32;
    }

    fn init_pointer_position(&self, x: f32, y: f32) {
        let shared = &mut *self.shared.borrow_mut();
        shared.state.pointer_x = x;
        shared.state.pointer_y = y;
    }

    fn query_state(
        &self,
        _device: &Rc<InputDevice>,
        sequence: Option<EventSequence>,
    ) -> Option<DeviceState> {
        let shared = self.shared.borrow();
        match sequence {
            Some(sequence) => {
                shared
                    .state
                    .touch_points
                    .get(&sequence)
                    .map(|&(x, y)| DeviceState {
                        x,
                        y,
                        modifiers: shared.state.modifiers,
                    })
            }
            None => Some(DeviceState {
                x: shared.state.pointer_x,
                y: shared.state.pointer_y,
                modifiers: shared.state.modifiers,
            }),
        }
    }

    fn touch_mode(&self) -> bool {
        let shared = self.shared.borrow();
        let has_touchscreen = shared
            .devices
            .iter()
            .any(|d| d.mode() != DeviceMode::Logical && d.kind() == DeviceType::Touchscreen);
        has_touchscreen && shared.state.tablet_mode.unwrap_or(true)
    }

    fn apply_kbd_a11y_settings(&self, settings: &KeyboardA11ySettings) {
        debug!(flags = ?settings.flags, "keyboard accessibility settings stored, no kernel side effect");
    }

    fn grab(&self, _time_ms: u32) -> Option<GrabState> {
        let shared = &mut *self.shared.borrow_mut();
        for node in &shared.nodes {
            if let Err(error) = node.handle.borrow_mut().grab(GrabMode::Grab) {
                warn!(device = %node.device, %error, "exclusive grab failed");
            }
        }
        shared.grabbed = true;
        Some(GrabState::ALL)
    }

    fn ungrab(&self, _time_ms: u32) {
        let shared = &mut *self.shared.borrow_mut();
        for node in &shared.nodes {
            if let Err(error) = node.handle.borrow_mut().grab(GrabMode::Ungrab) {
                debug!(device = %node.device, %error, "ungrab failed");
            }
        }
        shared.grabbed = false;
    }

    fn dispose(&self) {
        let shared = &mut *self.shared.borrow_mut();
        if shared.grabbed {
            for node in &shared.nodes {
                let _ = node.handle.borrow_mut().grab(GrabMode::Ungrab);
            }
            shared.grabbed = false;
        }
        shared.nodes.clear();
        shared.devices.clear();
        shared.state.touch_points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device(kind: DeviceType) -> Rc<InputDevice> {
        Rc::new(InputDevice::new(
            DeviceId(9),
            "node under test",
            kind,
            DeviceMode::Physical,
        ))
    }

    fn feed(
        code: EventCode,
        value: i32,
        device: &Rc<InputDevice>,
        decode: &mut DecodeState,
        state: &mut InputState,
        keymap: &Keymap,
        out: &mut Vec<Event>,
    ) {
        let time = TimeVal::new(1, 500_000);
        translate(
            &InputEvent::new(&time, &code, value),
            device,
            decode,
            state,
            keymap,
            out,
        );
    }

    #[test]
    fn rel_motion_coalesces_until_syn() {
        let device = test_device(DeviceType::Pointer);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_REL(EV_REL::REL_X), 4, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_REL(EV_REL::REL_Y), -2, &device, &mut decode, &mut state, &keymap, &mut out);
        assert!(out.is_empty());

        feed(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0, &device, &mut decode, &mut state, &keymap, &mut out);
        match out.as_slice() {
            [Event::Motion(motion)] => {
                assert_eq!((motion.x, motion.y), (4.0, -2.0));
                assert_eq!(motion.time_ms, 1500);
            }
            other => panic!("expected one motion event, got {other:?}"),
        }
        assert_eq!((state.pointer_x, state.pointer_y), (4.0, -2.0));
    }

    #[test]
    fn touch_lifecycle_allocates_one_sequence() {
        let device = test_device(DeviceType::Touchscreen);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_KEY(EV_KEY::BTN_TOUCH), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_ABS(EV_ABS::ABS_X), 120, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_ABS(EV_ABS::ABS_Y), 80, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0, &device, &mut decode, &mut state, &keymap, &mut out);

        feed(EventCode::EV_ABS(EV_ABS::ABS_X), 130, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0, &device, &mut decode, &mut state, &keymap, &mut out);

        feed(EventCode::EV_KEY(EV_KEY::BTN_TOUCH), 0, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0, &device, &mut decode, &mut state, &keymap, &mut out);

        match out.as_slice() {
            [
                Event::TouchBegin(begin),
                Event::TouchUpdate(update),
                Event::TouchEnd(end),
            ] => {
                assert_eq!(begin.sequence, EventSequence(1));
                assert_eq!((begin.x, begin.y), (120.0, 80.0));
                assert_eq!(update.sequence, begin.sequence);
                assert_eq!((update.x, update.y), (130.0, 80.0));
                assert_eq!(end.sequence, begin.sequence);
            }
            other => panic!("unexpected touch stream: {other:?}"),
        }
        assert!(state.touch_points.is_empty());
    }

    #[test]
    fn buttons_update_modifier_mask() {
        let device = test_device(DeviceType::Pointer);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_KEY(EV_KEY::BTN_LEFT), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        match out.as_slice() {
            [Event::Button(button)] => {
                assert_eq!(button.button, 1);
                assert!(button.pressed);
                assert!(button.modifiers.contains(ModifierMask::BUTTON1));
            }
            other => panic!("expected a button event, got {other:?}"),
        }

        feed(EventCode::EV_KEY(EV_KEY::BTN_LEFT), 0, &device, &mut decode, &mut state, &keymap, &mut out);
        assert!(!state.modifiers.contains(ModifierMask::BUTTON1));
    }

    #[test]
    fn modifier_keys_ride_on_key_events() {
        let device = test_device(DeviceType::Keyboard);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_KEY(EV_KEY::KEY_LEFTSHIFT), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_KEY(EV_KEY::KEY_A), 1, &device, &mut decode, &mut state, &keymap, &mut out);

        match out.as_slice() {
            [Event::Key(shift), Event::Key(a)] => {
                assert_eq!(shift.key, EV_KEY::KEY_LEFTSHIFT as u32);
                assert_eq!(a.key, EV_KEY::KEY_A as u32);
                assert!(a.modifiers.contains(ModifierMask::SHIFT));
            }
            other => panic!("expected two key events, got {other:?}"),
        }
    }

    #[test]
    fn wheel_becomes_scroll() {
        let device = test_device(DeviceType::Pointer);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_REL(EV_REL::REL_WHEEL), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        feed(EventCode::EV_SYN(EV_SYN::SYN_REPORT), 0, &device, &mut decode, &mut state, &keymap, &mut out);

        match out.as_slice() {
            [Event::Scroll(scroll)] => assert_eq!((scroll.dx, scroll.dy), (0.0, 1.0)),
            other => panic!("expected a scroll event, got {other:?}"),
        }
    }

    #[test]
    fn lock_leds_feed_keymap() {
        let device = test_device(DeviceType::Keyboard);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_LED(EV_LED::LED_CAPSL), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        assert!(keymap.caps_lock_state());
        assert!(state.modifiers.contains(ModifierMask::LOCK));

        feed(EventCode::EV_LED(EV_LED::LED_NUML), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        assert!(keymap.num_lock_state());
        assert!(keymap.caps_lock_state());
        assert!(out.is_empty());
    }

    #[test]
    fn tablet_switch_toggles_state() {
        let device = test_device(DeviceType::Keyboard);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_SW(EV_SW::SW_TABLET_MODE), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        assert_eq!(state.tablet_mode, Some(true));
        feed(EventCode::EV_SW(EV_SW::SW_TABLET_MODE), 0, &device, &mut decode, &mut state, &keymap, &mut out);
        assert_eq!(state.tablet_mode, Some(false));
    }

    #[test]
    fn tool_presence_bits_are_ignored() {
        let device = test_device(DeviceType::TabletPen);
        let mut decode = DecodeState::default();
        let mut state = InputState::default();
        let keymap = Keymap::new("us");
        let mut out = Vec::new();

        feed(EventCode::EV_KEY(EV_KEY::BTN_TOOL_PEN), 1, &device, &mut decode, &mut state, &keymap, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn timeval_conversion() {
        assert_eq!(timeval_to_ms(&TimeVal::new(2, 250_000)), 2250);
        let back = timeval_from_ms(2250);
        assert_eq!((back.tv_sec, back.tv_usec), (2, 250_000));
    }
}
