//! # Seat 门面
//!
//! 一个 display 一个 seat, 聚合该 display 的全部输入设备.
//! seat 自己只拥有三块状态: 指针无障碍配置, 焦点抑制计数, 观察者表;
//! 设备永远现场从后端读取, 不做缓存

pub mod backend;
pub mod backend_evdev;
pub mod backend_headless;
pub mod backend_wayland;
pub mod keyboard_a11y;
pub mod notify;
pub mod pointer_a11y;

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::device_model::{
    DeviceMode, DeviceType, InputDevice, Keymap, VirtualDeviceTypes, VirtualInputDevice,
};
use crate::event_model::{Event, EventSequence, ModifierMask};
use crate::seat::backend::{DeviceState, GrabState, SeatBackend};
use crate::seat::keyboard_a11y::{KeyboardA11yFlags, KeyboardA11ySettings};
use crate::seat::notify::{HandlerId, SeatSignal, SignalHandler, SignalRegistry};
use crate::seat::pointer_a11y::{
    A11yTimeoutType, DwellClickType, PointerA11yHandler, PointerA11ySettings,
};

pub struct Seat {
    name: String,
    backend: Box<dyn SeatBackend>,
    signals: SignalRegistry,
    inhibit_unfocus_count: Cell<u32>,
    pointer_a11y_settings: Cell<PointerA11ySettings>,
    kbd_a11y_settings: Cell<KeyboardA11ySettings>,
    a11y_handler: RefCell<Option<Rc<dyn PointerA11yHandler>>>,
    destroyed: Cell<bool>,
}

impl Seat {
    /// 初始无障碍配置在这里直接落盘, 不走 enable/disable 转换;
    /// 装好 handler 之后调 [`Seat::ensure_a11y_state`] 补关联
    pub fn new(
        name: impl Into<String>,
        backend: Box<dyn SeatBackend>,
        initial_a11y: PointerA11ySettings,
    ) -> Seat {
        let seat = Seat {
            name: name.into(),
            backend,
            signals: SignalRegistry::default(),
            inhibit_unfocus_count: Cell::new(0),
            pointer_a11y_settings: Cell::new(initial_a11y),
            kbd_a11y_settings: Cell::new(KeyboardA11ySettings::default()),
            a11y_handler: RefCell::new(None),
            destroyed: Cell::new(false),
        };
        debug!(seat = %seat.name, "seat created");
        seat
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_alive(&self, op: &str) -> bool {
        if self.destroyed.get() {
            warn!(seat = %self.name, op, "called on a destroyed seat");
            return false;
        }
        true
    }

    /// 逻辑指针, 没有则为 None
    pub fn pointer(&self) -> Option<Rc<InputDevice>> {
        if !self.check_alive("pointer") {
            return None;
        }
        self.backend.pointer()
    }

    /// 逻辑键盘
    pub fn keyboard(&self) -> Option<Rc<InputDevice>> {
        if !self.check_alive("keyboard") {
            return None;
        }
        self.backend.keyboard()
    }

    /// 后端设备列表的借用视图, 持有期间不要再调用会改设备表的操作
    pub fn peek_devices(&self) -> Ref<'_, [Rc<InputDevice>]> {
        if self.destroyed.get() {
            warn!(seat = %self.name, "peek_devices called on a destroyed seat");
        }
        self.backend.devices()
    }

    /// 调用一刻的快照, 之后与 seat 各自独立
    pub fn list_devices(&self) -> Vec<Rc<InputDevice>> {
        self.peek_devices().to_vec()
    }

    pub fn keymap(&self) -> Rc<Keymap> {
        if self.destroyed.get() {
            warn!(seat = %self.name, "keymap called on a destroyed seat");
        }
        self.backend.keymap()
    }

    pub fn bell_notify(&self) {
        if !self.check_alive("bell_notify") {
            return;
        }
        self.backend.bell_notify();
    }

    pub fn create_virtual_device(&self, kind: DeviceType) -> Option<Box<dyn VirtualInputDevice>> {
        if !self.check_alive("create_virtual_device") {
            return None;
        }
        let device = self.backend.create_virtual_device(kind);
        if device.is_none() {
            debug!(seat = %self.name, ?kind, "backend cannot create this virtual device type");
        }
        device
    }

    pub fn supported_virtual_device_types(&self) -> VirtualDeviceTypes {
        if !self.check_alive("supported_virtual_device_types") {
            return VirtualDeviceTypes::empty();
        }
        self.backend.supported_virtual_device_types()
    }

    pub fn warp_pointer(&self, x: i32, y: i32) {
        if !self.check_alive("warp_pointer") {
            return;
        }
        self.backend.warp_pointer(x, y);
    }

    pub fn init_pointer_position(&self, x: f32, y: f32) {
        if !self.check_alive("init_pointer_position") {
            return;
        }
        self.backend.init_pointer_position(x, y);
    }

    /// 查询设备 (或某个触摸点) 的坐标与 modifier 状态.
    /// 不属于本 seat 的设备按契约错误处理: 警告并返回 None
    pub fn query_state(
        &self,
        device: &Rc<InputDevice>,
        sequence: Option<EventSequence>,
    ) -> Option<DeviceState> {
        if !self.check_alive("query_state") {
            return None;
        }
        {
            let devices = self.backend.devices();
            if !devices.iter().any(|d| Rc::ptr_eq(d, device)) {
                warn!(seat = %self.name, device = %device, "query_state for a device not on this seat");
                return None;
            }
        }
        self.backend.query_state(device, sequence)
    }

    /// 后端不支持显式 grab 时给出宽松默认: 全部拿到
    pub fn grab(&self, time_ms: u32) -> GrabState {
        if !self.check_alive("grab") {
            return GrabState::empty();
        }
        match self.backend.grab(time_ms) {
            Some(state) => state,
            None => {
                debug!(seat = %self.name, "backend without grab support, granting everything");
                GrabState::ALL
            }
        }
    }

    pub fn ungrab(&self, time_ms: u32) {
        if !self.check_alive("ungrab") {
            return;
        }
        self.backend.ungrab(time_ms);
    }

    /// 事件派发完毕后的统一后处理: 先走后端钩子, 再做设备生命周期通知.
    /// 移除通知先发, 通知返回后才 dispose, 观察者在回调里仍可读设备属性
    pub fn handle_event_post(&self, event: &Event) -> bool {
        if !self.check_alive("handle_event_post") {
            return false;
        }
        self.backend.handle_event_post(event);

        let device = event.source_device();
        assert!(
            !device.is_disposed(),
            "event pipeline delivered a disposed device: {device}"
        );

        match event {
            Event::DeviceAdded(e) => {
                self.signals.emit(
                    self,
                    &SeatSignal::DeviceAdded {
                        device: e.device.clone(),
                    },
                );
            }
            Event::DeviceRemoved(e) => {
                self.signals.emit(
                    self,
                    &SeatSignal::DeviceRemoved {
                        device: e.device.clone(),
                    },
                );
                e.device.dispose();
            }
            _ => {}
        }
        true
    }

    pub fn touch_mode(&self) -> bool {
        if !self.check_alive("touch_mode") {
            return false;
        }
        self.backend.touch_mode()
    }

    /// 是否存在非逻辑触摸屏, 首个命中即返回
    pub fn has_touchscreen(&self) -> bool {
        if !self.check_alive("has_touchscreen") {
            return false;
        }
        self.backend
            .devices()
            .iter()
            .any(|d| d.mode() != DeviceMode::Logical && d.kind() == DeviceType::Touchscreen)
    }

    pub fn inhibit_unfocus(&self) {
        if !self.check_alive("inhibit_unfocus") {
            return;
        }
        let count = self.inhibit_unfocus_count.get() + 1;
        self.inhibit_unfocus_count.set(count);
        if count == 1 {
            self.signals.emit(self, &SeatSignal::IsUnfocusInhibitedChanged);
        }
    }

    pub fn uninhibit_unfocus(&self) {
        if !self.check_alive("uninhibit_unfocus") {
            return;
        }
        let count = self.inhibit_unfocus_count.get();
        if count == 0 {
            warn!(seat = %self.name, "uninhibit_unfocus without inhibiting before");
            return;
        }
        self.inhibit_unfocus_count.set(count - 1);
        if count == 1 {
            self.signals.emit(self, &SeatSignal::IsUnfocusInhibitedChanged);
        }
    }

    pub fn is_unfocus_inhibited(&self) -> bool {
        self.inhibit_unfocus_count.get() > 0
    }

    /// 按值整体比较; 唯一触发关联/解除关联的是 controls 掩码的 0/非 0 翻转,
    /// 其余字段怎么变都只是换存储值
    pub fn set_pointer_a11y_settings(&self, settings: PointerA11ySettings) {
        if !self.check_alive("set_pointer_a11y_settings") {
            return;
        }
        let current = self.pointer_a11y_settings.get();
        if current == settings {
            return;
        }

        if current.controls.is_empty() {
            if !settings.controls.is_empty() {
                self.enable_pointer_a11y();
            }
        } else if settings.controls.is_empty() {
            self.disable_pointer_a11y();
        }

        self.pointer_a11y_settings.set(settings);
    }

    pub fn pointer_a11y_settings(&self) -> PointerA11ySettings {
        self.pointer_a11y_settings.get()
    }

    /// 窄口径 setter, 只改 dwell click type, 刻意绕开 enable/disable 转换
    pub fn set_pointer_a11y_dwell_click_type(&self, click_type: DwellClickType) {
        if !self.check_alive("set_pointer_a11y_dwell_click_type") {
            return;
        }
        let mut settings = self.pointer_a11y_settings.get();
        settings.dwell_click_type = click_type;
        self.pointer_a11y_settings.set(settings);
    }

    pub fn set_pointer_a11y_handler(&self, handler: Rc<dyn PointerA11yHandler>) {
        *self.a11y_handler.borrow_mut() = Some(handler);
    }

    pub fn pointer_a11y_enabled(&self) -> bool {
        !self.pointer_a11y_settings.get().controls.is_empty()
    }

    /// 核心指针身份变化后 (比如后端重新探测) 重建关联, 幂等
    pub fn ensure_a11y_state(&self) {
        if !self.check_alive("ensure_a11y_state") {
            return;
        }
        if let Some(pointer) = self.backend.pointer() {
            if self.pointer_a11y_enabled() {
                self.add_a11y_device(&pointer);
            }
        }
    }

    fn enable_pointer_a11y(&self) {
        let Some(pointer) = self.backend.pointer() else {
            warn!(seat = %self.name, "pointer accessibility enabled but the seat has no core pointer");
            return;
        };
        self.add_a11y_device(&pointer);
    }

    fn disable_pointer_a11y(&self) {
        let Some(pointer) = self.backend.pointer() else {
            return;
        };
        let handler = self.a11y_handler.borrow().clone();
        if let Some(handler) = handler {
            handler.remove_device(self, &pointer);
        }
    }

    fn add_a11y_device(&self, pointer: &Rc<InputDevice>) {
        let handler = self.a11y_handler.borrow().clone();
        match handler {
            Some(handler) => handler.add_device(self, pointer),
            None => {
                debug!(seat = %self.name, "pointer accessibility active without a handler installed")
            }
        }
    }

    /// 存储, 下推后端, 再按位翻转发 flags 变化通知
    pub fn set_kbd_a11y_settings(&self, settings: KeyboardA11ySettings) {
        if !self.check_alive("set_kbd_a11y_settings") {
            return;
        }
        let previous = self.kbd_a11y_settings.get();
        self.kbd_a11y_settings.set(settings);
        self.backend.apply_kbd_a11y_settings(&settings);

        let changed_mask = previous.flags ^ settings.flags;
        if !changed_mask.is_empty() {
            self.signals.emit(
                self,
                &SeatSignal::KbdA11yFlagsChanged {
                    settings_flags: settings.flags,
                    changed_mask,
                },
            );
        }
    }

    pub fn kbd_a11y_settings(&self) -> KeyboardA11ySettings {
        self.kbd_a11y_settings.get()
    }

    pub fn connect<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Seat, &SeatSignal) + 'static,
    {
        let handler: SignalHandler = Rc::new(handler);
        self.signals.connect(handler)
    }

    pub fn disconnect(&self, id: HandlerId) {
        if !self.signals.disconnect(id) {
            warn!(seat = %self.name, "disconnect with an unknown handler id");
        }
    }

    /// 键盘无障碍引擎上报 latched/locked modifier 状态
    pub fn notify_kbd_a11y_mods_state_changed(&self, latched: ModifierMask, locked: ModifierMask) {
        if !self.check_alive("notify_kbd_a11y_mods_state_changed") {
            return;
        }
        self.signals
            .emit(self, &SeatSignal::KbdA11yModsStateChanged { latched, locked });
    }

    /// 引擎侧自发的 flags 翻转 (比如连按修饰键触发 sticky keys), 只通知不改存储
    pub fn notify_kbd_a11y_flags_changed(
        &self,
        settings_flags: KeyboardA11yFlags,
        changed_mask: KeyboardA11yFlags,
    ) {
        if !self.check_alive("notify_kbd_a11y_flags_changed") {
            return;
        }
        self.signals.emit(
            self,
            &SeatSignal::KbdA11yFlagsChanged {
                settings_flags,
                changed_mask,
            },
        );
    }

    pub fn notify_ptr_a11y_dwell_click_type_changed(&self, click_type: DwellClickType) {
        if !self.check_alive("notify_ptr_a11y_dwell_click_type_changed") {
            return;
        }
        self.signals
            .emit(self, &SeatSignal::PtrA11yDwellClickTypeChanged { click_type });
    }

    pub fn notify_ptr_a11y_timeout_started(
        &self,
        device: &Rc<InputDevice>,
        timeout_type: A11yTimeoutType,
        delay_ms: u32,
    ) {
        if !self.check_alive("notify_ptr_a11y_timeout_started") {
            return;
        }
        self.signals.emit(
            self,
            &SeatSignal::PtrA11yTimeoutStarted {
                device: device.clone(),
                timeout_type,
                delay_ms,
            },
        );
    }

    pub fn notify_ptr_a11y_timeout_stopped(
        &self,
        device: &Rc<InputDevice>,
        timeout_type: A11yTimeoutType,
        clicked: bool,
    ) {
        if !self.check_alive("notify_ptr_a11y_timeout_stopped") {
            return;
        }
        self.signals.emit(
            self,
            &SeatSignal::PtrA11yTimeoutStopped {
                device: device.clone(),
                timeout_type,
                clicked,
            },
        );
    }

    /// 解除关联, 逐个 dispose 设备, 再让后端放资源; 之后所有操作都按契约错误拒绝
    pub fn destroy(&self) {
        if self.destroyed.get() {
            warn!(seat = %self.name, "destroy called twice");
            return;
        }
        if self.pointer_a11y_enabled() {
            self.disable_pointer_a11y();
        }
        for device in self.list_devices() {
            device.dispose();
        }
        self.backend.dispose();
        self.signals.clear();
        self.a11y_handler.borrow_mut().take();
        self.destroyed.set(true);
        debug!(seat = %self.name, "seat destroyed");
    }
}
