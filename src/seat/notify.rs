use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::device_model::InputDevice;
use crate::event_model::ModifierMask;
use crate::seat::Seat;
use crate::seat::keyboard_a11y::KeyboardA11yFlags;
use crate::seat::pointer_a11y::{A11yTimeoutType, DwellClickType};

/// seat 对外的全部通知, 一个枚举走一个 registry, 观察者自己按变体过滤
#[derive(Debug, Clone)]
pub enum SeatSignal {
    DeviceAdded {
        device: Rc<InputDevice>,
    },
    DeviceRemoved {
        device: Rc<InputDevice>,
    },
    KbdA11yModsStateChanged {
        latched: ModifierMask,
        locked: ModifierMask,
    },
    KbdA11yFlagsChanged {
        settings_flags: KeyboardA11yFlags,
        changed_mask: KeyboardA11yFlags,
    },
    PtrA11yDwellClickTypeChanged {
        click_type: DwellClickType,
    },
    PtrA11yTimeoutStarted {
        device: Rc<InputDevice>,
        timeout_type: A11yTimeoutType,
        delay_ms: u32,
    },
    PtrA11yTimeoutStopped {
        device: Rc<InputDevice>,
        timeout_type: A11yTimeoutType,
        clicked: bool,
    },
    IsUnfocusInhibitedChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub(crate) type SignalHandler = Rc<dyn Fn(&Seat, &SeatSignal)>;

/// 同步派发的观察者表
///
/// 派发前快照一份 handler 列表, 回调里 connect/disconnect 不影响本轮派发
#[derive(Default)]
pub(crate) struct SignalRegistry {
    handlers: RefCell<Vec<(HandlerId, SignalHandler)>>,
    next_id: Cell<u64>,
}

impl SignalRegistry {
    pub(crate) fn connect(&self, handler: SignalHandler) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    pub(crate) fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub(crate) fn emit(&self, seat: &Seat, signal: &SeatSignal) {
        let snapshot: Vec<(HandlerId, SignalHandler)> = self.handlers.borrow().clone();
        for (_, handler) in snapshot {
            handler(seat, signal);
        }
    }

    pub(crate) fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}
