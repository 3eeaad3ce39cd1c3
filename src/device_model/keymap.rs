use std::cell::{Cell, RefCell};

/// 键盘布局描述与锁定键状态, 状态由后端随事件流更新
#[derive(Debug, Default)]
pub struct Keymap {
    layout: RefCell<String>,
    caps_lock: Cell<bool>,
    num_lock: Cell<bool>,
}

impl Keymap {
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: RefCell::new(layout.into()),
            caps_lock: Cell::new(false),
            num_lock: Cell::new(false),
        }
    }

    pub fn layout(&self) -> String {
        self.layout.borrow().clone()
    }

    pub fn caps_lock_state(&self) -> bool {
        self.caps_lock.get()
    }

    pub fn num_lock_state(&self) -> bool {
        self.num_lock.get()
    }

    pub(crate) fn set_layout(&self, layout: String) {
        *self.layout.borrow_mut() = layout;
    }

    pub(crate) fn set_lock_state(&self, caps_lock: bool, num_lock: bool) {
        self.caps_lock.set(caps_lock);
        self.num_lock.set(num_lock);
    }
}
