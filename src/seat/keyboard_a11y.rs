bitflags::bitflags! {
    /// 键盘无障碍功能开关
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyboardA11yFlags: u32 {
        const ENABLED = 1 << 0;
        const TIMEOUT_ENABLED = 1 << 1;
        const MOUSE_KEYS_ENABLED = 1 << 2;
        const SLOW_KEYS_ENABLED = 1 << 3;
        const BOUNCE_KEYS_ENABLED = 1 << 4;
        const TOGGLE_KEYS_ENABLED = 1 << 5;
        const STICKY_KEYS_ENABLED = 1 << 6;
        const STICKY_KEYS_TWO_KEY_OFF = 1 << 7;
        const STICKY_KEYS_BEEP = 1 << 8;
        const FEATURE_STATE_CHANGE_BEEP = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardA11ySettings {
    pub flags: KeyboardA11yFlags,
    pub slow_keys_delay_ms: u32,
    pub debounce_delay_ms: u32,
}

impl Default for KeyboardA11ySettings {
    fn default() -> Self {
        Self {
            flags: KeyboardA11yFlags::empty(),
            slow_keys_delay_ms: 300,
            debounce_delay_ms: 300,
        }
    }
}
