//! # 配置文件
//!
//! TOML 格式, 所有字段都有默认值, 缺文件就等价于空配置

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::warn;

use crate::seat::pointer_a11y::{A11yControls, DwellClickType, DwellMode, PointerA11ySettings};

/// 顶层配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub seat: SeatSection,
    pub pointer_a11y: PointerA11ySection,
}

/// `[seat]` 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeatSection {
    pub name: String,
}

impl Default for SeatSection {
    fn default() -> Self {
        Self {
            name: "seat0".to_string(),
        }
    }
}

/// `[pointer_a11y]` 段, 字段与 [`PointerA11ySettings`] 一一对应
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PointerA11ySection {
    pub secondary_click: bool,
    pub dwell: bool,
    pub dwell_click_type: u32,
    pub dwell_mode: String,
    pub secondary_click_delay_ms: u32,
    pub dwell_delay_ms: u32,
    pub dwell_threshold: u32,
}

impl Default for PointerA11ySection {
    fn default() -> Self {
        Self {
            secondary_click: false,
            dwell: false,
            dwell_click_type: 0,
            dwell_mode: "window".to_string(),
            secondary_click_delay_ms: 1200,
            dwell_delay_ms: 1200,
            dwell_threshold: 10,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn pointer_a11y_settings(&self) -> PointerA11ySettings {
        let section = &self.pointer_a11y;

        let mut controls = A11yControls::empty();
        if section.secondary_click {
            controls |= A11yControls::SECONDARY_CLICK;
        }
        if section.dwell {
            controls |= A11yControls::DWELL;
        }

        let dwell_mode = match section.dwell_mode.as_str() {
            "window" => DwellMode::Window,
            "gesture" => DwellMode::Gesture,
            other => {
                warn!(mode = other, "unknown dwell mode, falling back to window");
                DwellMode::Window
            }
        };

        PointerA11ySettings {
            controls,
            dwell_click_type: DwellClickType::from(section.dwell_click_type),
            dwell_mode,
            secondary_click_delay_ms: section.secondary_click_delay_ms,
            dwell_delay_ms: section.dwell_delay_ms,
            dwell_threshold: section.dwell_threshold,
            ..PointerA11ySettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.seat.name, "seat0");
        assert_eq!(config.pointer_a11y_settings(), PointerA11ySettings::default());
    }

    #[test]
    fn load_reads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[seat]").unwrap();
        writeln!(file, "name = \"usb-kvm\"").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[pointer_a11y]").unwrap();
        writeln!(file, "dwell = true").unwrap();
        writeln!(file, "dwell_click_type = 2").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.seat.name, "usb-kvm");

        let settings = config.pointer_a11y_settings();
        assert_eq!(settings.controls, A11yControls::DWELL);
        assert_eq!(settings.dwell_click_type, DwellClickType::Secondary);
        assert_eq!(settings.dwell_delay_ms, 1200);
    }

    #[test]
    fn unknown_click_type_falls_back_to_none() {
        let config: Config = toml::from_str("[pointer_a11y]\ndwell_click_type = 42\n").unwrap();
        assert_eq!(
            config.pointer_a11y_settings().dwell_click_type,
            DwellClickType::None
        );
    }

    #[test]
    fn bad_dwell_mode_falls_back_to_window() {
        let config: Config = toml::from_str("[pointer_a11y]\ndwell_mode = \"corner\"\n").unwrap();
        assert_eq!(config.pointer_a11y_settings().dwell_mode, DwellMode::Window);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[seat").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
