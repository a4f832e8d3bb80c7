//! Terminal colour helpers. Respects `NO_COLOR` and `--no-color`.

use colored::Colorize;

const ACCENT: (u8, u8, u8) = (0x2D, 0x8C, 0xFF);
const SUCCESS: (u8, u8, u8) = (0x2F, 0xBF, 0x71);
const WARN: (u8, u8, u8) = (0xFF, 0xB0, 0x20);
const ERROR: (u8, u8, u8) = (0xE2, 0x3D, 0x2D);
const MUTED: (u8, u8, u8) = (0x8B, 0x7F, 0x77);

/// Call once after argument parsing.
pub fn init_color(no_color_flag: bool) {
    if no_color_flag
        || std::env::var("NO_COLOR")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    {
        colored::control::set_override(false);
    }
}

fn apply(text: &str, rgb: (u8, u8, u8)) -> String {
    text.truecolor(rgb.0, rgb.1, rgb.2).to_string()
}

pub fn accent(text: &str) -> String {
    apply(text, ACCENT)
}

pub fn success(text: &str) -> String {
    apply(text, SUCCESS)
}

pub fn warn(text: &str) -> String {
    apply(text, WARN)
}

pub fn error(text: &str) -> String {
    apply(text, ERROR)
}

pub fn muted(text: &str) -> String {
    apply(text, MUTED)
}

pub fn bold(text: &str) -> String {
    text.bold().to_string()
}

/// `  Label: value` with the label accented.
pub fn label_value(label: &str, value: &str) -> String {
    format!("  {} {}", accent(&format!("{label}:")), value)
}
