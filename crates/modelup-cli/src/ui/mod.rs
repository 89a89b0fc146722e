//! Terminal output.

pub mod progress;

use crossterm::style::Stylize;

pub use progress::LineReporter;

/// Column width for model names.
pub const NAME_WIDTH: usize = 20;

pub fn info(msg: &str) {
    println!("{}", msg.dark_grey());
}

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Version as shown to users (`v1.2.0`).
pub fn display_version(version: &str) -> String {
    format!("v{}", version.trim_start_matches('v'))
}

/// Human-readable byte count (`1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_display_version() {
        assert_eq!(display_version("1.2.0"), "v1.2.0");
        assert_eq!(display_version("v1.2.0"), "v1.2.0");
    }
}
