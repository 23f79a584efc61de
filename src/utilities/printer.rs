//! Console printer with ANSI color support, used by the CLI summaries.

use serde::{Deserialize, Serialize};

/// Colors available for console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterColor {
    Red,
    Green,
    Yellow,
    Cyan,
    White,
    BoldGreen,
    BoldYellow,
    BoldCyan,
    BoldWhite,
}

impl PrinterColor {
    fn ansi_code(&self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Cyan => "\x1b[36m",
            Self::White => "\x1b[37m",
            Self::BoldGreen => "\x1b[1;32m",
            Self::BoldYellow => "\x1b[1;33m",
            Self::BoldCyan => "\x1b[1;36m",
            Self::BoldWhite => "\x1b[1;37m",
        }
    }

    /// Color for an accuracy or share in `[0, 1]`: green when high, yellow
    /// in the middle, red when low.
    pub fn for_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Green
        } else if score >= 0.6 {
            Self::Yellow
        } else {
            Self::Red
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Console printer. `plain` disables escape codes (for pipes and logs).
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    plain: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Printer that never emits ANSI escape codes.
    pub fn plain() -> Self {
        Self { plain: true }
    }

    /// Wrap `content` in the escape codes for `color`.
    pub fn paint(&self, content: &str, color: PrinterColor) -> String {
        if self.plain {
            content.to_string()
        } else {
            format!("{}{}{}", color.ansi_code(), content, RESET)
        }
    }

    /// Print a line in the given color.
    pub fn print(&self, content: &str, color: PrinterColor) {
        println!("{}", self.paint(content, color));
    }

    /// Print a `label: value` line with the label highlighted.
    pub fn print_field(&self, label: &str, value: &str) {
        println!("{} {}", self.paint(&format!("{}:", label), PrinterColor::BoldWhite), value);
    }

    /// Print a horizontal bar for a share in `[0, 1]`, e.g. for distributions.
    pub fn print_bar(&self, label: &str, share: f64) {
        let width = (share.clamp(0.0, 1.0) * 40.0).round() as usize;
        let bar = "#".repeat(width);
        println!(
            "  {:<18} {:>6.1}% {}",
            label,
            share * 100.0,
            self.paint(&bar, PrinterColor::Cyan)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_printer_has_no_escape_codes() {
        let p = Printer::plain();
        assert_eq!(p.paint("hello", PrinterColor::Red), "hello");
    }

    #[test]
    fn test_colored_printer_wraps_content() {
        let p = Printer::new();
        let painted = p.paint("ok", PrinterColor::Green);
        assert!(painted.starts_with("\x1b[32m"));
        assert!(painted.ends_with(RESET));
    }

    #[test]
    fn test_score_colors() {
        assert_eq!(PrinterColor::for_score(0.95), PrinterColor::Green);
        assert_eq!(PrinterColor::for_score(0.7), PrinterColor::Yellow);
        assert_eq!(PrinterColor::for_score(0.1), PrinterColor::Red);
    }
}
