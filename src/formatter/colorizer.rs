//! Terminal colors for formatted output
//!
//! Every method returns plain text when colors are disabled, so callers never
//! branch on the color setting themselves.

use nu_ansi_term::{Color, Style};

/// Applies the output color scheme
#[derive(Debug, Clone, Copy)]
pub struct Colorizer {
    enabled: bool,
}

impl Colorizer {
    /// Create a new colorizer
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.enabled {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Operation header line
    pub fn header(&self, text: &str) -> String {
        self.paint(Color::Blue.bold(), text)
    }

    pub fn success(&self, text: &str) -> String {
        self.paint(Color::Green.into(), text)
    }

    /// Error line, always prefixed with `Error: `
    pub fn error(&self, text: &str) -> String {
        self.paint(Color::Red.into(), &format!("Error: {text}"))
    }

    pub fn warning(&self, text: &str) -> String {
        self.paint(Color::Yellow.into(), text)
    }

    /// Secondary information such as timings
    pub fn dim(&self, text: &str) -> String {
        self.paint(Color::DarkGray.dimmed(), text)
    }

    /// Document key (unquoted, shell style)
    pub fn field_key(&self, key: &str) -> String {
        self.paint(Color::Cyan.into(), key)
    }

    /// String value, single-quoted like mongosh
    pub fn string(&self, value: &str) -> String {
        let quoted = format!("'{}'", value.replace('\'', "\\'"));
        self.paint(Color::Green.into(), &quoted)
    }

    pub fn number(&self, value: &str) -> String {
        self.paint(Color::Yellow.into(), value)
    }

    pub fn boolean(&self, value: bool) -> String {
        self.paint(Color::Magenta.into(), &value.to_string())
    }

    pub fn null(&self, value: &str) -> String {
        self.paint(Color::DarkGray.bold(), value)
    }

    /// Wrapped value such as `ObjectId('…')` or `Long('…')`
    pub fn type_wrapper(&self, type_name: &str, value: &str) -> String {
        if self.enabled {
            format!(
                "{}({})",
                Color::Purple.paint(type_name),
                Color::Green.paint(format!("'{value}'"))
            )
        } else {
            format!("{type_name}('{value}')")
        }
    }

    pub fn iso_date(&self, iso: &str) -> String {
        self.type_wrapper("ISODate", iso)
    }

    /// `BinData(subtype, 'hex')`
    pub fn bin_data(&self, subtype: u8, hex: &str) -> String {
        if self.enabled {
            format!(
                "{}({}, {})",
                Color::Purple.paint("BinData"),
                Color::Yellow.paint(subtype.to_string()),
                Color::Green.paint(format!("'{hex}'"))
            )
        } else {
            format!("BinData({subtype}, '{hex}')")
        }
    }

    pub fn regex(&self, pattern: &str, options: &str) -> String {
        self.paint(Color::Red.into(), &format!("/{pattern}/{options}"))
    }

    pub fn timestamp(&self, time: u32, increment: u32) -> String {
        let text = format!("Timestamp({{ t: {time}, i: {increment} }})");
        self.paint(Color::Purple.into(), &text)
    }
}

impl Default for Colorizer {
    fn default() -> Self {
        Self::new(false)
    }
}
