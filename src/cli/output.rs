//! Output formatting module for syncstack
//!
//! Provides colored human output and a line-delimited JSON mode.

use colored::{Color, Colorize};
use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use syncstack::config::ColorsConfig;
use tracing::warn;

/// Colors for the message classes, taken from the `[colors]` config table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Headers and summary lines
    pub highlight: Color,
    /// Warnings and pending stacks
    pub warn: Color,
    /// Errors
    pub error: Color,
    /// Synthesized stacks
    pub ok: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_config(&ColorsConfig::default())
    }
}

impl Palette {
    /// Resolve the configured color names. Unknown names keep the built-in
    /// color for that class.
    pub fn from_config(colors: &ColorsConfig) -> Self {
        Self {
            highlight: parse_color(&colors.highlight, Color::White),
            warn: parse_color(&colors.warn, Color::BrightMagenta),
            error: parse_color(&colors.error, Color::Red),
            ok: parse_color(&colors.ok, Color::Green),
        }
    }
}

/// Parse a color name such as `red`, `bright_purple` or `bright blue`
fn parse_color(name: &str, fallback: Color) -> Color {
    let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
    let normalized = match normalized.as_str() {
        "bright purple" => "bright magenta",
        other => other,
    };
    normalized.parse().unwrap_or_else(|_| {
        warn!(color = %name, "unknown color name; using the default");
        fallback
    })
}

/// Synthesis status of one stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
    /// Template rendered from concrete values
    Synthesized,
    /// Template rendered with dummy lookup values
    PendingLookups,
}

impl StackStatus {
    /// Get the colored string representation
    pub fn colored_string(&self, palette: &Palette) -> String {
        match self {
            StackStatus::Synthesized => self.as_str().color(palette.ok).to_string(),
            StackStatus::PendingLookups => self.as_str().color(palette.warn).to_string(),
        }
    }

    /// Get the plain string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Synthesized => "synthesized",
            StackStatus::PendingLookups => "pending lookups",
        }
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Colors per message class
    palette: Palette,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
            palette: Palette::default(),
            start_time: Instant::now(),
        }
    }

    /// Use the given colors
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// True in JSON mode
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print the result line of one synthesized stack
    pub fn stack_result(&self, stack: &str, status: StackStatus, file: Option<&str>) {
        if self.json_mode {
            self.emit(&serde_json::json!({
                "type": "stack",
                "stack": stack,
                "status": status.as_str(),
                "file": file,
            }));
            return;
        }

        let status_str = if self.use_color {
            status.colored_string(&self.palette)
        } else {
            status.as_str().to_string()
        };
        match file {
            Some(file) => println!("{}: [{}] => {}", status_str, stack, file),
            None => println!("{}: [{}]", status_str, stack),
        }
    }

    /// Print the closing summary of a synthesis run
    pub fn recap(&self, stacks: usize, missing_lookups: usize, dir: &str) {
        let elapsed = format_duration(self.start_time.elapsed());

        if self.json_mode {
            self.emit(&serde_json::json!({
                "type": "recap",
                "stacks": stacks,
                "missing_lookups": missing_lookups,
                "output": dir,
                "duration": elapsed,
            }));
            return;
        }

        self.section("SYNTH RECAP");
        let line = format!(
            "{} stacks written to {} in {}",
            stacks, dir, elapsed
        );
        if self.use_color {
            println!("{}", line.color(self.palette.highlight));
        } else {
            println!("{}", line);
        }
        if missing_lookups > 0 {
            self.hint("run the lookups listed under `missing` in the manifest, then synthesize again");
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.emit_err(&serde_json::json!({
                "type": "error",
                "message": message
            }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".color(self.palette.error).bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.emit_err(&serde_json::json!({
                "type": "warning",
                "message": message
            }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".color(self.palette.warn).bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.json_mode {
            self.emit_err(&serde_json::json!({
                "type": "hint",
                "message": message
            }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "HINT:".cyan().bold(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 {
            return;
        }

        if self.json_mode {
            self.emit(&serde_json::json!({
                "type": "info",
                "message": message
            }));
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 {
            return;
        }

        if self.json_mode {
            self.emit(&serde_json::json!({
                "type": "debug",
                "message": message
            }));
            return;
        }

        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {}", message);
        }
    }

    /// Print raw text untouched, in either mode
    pub fn raw(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.json_mode {
            self.emit(&serde_json::json!({
                "type": "table",
                "headers": headers,
                "rows": rows
            }));
            return;
        }

        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let header_line = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ");
        if self.use_color {
            println!("{}", header_line.color(self.palette.highlight).bold());
        } else {
            println!("{}", header_line);
        }

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            let row_line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join(" | ");
            println!("{}", row_line.trim_end());
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }

    fn emit<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("failed to encode output: {}", e),
        }
    }

    fn emit_err<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => eprintln!("failed to encode output: {}", e),
        }
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_status_display() {
        assert_eq!(StackStatus::Synthesized.as_str(), "synthesized");
        assert_eq!(StackStatus::PendingLookups.as_str(), "pending lookups");
        assert!(StackStatus::Synthesized
            .colored_string(&Palette::default())
            .contains("synthesized"));
    }

    #[test]
    fn test_palette_from_config() {
        let colors = ColorsConfig {
            warn: "yellow".to_string(),
            error: "Bright_Red".to_string(),
            ok: "no-such-color".to_string(),
            ..ColorsConfig::default()
        };
        let palette = Palette::from_config(&colors);
        assert_eq!(palette.warn, Color::Yellow);
        assert_eq!(palette.error, Color::BrightRed);
        assert_eq!(palette.ok, Color::Green);
        assert_eq!(palette.highlight, Color::White);
    }

    #[test]
    fn test_default_palette_matches_default_config() {
        let palette = Palette::default();
        assert_eq!(palette.warn, Color::BrightMagenta);
        assert_eq!(palette.error, Color::Red);
        assert_eq!(palette.ok, Color::Green);
    }

    #[test]
    fn test_formatter_uses_configured_palette() {
        let palette = Palette {
            ok: Color::Blue,
            ..Palette::default()
        };
        let formatter = OutputFormatter::new(true, false, 0).with_palette(palette);
        assert_eq!(formatter.palette.ok, Color::Blue);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_json_mode_flag() {
        assert!(OutputFormatter::new(false, true, 0).is_json());
        assert!(!OutputFormatter::new(true, false, 0).is_json());
    }
}
