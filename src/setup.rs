//! Setup/initialization module - handles application startup tasks
//!
//! Includes:
//! - Logger initialization
//! - Image folder initialization

use anstyle::{AnsiColor, Style};
use anyhow::{Context, Result};
use env_logger::{Builder, WriteStyle};
use log::kv::Key;
use log::info;
use std::{fs, io::Write, path::Path};

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

const DIM: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::BrightBlack)));
const DURATION: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Cyan)));

/// Width of the duration column, also the indent of continuation lines
const DURATION_WIDTH: usize = 10;

fn paint(style: Style, text: impl std::fmt::Display) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// `12.3456ms` becomes `12.35 ms`; anything unparsable is shown as is
fn format_duration(raw: &str) -> String {
    if let Some(idx) = raw.find(|c: char| c.is_alphabetic()) {
        let (num, unit) = (&raw[..idx], &raw[idx..]);
        if let Ok(val) = num.parse::<f32>() {
            return format!("{:.2} {}", val, unit);
        }
    }
    raw.to_string()
}

/// Install the global logger. `RUST_LOG` overrides the default filters.
pub fn initialize_logger() {
    Builder::new()
        .write_style(WriteStyle::Auto)
        .format(|buf, record| {
            let ts = paint(DIM, buf.timestamp());

            let level_style = buf.default_level_style(record.level());
            let lvl = paint(level_style, record.level());

            let tgt = paint(DIM, record.target());

            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| format_duration(&v.to_string()))
                .unwrap_or_default();

            let dur = if dur_raw.is_empty() {
                " ".repeat(DURATION_WIDTH)
            } else {
                paint(DURATION, format!("{:>width$}", dur_raw, width = DURATION_WIDTH))
            };

            writeln!(buf, "{} {} {}", ts, lvl, tgt)?;

            let message = record.args().to_string();
            let subsequent_indent = " ".repeat(DURATION_WIDTH + 1);
            let mut lines = message.lines();

            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }

            Ok(())
        })
        .filter(None, log::LevelFilter::Info)
        .filter(Some("reqwest"), log::LevelFilter::Warn)
        .filter(Some("hyper"), log::LevelFilter::Warn)
        .filter(Some("hyper_util"), log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .init();
}

// ────────────────────────────────────────────────────────────────
// Folder Initialization
// ────────────────────────────────────────────────────────────────

/// Create the image save folder up front so a bad path fails before any download
pub fn initialize_folder(image_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = image_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create image folder {:?}", dir))?;
        info!("Image folder ready: {:?}", dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_rounded_with_a_unit_gap() {
        assert_eq!(format_duration("12.3456ms"), "12.35 ms");
        assert_eq!(format_duration("1.5s"), "1.50 s");
        assert_eq!(format_duration("3.25µs"), "3.25 µs");
        assert_eq!(format_duration("odd"), "odd");
    }

    #[test]
    fn folder_is_created_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("images/saved");

        initialize_folder(Some(&target)).unwrap();
        assert!(target.is_dir());
        initialize_folder(None).unwrap();
    }
}
