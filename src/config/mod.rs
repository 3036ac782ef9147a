//! On-disk configuration: `frogpmp.cfg`, per-folder `_display.opt`,
//! `frogui_empty_dirs.cache`, and theme `theme.ini`.
//!
//! All of these are flat `key=value` (optionally `[section]`-grouped) text
//! files — no nesting, no arrays-of-tables, no type coercion beyond
//! ints/bools/strings — so they're parsed with a small hand-rolled line
//! reader rather than a generic config crate.

use crate::color::ColorMode;
use crate::video_player::PlayMode;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Parsed `key=value` lines, section-aware (`[section]` headers group
/// subsequent keys under that section name; keys before any header are
/// under the empty-string section).
pub struct KeyValueFile {
    sections: HashMap<String, HashMap<String, String>>,
}

impl KeyValueFile {
    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();
        sections.entry(current.clone()).or_default();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = stripped.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { sections }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn get_default(&self, key: &str) -> Option<&str> {
        self.get("", key)
    }
}

/// Settings persisted in `/mnt/sda1/ROMS/.frogpmp.cfg`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub color_mode: ColorMode,
    pub xvid_black_is_pc: bool,
    pub show_time: bool,
    pub show_debug: bool,
    pub play_mode: PlayMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Unchanged,
            xvid_black_is_pc: false,
            show_time: true,
            show_debug: false,
            play_mode: PlayMode::Repeat,
        }
    }
}

impl Settings {
    /// Parse a `frogpmp.cfg`. Corrupt or missing individual keys fall back to
    /// that key's default rather than failing the whole file (§3.1): a
    /// hand-edited or partially-written config must never block the player
    /// from opening.
    pub fn parse(text: &str) -> Self {
        let kv = KeyValueFile::parse(text);
        let defaults = Settings::default();

        let color_mode = kv
            .get_default("color_mode")
            .and_then(ColorMode::from_name)
            .unwrap_or(defaults.color_mode);

        let xvid_black_is_pc = kv
            .get_default("xvid_black")
            .and_then(|v| v.parse::<u32>().ok())
            .map(|v| v != 0)
            .unwrap_or(defaults.xvid_black_is_pc);

        let show_time = kv
            .get_default("show_time")
            .and_then(parse_bool)
            .unwrap_or(defaults.show_time);

        let show_debug = kv
            .get_default("show_debug")
            .and_then(parse_bool)
            .unwrap_or(defaults.show_debug);

        let play_mode = kv
            .get_default("play_mode")
            .and_then(PlayMode::from_name)
            .unwrap_or(defaults.play_mode);

        Self {
            color_mode,
            xvid_black_is_pc,
            show_time,
            show_debug,
            play_mode,
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "color_mode={}", self.color_mode.name());
        let _ = writeln!(out, "xvid_black={}", self.xvid_black_is_pc as u32);
        let _ = writeln!(out, "show_time={}", self.show_time as u32);
        let _ = writeln!(out, "show_debug={}", self.show_debug as u32);
        let _ = writeln!(out, "play_mode={}", self.play_mode.name());
        out
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// A parsed per-folder `<folder>_display.opt`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub files_and_dirs: bool,
    pub patterns: Vec<String>,
    pub disk1_only: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            files_and_dirs: true,
            patterns: Vec::new(),
            disk1_only: false,
        }
    }
}

impl DisplayOptions {
    pub fn parse(text: &str) -> Self {
        let kv = KeyValueFile::parse(text);
        let defaults = DisplayOptions::default();

        let files_and_dirs = match kv.get_default("mode") {
            Some("files_only") => false,
            Some("files_and_dirs") => true,
            _ => defaults.files_and_dirs,
        };

        let pattern_count: usize = kv
            .get_default("pattern_count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut patterns = Vec::with_capacity(pattern_count);
        for i in 0..pattern_count {
            if let Some(p) = kv.get_default(&format!("pattern{i}")) {
                patterns.push(p.to_string());
            }
        }

        let disk1_only = kv
            .get_default("disk1_only")
            .and_then(parse_bool)
            .unwrap_or(defaults.disk1_only);

        Self {
            files_and_dirs,
            patterns,
            disk1_only,
        }
    }
}

/// `configs/frogui_empty_dirs.cache`: one folder name per line.
pub fn parse_empty_dirs_cache(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_roundtrip_through_serialize_and_parse() {
        let s = Settings {
            color_mode: ColorMode::Warm,
            xvid_black_is_pc: true,
            show_time: false,
            show_debug: true,
            play_mode: PlayMode::Shuffle,
        };
        let text = s.serialize();
        let parsed = Settings::parse(&text);
        assert_eq!(s, parsed);
    }

    #[test]
    fn settings_default_on_missing_file() {
        let parsed = Settings::parse("");
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn settings_corrupt_single_line_falls_back_for_that_key_only() {
        let text = "color_mode=NotARealMode\nshow_time=1\n";
        let parsed = Settings::parse(text);
        assert_eq!(parsed.color_mode, Settings::default().color_mode);
        assert!(parsed.show_time);
    }

    #[test]
    fn display_options_parses_numbered_patterns() {
        let text = "mode=files_only\npattern_count=2\npattern0=*.gba\npattern1=*.zip\n";
        let opts = DisplayOptions::parse(text);
        assert!(!opts.files_and_dirs);
        assert_eq!(opts.patterns, vec!["*.gba", "*.zip"]);
    }

    #[test]
    fn empty_dirs_cache_skips_blank_lines() {
        let text = "snes\n\ngenesis\n";
        assert_eq!(parse_empty_dirs_cache(text), vec!["snes", "genesis"]);
    }

    #[test]
    fn sections_are_isolated() {
        let text = "[layout]\nwidth=10\n[colors]\nwidth=20\n";
        let kv = KeyValueFile::parse(text);
        assert_eq!(kv.get("layout", "width"), Some("10"));
        assert_eq!(kv.get("colors", "width"), Some("20"));
    }
}
