//! Form-to-payload marshalling. The coercion rules intentionally mirror the
//! device's original web dialog: numeric fields are parsed leniently with
//! per-field defaults, times are split on `:`, and local audio paths are
//! normalized onto the `/audio/` prefix before a save.

use chrono::NaiveDate;
use shared::{
    domain::{AudioSourceType, DaysMask, DAY_NAMES},
    protocol::{AlarmPayload, AudioSource, FileEntry, OutboundWebhooks},
};

pub const DEFAULT_AUDIO_PATH: &str = "/audio/default.wav";
pub const DEFAULT_TIME: &str = "07:30";

/// Lenient integer coercion: leading sign and digits are honored, anything
/// else is cut off, and blank or unparseable input falls back to `default`.
pub fn parse_int_or(input: &str, default: i64) -> i64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return default;
    }
    let mut end = 0;
    for (idx, ch) in trimmed.char_indices() {
        if ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+')) {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().unwrap_or(default)
}

fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, u8::MAX as i64) as u8
}

/// `"07:30"` → `(7, 30)`. Missing or garbage components coerce to zero;
/// range checking is the device's job.
pub fn parse_time(input: &str) -> (u8, u8) {
    let mut parts = input.trim().splitn(2, ':');
    let hour = clamp_u8(parse_int_or(parts.next().unwrap_or(""), 0));
    let minute = clamp_u8(parse_int_or(parts.next().unwrap_or(""), 0));
    (hour, minute)
}

/// Accepts either a raw bitmask number (`31`) or comma-separated day names
/// (`mon,tue,fri`), plus the `weekdays` / `daily` shorthands. Unknown names
/// are ignored rather than rejected.
pub fn parse_days(input: &str) -> DaysMask {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return DaysMask::default();
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return DaysMask::from_bits(parse_int_or(trimmed, 0) as u8);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "weekdays" => return DaysMask::WEEKDAYS,
        "daily" | "all" => return DaysMask::EVERY_DAY,
        _ => {}
    }
    let mut mask = DaysMask::default();
    for name in trimmed.split(',') {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        for (day, label) in DAY_NAMES.iter().enumerate() {
            if name.starts_with(&label.to_ascii_lowercase()) {
                mask = mask.with(day);
                break;
            }
        }
    }
    mask
}

/// Puts a local audio path under `/audio/`; already-prefixed paths pass
/// through untouched, so the operation is idempotent. Empty input stays
/// empty (the device treats that as "unset").
pub fn normalize_audio_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.starts_with("/audio/") {
        return trimmed.to_string();
    }
    format!("/audio/{}", trimmed.trim_start_matches('/'))
}

/// Selectable local-audio paths: the built-in default first, then every
/// cached file path normalized, duplicates dropped in order.
pub fn audio_path_options(files: &[FileEntry]) -> Vec<String> {
    let mut options = vec![DEFAULT_AUDIO_PATH.to_string()];
    for file in files {
        let raw = if file.path.is_empty() { &file.name } else { &file.path };
        if raw.is_empty() {
            continue;
        }
        let normalized = normalize_audio_path(raw);
        if !options.contains(&normalized) {
            options.push(normalized);
        }
    }
    options
}

/// Seed payload for `POST /api/alarms`, identical to what the web dialog
/// sent before opening the editor: disabled, 07:30, no recurrence.
pub fn create_seed() -> AlarmPayload {
    AlarmPayload {
        label: "New alarm".to_string(),
        enabled: Some(false),
        hour: 7,
        minute: 30,
        volume: 80,
        snooze_minutes: 5,
        audio_source: AudioSource {
            kind: AudioSourceType::Local,
            local_path: DEFAULT_AUDIO_PATH.to_string(),
            fallback_local_path: DEFAULT_AUDIO_PATH.to_string(),
            url: String::new(),
        },
        ..AlarmPayload::default()
    }
}

/// An alarm editor submission, everything still as the operator typed it.
/// Blank fields take the editor's prefill defaults.
#[derive(Debug, Clone, Default)]
pub struct AlarmForm {
    pub label: String,
    pub time: String,
    pub once_date: String,
    pub days: String,
    pub snooze_minutes: String,
    pub gpio_pin: String,
    pub long_press_ms: String,
    pub volume: String,
    pub inbound_webhook_token: String,
    pub audio_type: String,
    pub local_path: String,
    pub url: String,
    pub fallback_local_path: String,
    pub on_set_url: String,
    pub on_fire_url: String,
    pub on_snooze_url: String,
    pub on_dismiss_url: String,
}

impl AlarmForm {
    pub fn to_payload(&self) -> AlarmPayload {
        let time = if self.time.trim().is_empty() {
            DEFAULT_TIME
        } else {
            self.time.as_str()
        };
        let (hour, minute) = parse_time(time);

        let kind = if self.audio_type.trim().eq_ignore_ascii_case("url") {
            AudioSourceType::Url
        } else {
            AudioSourceType::Local
        };
        let mut audio_source = AudioSource {
            kind,
            local_path: self.local_path.trim().to_string(),
            url: self.url.trim().to_string(),
            fallback_local_path: self.fallback_local_path.trim().to_string(),
        };
        if kind == AudioSourceType::Local {
            audio_source.local_path = normalize_audio_path(&audio_source.local_path);
            audio_source.fallback_local_path =
                normalize_audio_path(&audio_source.fallback_local_path);
        }

        AlarmPayload {
            label: self.label.trim().to_string(),
            enabled: None,
            hour,
            minute,
            days_bitmask: parse_days(&self.days),
            once_date: NaiveDate::parse_from_str(self.once_date.trim(), "%Y-%m-%d").ok(),
            snooze_minutes: parse_int_or(&self.snooze_minutes, 5).clamp(0, u16::MAX as i64) as u16,
            gpio_pin: clamp_u8(parse_int_or(&self.gpio_pin, 0)),
            long_press_ms: parse_int_or(&self.long_press_ms, 0).clamp(0, u32::MAX as i64) as u32,
            volume: clamp_u8(parse_int_or(&self.volume, 80)),
            inbound_webhook_token: self.inbound_webhook_token.trim().to_string(),
            audio_source,
            outbound_webhooks: OutboundWebhooks {
                on_set_url: self.on_set_url.trim().to_string(),
                on_fire_url: self.on_fire_url.trim().to_string(),
                on_snooze_url: self.on_snooze_url.trim().to_string(),
                on_dismiss_url: self.on_dismiss_url.trim().to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
