//! Pure text renderers for the console views. Everything here takes the
//! records the API returned and formats them; nothing filters or reorders,
//! so a rendered list is exactly the device's list.

use chrono::{Local, NaiveDate, TimeZone};
use shared::{
    domain::{DaysMask, DAY_NAMES},
    protocol::{Alarm, DeviceStatus, FileEntry, FsUsage},
};

pub fn fmt_time(hour: u8, minute: u8) -> String {
    format!("{hour:02}:{minute:02}")
}

/// A set one-shot date overrides the recurrence mask, as it does on the
/// device.
pub fn fmt_days(mask: DaysMask, once_date: Option<NaiveDate>) -> String {
    if let Some(date) = once_date {
        return format!("once {date}");
    }
    if mask.is_empty() {
        return "no days".into();
    }
    if mask == DaysMask::EVERY_DAY {
        return "every day".into();
    }
    mask.iter()
        .map(|day| DAY_NAMES[day])
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn fmt_next(next_unix: i64) -> String {
    if next_unix <= 0 {
        return "-".into();
    }
    Local
        .timestamp_opt(next_unix, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn fmt_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

pub fn fs_line(fs: &FsUsage) -> String {
    format!("LittleFS {}/{} MB", fmt_mb(fs.used), fmt_mb(fs.total))
}

pub fn status_block(status: &DeviceStatus) -> String {
    let mut lines = vec![
        format!(
            "{} {}",
            if status.wifi_connected { "Online" } else { "AP mode" },
            status.device_id
        ),
        format!("  ip:    {}", if status.ip.is_empty() { "-" } else { &status.ip }),
        format!("  time:  {}", if status.ts_iso.is_empty() { "-" } else { &status.ts_iso }),
        format!(
            "  ntp:   {}",
            if status.ntp_synced {
                "synced"
            } else if status.time_valid {
                "time ok"
            } else {
                "time invalid"
            }
        ),
        format!("  fs:    {}", fs_line(&status.littlefs)),
    ];
    if let Some(id) = status.active_alarm() {
        lines.push(format!("  RINGING: alarm {id}"));
    }
    if !status.last_audio_error.is_empty() {
        lines.push(format!("  audio error: {}", status.last_audio_error));
    }
    lines.join("\n")
}

pub fn alarm_row(alarm: &Alarm) -> String {
    format!(
        "[{:>3}] {} {:<24} {:<24} next: {}{}",
        alarm.id,
        fmt_time(alarm.hour, alarm.minute),
        if alarm.label.is_empty() { "Alarm" } else { &alarm.label },
        fmt_days(alarm.days_bitmask, alarm.once_date),
        fmt_next(alarm.next_fire_unix),
        if alarm.enabled { "" } else { " (off)" },
    )
}

pub fn alarm_list(alarms: &[Alarm]) -> String {
    if alarms.is_empty() {
        return "no alarms".into();
    }
    alarms.iter().map(alarm_row).collect::<Vec<_>>().join("\n")
}

pub fn alarm_detail(alarm: &Alarm) -> String {
    let audio = &alarm.audio_source;
    let hooks = &alarm.outbound_webhooks;
    let mut lines = vec![
        format!("alarm {}", alarm.id),
        format!("  label:        {}", alarm.label),
        format!("  enabled:      {}", alarm.enabled),
        format!("  time:         {}", fmt_time(alarm.hour, alarm.minute)),
        format!(
            "  days:         {}",
            fmt_days(alarm.days_bitmask, alarm.once_date)
        ),
        format!("  snooze:       {} min", alarm.snooze_minutes),
        format!("  gpio pin:     {}", alarm.gpio_pin),
        format!("  long press:   {} ms", alarm.long_press_ms),
        format!("  volume:       {}", alarm.volume),
        format!("  audio:        {:?}", audio.kind),
        format!("    local:      {}", audio.local_path),
        format!("    url:        {}", audio.url),
        format!("    fallback:   {}", audio.fallback_local_path),
        format!("  next fire:    {}", fmt_next(alarm.next_fire_unix)),
    ];
    if !alarm.inbound_webhook_token.is_empty() {
        lines.push(format!("  inbound token: {}", alarm.inbound_webhook_token));
    }
    for (name, url) in [
        ("on_set", &hooks.on_set_url),
        ("on_fire", &hooks.on_fire_url),
        ("on_snooze", &hooks.on_snooze_url),
        ("on_dismiss", &hooks.on_dismiss_url),
    ] {
        if !url.is_empty() {
            lines.push(format!("  webhook {name}: {url}"));
        }
    }
    if alarm.ringing {
        lines.push("  RINGING".into());
    }
    if alarm.snoozed {
        lines.push(format!(
            "  snoozed until {}",
            fmt_next(alarm.snooze_until_unix)
        ));
    }
    lines.join("\n")
}

pub fn file_row(file: &FileEntry) -> String {
    format!("{:<28} {:>9} bytes  {}", file.name, file.size, file.path)
}

pub fn file_list(files: &[FileEntry]) -> String {
    if files.is_empty() {
        return "no files".into();
    }
    files.iter().map(file_row).collect::<Vec<_>>().join("\n")
}
