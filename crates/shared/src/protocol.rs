use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{AlarmId, AudioSourceType, DaysMask};

/// Filesystem usage as reported under `littlefs` in `/api/status` and by
/// `/api/files/space`. `free` is derived by the device; older firmware
/// omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FsUsage {
    pub total: u64,
    pub used: u64,
    #[serde(default)]
    pub free: u64,
}

/// Outcome of the device's most recent outbound webhook attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebhookStatus {
    #[serde(default)]
    pub http_status: i32,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub ts_unix: i64,
}

/// `GET /api/status`. Every field is defaulted so a response from older
/// firmware still parses; the console renders whatever it gets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub fw_version: u32,
    #[serde(default)]
    pub wifi_connected: bool,
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub time_valid: bool,
    #[serde(default)]
    pub ntp_synced: bool,
    #[serde(default)]
    pub ts_iso: String,
    #[serde(default)]
    pub ts_unix: i64,
    #[serde(default)]
    pub active_alarm_id: u32,
    #[serde(default)]
    pub audio_playing: bool,
    #[serde(default)]
    pub last_audio_error: String,
    #[serde(default)]
    pub littlefs: FsUsage,
    #[serde(default)]
    pub last_webhook: WebhookStatus,
}

impl DeviceStatus {
    /// The device reports `active_alarm_id: 0` when nothing is ringing.
    pub fn active_alarm(&self) -> Option<AlarmId> {
        (self.active_alarm_id != 0).then_some(AlarmId(self.active_alarm_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioSource {
    #[serde(rename = "type", default)]
    pub kind: AudioSourceType,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub fallback_local_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutboundWebhooks {
    #[serde(default)]
    pub on_set_url: String,
    #[serde(default)]
    pub on_fire_url: String,
    #[serde(default)]
    pub on_snooze_url: String,
    #[serde(default)]
    pub on_dismiss_url: String,
}

/// Full alarm record as the device reports it. The trailing runtime fields
/// (`next_fire_unix` onward) are read-only device state; the device ignores
/// them on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    #[serde(default)]
    pub days_bitmask: DaysMask,
    #[serde(default, with = "opt_iso_date")]
    pub once_date: Option<NaiveDate>,
    #[serde(default)]
    pub snooze_minutes: u16,
    #[serde(default)]
    pub gpio_pin: u8,
    #[serde(default)]
    pub long_press_ms: u32,
    #[serde(default)]
    pub volume: u8,
    #[serde(default)]
    pub inbound_webhook_token: String,
    #[serde(default)]
    pub audio_source: AudioSource,
    #[serde(default)]
    pub outbound_webhooks: OutboundWebhooks,
    #[serde(default)]
    pub next_fire_unix: i64,
    #[serde(default)]
    pub ringing: bool,
    #[serde(default)]
    pub snoozed: bool,
    #[serde(default)]
    pub snooze_until_unix: i64,
    #[serde(default)]
    pub last_fired_unix: i64,
}

/// Write shape for `POST /api/alarms` and `PUT /api/alarms/{id}`. The
/// browser dialog never sent `enabled` on save, so it stays optional here;
/// create seeds it explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlarmPayload {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    #[serde(default)]
    pub days_bitmask: DaysMask,
    #[serde(default, with = "opt_iso_date")]
    pub once_date: Option<NaiveDate>,
    #[serde(default)]
    pub snooze_minutes: u16,
    #[serde(default)]
    pub gpio_pin: u8,
    #[serde(default)]
    pub long_press_ms: u32,
    #[serde(default)]
    pub volume: u8,
    #[serde(default)]
    pub inbound_webhook_token: String,
    #[serde(default)]
    pub audio_source: AudioSource,
    #[serde(default)]
    pub outbound_webhooks: OutboundWebhooks,
}

impl From<&Alarm> for AlarmPayload {
    fn from(alarm: &Alarm) -> Self {
        AlarmPayload {
            label: alarm.label.clone(),
            enabled: Some(alarm.enabled),
            hour: alarm.hour,
            minute: alarm.minute,
            days_bitmask: alarm.days_bitmask,
            once_date: alarm.once_date,
            snooze_minutes: alarm.snooze_minutes,
            gpio_pin: alarm.gpio_pin,
            long_press_ms: alarm.long_press_ms,
            volume: alarm.volume,
            inbound_webhook_token: alarm.inbound_webhook_token.clone(),
            audio_source: alarm.audio_source.clone(),
            outbound_webhooks: alarm.outbound_webhooks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAlarm {
    pub id: AlarmId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTestResult {
    pub ok: bool,
    #[serde(default)]
    pub last_audio_error: String,
}

/// Device-side system settings carried by config export/import. All
/// optional: import only touches the keys that are present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_pwm_pin: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_pass: Option<String>,
}

/// `GET /api/config/export`; the same object is accepted verbatim by
/// `POST /api/config/import`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigBundle {
    #[serde(default)]
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemConfig>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

/// The firmware stores `once_date` as a raw char buffer and emits `""`
/// when no one-shot date is set; reads are equally lenient, so an
/// unparseable date maps to `None` rather than a deserialize error.
mod opt_iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDate::parse_from_str(s, FORMAT).ok()))
    }
}
