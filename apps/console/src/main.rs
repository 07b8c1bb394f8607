use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    forms::{self, normalize_audio_path, parse_days, parse_int_or, parse_time},
    DeviceClient,
};
use shared::{
    domain::{AlarmId, AudioSourceType},
    protocol::{AlarmPayload, ConfigBundle},
};

mod render;
mod settings;

#[derive(Parser, Debug)]
#[command(
    name = "alarm-console",
    about = "Operator console for the wake-up alarm device's REST API"
)]
struct Cli {
    /// Device base URL for this invocation, overriding the saved setting.
    #[arg(long, global = true)]
    device_url: Option<String>,
    /// Admin token for this invocation, overriding the saved setting.
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show device status
    Status,
    /// Re-poll status and logs on an interval
    Watch {
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Manage scheduled alarms
    #[command(subcommand)]
    Alarm(AlarmCmd),
    /// Manage uploaded audio files
    #[command(subcommand)]
    Files(FilesCmd),
    /// Print the device log buffer
    Logs,
    /// Export or import the full device configuration
    #[command(subcommand)]
    Config(ConfigCmd),
    /// Restart the device
    Restart {
        #[arg(long)]
        yes: bool,
    },
    /// Manage the saved admin token
    #[command(subcommand)]
    Token(TokenCmd),
}

#[derive(Subcommand, Debug)]
enum AlarmCmd {
    /// List all alarms
    List,
    /// Show one alarm in full
    Show { id: u32 },
    /// Create an alarm; any field flags are applied right after creation
    Create {
        #[command(flatten)]
        fields: AlarmFieldArgs,
    },
    /// Update fields of an existing alarm
    Edit {
        id: u32,
        #[command(flatten)]
        fields: AlarmFieldArgs,
    },
    Delete {
        id: u32,
        #[arg(long)]
        yes: bool,
    },
    Enable { id: u32 },
    Disable { id: u32 },
    /// Flip the enabled flag
    Toggle { id: u32 },
    /// Ring the alarm now
    Fire { id: u32 },
    /// Snooze the currently ringing alarm
    Snooze { id: u32 },
    /// Dismiss the currently ringing alarm
    Dismiss { id: u32 },
    /// Ask the device to play the alarm's audio once
    TestAudio { id: u32 },
}

/// Editable alarm fields, all optional; unset flags leave the device's
/// current value untouched. Values go through the same lenient coercion the
/// web dialog used.
#[derive(Args, Debug)]
struct AlarmFieldArgs {
    #[arg(long)]
    label: Option<String>,
    /// Wake time as HH:MM
    #[arg(long)]
    time: Option<String>,
    /// Bitmask number, day names ("mon,tue"), "weekdays" or "daily"
    #[arg(long)]
    days: Option<String>,
    /// One-shot date (YYYY-MM-DD) overriding recurrence; "none" clears it
    #[arg(long)]
    once_date: Option<String>,
    #[arg(long)]
    snooze_minutes: Option<String>,
    #[arg(long)]
    gpio_pin: Option<String>,
    #[arg(long)]
    long_press_ms: Option<String>,
    /// 0-100
    #[arg(long)]
    volume: Option<String>,
    #[arg(long)]
    inbound_webhook_token: Option<String>,
    /// "local" or "url"
    #[arg(long)]
    audio_type: Option<String>,
    #[arg(long)]
    local_path: Option<String>,
    #[arg(long)]
    audio_url: Option<String>,
    #[arg(long)]
    fallback_local_path: Option<String>,
    #[arg(long)]
    on_set_url: Option<String>,
    #[arg(long)]
    on_fire_url: Option<String>,
    #[arg(long)]
    on_snooze_url: Option<String>,
    #[arg(long)]
    on_dismiss_url: Option<String>,
}

impl AlarmFieldArgs {
    fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.time.is_none()
            && self.days.is_none()
            && self.once_date.is_none()
            && self.snooze_minutes.is_none()
            && self.gpio_pin.is_none()
            && self.long_press_ms.is_none()
            && self.volume.is_none()
            && self.inbound_webhook_token.is_none()
            && self.audio_type.is_none()
            && self.local_path.is_none()
            && self.audio_url.is_none()
            && self.fallback_local_path.is_none()
            && self.on_set_url.is_none()
            && self.on_fire_url.is_none()
            && self.on_snooze_url.is_none()
            && self.on_dismiss_url.is_none()
    }

    fn apply(&self, payload: &mut AlarmPayload) {
        if let Some(label) = &self.label {
            payload.label = label.trim().to_string();
        }
        if let Some(time) = &self.time {
            let (hour, minute) = parse_time(time);
            payload.hour = hour;
            payload.minute = minute;
        }
        if let Some(days) = &self.days {
            payload.days_bitmask = parse_days(days);
        }
        if let Some(once) = &self.once_date {
            let once = once.trim();
            payload.once_date = if once.is_empty() || once.eq_ignore_ascii_case("none") {
                None
            } else {
                chrono::NaiveDate::parse_from_str(once, "%Y-%m-%d").ok()
            };
        }
        if let Some(v) = &self.snooze_minutes {
            payload.snooze_minutes =
                parse_int_or(v, payload.snooze_minutes as i64).clamp(0, u16::MAX as i64) as u16;
        }
        if let Some(v) = &self.gpio_pin {
            payload.gpio_pin = parse_int_or(v, payload.gpio_pin as i64).clamp(0, 255) as u8;
        }
        if let Some(v) = &self.long_press_ms {
            payload.long_press_ms =
                parse_int_or(v, payload.long_press_ms as i64).clamp(0, u32::MAX as i64) as u32;
        }
        if let Some(v) = &self.volume {
            payload.volume = parse_int_or(v, payload.volume as i64).clamp(0, 255) as u8;
        }
        if let Some(v) = &self.inbound_webhook_token {
            payload.inbound_webhook_token = v.trim().to_string();
        }
        if let Some(v) = &self.audio_type {
            payload.audio_source.kind = if v.trim().eq_ignore_ascii_case("url") {
                AudioSourceType::Url
            } else {
                AudioSourceType::Local
            };
        }
        if let Some(v) = &self.local_path {
            payload.audio_source.local_path = v.trim().to_string();
        }
        if let Some(v) = &self.audio_url {
            payload.audio_source.url = v.trim().to_string();
        }
        if let Some(v) = &self.fallback_local_path {
            payload.audio_source.fallback_local_path = v.trim().to_string();
        }
        if let Some(v) = &self.on_set_url {
            payload.outbound_webhooks.on_set_url = v.trim().to_string();
        }
        if let Some(v) = &self.on_fire_url {
            payload.outbound_webhooks.on_fire_url = v.trim().to_string();
        }
        if let Some(v) = &self.on_snooze_url {
            payload.outbound_webhooks.on_snooze_url = v.trim().to_string();
        }
        if let Some(v) = &self.on_dismiss_url {
            payload.outbound_webhooks.on_dismiss_url = v.trim().to_string();
        }

        // Same pre-save normalization the web dialog applied.
        if payload.audio_source.kind == AudioSourceType::Local {
            payload.audio_source.local_path = normalize_audio_path(&payload.audio_source.local_path);
            payload.audio_source.fallback_local_path =
                normalize_audio_path(&payload.audio_source.fallback_local_path);
        }
    }
}

#[derive(Subcommand, Debug)]
enum FilesCmd {
    /// List uploaded audio files
    List,
    /// Show filesystem usage
    Space,
    /// Upload an audio file (max 2 MB)
    Upload { path: PathBuf },
    /// Delete a file by its device path
    Delete {
        path: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Dump the device configuration as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the device configuration from an exported JSON file
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum TokenCmd {
    /// Save the admin token in the console settings
    Set { token: String },
    /// Forget the saved token
    Clear,
    /// Print the saved token
    Show,
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn run_alarm(client: &mut DeviceClient, cmd: AlarmCmd) -> Result<()> {
    match cmd {
        AlarmCmd::List => {
            let alarms = client.alarms().await?;
            println!("{}", render::alarm_list(alarms));
        }
        AlarmCmd::Show { id } => {
            let alarm = client.alarm(AlarmId(id)).await?;
            println!("{}", render::alarm_detail(&alarm));
        }
        AlarmCmd::Create { fields } => {
            let id = client.create_alarm(&forms::create_seed()).await?;
            println!("created alarm {id}");
            // Mirror the create-then-edit flow: fetch the record the device
            // actually stored, then apply any flags on top of it.
            if !fields.is_empty() {
                let mut payload = match client.alarm(id).await {
                    Ok(alarm) => AlarmPayload::from(&alarm),
                    Err(_) => forms::create_seed(),
                };
                fields.apply(&mut payload);
                client.update_alarm(id, &payload).await?;
                println!("saved alarm {id}");
            }
        }
        AlarmCmd::Edit { id, fields } => {
            if fields.is_empty() {
                bail!("no field flags given; nothing to change");
            }
            let id = AlarmId(id);
            let alarm = client.alarm(id).await?;
            let mut payload = AlarmPayload::from(&alarm);
            fields.apply(&mut payload);
            client.update_alarm(id, &payload).await?;
            println!("saved alarm {id}");
        }
        AlarmCmd::Delete { id, yes } => {
            if !yes && !confirm(&format!("delete alarm {id}?"))? {
                return Ok(());
            }
            client.delete_alarm(AlarmId(id)).await?;
            println!("deleted alarm {id}");
        }
        AlarmCmd::Enable { id } => {
            client.set_enabled(AlarmId(id), true).await?;
            println!("alarm {id} enabled");
        }
        AlarmCmd::Disable { id } => {
            client.set_enabled(AlarmId(id), false).await?;
            println!("alarm {id} disabled");
        }
        AlarmCmd::Toggle { id } => {
            let enabled = client.toggle_alarm(AlarmId(id)).await?;
            println!(
                "alarm {id} {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        AlarmCmd::Fire { id } => {
            client.fire(AlarmId(id)).await?;
            println!("alarm {id} fired");
        }
        AlarmCmd::Snooze { id } => {
            client.snooze(AlarmId(id)).await?;
            println!("alarm {id} snoozed");
        }
        AlarmCmd::Dismiss { id } => {
            client.dismiss(AlarmId(id)).await?;
            println!("alarm {id} dismissed");
        }
        AlarmCmd::TestAudio { id } => {
            let result = client.test_audio(AlarmId(id)).await?;
            if result.ok {
                println!("audio test ok");
            } else {
                println!("audio test failed: {}", result.last_audio_error);
            }
        }
    }
    Ok(())
}

async fn run_files(client: &mut DeviceClient, cmd: FilesCmd) -> Result<()> {
    match cmd {
        FilesCmd::List => {
            let files = client.files().await?;
            println!("{}", render::file_list(files));
        }
        FilesCmd::Space => {
            let space = client.files_space().await?;
            println!("{}", render::fs_line(&space));
        }
        FilesCmd::Upload { path } => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("upload path has no file name")?
                .to_string();
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            client.upload_file(&file_name, bytes).await?;
            println!("uploaded {file_name}");
        }
        FilesCmd::Delete { path, yes } => {
            let device_path = normalize_audio_path(&path);
            if !yes && !confirm(&format!("delete {device_path}?"))? {
                return Ok(());
            }
            client.delete_file(&device_path).await?;
            println!("deleted {device_path}");
        }
    }
    Ok(())
}

async fn run_config(client: &DeviceClient, cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Export { out } => {
            let bundle = client.export_config().await?;
            let text = serde_json::to_string_pretty(&bundle)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &text)
                        .await
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                    println!("exported to {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        ConfigCmd::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let bundle: ConfigBundle =
                serde_json::from_str(&raw).context("config file is not valid export JSON")?;
            client.import_config(&bundle).await?;
            println!(
                "imported {} alarm(s) to {}",
                bundle.alarms.len(),
                bundle.device_id
            );
        }
    }
    Ok(())
}

fn run_token(cmd: TokenCmd) -> Result<()> {
    let mut saved = settings::load_settings();
    match cmd {
        TokenCmd::Set { token } => {
            let token = token.trim().to_string();
            saved.admin_token = (!token.is_empty()).then_some(token);
            settings::save_settings(&saved)?;
            println!("token saved");
        }
        TokenCmd::Clear => {
            saved.admin_token = None;
            settings::save_settings(&saved)?;
            println!("token cleared");
        }
        TokenCmd::Show => match &saved.admin_token {
            Some(token) => println!("{token}"),
            None => println!("no token set"),
        },
    }
    Ok(())
}

async fn run_watch(client: &DeviceClient, interval_secs: u64) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    loop {
        match client.status().await {
            Ok(status) => println!("{}", render::status_block(&status)),
            Err(err) => println!("status unavailable: {err}"),
        }
        match client.logs().await {
            Ok(logs) => {
                for line in logs.iter().rev().take(5).rev() {
                    println!("  log: {line}");
                }
            }
            Err(err) => println!("logs unavailable: {err}"),
        }
        println!();
        tokio::time::sleep(interval).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Token(cmd) = cli.command {
        return run_token(cmd);
    }

    let saved = settings::load_settings();
    let device_url = cli.device_url.unwrap_or(saved.device_url);
    let admin_token = cli.token.or(saved.admin_token);
    let mut client = DeviceClient::new(&device_url, admin_token)?;

    match cli.command {
        Command::Status => {
            let status = client.status().await?;
            println!("{}", render::status_block(&status));
        }
        Command::Watch { interval_secs } => run_watch(&client, interval_secs).await?,
        Command::Alarm(cmd) => run_alarm(&mut client, cmd).await?,
        Command::Files(cmd) => run_files(&mut client, cmd).await?,
        Command::Logs => {
            for line in client.logs().await? {
                println!("{line}");
            }
        }
        Command::Config(cmd) => run_config(&client, cmd).await?,
        Command::Restart { yes } => {
            if yes || confirm("restart the device?")? {
                client.restart().await?;
                println!("restart requested");
            }
        }
        Command::Token(_) => unreachable!("handled before client construction"),
    }

    Ok(())
}
