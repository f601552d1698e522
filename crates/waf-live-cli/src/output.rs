//! Output formatting for CLI commands.
//!
//! Events are written one per line; the dashboard view is written as a
//! block of text or a single JSON document.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use waf_live::{DashboardView, ErrorSource, LiveEvent};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a single feed event as one line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_event<W: Write>(&self, writer: &mut W, event: &LiveEvent) -> Result<(), CliError> {
        let record = EventRecord::new(Utc::now(), event);
        if self.is_json() {
            serde_json::to_writer(&mut *writer, &record)
                .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
            writeln!(writer)?;
        } else {
            let local: DateTime<Local> = record.at.into();
            writeln!(
                writer,
                "{} {:<15} {}",
                local.format("%H:%M:%S"),
                record.event,
                summarize(event)
            )?;
        }
        Ok(())
    }

    /// Write a serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        if self.is_json() {
            serde_json::to_writer_pretty(&mut *writer, value)
                .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
            writeln!(writer)?;
        } else {
            value.write_table(writer)?;
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// JSON line for one feed event.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    /// When the event was printed.
    pub at: DateTime<Utc>,
    /// Event name as used for subscriptions.
    pub event: &'static str,
    /// Payload, if the event carries one.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl EventRecord {
    /// Build the record for `event`.
    #[must_use]
    pub fn new(at: DateTime<Utc>, event: &LiveEvent) -> Self {
        use serde_json::{Value, json};

        let data = match event {
            LiveEvent::Connected => Value::Null,
            LiveEvent::Disconnected { reason } => json!({ "reason": reason }),
            LiveEvent::Reconnecting { attempt, delay } => json!({
                "attempt": attempt,
                "delayMs": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            }),
            LiveEvent::Failed { attempts, last_error } => json!({
                "attempts": attempts,
                "lastError": last_error,
            }),
            LiveEvent::Error { source, message } => json!({
                "source": source_name(*source),
                "message": message,
            }),
            LiveEvent::AttackBlocked(attack) => json!(attack.as_ref()),
            LiveEvent::TrafficUpdate(sample) => json!(sample.as_ref()),
            LiveEvent::StatsUpdate(stats) => json!(stats.as_ref()),
            LiveEvent::StatusChange(patch) => json!(patch.as_ref()),
        };

        Self {
            at,
            event: event.kind().name(),
            data,
        }
    }
}

const fn source_name(source: ErrorSource) -> &'static str {
    match source {
        ErrorSource::Handshake => "handshake",
        ErrorSource::Transport => "transport",
        ErrorSource::Server => "server",
    }
}

/// One-line human summary of an event.
#[must_use]
pub fn summarize(event: &LiveEvent) -> String {
    match event {
        LiveEvent::Connected => "feed is live".to_string(),
        LiveEvent::Disconnected { reason } => format!("link lost: {reason}"),
        LiveEvent::Reconnecting { attempt, delay } => {
            format!("attempt {attempt} in {}ms", delay.as_millis())
        }
        LiveEvent::Failed { attempts, last_error } => {
            format!("gave up after {attempts} attempts: {last_error}")
        }
        LiveEvent::Error { source, message } => format!("{}: {message}", source_name(*source)),
        LiveEvent::AttackBlocked(attack) => format!(
            "{:<8} {} from {} -> {} ({})",
            attack.severity.to_string(),
            attack.attack_type,
            attack.source_ip,
            attack.target_path,
            if attack.blocked { "blocked" } else { "allowed" }
        ),
        LiveEvent::TrafficUpdate(sample) => format!(
            "{} total={} blocked={} allowed={} rt={:.1}ms",
            sample.timestamp,
            sample.total_requests,
            sample.blocked_requests,
            sample.allowed_requests,
            sample.response_time
        ),
        LiveEvent::StatsUpdate(stats) => format!(
            "total={} blocked={} rate={:.2}% avg={:.1}ms",
            stats.total_requests, stats.blocked_requests, stats.block_rate, stats.avg_response_time
        ),
        LiveEvent::StatusChange(patch) => {
            let mut fields = Vec::new();
            if let Some(status) = patch.status {
                fields.push(format!("status={status}"));
            }
            if let Some(version) = &patch.version {
                fields.push(format!("version={version}"));
            }
            if let Some(at) = &patch.last_restart {
                fields.push(format!("lastRestart={at}"));
            }
            if let Some(at) = &patch.config_last_updated {
                fields.push(format!("configLastUpdated={at}"));
            }
            if let Some(n) = patch.rules_count {
                fields.push(format!("rules={n}"));
            }
            if let Some(n) = patch.active_rules_count {
                fields.push(format!("activeRules={n}"));
            }
            if fields.is_empty() {
                "no changes".to_string()
            } else {
                fields.join(" ")
            }
        }
    }
}

impl TableDisplay for DashboardView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "WAF Dashboard ({})", self.link)?;
        writeln!(writer, "══════════════════════════════════")?;

        match self.status.current() {
            Some(status) => {
                writeln!(writer, "Status:           {}", status.status)?;
                writeln!(writer, "Version:          {}", status.version)?;
                writeln!(
                    writer,
                    "Rules:            {}/{} active",
                    status.active_rules_count, status.rules_count
                )?;
                writeln!(writer, "Last Restart:     {}", status.last_restart)?;
            }
            None => writeln!(writer, "Status:           unknown")?,
        }
        writeln!(writer)?;

        writeln!(writer, "Stats")?;
        match self.stats.current() {
            Some(stats) => {
                writeln!(writer, "  Requests:       {}", stats.total_requests)?;
                writeln!(writer, "  Blocked:        {}", stats.blocked_requests)?;
                writeln!(writer, "  Allowed:        {}", stats.allowed_requests)?;
                writeln!(writer, "  Block Rate:     {:.2}%", stats.block_rate)?;
                writeln!(writer, "  Avg Response:   {:.1} ms", stats.avg_response_time)?;
            }
            None => writeln!(writer, "  (none)")?,
        }
        writeln!(writer)?;

        writeln!(
            writer,
            "Traffic ({} of {} samples)",
            self.traffic.len(),
            self.traffic.capacity()
        )?;
        if let Some(sample) = self.traffic.latest() {
            writeln!(
                writer,
                "  Latest:         {} total={} blocked={}",
                sample.timestamp, sample.total_requests, sample.blocked_requests
            )?;
        }
        writeln!(writer)?;

        writeln!(
            writer,
            "Recent Attacks ({} of {})",
            self.attacks.len(),
            self.attacks.capacity()
        )?;
        if self.attacks.is_empty() {
            writeln!(writer, "  (none)")?;
        } else {
            writeln!(
                writer,
                "  {:<24} {:<10} {:<16} {:<18} PATH",
                "TIME", "SEVERITY", "TYPE", "SOURCE"
            )?;
            for attack in self.attacks.iter() {
                writeln!(
                    writer,
                    "  {:<24} {:<10} {:<16} {:<18} {}",
                    attack.timestamp,
                    attack.severity.to_string(),
                    attack.attack_type,
                    attack.source_ip,
                    attack.target_path
                )?;
            }
        }
        Ok(())
    }
}
