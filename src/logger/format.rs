//! Access log line rendering
//!
//! Formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)
//! - anything else is a pattern with `$variable` placeholders

use chrono::{DateTime, Local};
use serde_json::json;
use std::borrow::Cow;
use std::time::Duration;

use crate::handler::TransferReport;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One access log line worth of data, taken from a finished transfer
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Client IP, `-` when unknown
    pub client: String,
    pub time: DateTime<Local>,
    pub method: String,
    /// Request target as received, query included
    pub target: String,
    /// `1.0`, `1.1`, `2`
    pub version: &'static str,
    pub status: u16,
    pub body_bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
    pub outcome: &'static str,
}

impl AccessLogEntry {
    pub fn from_report(report: &TransferReport) -> Self {
        let target = match &report.query {
            Some(query) => format!("{}?{query}", report.path),
            None => report.path.clone(),
        };
        Self {
            client: report
                .remote_addr
                .map_or_else(|| "-".to_string(), |addr| addr.ip().to_string()),
            time: Local::now(),
            method: report.method.to_string(),
            target,
            version: http_version(report.version),
            status: report.status.as_u16(),
            body_bytes: report.body_bytes,
            referer: report.referer.clone(),
            user_agent: report.user_agent.clone(),
            elapsed: report.elapsed,
            outcome: report.outcome.label(),
        }
    }

    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => format!(
                "{} \"{}\" \"{}\"",
                self.common_line(),
                dash(self.referer.as_deref()),
                dash(self.user_agent.as_deref()),
            ),
            "common" => self.common_line(),
            "json" => self.json_line(),
            pattern => self.render_pattern(pattern),
        }
    }

    /// `METHOD target HTTP/version`
    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.target, self.version)
    }

    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.client,
            self.time.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn json_line(&self) -> String {
        json!({
            "client": self.client,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "target": self.target,
            "http_version": self.version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
            "outcome": self.outcome,
        })
        .to_string()
    }

    /// Replace each `$name` with its value; unknown names are kept as written
    fn render_pattern(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 64);
        let mut rest = pattern;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            match self.variable(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('$');
                    out.push_str(name);
                }
            }
            rest = &after[name_len..];
        }
        out.push_str(rest);
        out
    }

    fn variable(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "remote_addr" => Cow::Borrowed(self.client.as_str()),
            "time_local" => Cow::Owned(self.time.format(CLF_TIME).to_string()),
            "time_iso8601" => Cow::Owned(self.time.to_rfc3339()),
            "request" => Cow::Owned(self.request_line()),
            "request_method" => Cow::Borrowed(self.method.as_str()),
            "request_uri" => Cow::Borrowed(self.target.as_str()),
            "status" => Cow::Owned(self.status.to_string()),
            "body_bytes_sent" => Cow::Owned(self.body_bytes.to_string()),
            "http_referer" => Cow::Borrowed(dash(self.referer.as_deref())),
            "http_user_agent" => Cow::Borrowed(dash(self.user_agent.as_deref())),
            "request_time" => Cow::Owned(format!("{:.3}", self.elapsed.as_secs_f64())),
            "outcome" => Cow::Borrowed(self.outcome),
            _ => return None,
        };
        Some(value)
    }
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

const fn http_version(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
