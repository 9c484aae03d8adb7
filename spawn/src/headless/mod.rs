//! The headless bridge: same orchestrator, different shell.
//! Informational output goes to `tracing`'s stderr layer; exactly one
//! structured line is written to stdout.
use crate::error::{ErrorCode, SpawnError};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Plain,
}

impl OutputFormat {
    pub fn from_flag(output: Option<&str>) -> Self {
        match output {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Plain,
        }
    }
}

/// Connection details re-read from the path the cloud driver wrote during
/// `create_server`, re-validated field-by-field before being surfaced.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub ip_address: Option<String>,
    pub ssh_user: Option<String>,
    pub server_id: Option<String>,
    pub server_name: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    status: &'static str,
    cloud: &'a str,
    agent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

/// Writes the one-line envelope to `out` and returns the process exit
/// code: `0` success, `1` execution error, `2` download error, `3`
/// validation/credentials error.
pub fn emit(
    out: &mut impl Write,
    format: OutputFormat,
    cloud: &str,
    agent: &str,
    result: Result<&ConnectionInfo, &SpawnError>,
) -> i32 {
    let error_message = result.err().map(|err| err.to_string());
    let (envelope, exit_code) = match result {
        Ok(info) => (
            Envelope {
                status: "success",
                cloud,
                agent,
                ip_address: info.ip_address.as_deref(),
                ssh_user: info.ssh_user.as_deref(),
                server_id: info.server_id.as_deref(),
                server_name: info.server_name.as_deref(),
                error_code: None,
                error_message: None,
            },
            0,
        ),
        Err(err) => (
            Envelope {
                status: "error",
                cloud,
                agent,
                ip_address: None,
                ssh_user: None,
                server_id: None,
                server_name: None,
                error_code: Some(err.error_code()),
                error_message: error_message.as_deref(),
            },
            err.exit_code(),
        ),
    };
    write_envelope(out, format, &envelope);
    exit_code
}

fn write_envelope(out: &mut impl Write, format: OutputFormat, envelope: &Envelope) {
    match format {
        OutputFormat::Json => {
            let _ = writeln!(out, "{}", serde_json::to_string(envelope).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let _ = writeln!(out, "status: {}", envelope.status);
            let _ = writeln!(out, "cloud: {}", envelope.cloud);
            let _ = writeln!(out, "agent: {}", envelope.agent);
            for (label, value) in [
                ("ip_address", envelope.ip_address),
                ("ssh_user", envelope.ssh_user),
                ("server_id", envelope.server_id),
                ("server_name", envelope.server_name),
                ("error_message", envelope.error_message),
            ] {
                if let Some(value) = value {
                    let _ = writeln!(out, "{label}: {value}");
                }
            }
            if let Some(code) = envelope.error_code {
                let _ = writeln!(out, "error_code: {}", serde_json::to_value(code).unwrap_or_default().as_str().unwrap_or_default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error_fields_in_json() {
        let mut buf = Vec::new();
        let info = ConnectionInfo {
            ip_address: Some("203.0.113.10".to_string()),
            ssh_user: Some("root".to_string()),
            server_id: Some("1".to_string()),
            server_name: Some("spawn-abc".to_string()),
        };
        let code = emit(&mut buf, OutputFormat::Json, "hetzner", "claude", Ok(&info));
        assert_eq!(code, 0);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"status\":\"success\""));
        assert!(!text.contains("error_code"));
    }

    #[test]
    fn plain_format_emits_key_value_lines() {
        let mut buf = Vec::new();
        let info = ConnectionInfo { server_id: Some("1".to_string()), ..Default::default() };
        emit(&mut buf, OutputFormat::Plain, "hetzner", "claude", Ok(&info));
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("server_id: 1"));
    }
}
