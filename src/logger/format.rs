//! Access log lines
//!
//! Formats are `%` directive strings in the Common Log Format tradition.
//! `common` and `combined` name the two usual layouts, `json` writes one
//! object per request, and anything else is taken as a directive string:
//!
//! | Directive | Value |
//! |---|---|
//! | `%h` | remote host (name when `HostnameLookups` resolved one) |
//! | `%a` | remote IP address |
//! | `%l`, `%u` | always `-` |
//! | `%t`, `%{fmt}t` | request time, bracketed CLF date or `strftime` format |
//! | `%r` | request line as received, even after internal redirects |
//! | `%m` | method of the request line |
//! | `%U` | URI finally served |
//! | `%s`, `%>s` | final status |
//! | `%b`, `%B` | body bytes, `-` or `0` when empty |
//! | `%v` | server name |
//! | `%T`, `%D` | service time in seconds, microseconds |
//! | `%{Name}i` | request header |
//! | `%%` | literal `%` |

use chrono::{DateTime, Local};
use hyper::header::HeaderMap;
use std::fmt::Write;

const COMMON: &str = "%h %l %u %t \"%r\" %>s %b";
const COMBINED: &str = "%h %l %u %t \"%r\" %>s %b \"%{Referer}i\" \"%{User-Agent}i\"";
const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_host: String,
    pub remote_ip: String,
    pub server_name: String,
    pub time: DateTime<Local>,
    pub request_line: String,
    /// URI of the last internal redirect, or the request's own
    pub served_uri: String,
    pub status: u16,
    pub body_bytes: u64,
    pub headers: HeaderMap,
    pub request_time_us: u64,
}

impl AccessLogEntry {
    pub fn new(remote_ip: String, request_line: String) -> Self {
        Self {
            remote_host: remote_ip.clone(),
            remote_ip,
            server_name: String::new(),
            time: Local::now(),
            request_line,
            served_uri: String::new(),
            status: 200,
            body_bytes: 0,
            headers: HeaderMap::new(),
            request_time_us: 0,
        }
    }

    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.expand(COMMON),
            "combined" => self.expand(COMBINED),
            "json" => self.to_json(),
            pattern => self.expand(pattern),
        }
    }

    fn method(&self) -> &str {
        self.request_line.split(' ').next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
    }

    fn to_json(&self) -> String {
        serde_json::json!({
            "remote_host": self.remote_host,
            "remote_ip": self.remote_ip,
            "server_name": self.server_name,
            "time": self.time.to_rfc3339(),
            "request": self.request_line,
            "served_uri": self.served_uri,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.headers.get("referer").and_then(|v| v.to_str().ok()),
            "user_agent": self.headers.get("user-agent").and_then(|v| v.to_str().ok()),
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    fn expand(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + self.request_line.len());
        let mut rest = pattern;
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];
            let directive = rest.trim_start_matches(['<', '>']);
            let (arg, directive) = match directive.strip_prefix('{') {
                Some(braced) => match braced.split_once('}') {
                    Some((arg, after)) => (Some(arg), after),
                    None => (None, directive),
                },
                None => (None, directive),
            };
            let Some(letter) = directive.chars().next() else {
                out.push('%');
                rest = directive;
                break;
            };
            if !self.push_directive(&mut out, letter, arg) {
                // Unknown directives are written back as they appeared
                out.push('%');
                out.push_str(&rest[..rest.len() - directive.len()]);
                out.push(letter);
            }
            rest = &directive[letter.len_utf8()..];
        }
        out.push_str(rest);
        out
    }

    fn push_directive(&self, out: &mut String, letter: char, arg: Option<&str>) -> bool {
        match letter {
            'h' => out.push_str(&self.remote_host),
            'a' => out.push_str(&self.remote_ip),
            'l' | 'u' => out.push('-'),
            't' => match arg {
                // An invalid strftime item is dropped from the line
                Some(fmt) => {
                    let _ = write!(out, "{}", self.time.format(fmt));
                }
                None => out.push_str(&format!("[{}]", self.time.format(CLF_TIME))),
            },
            'r' => out.push_str(&self.request_line),
            'm' => out.push_str(self.method()),
            'U' => out.push_str(&self.served_uri),
            's' => out.push_str(&self.status.to_string()),
            'b' if self.body_bytes == 0 => out.push('-'),
            'b' | 'B' => out.push_str(&self.body_bytes.to_string()),
            'v' => out.push_str(&self.server_name),
            'T' => out.push_str(&(self.request_time_us / 1_000_000).to_string()),
            'D' => out.push_str(&self.request_time_us.to_string()),
            'i' => match arg {
                Some(name) => out.push_str(self.header(name)),
                None => return false,
            },
            '%' => out.push('%'),
            _ => return false,
        }
        true
    }
}
