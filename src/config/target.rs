// ABOUTME: Target host configuration for SSH deployment.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    /// Remote base directory for uploaded releases.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

impl TargetConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = if let Some(at_pos) = s.find('@') {
            (Some(&s[..at_pos]), &s[at_pos + 1..])
        } else {
            (None, s)
        };

        let (host, port) = if let Some(colon_pos) = rest.rfind(':') {
            let port_str = &rest[colon_pos + 1..];
            let port = port_str
                .parse::<u16>()
                .map_err(|_| format!("invalid port: {port_str}"))?;
            (&rest[..colon_pos], port)
        } else {
            (rest, default_ssh_port())
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if let Some(user) = user_part
            && user.is_empty()
        {
            return Err("user cannot be empty".to_string());
        }

        Ok(TargetConfig {
            host: host.to_string(),
            port,
            user: user_part.map(|s| s.to_string()),
            directory: None,
        })
    }

    /// The user to authenticate as, falling back to $USER then "root".
    pub fn resolved_user(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| env::var("USER").unwrap_or_else(|_| "root".to_string()))
    }

    /// The remote base directory, defaulting to the user's deploy directory.
    pub fn resolved_directory(&self, user: &str) -> String {
        self.directory
            .clone()
            .unwrap_or_else(|| format!("/home/{user}/deploy"))
    }
}
