use std::time::Duration;

use serde::Deserialize;
use wscollab_core::error::{Result, WsCollabError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub transport: TransportSection,

    /// Only read by the `wscollab` binary.
    #[serde(default)]
    pub session: Option<SessionSection>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            reconnect: ReconnectSection::default(),
            transport: TransportSection::default(),
            session: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WsCollabError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.reconnect.validate()?;
        self.transport.validate()?;
        if let Some(session) = &self.session {
            session.validate()?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > 20 {
            return Err(WsCollabError::Config(
                "reconnect.max_retries must be between 0 and 20".into(),
            ));
        }
        if !(1..=60000).contains(&self.base_delay_ms) {
            return Err(WsCollabError::Config(
                "reconnect.base_delay_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=120000).contains(&self.connect_timeout_ms) {
            return Err(WsCollabError::Config(
                "transport.connect_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    pub url: String,
    pub channel_id: String,
    pub user: String,

    /// Environment variable holding the password (never stored in the file).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.is_empty() {
            return Err(WsCollabError::Config("session.channel_id must not be empty".into()));
        }
        if self.user.is_empty() {
            return Err(WsCollabError::Config("session.user must not be empty".into()));
        }
        Ok(())
    }
}

fn default_password_env() -> String {
    "WSCOLLAB_PASSWORD".into()
}
