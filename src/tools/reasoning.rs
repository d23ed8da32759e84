// Reasoning tools: helpers that need no stored data

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Capability, ToolHandler, optional_str};
use crate::mcp::protocol::Tool;
use crate::{RagError, Result};

const DEFAULT_TIMEZONE: &str = "UTC";

/// Reports the current wall-clock time in an IANA timezone
pub struct CurrentTimeTool {
    clock: fn() -> DateTime<Utc>,
}

impl CurrentTimeTool {
    #[inline]
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Use a fixed clock instead of the system time
    #[inline]
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }

    /// Format `now` as seen in `timezone`
    #[inline]
    pub fn describe(now: DateTime<Utc>, timezone: &str) -> Result<String> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| RagError::Tool(format!("Unknown timezone: {}", timezone)))?;
        let local = now.with_timezone(&tz);
        Ok(format!(
            "Current time in {}: {}",
            timezone,
            local.format("%Y-%m-%d %H:%M:%S %Z")
        ))
    }
}

impl Default for CurrentTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for CurrentTimeTool {
    #[inline]
    fn capability(&self) -> Capability {
        Capability::Reasoning
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "get_current_time".to_string(),
            description: Some("Get the current date and time in a timezone".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "IANA timezone name, e.g. 'Europe/Paris' (default: UTC)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String> {
        let timezone = optional_str(arguments, "timezone")?.unwrap_or(DEFAULT_TIMEZONE);
        debug!("Getting current time in {}", timezone);
        Self::describe((self.clock)(), timezone)
    }
}
