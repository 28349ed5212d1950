//! The `get_current_time` tool.
//!
//! All wall-clock renderings are anchored to Korea Standard Time (UTC+9);
//! the `timestamp` format is timezone-independent epoch milliseconds.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{FieldSpec, InputShape};
use crate::tools::{
    RegistryError, ToolContext, ToolFuture, ToolMetadata, ToolOutput, ToolRegistry,
};

/// Registered tool name.
pub const TOOL_NAME: &str = "get_current_time";

/// Seconds east of UTC for the reference timezone (KST).
const KST_OFFSET_SECONDS: i32 = 9 * 3600;

/// Output format selector for [`format_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Human-readable rendering including the weekday name.
    #[default]
    Locale,
    /// `YYYY-MM-DDTHH:MM:SS.000Z` with KST wall-clock fields.
    Iso,
    /// Milliseconds since the Unix epoch, as a decimal string.
    Timestamp,
}

impl TimeFormat {
    /// Accepted `format` argument values, in schema order.
    pub const ALLOWED: &'static [&'static str] = &["locale", "iso", "timestamp"];
}

fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECONDS).expect("KST offset is within range")
}

/// Render `now` in the requested format.
pub fn format_time(now: DateTime<Utc>, format: TimeFormat) -> String {
    match format {
        TimeFormat::Timestamp => now.timestamp_millis().to_string(),
        TimeFormat::Iso => now
            .with_timezone(&reference_offset())
            .format("%Y-%m-%dT%H:%M:%S.000Z")
            .to_string(),
        TimeFormat::Locale => now
            .with_timezone(&reference_offset())
            .format("%Y. %m. %d. %A %r")
            .to_string(),
    }
}

fn run(context: ToolContext, arguments: Value) -> ToolFuture {
    Box::pin(async move {
        #[derive(Deserialize)]
        struct Args {
            format: Option<TimeFormat>,
        }

        let args: Args =
            serde_json::from_value(arguments).context("invalid get_current_time arguments")?;
        let rendered = format_time(context.now, args.format.unwrap_or_default());
        Ok(ToolOutput::text(rendered))
    })
}

/// Register the tool into `registry`.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        TOOL_NAME,
        ToolMetadata::new(
            "Current Time",
            "Returns the current time in Korea Standard Time (UTC+9)",
        ),
        InputShape::new().with_field(
            FieldSpec::string("format", "Time format (default: locale)")
                .one_of(TimeFormat::ALLOWED),
        ),
        Arc::new(run),
    )
}
