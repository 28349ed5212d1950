//! The `get_random_number` tool.
//!
//! Bounds are clamped into [1,100] independently and only then swapped when
//! inverted. The order matters and is observable: (200, 5) clamps to
//! (100, 5) and swaps to (5, 100), not to (5, 100) clamped from (5, 200).

use std::sync::Arc;

use anyhow::Context;
use rand::RngExt;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{FieldSpec, InputShape};
use crate::tools::{
    RegistryError, ToolContext, ToolFuture, ToolMetadata, ToolOutput, ToolRegistry,
};

/// Registered tool name.
pub const TOOL_NAME: &str = "get_random_number";

/// Smallest bound a request may land on after clamping.
pub const BOUND_FLOOR: i64 = 1;
/// Largest bound a request may land on after clamping.
pub const BOUND_CEIL: i64 = 100;
/// Lower bound used when the request omits `min`.
pub const DEFAULT_MIN: i64 = 1;
/// Upper bound used when the request omits `max`.
pub const DEFAULT_MAX: i64 = 50;

/// Clamp both bounds into [1,100] independently, then swap when inverted.
pub fn clamp_bounds(min: i64, max: i64) -> (i64, i64) {
    let min = min.clamp(BOUND_FLOOR, BOUND_CEIL);
    let max = max.clamp(BOUND_FLOOR, BOUND_CEIL);
    if min > max {
        (max, min)
    } else {
        (min, max)
    }
}

/// Uniform inclusive draw over the clamped, ordered bounds.
pub fn draw(min: i64, max: i64) -> i64 {
    let (low, high) = clamp_bounds(min, max);
    let mut rng = rand::rng();
    rng.random_range(low..=high)
}

fn run(_context: ToolContext, arguments: Value) -> ToolFuture {
    Box::pin(async move {
        #[derive(Deserialize)]
        struct Args {
            min: Option<i64>,
            max: Option<i64>,
        }

        let args: Args =
            serde_json::from_value(arguments).context("invalid get_random_number arguments")?;
        let value = draw(
            args.min.unwrap_or(DEFAULT_MIN),
            args.max.unwrap_or(DEFAULT_MAX),
        );
        Ok(ToolOutput::text(value.to_string()))
    })
}

/// Register the tool into `registry`.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        TOOL_NAME,
        ToolMetadata::new(
            "Random Number",
            "Returns a uniform random integer between min and max, bounds clamped to 1-100",
        ),
        InputShape::new()
            .with_field(FieldSpec::integer(
                "min",
                "Lower bound, clamped to 1-100 (default: 1)",
            ))
            .with_field(FieldSpec::integer(
                "max",
                "Upper bound, clamped to 1-100 (default: 50)",
            )),
        Arc::new(run),
    )
}
