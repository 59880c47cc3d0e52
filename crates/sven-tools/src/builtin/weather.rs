// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::WeatherBackend;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct WeatherTool {
    pub backend: Arc<dyn WeatherBackend>,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Fetch a short weather forecast for a named location."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "City or place name" }
            },
            "required": ["location"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let location = match call.args.get("location").and_then(|v| v.as_str()) {
            Some(l) => l,
            None => return ToolOutput::err(&call.id, "missing 'location'"),
        };
        match self.backend.weather(location).await {
            Ok(forecast) => ToolOutput::ok(&call.id, forecast),
            Err(e) => ToolOutput::err(&call.id, format!("weather error: {e}")),
        }
    }
}
