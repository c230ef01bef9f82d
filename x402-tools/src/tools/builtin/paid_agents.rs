//! Paid 402box agent tools (x_searcher, find_people)
//!
//! Both tools take a single `query` string and proxy it to their agent
//! endpoint, paying per call with the configured wallet.

use crate::agents::{self, PaidAgent, FIND_PEOPLE, X_SEARCHER};
use crate::config::Config;
use crate::tools::registry::Tool;
use crate::tools::types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const X_SEARCHER_DESCRIPTION: &str =
    "AI-powered X/Twitter search agent - Get real-time trends, news, and social media insights";

const FIND_PEOPLE_DESCRIPTION: &str = r#"Find People is a real-time Open Source Intelligence (OSINT) agent specialized in researching individuals and professional entities.

**What it does:**
• Identifies people by name, role, or company affiliation
• Retrieves verified career timelines and professional backgrounds
• Finds similar professionals in any industry or domain
• Synthesizes biographical information with source citations
• Validates identities across LinkedIn, company sites, and public records

**Best for:**
→ Due diligence research on potential hires or partners
→ Competitive intelligence on industry leaders
→ Journalist & researcher background verification
→ Sales prospecting and lead enrichment
→ Investor research on startup founders and executives

**Powered by:**
Neural and deep search capabilities that go beyond standard search engines to find hard-to-reach biographical details, executive profiles, and professional networks.

**Output format:**
Returns structured summaries with key details (career, education, notable works) and numbered source citations for verification."#;

pub struct PaidAgentTool {
    agent: PaidAgent,
    definition: ToolDefinition,
    config: Arc<Config>,
}

impl PaidAgentTool {
    pub fn new(agent: PaidAgent, description: &str, config: Arc<Config>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema::string("Natural-language query for the agent"),
        );

        PaidAgentTool {
            agent,
            definition: ToolDefinition {
                name: agent.name.to_string(),
                description: description.to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["query".to_string()],
                },
            },
            config,
        }
    }

    pub fn x_searcher(config: Arc<Config>) -> Self {
        Self::new(X_SEARCHER, X_SEARCHER_DESCRIPTION, config)
    }

    pub fn find_people(config: Arc<Config>) -> Self {
        Self::new(FIND_PEOPLE, FIND_PEOPLE_DESCRIPTION, config)
    }
}

#[derive(Debug, Deserialize)]
struct Params {
    query: String,
}

/// Strings pass through as-is; anything structured is pretty-printed
fn render_response(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[async_trait]
impl Tool for PaidAgentTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        if params.query.trim().is_empty() {
            return ToolResult::error("'query' is required");
        }

        match agents::query_agent(&self.config, &self.agent, &params.query).await {
            Ok(value) => ToolResult::success(render_response(&value)),
            Err(e) => {
                log::warn!("[AGENT] {} failed: {}", self.agent.name, e);
                ToolResult::error(e.to_string())
            }
        }
    }
}
