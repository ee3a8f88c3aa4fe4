use std::sync::Arc;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters,
    model::*, tool, tool_handler, tool_router,
    transport::stdio, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

mod apis;
mod config;
mod llm;
mod references;
mod review;
mod search;

use config::Config;
use review::{ReviewAgent, ReviewLength, ReviewRequest};

const MAX_RESULTS_CAP: u32 = 100;

// ── Parameter structs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchLiteratureParams {
    #[schemars(description = "Research topic to search for")]
    topic: String,
    #[schemars(description = "Maximum papers to return (default 20, max 100)")]
    max_results: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GenerateReviewParams {
    #[schemars(description = "Research topic for the literature review")]
    topic: String,
    #[schemars(description = "Academic field, echoed in the result (default \"general\")")]
    field: Option<String>,
    #[schemars(description = "Maximum sources to review (default 20, max 100)")]
    max_sources: Option<u32>,
    #[schemars(description = "'brief', 'standard' or 'comprehensive' (default)")]
    review_length: Option<String>,
    #[schemars(description = "Research objectives the review should address")]
    objectives: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SummarizeParams {
    #[schemars(description = "Research topic to summarize recent trends for")]
    topic: String,
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LitReviewServer {
    tool_router: ToolRouter<Self>,
    config: Arc<Config>,
    agent: Arc<ReviewAgent>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl LitReviewServer {
    pub fn create() -> anyhow::Result<Self> {
        let config = Config::from_env();
        let client = config.http_client()?;
        let sources = config.build_sources(&client);
        let model = config.build_model(&config.model_client()?)?;

        tracing::info!(
            "Initialized {} paper sources, model={}, timeout={}s",
            sources.len(),
            model.model(),
            config.request_timeout.as_secs()
        );

        Ok(Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            agent: Arc::new(ReviewAgent::new(sources, Arc::new(model))),
        })
    }

    #[tool(description = "List available literature sources and their status")]
    async fn list_sources(&self) -> Result<CallToolResult, McpError> {
        to_json(&self.config.source_status())
    }

    #[tool(description = "Search arXiv, OpenAlex, Crossref and Semantic Scholar. Returns deduplicated papers, newest first.")]
    async fn search_literature(
        &self,
        Parameters(params): Parameters<SearchLiteratureParams>,
    ) -> Result<CallToolResult, McpError> {
        let max = params.max_results.unwrap_or(20).min(MAX_RESULTS_CAP);
        let papers = self.agent.search_literature(&params.topic, max).await;
        to_json(&papers)
    }

    #[tool(description = "Generate a structured literature review with APA references for a topic")]
    async fn generate_review(
        &self,
        Parameters(params): Parameters<GenerateReviewParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut request = ReviewRequest::new(params.topic);
        if let Some(field) = params.field {
            request.field = field;
        }
        if let Some(max) = params.max_sources {
            request.max_sources = max.min(MAX_RESULTS_CAP);
        }
        if let Some(ref length) = params.review_length {
            request.review_length = ReviewLength::parse_lenient(length);
        }
        request.objectives = params.objectives.unwrap_or_default();

        let result = self.agent.generate_review(&request).await;
        to_json(&result)
    }

    #[tool(description = "Summarize current research trends for a topic in 2-3 sentences")]
    async fn summarize_literature(
        &self,
        Parameters(params): Parameters<SummarizeParams>,
    ) -> Result<CallToolResult, McpError> {
        let summary = self.agent.summarize(&params.topic).await;
        Ok(CallToolResult::success(vec![Content::text(summary)]))
    }
}

#[tool_handler]
impl ServerHandler for LitReviewServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Aggregate recent papers from arXiv, OpenAlex, Crossref and Semantic Scholar \
                 and synthesize literature reviews with APA references."
                    .into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting litreview MCP server");

    let server = LitReviewServer::create()?;
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
