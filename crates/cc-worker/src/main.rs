use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;
use dotenvy::dotenv;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use cc_common::batch::{BatchOrchestrator, BatchReport, CancelFlag, DEFAULT_MAX_CONCURRENCY};
use cc_common::error::ExtractionError;
use cc_common::export::export_rows;
use cc_common::ingest::{candidate_from_row, CandidateRow};
use cc_common::matching::scoring::RulesEngine;
use cc_common::oracle::ExtractionOracle;
use cc_common::rules::RulesConfig;
use cc_common::{CandidateProfile, JobRequirement};

/// Runtime configuration of the LLM oracle endpoint, env-driven with
/// provider-keyed defaults.
#[derive(Debug, Clone)]
struct OracleRuntimeConfig {
    provider: String,
    model: String,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_secs: u64,
}

impl Default for OracleRuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_secs: 5,
        }
    }
}

impl OracleRuntimeConfig {
    fn from_env() -> Self {
        fn provider_defaults(provider: &str) -> (String, String) {
            match provider.to_ascii_lowercase().as_str() {
                "anthropic" => (
                    "claude-3-5-sonnet-20240620".into(),
                    "https://api.anthropic.com/v1/messages".into(),
                ),
                "google" | "google-genai" => (
                    "gemini-1.5-flash".into(),
                    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                        .into(),
                ),
                "mistral" => (
                    "mistral-large-latest".into(),
                    "https://api.mistral.ai/v1/chat/completions".into(),
                ),
                "xai" => (
                    "grok-2-latest".into(),
                    "https://api.x.ai/v1/chat/completions".into(),
                ),
                _ => (
                    "gpt-4o-mini".into(),
                    "https://api.openai.com/v1/chat/completions".into(),
                ),
            }
        }

        fn provider_api_key(provider: &str) -> Option<String> {
            match provider.to_ascii_lowercase().as_str() {
                "openai" => std::env::var("OPENAI_API_KEY").ok(),
                "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
                "google" | "google-genai" => std::env::var("GOOGLE_API_KEY").ok(),
                "mistral" => std::env::var("MISTRAL_API_KEY").ok(),
                "xai" => std::env::var("XAI_API_KEY").ok(),
                _ => None,
            }
        }

        fn parse_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(default)
        }

        fn parse_u32(key: &str, default: u32) -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(default)
        }

        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".into());
        let (default_model, default_endpoint) = provider_defaults(&provider);
        let api_key = std::env::var("LLM_API_KEY")
            .ok()
            .or_else(|| provider_api_key(&provider))
            .unwrap_or_default();

        Self {
            provider,
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| default_model),
            endpoint: std::env::var("LLM_ENDPOINT").unwrap_or_else(|_| default_endpoint),
            api_key,
            timeout_secs: parse_u64("LLM_TIMEOUT_SECONDS", 30),
            max_retries: parse_u32("LLM_MAX_RETRIES", 3),
            retry_backoff_secs: parse_u64("LLM_RETRY_BACKOFF_SECONDS", 5),
        }
    }
}

/// OpenAI-compatible chat-completions client behind the oracle trait.
struct HttpExtractionOracle {
    client: reqwest::Client,
    config: OracleRuntimeConfig,
}

impl HttpExtractionOracle {
    fn new(config: OracleRuntimeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// One prompt round-trip with bounded retries on transport failures.
    /// Timeouts are returned immediately; the core degrades them per item.
    async fn complete(&self, prompt: String) -> Result<String, ExtractionError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0.1,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    let payload: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|err| ExtractionError::Malformed(err.to_string()))?;
                    return payload["choices"][0]["message"]["content"]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ExtractionError::Malformed("response carries no message content".into())
                        });
                }
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt <= self.config.max_retries {
                        warn!(%status, attempt, "oracle endpoint errored; retrying");
                    } else {
                        return Err(ExtractionError::Transport(format!(
                            "endpoint returned {status}"
                        )));
                    }
                }
                Err(err) if err.is_timeout() => {
                    return Err(ExtractionError::Timeout {
                        seconds: self.config.timeout_secs,
                    });
                }
                Err(err) => {
                    if attempt <= self.config.max_retries {
                        warn!(error = %err, attempt, "oracle request failed; retrying");
                    } else {
                        return Err(ExtractionError::Transport(err.to_string()));
                    }
                }
            }
            sleep(Duration::from_secs(self.config.retry_backoff_secs)).await;
        }
    }
}

fn as_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn job_analysis_prompt(job_text: &str) -> String {
    format!(
        "Analyze this job description and return ONLY a JSON object with keys: \
         title, department, required_skills (array), experience_years (number), \
         seniority_level, location_type (remote|hybrid|onsite|flexible), \
         sponsorship_policy (full_sponsorship|no_sponsorship|case_by_case).\n\n\
         Job description:\n{job_text}"
    )
}

fn parse_prompt(resume_text: &str) -> String {
    format!(
        "Parse this resume and return ONLY a JSON object with keys: name, email, \
         phone, skills (array), experience_years (number), education, \
         previous_roles, location_preference, work_authorization, and \
         confidence {{overall (0-100), needs_review (array of field names)}}.\n\n\
         Resume:\n{resume_text}"
    )
}

fn match_prompt(candidate: &CandidateProfile, job: &JobRequirement) -> String {
    format!(
        "Score how well this candidate fits this job. Return ONLY a JSON object \
         with keys: job_title_match_score, skills_score, experience_score, \
         profile_description_match_score (each 0-100), strengths (array), \
         gaps (array), reasoning.\n\nCandidate:\n{}\n\nJob:\n{}",
        as_json(candidate),
        as_json(job)
    )
}

#[async_trait]
impl ExtractionOracle for HttpExtractionOracle {
    async fn analyze_job(&self, job_text: &str) -> Result<String, ExtractionError> {
        self.complete(job_analysis_prompt(job_text)).await
    }

    async fn parse_candidate(&self, resume_text: &str) -> Result<String, ExtractionError> {
        self.complete(parse_prompt(resume_text)).await
    }

    async fn score_match(
        &self,
        candidate: &CandidateProfile,
        job: &JobRequirement,
    ) -> Result<String, ExtractionError> {
        self.complete(match_prompt(candidate, job)).await
    }

    async fn enhance_resume(
        &self,
        candidate: &CandidateProfile,
        job: &JobRequirement,
        iteration: u32,
    ) -> Result<String, ExtractionError> {
        let prompt = format!(
            "Rewrite this resume toward the job (pass {iteration}). Return ONLY a \
             JSON object with keys: enhanced_resume (object), changes (array), \
             ats_score {{before, after}}.\n\nCandidate:\n{}\n\nJob:\n{}",
            as_json(candidate),
            as_json(job)
        );
        self.complete(prompt).await
    }

    async fn review_quality(
        &self,
        candidate: &CandidateProfile,
        enhanced: &serde_json::Value,
    ) -> Result<String, ExtractionError> {
        let prompt = format!(
            "Review this enhanced resume against the original for accuracy. Return \
             ONLY a JSON object with keys: approval {{status \
             (approved|needs_review|rejected), reason}}, issues (array of \
             {{text, severity (low|medium|high|critical)}}).\n\nOriginal:\n{}\n\n\
             Enhanced:\n{enhanced}",
            as_json(candidate)
        );
        self.complete(prompt).await
    }
}

#[derive(Debug, Parser)]
#[command(name = "cc-worker", about = "Match a candidate sheet against one job posting")]
struct Cli {
    /// Rules file; falls back to builtin defaults when missing
    #[arg(long, default_value = "config/matching_rules.json")]
    rules: PathBuf,

    /// Plain-text job description file
    #[arg(long)]
    job_file: PathBuf,

    /// Candidate sheet (CSV) to match against the job
    #[arg(long)]
    candidates: PathBuf,

    /// Write the ranked report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Job id recorded into every match record
    #[arg(long, default_value = "job_0001")]
    job_id: String,

    /// Concurrent candidate tasks
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,
}

fn load_candidates(path: &PathBuf) -> Result<Vec<CandidateProfile>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut candidates = Vec::new();
    for (index, record) in reader.deserialize::<CandidateRow>().enumerate() {
        match record {
            Ok(row) => candidates.push(candidate_from_row(index, &row)),
            Err(err) => warn!(row = index + 1, error = %err, "skipping unreadable candidate row"),
        }
    }
    Ok(candidates)
}

fn render_report(report: &BatchReport) -> serde_json::Value {
    json!({
        "job_id": report.job.id,
        "total_candidates": report.total_candidates,
        "ranked": export_rows(report),
        "errors": report.errors,
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    cc_common::logging::init("cc-worker");

    let args = Cli::parse();
    let config = RulesConfig::load_or_default(&args.rules)?;
    let oracle_config = OracleRuntimeConfig::from_env();
    info!(
        rules_version = %config.version,
        provider = %oracle_config.provider,
        model = %oracle_config.model,
        endpoint = %oracle_config.endpoint,
        max_concurrency = args.max_concurrency,
        "starting batch match"
    );

    let engine = RulesEngine::new(std::sync::Arc::new(config));
    let orchestrator = BatchOrchestrator::new(engine).with_max_concurrency(args.max_concurrency);
    let oracle = HttpExtractionOracle::new(oracle_config)?;

    let description = tokio::fs::read_to_string(&args.job_file).await?;
    let job = JobRequirement {
        id: args.job_id.clone(),
        description,
        ..JobRequirement::default()
    };
    let candidates = load_candidates(&args.candidates)?;
    info!(candidates = candidates.len(), "loaded candidate sheet");

    let report = orchestrator
        .run(job, candidates, &oracle, &CancelFlag::new())
        .await?;
    info!(
        ranked = report.ranked.len(),
        errors = report.errors.len(),
        "batch finished"
    );

    let rendered = serde_json::to_string_pretty(&render_report(&report))?;
    match &args.out {
        Some(path) => tokio::fs::write(path, rendered).await?,
        None => println!("{rendered}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("cc-worker failed: {err}");
        std::process::exit(1);
    }
}
