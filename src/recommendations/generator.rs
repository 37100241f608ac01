//! Batch generation against the text generator, with bounded retries.
//!
//! Each attempt uses a progressively simpler prompt:
//!
//! | attempt | prompt                          | output       | temperature |
//! |---------|---------------------------------|--------------|-------------|
//! | 0       | full prompt                     | JSON schema  | 0.2         |
//! | 1       | full prompt + JSON reminder     | JSON schema  | 0.2         |
//! | 2+      | one title per line              | plain text   | 0.1         |
//!
//! When every attempt fails the offline fallback answers instead, so
//! `generate` always returns a non-empty list.

use crate::config::Config;
use crate::gemini::{GenerationRequest, TextGenerator};
use crate::metrics::{self, MetricsSink};
use crate::recommendations::fallback::FallbackRecommender;
use crate::recommendations::parser;
use crate::recommendations::types::RecommendationEntry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const STRUCTURED_TEMPERATURE: f32 = 0.2;
const PLAIN_TEXT_TEMPERATURE: f32 = 0.1;

const JSON_REMINDER: &str =
    "\n\nPlease only provide song titles. Your response should be in valid JSON format.";

const RESPONSE_FORMAT: &str = "Your response should be a JSON array with objects containing only 'song_title' field. For example:
[
    { \"song_title\": \"Example Song\" },
    { \"song_title\": \"Another Song\" }
]";

/// Everything a prompt is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub seeds: Vec<String>,
    pub prior_titles: Vec<String>,
    pub desired_count: usize,
    pub steering: Option<String>,
}

impl PromptContext {
    /// Keeps the first `max_seeds` seeds; blank steering is dropped.
    pub fn new(
        seeds: &[String],
        prior: &[RecommendationEntry],
        desired_count: usize,
        steering: Option<&str>,
        max_seeds: usize,
    ) -> Self {
        Self {
            seeds: seeds.iter().take(max_seeds).cloned().collect(),
            prior_titles: prior.iter().map(|e| e.song_title.clone()).collect(),
            desired_count,
            steering: steering
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    fn bullet_list(items: &[String]) -> String {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn full_prompt(&self) -> String {
        let mut prompt = format!(
            "Based on the following playlist tracks:\n\n{}\n\n",
            Self::bullet_list(&self.seeds)
        );

        let exclusion = if self.prior_titles.is_empty() {
            prompt.push_str(&format!(
                "Recommend {} new songs that would fit well with this playlist. ",
                self.desired_count
            ));
            "DO NOT recommend songs that are already in the input list."
        } else {
            prompt.push_str(&format!(
                "I already recommended these songs:\n\n{}\n\nRecommend {} MORE new songs that would fit well with this playlist. ",
                Self::bullet_list(&self.prior_titles),
                self.desired_count
            ));
            "DO NOT recommend songs that are already in the input list or in the previously recommended songs list."
        };

        if let Some(steering) = &self.steering {
            prompt.push_str(&format!("I want you to {}. ", steering));
        }

        prompt.push_str(
            "Only provide the song titles without artists. The recommendations should feel cohesive with the existing playlist.\n",
        );
        prompt.push_str(exclusion);
        prompt.push_str("\n\n");
        prompt.push_str(RESPONSE_FORMAT);
        prompt
    }

    fn plain_text_prompt(&self) -> String {
        let mut prompt = format!(
            "Based on the following playlist tracks:\n\n{}\n\nRecommend {} songs. Just give me the song titles only, one per line.",
            Self::bullet_list(&self.seeds),
            self.desired_count
        );
        if let Some(steering) = &self.steering {
            prompt.push_str(&format!(" {}.", steering));
        }
        prompt
    }
}

/// Request for the given zero-based attempt.
pub fn prompt_for_attempt(ctx: &PromptContext, attempt: u32) -> GenerationRequest {
    match attempt {
        0 => GenerationRequest {
            prompt: ctx.full_prompt(),
            temperature: STRUCTURED_TEMPERATURE,
            structured: true,
        },
        1 => GenerationRequest {
            prompt: format!("{}{}", ctx.full_prompt(), JSON_REMINDER),
            temperature: STRUCTURED_TEMPERATURE,
            structured: true,
        },
        _ => GenerationRequest {
            prompt: ctx.plain_text_prompt(),
            temperature: PLAIN_TEXT_TEMPERATURE,
            structured: false,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::MAX_ATTEMPTS,
            delay: Duration::from_millis(crate::config::RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

pub struct RecommendationGenerator {
    client: Arc<dyn TextGenerator>,
    fallback: FallbackRecommender,
    policy: RetryPolicy,
    max_seed_tracks: usize,
    cancel: CancellationToken,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl RecommendationGenerator {
    pub fn new(client: Arc<dyn TextGenerator>) -> Self {
        Self {
            client,
            fallback: FallbackRecommender::new(),
            policy: RetryPolicy::default(),
            max_seed_tracks: crate::config::MAX_SEED_TRACKS,
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    pub fn from_config(client: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self::new(client)
            .with_policy(RetryPolicy::from_config(config))
            .with_max_seed_tracks(config.max_seed_tracks)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_seed_tracks(mut self, max_seed_tracks: usize) -> Self {
        self.max_seed_tracks = max_seed_tracks;
        self
    }

    /// Cancelling `token` skips pending retry delays. Attempts still run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Produce a batch of about `desired_count` entries. Never empty.
    pub async fn generate(
        &self,
        seeds: &[String],
        prior: &[RecommendationEntry],
        desired_count: usize,
        steering: Option<&str>,
    ) -> Vec<RecommendationEntry> {
        let ctx = PromptContext::new(seeds, prior, desired_count, steering, self.max_seed_tracks);

        log::info!(
            "Requesting {} recommendations from {} ({} seeds, {} prior)",
            desired_count,
            self.client.name(),
            ctx.seeds.len(),
            ctx.prior_titles.len()
        );
        if let Some(steering) = &ctx.steering {
            log::info!("Including steering instruction: '{}'", steering);
        }

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                self.pause_before_retry(attempt).await;
            }

            let request = prompt_for_attempt(&ctx, attempt);
            let started = Instant::now();
            let result = self.client.generate(&request).await;
            self.record(metrics::GENERATIONS);
            if let Some(sink) = &self.metrics {
                sink.record_generation_time(started.elapsed());
            }

            match result {
                Ok(body) => {
                    let entries = parser::parse(&body);
                    if !entries.is_empty() {
                        log::info!(
                            "Attempt {}/{} produced {} recommendations",
                            attempt + 1,
                            self.policy.max_attempts,
                            entries.len()
                        );
                        return entries;
                    }
                    log::warn!(
                        "Attempt {}/{} returned no usable recommendations",
                        attempt + 1,
                        self.policy.max_attempts
                    );
                }
                Err(e) => {
                    self.record(metrics::GENERATION_FAILURES);
                    log::warn!(
                        "Attempt {}/{} failed: {}",
                        attempt + 1,
                        self.policy.max_attempts,
                        e
                    );
                }
            }
        }

        log::warn!(
            "All {} attempts failed, using fallback recommendations",
            self.policy.max_attempts
        );
        self.record(metrics::FALLBACKS);
        self.fallback.recommend(seeds)
    }

    async fn pause_before_retry(&self, attempt: u32) {
        if self.policy.delay.is_zero() || self.cancel.is_cancelled() {
            return;
        }

        log::info!(
            "Waiting {}ms before retry #{}",
            self.policy.delay.as_millis(),
            attempt
        );
        tokio::select! {
            _ = self.cancel.cancelled() => log::debug!("Retry delay cancelled"),
            _ = tokio::time::sleep(self.policy.delay) => {}
        }
    }

    fn record(&self, counter: &str) {
        if let Some(sink) = &self.metrics {
            sink.increment_counter(counter);
        }
    }
}
