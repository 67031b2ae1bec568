//! `ReqwestImageApiClient`: submits a subtask's prompts to the upstream
//! `make_image` endpoint and polls `artifact/task/{uuid}` until a terminal
//! `task_status`, exactly mirroring `_call_api`/`_poll_task_status` from
//! `original_source/backend/dramatiq_app/actors/test_run_subtask.py`.

use std::num::NonZeroU32;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::application::image_dimensions::ratio_to_dimensions;
use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::ConstantPrompt;
use crate::domain::ports::{GenerateRequest, GenerateResult, ImageApiClient};

/// The one hard-coded Lumina "elementum" prompt every Lumina request
/// carries alongside the task's own prompts (spec §4.5 step 2).
const LUMINA_ELEMENTUM_UUID: &str = "b5edccfe-46a2-4a14-a8ff-f4d430343805";
const LUMINA_ELEMENTUM_IMG_URL: &str = "https://oss.talesofai.cn/picture_s/1y7f53e6itfn_0.jpeg";
const LUMINA_ELEMENTUM_NAME: &str = "lumina1";

#[derive(Debug, Clone)]
pub struct ImageApiConfig {
    pub x_token: String,
    pub api_url: String,
    pub task_status_url: String,
    pub lumina_api_url: String,
    pub lumina_task_status_url: String,
    pub max_polling_attempts: u32,
    pub polling_interval: Duration,
    pub lumina_max_polling_attempts: u32,
    pub lumina_polling_interval: Duration,
    pub submit_timeout: Duration,
    pub poll_timeout: Duration,
    /// Upstream requests per second this client will sustain, shared
    /// across both the standard and Lumina endpoints.
    pub rate_limit_per_second: u32,
}

impl Default for ImageApiConfig {
    fn default() -> Self {
        Self {
            x_token: String::new(),
            api_url: "https://api.talesofai.cn/v3/make_image".to_string(),
            task_status_url: "https://api.talesofai.cn/v1/artifact/task/{task_uuid}".to_string(),
            lumina_api_url: "https://ops.api.talesofai.cn/v3/make_image".to_string(),
            lumina_task_status_url: "https://ops.api.talesofai.cn/v1/artifact/task/{task_uuid}".to_string(),
            max_polling_attempts: 30,
            polling_interval: Duration::from_secs(2),
            lumina_max_polling_attempts: 50,
            lumina_polling_interval: Duration::from_secs(3),
            submit_timeout: Duration::from_secs(300),
            poll_timeout: Duration::from_secs(30),
            rate_limit_per_second: 5,
        }
    }
}

pub struct ReqwestImageApiClient {
    http: Client,
    config: ImageApiConfig,
    limiter: DefaultDirectRateLimiter,
}

impl ReqwestImageApiClient {
    pub fn new(config: ImageApiConfig) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(config.rate_limit_per_second.max(1)).unwrap());
        Self {
            http: Client::new(),
            limiter: RateLimiter::direct(quota),
            config,
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_string()),
            ("x-platform", "nieta-app/web".to_string()),
            ("X-Token", self.config.x_token.clone()),
        ]
    }

    /// Submit the payload and return the bare task UUID. The upstream
    /// response body is a JSON string literal (quoted UUID); strip the
    /// quotes rather than parse it as a JSON document (it isn't one).
    #[instrument(skip(self, payload))]
    async fn call_api(&self, api_url: &str, payload: &Value) -> OrchestratorResult<String> {
        self.limiter.until_ready().await;

        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(5)))
            .build();

        let response = backoff::future::retry(backoff, || async {
            let mut request = self.http.post(api_url).timeout(self.config.submit_timeout).json(payload);
            for (name, value) in self.headers() {
                request = request.header(name, value);
            }
            request.send().await.map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
        .map_err(|e| OrchestratorError::Retryable(format!("image API submit failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::from_upstream_message(format!(
                "image API submit returned {status}: {body}"
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| OrchestratorError::Retryable(format!("reading submit response failed: {e}")))?;
        let task_uuid = content.trim().trim_matches('"').to_string();
        if task_uuid.is_empty() {
            return Err(OrchestratorError::Fatal("image API returned an empty task uuid".to_string()));
        }
        Ok(task_uuid)
    }

    /// Poll `task_status_url_template` (with `{task_uuid}` substituted)
    /// until a terminal status or `max_attempts` is exhausted.
    #[instrument(skip(self))]
    async fn poll_task_status(
        &self,
        task_uuid: &str,
        task_status_url_template: &str,
        max_attempts: u32,
        polling_interval: Duration,
    ) -> OrchestratorResult<Value> {
        let url = task_status_url_template.replace("{task_uuid}", task_uuid);

        for attempt in 1..=max_attempts {
            let outcome = self.poll_once(&url).await;
            match outcome {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {
                    info!(%task_uuid, attempt, max_attempts, "task still pending");
                }
                Err(err) if attempt == max_attempts => return Err(err),
                Err(err) => {
                    warn!(%task_uuid, attempt, error = %err, "poll attempt failed, retrying");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(polling_interval).await;
            }
        }
        Err(OrchestratorError::MaxAttempts)
    }

    /// One GET of the status endpoint. `Ok(None)` means keep polling
    /// (status is `PENDING` or absent); `Ok(Some(_))` means `SUCCESS`.
    async fn poll_once(&self, url: &str) -> OrchestratorResult<Option<Value>> {
        let mut request = self.http.get(url).timeout(self.config.poll_timeout);
        for (name, value) in self.headers() {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::Retryable(format!("status poll request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(OrchestratorError::Retryable(format!("status poll returned {status}")));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Retryable(format!("status poll response malformed: {e}")))?;

        match result.get("task_status").and_then(Value::as_str) {
            Some("SUCCESS") => Ok(Some(result)),
            Some("FAILURE") => {
                let error_msg = result.get("error").and_then(Value::as_str).unwrap_or("unknown error");
                Err(OrchestratorError::from_upstream_message(error_msg.to_string()))
            }
            Some("ILLEGAL_IMAGE") => Err(OrchestratorError::ContentCensored(
                "image API returned ILLEGAL_IMAGE".to_string(),
            )),
            Some("TIMEOUT") => Err(OrchestratorError::Retryable("image API returned TIMEOUT".to_string())),
            Some("PENDING") | None => Ok(None),
            Some(other) => {
                let error_msg = result
                    .get("error")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("task status was {other}"));
                Err(OrchestratorError::from_upstream_message(error_msg))
            }
        }
    }

    fn extract_image_url(result: &Value) -> Option<String> {
        result
            .get("artifacts")
            .and_then(Value::as_array)
            .and_then(|artifacts| artifacts.first())
            .and_then(|artifact| artifact.get("url"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }
}

fn reference_prompt_to_wire(kind: &str, value: &str, uuid: &str, name: &str, img_url: &str, weight: f64) -> Value {
    json!({
        "type": kind,
        "value": value,
        "uuid": uuid,
        "weight": weight,
        "name": name,
        "img_url": img_url,
        "domain": "",
        "parent": "",
        "label": null,
        "sort_index": 0,
        "status": "IN_USE",
        "polymorphi_values": {},
        "sub_type": null,
    })
}

fn prompt_to_wire(prompt: &ConstantPrompt) -> Value {
    match prompt {
        ConstantPrompt::Freetext { value, weight } => json!({
            "type": "freetext",
            "value": value,
            "weight": weight,
        }),
        ConstantPrompt::Reference {
            kind,
            value,
            uuid,
            name,
            img_url,
            weight,
        } => reference_prompt_to_wire(kind.as_str(), value, uuid, name, img_url, *weight),
    }
}

fn elementum_prompt() -> Value {
    reference_prompt_to_wire(
        "elementum",
        LUMINA_ELEMENTUM_UUID,
        LUMINA_ELEMENTUM_UUID,
        LUMINA_ELEMENTUM_NAME,
        LUMINA_ELEMENTUM_IMG_URL,
        1.0,
    )
}

fn resolve_seed(seed: Option<i64>) -> i64 {
    match seed {
        Some(s) if s != 0 => s,
        _ => rand::thread_rng().gen_range(1..=2_147_483_647_i64),
    }
}

#[async_trait::async_trait]
impl ImageApiClient for ReqwestImageApiClient {
    #[instrument(skip(self, request))]
    async fn generate(&self, request: &GenerateRequest) -> OrchestratorResult<GenerateResult> {
        let params = &request.params;
        let seed = resolve_seed(params.seed);
        let (width, height) = ratio_to_dimensions(&params.ratio);

        let mut raw_prompt: Vec<Value> = request.prompts.iter().map(prompt_to_wire).collect();
        if params.is_lumina {
            raw_prompt.push(elementum_prompt());
        }

        let mut payload = json!({
            "storyId": "",
            "jobType": "universal",
            "width": width,
            "height": height,
            "rawPrompt": raw_prompt,
            "seed": seed,
            "meta": {"entrance": "PICTURE,PURE"},
            "context_model_series": null,
            "negative_freetext": "",
            "advanced_translator": params.use_polish,
        });

        if params.is_lumina {
            let mut client_args = serde_json::Map::new();
            if let Some(name) = &params.lumina_model_name {
                if !name.is_empty() {
                    client_args.insert("ckpt_name".to_string(), json!(name));
                }
            }
            if let Some(cfg) = params.lumina_cfg {
                client_args.insert("cfg".to_string(), json!(cfg));
            }
            if let Some(step) = params.lumina_step {
                client_args.insert("steps".to_string(), json!(step));
            }
            if !client_args.is_empty() {
                payload["client_args"] = Value::Object(client_args);
            }
        }

        let (api_url, status_url, max_attempts, interval) = if params.is_lumina {
            (
                self.config.lumina_api_url.as_str(),
                self.config.lumina_task_status_url.as_str(),
                self.config.lumina_max_polling_attempts,
                self.config.lumina_polling_interval,
            )
        } else {
            (
                self.config.api_url.as_str(),
                self.config.task_status_url.as_str(),
                self.config.max_polling_attempts,
                self.config.polling_interval,
            )
        };

        let task_uuid = self.call_api(api_url, &payload).await?;
        let result = self.poll_task_status(&task_uuid, status_url, max_attempts, interval).await?;

        let image_url = Self::extract_image_url(&result)
            .ok_or_else(|| OrchestratorError::Fatal(format!("task {task_uuid} succeeded with no artifact url")))?;

        Ok(GenerateResult {
            image_url,
            seed_used: seed,
        })
    }
}
