use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vantage_models::{AgentIdentity, DispatchConfig, ProviderKind, ProviderLimits};

use crate::credential::Credential;
use crate::error::{DispatchError, ProviderError};
use crate::provider::{CallParams, Provider};
use crate::providers::{AnthropicProvider, ClaudeCliProvider, GeminiProvider, OpenAiProvider};
use crate::registry::BrainRegistry;
use crate::template;

/// Caller-side timing knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// How long a caller waits for its result.
    pub request_timeout: Duration,
    /// How long an enqueue may wait on a full queue before `Backpressure`.
    pub enqueue_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            enqueue_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            enqueue_timeout: Duration::from_secs(config.enqueue_timeout_seconds),
        }
    }
}

/// A rendered unit of work. Built per call and never mutated.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub id: Uuid,
    pub agent: AgentIdentity,
    pub model: String,
    pub prompt: String,
    pub params: CallParams,
    pub created_at: DateTime<Utc>,
}

struct Job {
    request: DispatchRequest,
    credential: Option<Credential>,
    reply: oneshot::Sender<Result<String, ProviderError>>,
    enqueued_at: Instant,
}

struct ProviderPool {
    sender: mpsc::Sender<Job>,
    requires_credential: bool,
}

/// The single chokepoint for LLM generation.
///
/// Owns one bounded FIFO queue and `max_concurrent` long-lived workers per
/// provider. Workers only stop on `shutdown` or when the service is dropped.
///
/// A caller that times out is detached from its request: the worker still
/// finishes the provider call and the result is discarded.
pub struct DispatchService {
    settings: DispatchSettings,
    registry: BrainRegistry,
    pools: HashMap<ProviderKind, ProviderPool>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchService {
    /// Validate the wiring and spawn every worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        settings: DispatchSettings,
        registry: BrainRegistry,
        limits: &[ProviderLimits],
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, DispatchError> {
        let implementations: HashMap<ProviderKind, Arc<dyn Provider>> = providers
            .into_iter()
            .map(|provider| (provider.kind(), provider))
            .collect();

        let mut seen = HashMap::new();
        for limit in limits {
            if limit.max_concurrent == 0 || limit.queue_capacity == 0 {
                return Err(DispatchError::Config(format!(
                    "{}: max_concurrent and queue_capacity must be at least 1",
                    limit.provider
                )));
            }
            if seen.insert(limit.provider, limit).is_some() {
                return Err(DispatchError::Config(format!(
                    "duplicate limits for provider {}",
                    limit.provider
                )));
            }
        }

        for brain in registry.brains() {
            if !seen.contains_key(&brain.provider) {
                return Err(DispatchError::Config(format!(
                    "no provider limits configured for {} (used by {})",
                    brain.provider, brain.identity
                )));
            }
            if !implementations.contains_key(&brain.provider) {
                return Err(DispatchError::Config(format!(
                    "no implementation registered for provider {} (used by {})",
                    brain.provider, brain.identity
                )));
            }
        }

        let cancel = CancellationToken::new();
        let mut pools = HashMap::new();
        let mut workers = Vec::new();

        for limit in limits {
            let Some(provider) = implementations.get(&limit.provider) else {
                debug!(provider = %limit.provider, "Limits configured for unused provider");
                continue;
            };

            let (sender, receiver) = mpsc::channel(limit.queue_capacity);
            let receiver = Arc::new(Mutex::new(receiver));

            for worker_id in 0..limit.max_concurrent {
                workers.push(tokio::spawn(worker_loop(
                    limit.provider,
                    worker_id,
                    provider.clone(),
                    receiver.clone(),
                    cancel.clone(),
                )));
            }

            info!(
                provider = %limit.provider,
                max_concurrent = limit.max_concurrent,
                queue_capacity = limit.queue_capacity,
                "Provider pool started"
            );

            pools.insert(
                limit.provider,
                ProviderPool {
                    sender,
                    requires_credential: provider.requires_credential(),
                },
            );
        }

        Ok(Self {
            settings,
            registry,
            pools,
            cancel,
            workers: Mutex::new(workers),
        })
    }

    /// Wire the HTTP and CLI providers, resolve credentials from the
    /// environment and start the pools.
    pub fn from_config(
        config: &DispatchConfig,
        default_template: impl Fn(AgentIdentity) -> &'static str,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DispatchError::Config(format!("HTTP client: {e}")))?;

        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(OpenAiProvider::new(client.clone())),
            Arc::new(GeminiProvider::new(client.clone())),
            Arc::new(AnthropicProvider::new(client)),
            Arc::new(ClaudeCliProvider::default()),
        ];

        let registry =
            BrainRegistry::from_configs(&config.brains, default_template, Credential::from_env);

        Self::start(
            DispatchSettings::from(config),
            registry,
            &config.providers,
            providers,
        )
    }

    /// Generate text for a string-named agent identity.
    pub async fn dispatch(
        &self,
        agent: &str,
        input: &str,
        prompt_vars: &BTreeMap<String, String>,
    ) -> Result<String, DispatchError> {
        let identity = agent
            .parse::<AgentIdentity>()
            .map_err(|e| DispatchError::Config(format!("unregistered agent identity: {e}")))?;
        self.dispatch_as(identity, input, prompt_vars).await
    }

    /// Generate text for `identity`: render its template, queue the request
    /// on its provider and wait for the result.
    pub async fn dispatch_as(
        &self,
        identity: AgentIdentity,
        input: &str,
        prompt_vars: &BTreeMap<String, String>,
    ) -> Result<String, DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }

        let brain = self
            .registry
            .get(identity)
            .ok_or_else(|| DispatchError::Config(format!("no brain registered for {identity}")))?;

        let pool = self.pools.get(&brain.provider).ok_or_else(|| {
            DispatchError::Config(format!("no worker pool for provider {}", brain.provider))
        })?;

        if pool.requires_credential && brain.credential.is_none() {
            let source = brain.credential_env.as_deref().unwrap_or("no credential_env");
            return Err(DispatchError::Config(format!(
                "missing credential for {identity} on {} ({source})",
                brain.provider
            )));
        }

        let prompt = template::render(&brain.template, input, prompt_vars)?;
        let request = DispatchRequest {
            id: Uuid::new_v4(),
            agent: identity,
            model: brain.model.clone(),
            prompt,
            params: brain.params,
            created_at: Utc::now(),
        };
        let request_id = request.id;
        let provider = brain.provider;

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            request,
            credential: brain.credential.clone(),
            reply: reply_tx,
            enqueued_at: Instant::now(),
        };

        pool.sender
            .send_timeout(job, self.settings.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    warn!(agent = %identity, provider = %provider, "Provider queue full, rejecting request");
                    DispatchError::Backpressure { provider }
                }
                SendTimeoutError::Closed(_) => DispatchError::Shutdown,
            })?;

        debug!(
            request_id = %request_id,
            agent = %identity,
            provider = %provider,
            queue_depth = self.queue_depth(provider),
            "Request enqueued"
        );

        match tokio::time::timeout(self.settings.request_timeout, reply_rx).await {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(source))) => Err(DispatchError::Provider { provider, source }),
            Ok(Err(_)) => Err(DispatchError::Shutdown),
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    agent = %identity,
                    provider = %provider,
                    timeout_ms = self.settings.request_timeout.as_millis() as u64,
                    "Caller timed out; request keeps running"
                );
                Err(DispatchError::Timeout(self.settings.request_timeout))
            }
        }
    }

    /// Whether `identity` has a brain, a worker pool and, where the provider
    /// needs one, a credential.
    pub fn can_serve(&self, identity: AgentIdentity) -> bool {
        self.registry.get(identity).is_some_and(|brain| {
            self.pools.get(&brain.provider).is_some_and(|pool| {
                !pool.requires_credential || brain.credential.is_some()
            })
        })
    }

    /// Requests waiting in a provider's queue (not counting in-flight calls).
    pub fn queue_depth(&self, provider: ProviderKind) -> usize {
        self.pools
            .get(&provider)
            .map(|pool| pool.sender.max_capacity() - pool.sender.capacity())
            .unwrap_or(0)
    }

    /// Stop accepting work and wait for the workers to exit. In-flight
    /// provider calls finish first; still-queued requests fail with
    /// `Shutdown`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        let count = workers.len();
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                warn!(error = %e, "Dispatch worker ended abnormally");
            }
        }
        info!(workers = count, "Dispatch service shut down");
    }
}

async fn worker_loop(
    provider_kind: ProviderKind,
    worker_id: usize,
    provider: Arc<dyn Provider>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    cancel: CancellationToken,
) {
    debug!(provider = %provider_kind, worker_id, "Dispatch worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        run_job(provider_kind, worker_id, provider.as_ref(), job).await;
    }

    debug!(provider = %provider_kind, worker_id, "Dispatch worker stopped");
}

async fn run_job(provider_kind: ProviderKind, worker_id: usize, provider: &dyn Provider, job: Job) {
    let Job {
        request,
        credential,
        reply,
        enqueued_at,
    } = job;

    debug!(
        request_id = %request.id,
        agent = %request.agent,
        provider = %provider_kind,
        worker_id,
        queue_time_ms = enqueued_at.elapsed().as_millis() as u64,
        "Request dequeued"
    );

    let started = Instant::now();
    let outcome = AssertUnwindSafe(provider.invoke(
        &request.model,
        &request.prompt,
        credential.as_ref(),
        &request.params,
    ))
    .catch_unwind()
    .await;

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => Err(ProviderError::Panicked(panic_message(&*panic))),
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(text) => info!(
            request_id = %request.id,
            agent = %request.agent,
            provider = %provider_kind,
            latency_ms,
            response_len = text.len(),
            "Provider call completed"
        ),
        Err(e) => warn!(
            request_id = %request.id,
            agent = %request.agent,
            provider = %provider_kind,
            latency_ms,
            error = %e,
            "Provider call failed"
        ),
    }

    if reply.send(result).is_err() {
        debug!(request_id = %request.id, "Caller detached, result discarded");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn kind(&self) -> ProviderKind {
            ProviderKind::ClaudeCli
        }

        fn requires_credential(&self) -> bool {
            false
        }

        async fn invoke(
            &self,
            model: &str,
            prompt: &str,
            _credential: Option<&Credential>,
            _params: &CallParams,
        ) -> Result<String, ProviderError> {
            Ok(format!("{model}:{prompt}"))
        }
    }

    struct Keyed;

    #[async_trait]
    impl Provider for Keyed {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn invoke(
            &self,
            _model: &str,
            _prompt: &str,
            credential: Option<&Credential>,
            _params: &CallParams,
        ) -> Result<String, ProviderError> {
            Ok(credential.map(|c| c.expose().len()).unwrap_or(0).to_string())
        }
    }

    fn brain(identity: AgentIdentity, provider: ProviderKind, template: &str) -> crate::Brain {
        crate::Brain {
            identity,
            provider,
            model: "m".to_string(),
            credential: None,
            credential_env: Some("VANTAGE_TEST_KEY".to_string()),
            template: template.to_string(),
            params: CallParams::default(),
        }
    }

    fn limits(provider: ProviderKind) -> ProviderLimits {
        ProviderLimits {
            provider,
            max_concurrent: 1,
            queue_capacity: 4,
        }
    }

    #[tokio::test]
    async fn dispatch_renders_template() {
        let registry = BrainRegistry::new().with(brain(
            AgentIdentity::Stock,
            ProviderKind::ClaudeCli,
            "[{{ horizon }}] {{ input }}",
        ));
        let service = DispatchService::start(
            DispatchSettings::default(),
            registry,
            &[limits(ProviderKind::ClaudeCli)],
            vec![Arc::new(Echo)],
        )
        .unwrap();

        let vars = BTreeMap::from([("horizon".to_string(), "6 months".to_string())]);
        let text = service.dispatch("stock", "AAPL", &vars).await.unwrap();
        assert_eq!(text, "m:[6 months] AAPL");
    }

    #[tokio::test]
    async fn template_error_surfaces() {
        let registry = BrainRegistry::new().with(brain(
            AgentIdentity::Stock,
            ProviderKind::ClaudeCli,
            "{{ input }} {{ horizon }}",
        ));
        let service = DispatchService::start(
            DispatchSettings::default(),
            registry,
            &[limits(ProviderKind::ClaudeCli)],
            vec![Arc::new(Echo)],
        )
        .unwrap();

        let err = service
            .dispatch_as(AgentIdentity::Stock, "x", &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "template");
    }

    #[tokio::test]
    async fn unknown_name_is_config_error() {
        let service = DispatchService::start(
            DispatchSettings::default(),
            BrainRegistry::new(),
            &[],
            vec![],
        )
        .unwrap();

        let err = service.dispatch("oracle", "x", &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Config(m) if m.contains("oracle")));
    }

    #[tokio::test]
    async fn missing_credential_is_config_error() {
        let registry =
            BrainRegistry::new().with(brain(AgentIdentity::Sector, ProviderKind::OpenAi, "{{ input }}"));
        let service = DispatchService::start(
            DispatchSettings::default(),
            registry,
            &[limits(ProviderKind::OpenAi)],
            vec![Arc::new(Keyed)],
        )
        .unwrap();

        let err = service
            .dispatch_as(AgentIdentity::Sector, "x", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Config(m) if m.contains("VANTAGE_TEST_KEY")));
        assert!(!service.can_serve(AgentIdentity::Sector));
        assert!(!service.can_serve(AgentIdentity::Chief));
    }

    #[tokio::test]
    async fn credential_reaches_provider() {
        let mut keyed = brain(AgentIdentity::Sector, ProviderKind::OpenAi, "{{ input }}");
        keyed.credential = Some(Credential::new("abcd"));
        let service = DispatchService::start(
            DispatchSettings::default(),
            BrainRegistry::new().with(keyed),
            &[limits(ProviderKind::OpenAi)],
            vec![Arc::new(Keyed)],
        )
        .unwrap();

        let text = service
            .dispatch_as(AgentIdentity::Sector, "x", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(text, "4");
        assert!(service.can_serve(AgentIdentity::Sector));
    }

    #[tokio::test]
    async fn start_rejects_missing_limits() {
        let registry =
            BrainRegistry::new().with(brain(AgentIdentity::Chief, ProviderKind::ClaudeCli, "{{ input }}"));
        let result = DispatchService::start(
            DispatchSettings::default(),
            registry,
            &[],
            vec![Arc::new(Echo)],
        );
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[tokio::test]
    async fn start_rejects_zero_limits() {
        let result = DispatchService::start(
            DispatchSettings::default(),
            BrainRegistry::new(),
            &[ProviderLimits {
                provider: ProviderKind::ClaudeCli,
                max_concurrent: 0,
                queue_capacity: 1,
            }],
            vec![Arc::new(Echo)],
        );
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_fails() {
        let registry =
            BrainRegistry::new().with(brain(AgentIdentity::Chief, ProviderKind::ClaudeCli, "{{ input }}"));
        let service = DispatchService::start(
            DispatchSettings::default(),
            registry,
            &[limits(ProviderKind::ClaudeCli)],
            vec![Arc::new(Echo)],
        )
        .unwrap();

        service.shutdown().await;
        let err = service
            .dispatch_as(AgentIdentity::Chief, "x", &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Shutdown);
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic payload");
    }
}
