//! Admission control, concurrency and failure behaviour of the dispatch
//! service, driven through a scripted in-process provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use vantage_dispatch::{
    Brain, BrainRegistry, CallParams, Credential, DispatchError, DispatchService,
    DispatchSettings, Provider, ProviderError,
};
use vantage_models::{AgentIdentity, ProviderKind, ProviderLimits};

#[derive(Default)]
struct Probe {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Probe {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

/// Echoes the prompt. `"panic"` panics, prompts starting with `"fail"`
/// return a rate-limit error.
struct Scripted {
    probe: Arc<Probe>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl Provider for Scripted {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ClaudeCli
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn invoke(
        &self,
        _model: &str,
        prompt: &str,
        _credential: Option<&Credential>,
        _params: &CallParams,
    ) -> Result<String, ProviderError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.prompts.lock().unwrap().push(prompt.to_string());
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        tokio::time::sleep(self.delay).await;

        if prompt == "panic" {
            panic!("scripted provider panic");
        }

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.probe.completed.fetch_add(1, Ordering::SeqCst);

        if prompt.starts_with("fail") {
            return Err(ProviderError::RateLimited("quota exhausted".to_string()));
        }
        Ok(format!("echo:{prompt}"))
    }
}

fn brain(identity: AgentIdentity) -> Brain {
    Brain {
        identity,
        provider: ProviderKind::ClaudeCli,
        model: "scripted".to_string(),
        credential: None,
        credential_env: None,
        template: "{{ input }}".to_string(),
        params: CallParams::default(),
    }
}

fn start(
    max_concurrent: usize,
    queue_capacity: usize,
    settings: DispatchSettings,
    provider: Scripted,
) -> Arc<DispatchService> {
    let registry = BrainRegistry::new()
        .with(brain(AgentIdentity::Stock))
        .with(brain(AgentIdentity::Chief));
    let limits = [ProviderLimits {
        provider: ProviderKind::ClaudeCli,
        max_concurrent,
        queue_capacity,
    }];
    Arc::new(DispatchService::start(settings, registry, &limits, vec![Arc::new(provider)]).unwrap())
}

fn spawn_dispatch(
    service: &Arc<DispatchService>,
    input: &str,
) -> tokio::task::JoinHandle<Result<String, DispatchError>> {
    let service = service.clone();
    let input = input.to_string();
    tokio::spawn(async move {
        service
            .dispatch("stock", &input, &BTreeMap::new())
            .await
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition never became true");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn at_most_k_requests_execute_at_once() {
    let probe = Arc::new(Probe::default());
    let service = start(
        2,
        8,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::from_millis(100),
            gate: None,
        },
    );

    let handles: Vec<_> = (0..3).map(|i| spawn_dispatch(&service, &format!("r{i}"))).collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().starts_with("echo:r"));
    }

    assert_eq!(probe.calls(), 3);
    assert_eq!(probe.peak(), 2);
}

#[tokio::test]
async fn single_worker_serializes_provider() {
    let probe = Arc::new(Probe::default());
    let service = start(
        1,
        8,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::from_millis(20),
            gate: None,
        },
    );

    let handles: Vec<_> = (0..4).map(|i| spawn_dispatch(&service, &format!("r{i}"))).collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(probe.peak(), 1);
    assert_eq!(probe.completed(), 4);
}

#[tokio::test]
async fn full_queue_fails_with_backpressure() {
    let probe = Arc::new(Probe::default());
    let gate = Arc::new(Semaphore::new(0));
    let service = start(
        1,
        1,
        DispatchSettings {
            request_timeout: Duration::from_secs(10),
            enqueue_timeout: Duration::from_millis(50),
        },
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: Some(gate.clone()),
        },
    );

    // First request occupies the only worker.
    let first = spawn_dispatch(&service, "first");
    wait_until(|| probe.calls() == 1).await;

    // Second fills the queue.
    let second = spawn_dispatch(&service, "second");
    wait_until(|| service.queue_depth(ProviderKind::ClaudeCli) == 1).await;

    let started = tokio::time::Instant::now();
    let err = service
        .dispatch("stock", "third", &BTreeMap::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Backpressure {
            provider: ProviderKind::ClaudeCli
        }
    );
    assert!(started.elapsed() < Duration::from_secs(2));

    gate.add_permits(10);
    assert_eq!(first.await.unwrap().unwrap(), "echo:first");
    assert_eq!(second.await.unwrap().unwrap(), "echo:second");
    assert_eq!(probe.calls(), 2);
}

#[tokio::test]
async fn unregistered_identity_never_reaches_provider() {
    let probe = Arc::new(Probe::default());
    let service = start(
        1,
        4,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: None,
        },
    );

    let err = service
        .dispatch("oracle", "x", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Config(_)));

    // Known name, but no brain registered for it.
    let err = service
        .dispatch_as(AgentIdentity::Commodities, "x", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Config(_)));

    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn timeout_detaches_caller_but_call_completes() {
    let probe = Arc::new(Probe::default());
    let service = start(
        1,
        4,
        DispatchSettings {
            request_timeout: Duration::from_millis(50),
            enqueue_timeout: Duration::from_secs(1),
        },
        Scripted {
            probe: probe.clone(),
            delay: Duration::from_millis(200),
            gate: None,
        },
    );

    let err = service
        .dispatch("stock", "slow", &BTreeMap::new())
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Timeout(Duration::from_millis(50)));
    assert_eq!(probe.completed(), 0);

    // The worker was not cancelled.
    wait_until(|| probe.completed() == 1).await;
}

#[tokio::test]
async fn provider_error_wraps_upstream_message() {
    let probe = Arc::new(Probe::default());
    let service = start(
        1,
        4,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: None,
        },
    );

    let err = service
        .dispatch_as(AgentIdentity::Chief, "fail now", &BTreeMap::new())
        .await
        .unwrap_err();

    match &err {
        DispatchError::Provider { provider, source } => {
            assert_eq!(*provider, ProviderKind::ClaudeCli);
            assert_eq!(*source, ProviderError::RateLimited("quota exhausted".to_string()));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(err.to_string().contains("quota exhausted"));
}

#[tokio::test]
async fn queue_is_fifo() {
    let probe = Arc::new(Probe::default());
    let gate = Arc::new(Semaphore::new(0));
    let service = start(
        1,
        8,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: Some(gate.clone()),
        },
    );

    let mut handles = vec![spawn_dispatch(&service, "0")];
    wait_until(|| probe.calls() == 1).await;
    for i in 1..5 {
        handles.push(spawn_dispatch(&service, &i.to_string()));
        wait_until(|| service.queue_depth(ProviderKind::ClaudeCli) == i).await;
    }

    gate.add_permits(10);
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(probe.prompts(), vec!["0", "1", "2", "3", "4"]);
}

#[tokio::test]
async fn worker_survives_errors_and_panics() {
    let probe = Arc::new(Probe::default());
    let service = start(
        1,
        4,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: None,
        },
    );
    let vars = BTreeMap::new();

    let err = service.dispatch("stock", "panic", &vars).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Provider {
            source: ProviderError::Panicked(_),
            ..
        }
    ));

    let err = service.dispatch("stock", "fail", &vars).await.unwrap_err();
    assert_eq!(err.kind(), "provider");

    let text = service.dispatch("stock", "still here", &vars).await.unwrap();
    assert_eq!(text, "echo:still here");
    assert_eq!(probe.calls(), 3);
}

#[tokio::test]
async fn shutdown_lets_in_flight_call_finish() {
    let probe = Arc::new(Probe::default());
    let gate = Arc::new(Semaphore::new(0));
    let service = start(
        1,
        4,
        DispatchSettings::default(),
        Scripted {
            probe: probe.clone(),
            delay: Duration::ZERO,
            gate: Some(gate.clone()),
        },
    );

    let in_flight = spawn_dispatch(&service, "last");
    wait_until(|| probe.calls() == 1).await;

    let stopping = {
        let service = service.clone();
        tokio::spawn(async move { service.shutdown().await })
    };

    gate.add_permits(1);
    assert_eq!(in_flight.await.unwrap().unwrap(), "echo:last");
    stopping.await.unwrap();

    let err = service
        .dispatch("stock", "late", &BTreeMap::new())
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Shutdown);
}
