use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use tokio::task::JoinHandle;

use crate::{
    config::AppConfig,
    events::{EventPublisher, HttpEventPublisher},
    infrastructure::{
        directories::ResolvedPaths, instance_guard::InstanceGuard, shutdown::Shutdown,
    },
    labeling::LabelingClient,
    routing::{self, LocalBus, RuleSet},
    tasks::{processor::MessageProcessor, queue::SpoolQueue, worker::QueueWorker},
};

pub struct RouterApp {
    _guard: InstanceGuard,
    queue: Arc<SpoolQueue>,
    worker_handle: JoinHandle<()>,
    shutdown: Shutdown,
}

impl RouterApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let guard = InstanceGuard::acquire(&paths.data_dir)?;

        let http_client = Client::builder()
            .user_agent(format!("image-label-router/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let detector = Arc::new(LabelingClient::new(
            http_client.clone(),
            config.labeling.clone(),
        ));
        let publisher = build_publisher(&http_client, &config);

        let processor = Arc::new(MessageProcessor::new(detector, publisher, &config));
        let queue = Arc::new(SpoolQueue::new(
            paths.inbox_dir.clone(),
            paths.dead_letter_dir.clone(),
            config.queue.max_receive_count,
        ));
        let worker = Arc::new(QueueWorker::new(queue.clone(), processor, &config.queue));
        let worker_handle = worker.spawn(shutdown.subscribe());

        tracing::info!(
            target: "lifecycle",
            inbox = %paths.inbox_dir.display(),
            bus = %config.bus.bus_name,
            detail_type = %config.bus.detail_type,
            min_confidence = config.labeling.min_confidence,
            max_labels = config.labeling.max_labels,
            batch_size = config.queue.batch_size,
            "initialised"
        );

        Ok(Self {
            _guard: guard,
            queue,
            worker_handle,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let RouterApp {
            _guard,
            queue,
            mut worker_handle,
            shutdown,
        } = self;

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);

        tokio::select! {
            reason = shutdown_listener.notified() => {
                tracing::info!(target: "lifecycle", ?reason, "shutdown requested");
            }
            res = &mut worker_handle => {
                if let Err(err) = res {
                    tracing::error!(
                        target: "lifecycle",
                        error = %err,
                        "queue worker ended unexpectedly"
                    );
                }
                return Ok(());
            }
        }

        let worker_sleep = tokio::time::sleep(shutdown_timeout);
        tokio::pin!(worker_sleep);
        tokio::select! {
            res = &mut worker_handle => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "lifecycle", "queue worker panicked");
                    }
                }
            }
            _ = &mut worker_sleep => {
                tracing::warn!(
                    target: "lifecycle",
                    "queue worker did not stop within {:?}; aborting",
                    shutdown_timeout
                );
                worker_handle.abort();
            }
        }

        let snapshot = queue.snapshot();
        tracing::info!(
            target: "lifecycle",
            in_flight = snapshot.in_flight,
            tracked = snapshot.tracked,
            "router stopped"
        );
        Ok(())
    }
}

fn build_publisher(http: &Client, config: &AppConfig) -> Arc<dyn EventPublisher> {
    match &config.bus.endpoint {
        Some(endpoint) => {
            tracing::info!(
                target: "publisher",
                host = endpoint.host_str().unwrap_or_default(),
                "publishing to remote event bus"
            );
            Arc::new(HttpEventPublisher::new(http.clone(), endpoint.clone()))
        }
        None => {
            tracing::info!(
                target: "publisher",
                bus = %config.bus.bus_name,
                "routing events in-process"
            );
            let rules = RuleSet::priority_rules(&config.bus.detail_type);
            for rule in rules.rules() {
                tracing::debug!(
                    target: "routing",
                    rule = rule.name,
                    topic = %rule.target,
                    labels = ?rule.match_labels,
                    "rule registered"
                );
            }
            let targets = routing::build_targets(http, &config.targets);
            Arc::new(LocalBus::new(
                config.bus.bus_name.clone(),
                rules,
                targets,
                config.targets.delivery_timeout,
            ))
        }
    }
}
