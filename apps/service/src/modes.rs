//! Wiring of the three run modes

use std::sync::Arc;

use anyhow::Context;
use sitewatch::{
    AlertEngine, AlertPolicy, CheckerScheduler, HttpProber, MemoryStateStore, MetricsRecorder,
    Notifier, ProbePool, ResultConsumer, ResultPublisher, ShardedAlertEngine, Shutdown,
    StateStore, StaticTargetSource, SystemClock, TargetSource, memory_channel,
};
use tracing::info;

use crate::adapters::{
    HttpTargetSource, RedisStateStore, RedisStreamConsumer, RedisStreamPublisher, notifiers,
    redis,
};
use crate::config::{AlertConfig, CheckerConfig, Config};

/// Results buffered between the two halves in standalone mode
const STANDALONE_CHANNEL_CAPACITY: usize = 1024;

fn target_source(config: &CheckerConfig) -> anyhow::Result<Arc<dyn TargetSource>> {
    Ok(match &config.api_url {
        Some(api_url) => {
            let source = HttpTargetSource::new(api_url).context("failed to build registry client")?;
            info!(endpoint = %source.endpoint(), "Reading targets from site registry");
            Arc::new(source)
        }
        None => {
            info!(count = config.targets.len(), "Using targets from configuration");
            Arc::new(StaticTargetSource::new(config.targets.clone()))
        }
    })
}

fn scheduler(
    config: &CheckerConfig,
    publisher: Arc<dyn ResultPublisher>,
    metrics: Arc<dyn MetricsRecorder>,
) -> anyhow::Result<CheckerScheduler> {
    let prober = HttpProber::new(config.timeout()).context("failed to build HTTP prober")?;
    let pool = ProbePool::new(Arc::new(prober), publisher, metrics.clone(), config.workers);

    Ok(CheckerScheduler::new(target_source(config)?, pool, metrics, config.interval()))
}

fn alert_engine(
    config: &AlertConfig,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsRecorder>,
) -> ShardedAlertEngine {
    let policy = AlertPolicy::new(config.cooldown(), config.reminders);
    let engine = AlertEngine::new(store, notifier, metrics, Arc::new(SystemClock), policy);
    ShardedAlertEngine::new(Arc::new(engine), config.shards)
}

/// Probe on schedule and publish every result to the Redis stream.
pub async fn run_checker(
    config: &Config,
    metrics: Arc<dyn MetricsRecorder>,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let conn = redis::connect(&config.redis.url).await.context("failed to connect to Redis")?;
    let publisher = Arc::new(RedisStreamPublisher::new(conn, &config.redis));
    let scheduler = scheduler(&config.checker, publisher, metrics)?;

    info!(
        interval_secs = config.checker.interval_secs,
        workers = config.checker.workers,
        stream = %config.redis.stream,
        "Starting checker"
    );
    scheduler.run(shutdown).await;
    Ok(())
}

/// Consume results from the Redis stream and send alerts.
pub async fn run_alert(
    config: &Config,
    metrics: Arc<dyn MetricsRecorder>,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let conn = redis::connect(&config.redis.url).await.context("failed to connect to Redis")?;
    // blocking stream reads get a connection of their own
    let reader = redis::connect(&config.redis.url).await.context("failed to connect to Redis")?;
    let consumer = RedisStreamConsumer::new(reader, conn.clone(), &config.redis)
        .await
        .context("failed to join consumer group")?;
    let store = Arc::new(RedisStateStore::new(conn, config.redis.state_ttl_secs));
    let notifier = notifiers::from_config(&config.notifier).context("failed to build notifier")?;
    let engine = alert_engine(&config.alert, store, notifier, metrics);

    info!(
        consumer = %consumer.consumer_name(),
        shards = engine.shards(),
        "Starting alert consumer"
    );
    let consumer: Arc<dyn ResultConsumer> = Arc::new(consumer);
    engine.run(consumer, shutdown).await;
    Ok(())
}

/// Run both halves in this process with in-memory transport and state.
pub async fn run_standalone(
    config: &Config,
    metrics: Arc<dyn MetricsRecorder>,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let (publisher, consumer) = memory_channel(STANDALONE_CHANNEL_CAPACITY);
    let scheduler = scheduler(&config.checker, Arc::new(publisher), metrics.clone())?;
    let notifier = notifiers::from_config(&config.notifier).context("failed to build notifier")?;
    let engine = alert_engine(&config.alert, Arc::new(MemoryStateStore::new()), notifier, metrics);

    info!(
        interval_secs = config.checker.interval_secs,
        workers = config.checker.workers,
        "Starting standalone pipeline"
    );
    let consumer: Arc<dyn ResultConsumer> = Arc::new(consumer);
    tokio::join!(scheduler.run(shutdown.clone()), engine.run(consumer, shutdown));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sitewatch::{NoopMetrics, Target};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_targets_without_api_url() {
        let config = CheckerConfig {
            targets: vec![Target::new("1", "https://a.test")],
            ..Default::default()
        };

        let targets = target_source(&config).unwrap().list_active_targets().await.unwrap();
        assert_eq!(targets, vec![Target::new("1", "https://a.test")]);
    }

    #[tokio::test]
    async fn test_standalone_probes_and_stops_on_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.checker.targets = vec![
            Target::new("1", format!("{}/a", server.uri())),
            Target::new("2", format!("{}/b", server.uri())),
        ];

        let (trigger, shutdown) = sitewatch::shutdown::channel();
        let running = tokio::spawn(async move {
            run_standalone(&config, Arc::new(NoopMetrics), shutdown).await
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while server.received_requests().await.map_or(0, |r| r.len()) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
