//! Redis backed transport and state storage.
//!
//! Check results travel over a Redis Stream read through a consumer group, so several
//! alert processes can share the load and unacknowledged entries are redelivered to the
//! consumer that claimed them. Per-URL alert state lives in plain string keys.

use std::collections::VecDeque;

use async_trait::async_trait;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError, aio::MultiplexedConnection};
use sitewatch::{
    CheckResult, Delivery, Error, Result, ResultConsumer, ResultPublisher, StateStore, TargetState,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{RedisConfig, mask_url};

/// Entries fetched per XREADGROUP call
const READ_BATCH: usize = 32;

const STATE_KEY_PREFIX: &str = "site_status:";

fn channel_error(e: RedisError) -> Error {
    Error::Channel(e.to_string())
}

fn store_error(e: RedisError) -> Error {
    Error::StateStore(e.to_string())
}

/// Open a multiplexed connection, shared by clones.
pub async fn connect(url: &str) -> std::result::Result<MultiplexedConnection, RedisError> {
    debug!(url = %mask_url(url), "Connecting to Redis");
    let client = Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    info!(url = %mask_url(url), "Connected to Redis");
    Ok(conn)
}

/// Appends results to a stream, one entry per result.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
    stream: String,
    max_len: Option<usize>,
}

impl RedisStreamPublisher {
    pub fn new(conn: MultiplexedConnection, config: &RedisConfig) -> Self {
        Self { conn, stream: config.stream.clone(), max_len: config.stream_max_len }
    }
}

#[async_trait]
impl ResultPublisher for RedisStreamPublisher {
    async fn publish(&self, result: &CheckResult) -> Result<()> {
        let items = [("url", result.url.as_bytes().to_vec()), ("payload", result.to_json()?)];
        let mut conn = self.conn.clone();

        let id: String = match self.max_len {
            Some(max_len) => conn
                .xadd_maxlen(&self.stream, StreamMaxlen::Approx(max_len), "*", &items)
                .await
                .map_err(channel_error)?,
            None => conn.xadd(&self.stream, "*", &items).await.map_err(channel_error)?,
        };

        debug!(url = %result.url, id = %id, "Result appended to stream");
        Ok(())
    }
}

struct ReadState {
    buffer: VecDeque<Delivery>,
    /// Position in this consumer's pending list; `None` once it has been drained
    pending_cursor: Option<String>,
}

/// Reads results as one named consumer of a consumer group.
///
/// Entries delivered to this consumer before a restart and never acknowledged are handed
/// out again first, then new entries are read.
///
/// `XREADGROUP ... BLOCK` stalls every command queued behind it on the same connection,
/// so reads go over a dedicated `reader` connection and acknowledgements over `conn`,
/// which may be shared with other users such as the state store.
pub struct RedisStreamConsumer {
    reader: MultiplexedConnection,
    conn: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    block_ms: usize,
    state: Mutex<ReadState>,
}

impl RedisStreamConsumer {
    /// Join (and if needed create) the consumer group.
    ///
    /// `reader` must not be used by anything else.
    pub async fn new(
        reader: MultiplexedConnection,
        conn: MultiplexedConnection,
        config: &RedisConfig,
    ) -> Result<Self> {
        let consumer = config.consumer_name();
        let mut setup = conn.clone();

        let created: std::result::Result<(), RedisError> =
            setup.xgroup_create_mkstream(&config.stream, &config.group, "0").await;
        match created {
            Ok(()) => info!(stream = %config.stream, group = %config.group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream = %config.stream, group = %config.group, "Consumer group already exists")
            }
            Err(e) => return Err(channel_error(e)),
        }

        info!(stream = %config.stream, group = %config.group, consumer = %consumer, "Joined consumer group");
        Ok(Self {
            reader,
            conn,
            stream: config.stream.clone(),
            group: config.group.clone(),
            consumer,
            block_ms: config.block_ms,
            state: Mutex::new(ReadState {
                buffer: VecDeque::new(),
                pending_cursor: Some("0".to_string()),
            }),
        })
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer
    }

    async fn read(&self, from: &str, block: bool) -> Result<Vec<Delivery>> {
        let mut options =
            StreamReadOptions::default().group(&self.group, &self.consumer).count(READ_BATCH);
        if block {
            options = options.block(self.block_ms);
        }

        let mut reader = self.reader.clone();
        let reply: Option<StreamReadReply> = reader
            .xread_options(&[&self.stream], &[from], &options)
            .await
            .map_err(channel_error)?;

        Ok(reply.map(into_deliveries).unwrap_or_default())
    }
}

/// Flatten a read reply into deliveries, keeping stream order.
fn into_deliveries(reply: StreamReadReply) -> Vec<Delivery> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| {
            // entries trimmed away while pending come back without fields
            let payload = entry.get::<Vec<u8>>("payload").unwrap_or_default();
            Delivery { id: entry.id, payload }
        })
        .collect()
}

#[async_trait]
impl ResultConsumer for RedisStreamConsumer {
    async fn next_delivery(&self) -> Result<Option<Delivery>> {
        let mut state = self.state.lock().await;

        loop {
            if let Some(delivery) = state.buffer.pop_front() {
                return Ok(Some(delivery));
            }

            match state.pending_cursor.clone() {
                Some(cursor) => {
                    let deliveries = self.read(&cursor, false).await?;
                    match deliveries.last() {
                        Some(last) => {
                            warn!(count = deliveries.len(), "Redelivering unacknowledged results");
                            state.pending_cursor = Some(last.id.clone());
                        }
                        None => state.pending_cursor = None,
                    }
                    state.buffer.extend(deliveries);
                }
                None => {
                    let deliveries = self.read(">", true).await?;
                    state.buffer.extend(deliveries);
                }
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(&self.stream, &self.group, &[&delivery.id])
            .await
            .map_err(channel_error)?;
        Ok(())
    }
}

/// Per-URL alert state as JSON strings under `site_status:<url>`.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: MultiplexedConnection,
    ttl_secs: Option<u64>,
}

impl RedisStateStore {
    pub fn new(conn: MultiplexedConnection, ttl_secs: Option<u64>) -> Self {
        Self { conn, ttl_secs }
    }
}

pub fn state_key(url: &str) -> String {
    format!("{STATE_KEY_PREFIX}{url}")
}

/// Parse a stored record. Unreadable records count as absent.
fn decode_state(url: &str, raw: &str) -> Option<TargetState> {
    match serde_json::from_str(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(url = %url, error = %e, "Discarding unreadable stored state");
            None
        }
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, url: &str) -> Result<Option<TargetState>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(state_key(url)).await.map_err(store_error)?;
        Ok(raw.and_then(|raw| decode_state(url, &raw)))
    }

    async fn set(&self, url: &str, state: TargetState) -> Result<()> {
        let value = serde_json::to_string(&state)?;
        let mut conn = self.conn.clone();

        match self.ttl_secs {
            Some(ttl) => {
                let _: () = conn.set_ex(state_key(url), value, ttl).await.map_err(store_error)?;
            }
            None => {
                let _: () = conn.set(state_key(url), value).await.map_err(store_error)?;
            }
        }
        Ok(())
    }
}
