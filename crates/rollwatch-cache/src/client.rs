//! Redis connection over plain TCP.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use rollwatch_core::CacheConfig;

use crate::backend::CacheBackend;
use crate::error::{CacheError, CacheResult};
use crate::resp::{encode_command, read_reply, Reply};

/// Default time allowed to establish the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single Redis connection issuing one command at a time.
#[derive(Debug)]
pub struct RedisClient {
    stream: BufReader<TcpStream>,
}

impl RedisClient {
    /// Connect to `address` (`host:port`).
    pub async fn connect(address: &str, timeout: Duration) -> CacheResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| CacheError::ConnectTimeout(address.to_string()))?
            .map_err(|source| CacheError::Connect {
                address: address.to_string(),
                source,
            })?;
        debug!(%address, "connected to cache");
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    /// Connect per config and switch to the configured database.
    pub async fn open(config: &CacheConfig) -> CacheResult<Self> {
        let mut client = Self::connect(&config.address, CONNECT_TIMEOUT).await?;
        if config.database != 0 {
            client.select(config.database).await?;
        }
        Ok(client)
    }

    /// Send one command and read its reply. Server errors become
    /// [`CacheError::Server`].
    pub async fn command(&mut self, parts: &[&str]) -> CacheResult<Reply> {
        let cmd = encode_command(parts);
        let stream = self.stream.get_mut();
        stream.write_all(&cmd).await?;
        stream.flush().await?;

        match read_reply(&mut self.stream).await? {
            Reply::Error(message) => Err(CacheError::Server {
                command: parts.first().copied().unwrap_or_default().to_string(),
                message,
            }),
            reply => Ok(reply),
        }
    }

    pub async fn select(&mut self, database: u32) -> CacheResult<()> {
        let db = database.to_string();
        let reply = self.command(&["SELECT", db.as_str()]).await?;
        expect_ok("SELECT", reply)
    }
}

fn expect_ok(command: &str, reply: Reply) -> CacheResult<()> {
    match reply {
        Reply::Simple(s) if s == "OK" => Ok(()),
        reply => Err(unexpected(command, reply)),
    }
}

fn unexpected(command: &str, reply: Reply) -> CacheError {
    CacheError::UnexpectedReply {
        command: command.to_string(),
        reply: reply.to_string(),
    }
}

impl CacheBackend for RedisClient {
    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        let reply = self.command(&["SET", key, value]).await?;
        expect_ok("SET", reply)
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> CacheResult<()> {
        let secs = ttl.as_secs().to_string();
        match self.command(&["EXPIRE", key, secs.as_str()]).await? {
            Reply::Integer(1) => Ok(()),
            reply => Err(unexpected("EXPIRE", reply)),
        }
    }

    async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        match self.command(&["GET", key]).await? {
            Reply::Bulk(value) => Ok(value),
            reply => Err(unexpected("GET", reply)),
        }
    }
}

/// A [`RedisClient`] opened on its first command rather than up front.
///
/// A rollout check can poll for a long time before it has anything to
/// write; the connection is only made once the verdict is ready.
#[derive(Debug)]
pub struct LazyClient {
    config: CacheConfig,
    client: Option<RedisClient>,
}

impl LazyClient {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn client(&mut self) -> CacheResult<&mut RedisClient> {
        let client = match self.client.take() {
            Some(client) => client,
            None => RedisClient::open(&self.config).await?,
        };
        Ok(self.client.insert(client))
    }
}

impl CacheBackend for LazyClient {
    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        self.client().await?.set(key, value).await
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> CacheResult<()> {
        self.client().await?.expire(key, ttl).await
    }

    async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        self.client().await?.get(key).await
    }
}
