//! Atomic script execution against the shared store.
//!
//! The runner executes a named script by digest and owns the process-local
//! digest table. The store serializes script execution, so each successful
//! call is exactly one atomic run of the algorithm; no partial execution is
//! observable.
//!
//! Digest lifecycle: a "script not cached" reply from the store triggers a
//! reload of the source and a single retry by digest. With no cached digest
//! (cold start, reconnect in progress) the runner registers the source first
//! so the first use heals the cache, and falls back to evaluating the full
//! source when even registration fails. Lost updates on the table are benign:
//! both writers compute the same digest for the same source.

use std::collections::HashMap;

use deadpool_redis::redis::{ErrorKind, RedisError, RedisResult, Value, cmd};
use deadpool_redis::{Connection, Pool};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::script::{ScriptKind, ScriptRegistry};

/// Executes registry scripts atomically on the shared store.
pub struct ScriptRunner {
    pool: Pool,
    registry: ScriptRegistry,
    digests: RwLock<HashMap<ScriptKind, String>>,
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("cached", &self.digests.read().len())
            .finish()
    }
}

impl ScriptRunner {
    /// Create a runner over the given pool and registry.
    pub fn new(pool: Pool, registry: ScriptRegistry) -> Self {
        Self {
            pool,
            registry,
            digests: RwLock::new(HashMap::new()),
        }
    }

    /// The registry backing this runner.
    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    /// Digest currently cached for a script, if any.
    pub fn cached_digest(&self, kind: ScriptKind) -> Option<String> {
        self.digests.read().get(&kind).cloned()
    }

    /// Register all four scripts with the store and replace the digest table.
    ///
    /// Called once the connection is ready. Failures are logged and
    /// non-fatal; the fallback path in [`invoke`](Self::invoke) heals the
    /// cache on first use.
    pub async fn preload(&self) {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "script preload skipped");
                return;
            }
        };

        let mut table = HashMap::with_capacity(ScriptKind::ALL.len());
        for kind in ScriptKind::ALL {
            match Self::load_script(&mut conn, self.registry.source(kind)).await {
                Ok(digest) => {
                    table.insert(kind, digest);
                }
                Err(err) => warn!(script = %kind, error = %err, "failed to preload script"),
            }
        }

        *self.digests.write() = table;
    }

    /// Run a script atomically with the given keys and arguments.
    ///
    /// Returns the raw store reply; the algorithm wrappers decode it.
    pub async fn invoke(&self, kind: ScriptKind, keys: &[&str], args: &[String]) -> Result<Value> {
        let cached = self.cached_digest(kind);
        let mut conn = self.connection().await?;

        match cached {
            Some(digest) => {
                match Self::eval_by_digest(&mut conn, &digest, keys, args).await {
                    Ok(value) => Ok(value),
                    Err(err) if is_noscript(&err) => {
                        debug!(script = %kind, "store lost the script cache, reloading");
                        let digest = Self::load_script(&mut conn, self.registry.source(kind))
                            .await
                            .map_err(into_store_error)?;
                        self.digests.write().insert(kind, digest.clone());
                        Self::eval_by_digest(&mut conn, &digest, keys, args)
                            .await
                            .map_err(into_store_error)
                            .map_err(Into::into)
                    }
                    Err(err) => Err(into_store_error(err).into()),
                }
            }
            None => {
                match Self::load_script(&mut conn, self.registry.source(kind)).await {
                    Ok(digest) => {
                        self.digests.write().insert(kind, digest.clone());
                        Self::eval_by_digest(&mut conn, &digest, keys, args)
                            .await
                            .map_err(into_store_error)
                            .map_err(Into::into)
                    }
                    // Registration refused; evaluate the full source, which
                    // the store caches as a side effect.
                    Err(_) => Self::eval_source(&mut conn, self.registry.source(kind), keys, args)
                        .await
                        .map_err(into_store_error)
                        .map_err(Into::into),
                }
            }
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|_| StoreError::PoolExhausted.into())
    }

    async fn load_script(conn: &mut Connection, source: &str) -> RedisResult<String> {
        cmd("SCRIPT")
            .arg("LOAD")
            .arg(source)
            .query_async(&mut **conn)
            .await
    }

    async fn eval_by_digest(
        conn: &mut Connection,
        digest: &str,
        keys: &[&str],
        args: &[String],
    ) -> RedisResult<Value> {
        let mut call = cmd("EVALSHA");
        call.arg(digest).arg(keys.len()).arg(keys).arg(args);
        call.query_async(&mut **conn).await
    }

    async fn eval_source(
        conn: &mut Connection,
        source: &str,
        keys: &[&str],
        args: &[String],
    ) -> RedisResult<Value> {
        let mut call = cmd("EVAL");
        call.arg(source).arg(keys.len()).arg(keys).arg(args);
        call.query_async(&mut **conn).await
    }
}

/// The store does not have this digest cached.
fn is_noscript(err: &RedisError) -> bool {
    err.kind() == ErrorKind::NoScriptError
}

/// Map a store client error, tagging transport failures as retryable.
pub(crate) fn into_store_error(err: RedisError) -> StoreError {
    let retryable = err.is_timeout() || err.is_connection_dropped() || err.is_io_error();
    StoreError::operation_failed(err.to_string(), retryable)
}
