//! Table-backed `SessionStore`.

use std::sync::Arc;

use async_trait::async_trait;

use sessionstore_core::session::{
    expiration, plan_write, ttl_in_range, Clock, ExtraFields, PayloadCodec, Result, RowUpdate,
    SessionData, SessionId, SessionRow, SessionStore, SessionTable, StoreError, SystemClock,
    TableError,
};

use crate::config::StoreConfig;
use crate::observer::{NoopObserver, StoreObserver, TracingObserver};
use crate::sweeper::{sweep_once, ExpirySweeper};

/// Derives extra column values for a row from its payload.
///
/// Called on every `set` with the row about to be written (without extra
/// fields) and the cleartext payload.
pub type ExtendDefaultFields = Arc<dyn Fn(&SessionRow, &SessionData) -> ExtraFields + Send + Sync>;

/// Session store over a relational session table.
///
/// Payloads are encrypted before they reach the table. The store owns the
/// expiry sweeper, which is cancelled when the store is dropped.
pub struct TableStore<T: SessionTable + 'static> {
    table: Arc<T>,
    codec: PayloadCodec,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn StoreObserver>,
    expiration: chrono::Duration,
    check_expiration_interval: std::time::Duration,
    disable_touch: bool,
    extend_default_fields: Option<ExtendDefaultFields>,
    sweeper: ExpirySweeper,
}

impl<T: SessionTable + 'static> TableStore<T> {
    pub fn builder() -> StoreBuilder<T> {
        StoreBuilder::new()
    }

    /// The underlying table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Create the session table if it does not exist.
    pub async fn sync(&self) -> Result<()> {
        self.table.sync().await?;
        tracing::debug!("Session table synced");
        Ok(())
    }

    /// Delete expired rows now. Returns the number of deleted rows.
    pub async fn clear_expired(&self) -> Result<u64> {
        sweep_once(
            self.table.as_ref(),
            self.clock.as_ref(),
            self.observer.as_ref(),
        )
        .await
    }

    /// (Re)start the expiry sweeper with the configured interval.
    ///
    /// Cancels any running schedule first. With a zero interval the sweeper
    /// just stays stopped.
    pub fn start_expiry_sweeper(&self) -> Result<()> {
        require_runtime()?;
        self.sweeper.start(self.check_expiration_interval);
        Ok(())
    }

    /// Cancel the expiry sweeper.
    pub fn stop_expiry_sweeper(&self) {
        self.sweeper.stop();
        tracing::debug!("Expiry sweeper stopped");
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the sweeper, waiting for a sweep in flight to finish.
    pub async fn close(&self) {
        self.sweeper.shutdown().await;
        tracing::debug!("Session store closed");
    }

    /// Build the row a `set` wants to store.
    fn candidate_row(&self, sid: &SessionId, data: &SessionData) -> Result<SessionRow> {
        let expires = expiration(data, self.clock.now(), self.expiration);
        let blob = self.codec.encode(data)?;
        let mut row = SessionRow::new(sid.clone(), blob, expires);

        if let Some(extend) = &self.extend_default_fields {
            row.extra = extend(&row, data);
        }

        Ok(row)
    }

    /// Update an existing row if anything differs from `candidate`.
    async fn write_existing(&self, stored: SessionRow, candidate: SessionRow) -> Result<SessionRow> {
        let plan = plan_write(&stored, &candidate);

        if !plan.changed {
            self.observer.on_write_skip(&stored.sid);
            return Ok(stored);
        }

        self.table.update(&stored.sid, &plan.update).await?;
        tracing::debug!(sid = %stored.sid, "Session updated");

        let mut row = stored;
        plan.update.apply_to(&mut row);
        Ok(row)
    }
}

#[async_trait]
impl<T: SessionTable + 'static> SessionStore for TableStore<T> {
    async fn get(&self, sid: &SessionId) -> Result<Option<SessionData>> {
        let Some(row) = self.table.find_one(sid).await? else {
            self.observer.on_lookup_miss(sid);
            return Ok(None);
        };

        let data = self.codec.decode(&row.data).map_err(|e| {
            tracing::warn!(%sid, error = %e, "Failed to decode session data");
            StoreError::from(e)
        })?;

        Ok(Some(data))
    }

    async fn set(&self, sid: &SessionId, data: &SessionData) -> Result<SessionRow> {
        let candidate = self.candidate_row(sid, data)?;

        match self.table.find_or_create(&candidate).await {
            Ok((row, true)) => {
                tracing::debug!(%sid, expires = %row.expires, "Session created");
                Ok(row)
            }
            Ok((stored, false)) => self.write_existing(stored, candidate).await,
            Err(TableError::AlreadyExists { .. }) => {
                // Another writer created the row between our lookup and insert
                tracing::debug!(%sid, "Session created concurrently, retrying as update");
                match self.table.find_one(sid).await? {
                    Some(stored) => self.write_existing(stored, candidate).await,
                    None => Err(TableError::AlreadyExists {
                        sid: sid.to_string(),
                    }
                    .into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn touch(&self, sid: &SessionId, data: &SessionData) -> Result<()> {
        if self.disable_touch {
            return Ok(());
        }

        let expires = expiration(data, self.clock.now(), self.expiration);
        let affected = self
            .table
            .update(sid, &RowUpdate::expires_only(expires))
            .await?;

        tracing::trace!(%sid, affected, "Session touched");
        Ok(())
    }

    async fn destroy(&self, sid: &SessionId) -> Result<()> {
        let deleted = self.table.destroy(sid).await?;
        tracing::debug!(%sid, deleted, "Session destroyed");
        Ok(())
    }

    async fn length(&self) -> Result<u64> {
        Ok(self.table.count().await?)
    }
}

/// Builder for [`TableStore`].
///
/// A table and a secret are required. Everything else has defaults:
/// the system clock, and the tracing observer when `debug` is set.
pub struct StoreBuilder<T> {
    table: Option<T>,
    config: StoreConfig,
    clock: Option<Arc<dyn Clock>>,
    observer: Option<Arc<dyn StoreObserver>>,
    extend_default_fields: Option<ExtendDefaultFields>,
}

impl<T: SessionTable + 'static> Default for StoreBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SessionTable + 'static> StoreBuilder<T> {
    pub fn new() -> Self {
        Self {
            table: None,
            config: StoreConfig::default(),
            clock: None,
            observer: None,
            extend_default_fields: None,
        }
    }

    pub fn with_table(mut self, table: T) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Install a custom observer. Takes precedence over the `debug` option.
    pub fn with_observer(mut self, observer: Arc<dyn StoreObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_extend_default_fields<F>(mut self, extend: F) -> Self
    where
        F: Fn(&SessionRow, &SessionData) -> ExtraFields + Send + Sync + 'static,
    {
        self.extend_default_fields = Some(Arc::new(extend));
        self
    }

    /// Build the store and start the expiry sweeper.
    ///
    /// Fails with `StoreError::Configuration` when the table or the secret is
    /// missing, when `table` names a different table than the one given,
    /// when `expiration` cannot be stored, or when the sweeper is enabled
    /// outside a tokio runtime.
    pub fn build(self) -> Result<TableStore<T>> {
        let table = self.table.ok_or_else(|| {
            StoreError::Configuration("a session table is required".to_string())
        })?;
        if let Some(name) = &self.config.table {
            if name != table.table_name() {
                return Err(StoreError::Configuration(format!(
                    "configured table '{}' does not match the table handle '{}'",
                    name,
                    table.table_name()
                )));
            }
        }
        let secret = self
            .config
            .secret
            .as_deref()
            .ok_or_else(|| StoreError::Configuration("a secret is required".to_string()))?;
        let codec = PayloadCodec::new(secret)?;

        let expiration = chrono::Duration::from_std(self.config.expiration).map_err(|e| {
            StoreError::Configuration(format!("expiration out of range: {e}"))
        })?;

        if self.config.sweeper_enabled() {
            require_runtime()?;
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        if !ttl_in_range(clock.now(), expiration) {
            return Err(StoreError::Configuration(format!(
                "expiration of {} ms reaches past year 9999",
                self.config.expiration.as_millis()
            )));
        }
        let observer: Arc<dyn StoreObserver> = match self.observer {
            Some(observer) => observer,
            None if self.config.debug => Arc::new(TracingObserver),
            None => Arc::new(NoopObserver),
        };

        let table = Arc::new(table);
        let sweeper = ExpirySweeper::new(
            Arc::clone(&table) as Arc<dyn SessionTable>,
            Arc::clone(&clock),
            Arc::clone(&observer),
        );

        let store = TableStore {
            table,
            codec,
            clock,
            observer,
            expiration,
            check_expiration_interval: self.config.check_expiration_interval,
            disable_touch: self.config.disable_touch,
            extend_default_fields: self.extend_default_fields,
            sweeper,
        };

        if self.config.sweeper_enabled() {
            store.sweeper.start(store.check_expiration_interval);
        }

        tracing::debug!(
            table = store.table.table_name(),
            disable_touch = store.disable_touch,
            "Session store ready"
        );

        Ok(store)
    }
}

fn require_runtime() -> Result<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| {
            StoreError::Configuration("the expiry sweeper needs a tokio runtime".to_string())
        })
}
