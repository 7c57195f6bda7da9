//! Runs one device group through every stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use iapfeed_artifact::{
    compress, run_xmllint, validate_structure, write_artifact, ArtifactBuilder, BuildOptions,
};
use iapfeed_cache::CacheStore;
use iapfeed_common::DeviceGroup;
use iapfeed_config::{resolve_group, FeedConfig, ResolvedGroup};
use iapfeed_inventory::{GroupFetch, InventoryClient, InventorySettings};
use iapfeed_reconcile::{
    MySqlScopeSource, ReconcilePolicy, ScopeSource, StaticScopeSource, SubnetReconciler,
};
use iapfeed_upload::{ImportOutcome, UploadSession, UploadSettings};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::lock::RunLocks;
use crate::run::{write_status, GenerationRun, RunState};

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Bypass the cache for every inventory call.
    pub force_refresh: bool,
    /// Stop after compression; the run completes without uploading.
    pub no_upload: bool,
}

/// The pipeline driver.
///
/// Owns the cache, the inventory client and the scope source for its
/// lifetime. Groups may run concurrently through one driver; a second run of
/// the same group is refused.
pub struct Pipeline {
    config: FeedConfig,
    cache: Arc<CacheStore>,
    inventory: InventoryClient,
    scopes: Arc<dyn ScopeSource>,
    reconciler: SubnetReconciler,
    locks: RunLocks,
}

impl Pipeline {
    /// Creates a driver from explicit collaborators.
    pub fn new(
        config: FeedConfig,
        cache: Arc<CacheStore>,
        scopes: Arc<dyn ScopeSource>,
    ) -> Result<Self, PipelineError> {
        let settings = InventorySettings::from_config(&config.inventory, &config.cache)?;
        let inventory = InventoryClient::new(settings, Arc::clone(&cache))?;
        let reconciler = SubnetReconciler::new(ReconcilePolicy::from_config(&config.reconcile));
        Ok(Self {
            config,
            cache,
            inventory,
            scopes,
            reconciler,
            locks: RunLocks::new(),
        })
    }

    /// Creates a driver with the configured cache directory and scope database.
    ///
    /// Without a configured scope database the scope source is empty and
    /// reconciliation only normalizes inventory subnets.
    pub fn from_config(config: FeedConfig) -> Result<Self, PipelineError> {
        let cache = Arc::new(open_cache(&config));
        let scopes: Arc<dyn ScopeSource> = match MySqlScopeSource::from_config(&config.scope_db)? {
            Some(source) => Arc::new(source),
            None => {
                tracing::info!("no scope database configured");
                Arc::new(StaticScopeSource::default())
            }
        };
        Self::new(config, cache, scopes)
    }

    /// The loaded configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// The run locks, shared by every run of this driver.
    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    /// Runs one group to a terminal state.
    ///
    /// Stage failures end the run in `failed` and are returned inside the
    /// [`GenerationRun`]; only a held lock or an unresolvable group is an
    /// `Err`. The status file is rewritten at every transition.
    pub async fn run_group(
        &self,
        group: DeviceGroup,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerationRun, PipelineError> {
        let resolved = resolve_group(&self.config, group)?;
        let _guard = self.locks.acquire(group)?;

        let mut run = GenerationRun::new(group, Utc::now());
        self.persist(&run);
        match self.execute(&resolved, options, cancel, &mut run).await {
            Ok(()) => run.complete(Utc::now()),
            Err(e) => run.fail(e, Utc::now()),
        }
        self.persist(&run);
        Ok(run)
    }

    async fn execute(
        &self,
        group: &ResolvedGroup,
        options: RunOptions,
        cancel: &CancellationToken,
        run: &mut GenerationRun,
    ) -> Result<(), PipelineError> {
        self.advance(run, RunState::Fetching, cancel)?;
        let fetched = self
            .inventory
            .fetch_group(group.group, group.inventory_group, options.force_refresh)
            .await?;
        for dropped in fetched.dropped {
            run.record_device_failure(dropped.name, dropped.reason);
        }

        self.advance(run, RunState::Reconciling, cancel)?;
        tracing::info!(source = %self.scopes.describe(), "loading scope rows");
        let rows = self.scopes.load_scopes().await?;
        let report = self.reconciler.reconcile(fetched.devices, &rows);
        run.scope_rows_skipped = report.skipped_rows.len();

        self.advance(run, RunState::Building, cancel)?;
        let builder = ArtifactBuilder::new(BuildOptions {
            xml_groups: group.xml_groups.clone(),
            juniper: self.config.vendors.juniper.clone(),
            nokia: self.config.vendors.nokia.clone(),
        });
        let document = builder.build(&report.devices)?;
        for rejected in &document.rejected {
            run.record_device_failure(rejected.name.clone(), rejected.reason.clone());
        }
        run.devices_without_loopback = document.skipped_no_loopback.len();
        run.device_count = document.included.len();
        let xml_path = write_artifact(
            &self.config.output.dir,
            &group.file_prefix,
            Utc::now().date_naive(),
            &document.xml,
        )?;
        run.output_path = Some(xml_path.clone());

        self.advance(run, RunState::Validating, cancel)?;
        let summary = validate_structure(&document.xml)?;
        tracing::debug!(iaps = summary.iaps, networks = summary.networks, "structure valid");
        if let Some(schema) = self.config.output.schema.clone() {
            let xmllint = self.config.output.xmllint.clone();
            let file = xml_path.clone();
            tokio::task::spawn_blocking(move || run_xmllint(&xmllint, &schema, &file))
                .await
                .map_err(|e| PipelineError::Task {
                    reason: e.to_string(),
                })??;
        }
        run.compressed_path = Some(compress(&xml_path)?);

        if options.no_upload {
            tracing::info!(group = %group.group, "upload disabled for this run");
            return Ok(());
        }

        self.advance(run, RunState::Uploading, cancel)?;
        let mut session = UploadSession::new(UploadSettings::from_config(&self.config.upload)?)?;
        session.login().await?;
        session.import(&document.xml, &group.upload_groups).await?;
        run.uploaded = true;
        Ok(())
    }

    /// Fetches a group with a forced refresh to pre-populate the cache.
    pub async fn warm(
        &self,
        group: DeviceGroup,
        cancel: &CancellationToken,
    ) -> Result<GroupFetch, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let resolved = resolve_group(&self.config, group)?;
        let fetched = self
            .inventory
            .fetch_group(group, resolved.inventory_group, true)
            .await?;
        Ok(fetched)
    }

    /// Re-uploads an existing artifact for a group.
    pub async fn upload_existing(
        &self,
        group: DeviceGroup,
        file: &Path,
    ) -> Result<ImportOutcome, PipelineError> {
        let resolved = resolve_group(&self.config, group)?;
        let mut session = UploadSession::new(UploadSettings::from_config(&self.config.upload)?)?;
        Ok(session.upload_file(file, &resolved.upload_groups).await?)
    }

    fn advance(
        &self,
        run: &mut GenerationRun,
        state: RunState,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        run.enter(state, Utc::now());
        self.persist(run);
        Ok(())
    }

    fn persist(&self, run: &GenerationRun) {
        if let Err(e) = write_status(&self.config.output.dir, run) {
            tracing::warn!(run = %run.run_id, error = %e, "cannot write run status");
        }
    }
}

/// Opens the configured cache directory.
pub fn open_cache(config: &FeedConfig) -> CacheStore {
    CacheStore::open(&config.cache.dir, Duration::from_secs(config.cache.ttl_secs))
}
