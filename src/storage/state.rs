//! Typed access to persisted monitor state.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::capture::SelectedRegion;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::identifiers::TabId;

use super::{Storage, keys};

// ============================================================================
// StateStore
// ============================================================================

/// Typed view over a [`Storage`] backend.
///
/// Values that fail to deserialize are logged and read as absent.
#[derive(Clone)]
pub struct StateStore {
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl StateStore {
    /// Wraps a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Returns the underlying backend.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.storage.get(key).await? else {
            return Ok(None);
        };

        if value.is_null() {
            return Ok(None);
        }

        match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed stored value");
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let mut items = Map::new();
        items.insert(key.to_string(), serde_json::to_value(value)?);
        self.storage.set(items).await
    }
}

// ============================================================================
// StateStore - Panel State
// ============================================================================

/// Keys owned by the control panel. The coordinator only reads most of
/// them; [`record_start`](StateStore::record_start),
/// [`set_monitoring`](StateStore::set_monitoring) and
/// [`tab_url`](StateStore::tab_url) are the panel-side accessors for
/// panels embedded in the same process.
impl StateStore {
    /// Tab chosen in the panel.
    pub async fn tab_id(&self) -> Result<Option<TabId>> {
        self.read(keys::TAB_ID).await
    }

    /// URL of the chosen tab. Read by the panel; the coordinator does not
    /// use it.
    pub async fn tab_url(&self) -> Result<Option<String>> {
        self.read(keys::TAB_URL).await
    }

    /// Records the panel's start request: tab, url, settings, and a zeroed
    /// counter.
    ///
    /// Panel-side writer; call before sending `startMonitoring`.
    pub async fn record_start(
        &self,
        tab_id: TabId,
        tab_url: &str,
        config: &MonitorConfig,
    ) -> Result<()> {
        debug!(tab_id = %tab_id, "Persisting monitor start");

        let mut items = Map::new();
        items.insert(keys::IS_MONITORING.into(), json!(true));
        items.insert(keys::TAB_ID.into(), json!(tab_id));
        items.insert(keys::TAB_URL.into(), json!(tab_url));
        items.insert(
            keys::DELAY_AFTER_LOAD.into(),
            json!(config.delay_after_load.as_secs()),
        );
        items.insert(
            keys::SIMILARITY_THRESHOLD.into(),
            json!(config.similarity_threshold),
        );
        items.insert(keys::REFRESH_COUNT.into(), json!(0));
        self.storage.set(items).await
    }

    /// Settings stored by the panel, with defaults for missing values.
    pub async fn monitor_config(&self) -> Result<MonitorConfig> {
        let delay = self.read::<u64>(keys::DELAY_AFTER_LOAD).await?;
        let threshold = self.read::<f64>(keys::SIMILARITY_THRESHOLD).await?;
        Ok(MonitorConfig::from_persisted(delay, threshold))
    }

    /// Stored similarity threshold, if any.
    pub async fn similarity_threshold(&self) -> Result<Option<f64>> {
        self.read(keys::SIMILARITY_THRESHOLD).await
    }

    /// Whether monitoring was active when last persisted.
    pub async fn is_monitoring(&self) -> Result<bool> {
        Ok(self.read(keys::IS_MONITORING).await?.unwrap_or(false))
    }

    /// Persists the monitoring flag. Panel-side writer; the coordinator
    /// clears it through [`record_stopped`](Self::record_stopped).
    pub async fn set_monitoring(&self, monitoring: bool) -> Result<()> {
        self.write(keys::IS_MONITORING, monitoring).await
    }

    /// Persisted poll counter.
    pub async fn refresh_count(&self) -> Result<u64> {
        Ok(self.read(keys::REFRESH_COUNT).await?.unwrap_or(0))
    }

    /// Persists the poll counter.
    pub async fn set_refresh_count(&self, count: u64) -> Result<()> {
        self.write(keys::REFRESH_COUNT, count).await
    }

    /// Marks monitoring stopped and clears the counter.
    pub async fn record_stopped(&self) -> Result<()> {
        let mut items = Map::new();
        items.insert(keys::IS_MONITORING.into(), json!(false));
        items.insert(keys::REFRESH_COUNT.into(), json!(0));
        self.storage.set(items).await
    }
}

// ============================================================================
// StateStore - Region & Reference
// ============================================================================

impl StateStore {
    /// The selected region.
    pub async fn selected_area(&self) -> Result<Option<SelectedRegion>> {
        self.read(keys::SELECTED_AREA).await
    }

    /// Persists the selected region.
    pub async fn set_selected_area(&self, region: SelectedRegion) -> Result<()> {
        self.write(keys::SELECTED_AREA, region).await
    }

    /// The reference image data URL.
    pub async fn reference_image(&self) -> Result<Option<String>> {
        Ok(self
            .read::<String>(keys::ORIGINAL_SCREENSHOT)
            .await?
            .filter(|data_url| !data_url.is_empty()))
    }

    /// Returns `true` if a reference image is stored.
    pub async fn has_reference_image(&self) -> Result<bool> {
        Ok(self.reference_image().await?.is_some())
    }

    /// Overwrites the reference image.
    pub async fn set_reference_image(&self, data_url: &str) -> Result<()> {
        self.write(keys::ORIGINAL_SCREENSHOT, data_url).await
    }

    /// Deletes the reference image.
    pub async fn clear_reference_image(&self) -> Result<()> {
        self.storage.remove(keys::ORIGINAL_SCREENSHOT).await
    }
}

// ============================================================================
// Tests
// ============================================================================
