//! Catalog store: load-once catalog cache plus on-demand DDL lookup.
//!
//! The catalog is read from its backing file on first use and shared as an
//! `Arc<Catalog>` by every workflow run until `invalidate()` is called.

use crate::dir::DatabaseDir;
use crate::CatalogError;
use async_trait::async_trait;
use nq_core::schema::Catalog;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Source of the catalog.
#[async_trait]
pub trait CatalogLoader: Send + Sync {
    async fn load(&self) -> Result<Catalog, CatalogError>;
}

/// Reads the catalog from an M-Schema JSON file.
#[derive(Debug, Clone)]
pub struct FileCatalogLoader {
    path: PathBuf,
}

impl FileCatalogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogLoader for FileCatalogLoader {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::CatalogNotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let catalog: Catalog =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        tracing::info!(
            path = %self.path.display(),
            databases = catalog.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }
}

type Slot = Arc<OnceCell<Arc<Catalog>>>;

pub struct CatalogStore {
    loader: Arc<dyn CatalogLoader>,
    database_dir: DatabaseDir,
    slot: Mutex<Slot>,
}

impl CatalogStore {
    /// Store reading `catalog_path`, with databases under `database_dir`.
    pub fn new(catalog_path: impl Into<PathBuf>, database_dir: impl Into<PathBuf>) -> Self {
        Self::with_loader(
            Arc::new(FileCatalogLoader::new(catalog_path)),
            DatabaseDir::new(database_dir),
        )
    }

    pub fn with_loader(loader: Arc<dyn CatalogLoader>, database_dir: DatabaseDir) -> Self {
        Self {
            loader,
            database_dir,
            slot: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    pub fn database_dir(&self) -> &DatabaseDir {
        &self.database_dir
    }

    fn current_slot(&self) -> Slot {
        Arc::clone(&self.slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// The catalog, loaded on the first call. Concurrent first calls share a
    /// single load; later calls return the same `Arc`.
    pub async fn load_catalog(&self) -> Result<Arc<Catalog>, CatalogError> {
        let slot = self.current_slot();
        let catalog = slot
            .get_or_try_init(|| async {
                tracing::debug!("Catalog cache miss, loading");
                self.loader.load().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(catalog))
    }

    pub fn is_loaded(&self) -> bool {
        self.current_slot().initialized()
    }

    /// Drop the cached catalog; the next `load_catalog` reloads it.
    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
        tracing::info!("Catalog cache invalidated");
    }

    /// Full DDL for one database. Not cached.
    pub async fn get_detailed_schema(&self, db: &str) -> Result<String, CatalogError> {
        let dir = self.database_dir.clone();
        let db = db.to_string();
        tokio::task::spawn_blocking(move || dir.detailed_schema(&db))
            .await
            .map_err(|e| CatalogError::Internal(format!("schema task failed: {e}")))?
    }

    pub async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        let dir = self.database_dir.clone();
        tokio::task::spawn_blocking(move || dir.list())
            .await
            .map_err(|e| CatalogError::Internal(format!("listing task failed: {e}")))?
    }

    pub async fn get_tables(&self, db: &str) -> Result<Vec<String>, CatalogError> {
        let dir = self.database_dir.clone();
        let db = db.to_string();
        tokio::task::spawn_blocking(move || dir.tables(&db))
            .await
            .map_err(|e| CatalogError::Internal(format!("tables task failed: {e}")))?
    }
}
