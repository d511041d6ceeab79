//! Batch driver: discovery, bounded concurrency, per-file failure isolation and the final
//! ledger rebuild.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, ExtractionError, KabalotError, Result};
use crate::exchange::{self, ExchangeRates};
use crate::extraction::{ExtractionClient, OpenAiExtractionClient, RawPageResult};
use crate::invoice::InvoiceNormalizer;
use crate::ledger::{Ledger, SummaryAggregator};
use crate::models::config::KabalotConfig;
use crate::raster::{DocumentKind, DocumentRasterizer, PageImage};
use crate::secrets::Secrets;
use crate::store::{RecordStore, StorageId};
use crate::upload::{DropboxUploader, StorageUploader};

/// A successfully processed input file.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub source: PathBuf,
    pub storage_id: StorageId,
    pub pages: usize,
    pub dropbox_link: Option<String>,
}

/// A file that could not be processed, with its cause.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: KabalotError,
}

/// What a batch run did.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub persisted: Vec<PersistedRecord>,
    pub failures: Vec<FileFailure>,
    /// The rebuilt ledger, when aggregation succeeded.
    pub ledger: Option<Ledger>,
    pub ledger_error: Option<KabalotError>,
}

impl BatchReport {
    /// Every file persisted and the ledger rebuilt.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.ledger_error.is_none()
    }
}

/// Called once per finished file with its path and whether it was persisted.
pub type ProgressCallback = Arc<dyn Fn(&Path, bool) + Send + Sync>;

/// The invoice pipeline: rasterize, extract, normalize, upload, persist, aggregate.
pub struct Pipeline {
    config: Arc<KabalotConfig>,
    rasterizer: Arc<DocumentRasterizer>,
    extractor: Arc<dyn ExtractionClient>,
    normalizer: InvoiceNormalizer,
    store: RecordStore,
    uploader: Arc<dyn StorageUploader>,
    permits: Arc<Semaphore>,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: KabalotConfig,
        extractor: Arc<dyn ExtractionClient>,
        uploader: Arc<dyn StorageUploader>,
        rates: Arc<dyn ExchangeRates>,
    ) -> Self {
        let rasterizer = Arc::new(DocumentRasterizer::new(config.raster.clone()));
        let normalizer = InvoiceNormalizer::new(config.normalization.clone(), rates);
        let store = RecordStore::new(config.output_dir.clone(), config.store.clone());
        let permits = Arc::new(Semaphore::new(config.extraction.max_concurrent_requests));

        Self {
            config: Arc::new(config),
            rasterizer,
            extractor,
            normalizer,
            store,
            uploader,
            permits,
            progress: None,
        }
    }

    /// Assemble a pipeline talking to the configured services.
    pub fn from_config(config: KabalotConfig, secrets: &Secrets) -> Result<Self> {
        let extractor = OpenAiExtractionClient::new(&config.extraction, secrets.openai.clone())?;
        let uploader = DropboxUploader::new(&config.upload_path, secrets.dropbox.clone())?;
        let rates = exchange::from_config(&config.exchange)?;
        Ok(Self::new(config, Arc::new(extractor), Arc::new(uploader), rates))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &KabalotConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn aggregator(&self) -> SummaryAggregator {
        SummaryAggregator::new(self.store.clone(), self.config.ledger_path.clone())
    }

    /// Files directly inside the input directories, sorted. Hidden files are skipped.
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for dir in &self.config.input_dirs {
            if !dir.is_dir() {
                return Err(ConfigError::Invalid {
                    option: "input_dirs".to_string(),
                    reason: format!("{} is not a directory", dir.display()),
                }
                .into());
            }

            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
                if path.is_file() && !hidden {
                    files.push(path);
                }
            }
        }
        files.sort();
        debug!(count = files.len(), "Discovered input files");
        Ok(files)
    }

    async fn extract_page(&self, page: &PageImage) -> std::result::Result<RawPageResult, ExtractionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        debug!(file = %page.source.display(), page = page.index, "Extracting page");
        self.extractor.extract(page).await
    }

    /// Run one file through the pipeline up to a stored record.
    pub async fn process_file(&self, path: &Path) -> Result<PersistedRecord> {
        // Unsupported files never reach the rasterizer or the extraction service
        DocumentKind::classify(path)?;

        let rasterizer = Arc::clone(&self.rasterizer);
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&owned))
            .await
            .map_err(|e| KabalotError::Task(e.to_string()))??;
        let page_count = pages.len();

        let raw = join_all(pages.iter().map(|page| self.extract_page(page)))
            .await
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(pages);

        let mut record = self.normalizer.normalize(raw, path).await?;

        let link = match self.uploader.upload(path).await {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Upload failed; storing record without link");
                if let Some(summary) = record.summary_mut() {
                    summary.notes.push(format!("upload failed: {e}"));
                }
                None
            }
        };
        if let Some(summary) = record.summary_mut() {
            summary.dropbox_link = link.clone();
        }

        let storage_id = self.store.persist(&record)?;

        Ok(PersistedRecord {
            source: path.to_path_buf(),
            storage_id,
            pages: page_count,
            dropbox_link: link,
        })
    }

    /// Process the given files, then rebuild the ledger.
    pub async fn run_files(&self, files: Vec<PathBuf>) -> BatchReport {
        let mut report = BatchReport {
            attempted: files.len(),
            ..Default::default()
        };
        info!(files = files.len(), jobs = self.config.batch.file_jobs, "Starting batch");

        let mut results = stream::iter(files)
            .map(|path| async move {
                let result = self.process_file(&path).await;
                (path, result)
            })
            .buffer_unordered(self.config.batch.file_jobs);

        while let Some((path, result)) = results.next().await {
            if let Some(progress) = &self.progress {
                progress(&path, result.is_ok());
            }
            match result {
                Ok(persisted) => {
                    info!(
                        file = %path.display(),
                        id = %persisted.storage_id,
                        pages = persisted.pages,
                        "Invoice stored"
                    );
                    report.persisted.push(persisted);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Invoice failed");
                    report.failures.push(FileFailure { path, error: e });
                }
            }
        }

        match self.aggregator().aggregate() {
            Ok(ledger) => report.ledger = Some(ledger),
            Err(e) => {
                error!(error = %e, "Ledger rebuild failed");
                report.ledger_error = Some(e.into());
            }
        }

        info!(
            attempted = report.attempted,
            persisted = report.persisted.len(),
            failed = report.failures.len(),
            "Batch finished"
        );
        report
    }

    /// Discover every input file and run the batch.
    pub async fn run_batch(&self) -> Result<BatchReport> {
        let files = self.discover_inputs()?;
        Ok(self.run_files(files).await)
    }
}
