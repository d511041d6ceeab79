//! Core library for invoice and receipt processing.
//!
//! This crate provides:
//! - Document rasterization (PDF pages and single images)
//! - Page extraction through a document-understanding service
//! - Invoice normalization (classification, vehicle attribution, VAT, currency)
//! - Collision-safe record storage and cloud upload of originals
//! - Ledger aggregation to CSV or xlsx

pub mod error;
pub mod exchange;
pub mod extraction;
pub mod invoice;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod raster;
pub mod secrets;
pub mod store;
pub mod upload;

pub use error::{KabalotError, Result};
pub use extraction::{ExtractionClient, FakeExtractionClient, OpenAiExtractionClient, RawPageResult};
pub use invoice::InvoiceNormalizer;
pub use ledger::{Ledger, LedgerRow, RollupRow, SummaryAggregator};
pub use models::config::{ConfigFile, KabalotConfig};
pub use models::invoice::{ExpenseType, InvoiceRecord, InvoiceSummary, PageResult, VatStatus};
pub use pipeline::{BatchReport, FileFailure, PersistedRecord, Pipeline};
pub use raster::{DocumentKind, DocumentRasterizer, PageImage};
pub use secrets::{Secret, Secrets};
pub use store::{RecordStore, StorageId};
pub use upload::{DropboxUploader, FakeUploader, StorageUploader};
