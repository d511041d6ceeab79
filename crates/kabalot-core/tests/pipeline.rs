use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::RgbImage;
use kabalot_core::exchange::FixedRates;
use kabalot_core::models::config::{BatchConfig, NormalizationConfig};
use kabalot_core::{
    ConfigFile, ExpenseType, FakeExtractionClient, FakeUploader, KabalotConfig, KabalotError,
    Pipeline,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use tempfile::TempDir;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn scan(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::new(8, 8).save(&path).unwrap();
    path
}

fn config(root: &Path) -> KabalotConfig {
    ConfigFile {
        input_dirs: vec![root.join("in")],
        output_dir: Some(root.join("out")),
        upload_path: Some("/Invoices".to_string()),
        ledger_path: Some(root.join("ledger.csv")),
        normalization: NormalizationConfig {
            vehicle_plates: vec!["12-345-67".to_string()],
            ..Default::default()
        },
        batch: BatchConfig { file_jobs: 1 },
        ..Default::default()
    }
    .resolve()
    .unwrap()
}

fn scripted() -> FakeExtractionClient {
    FakeExtractionClient::new()
        .with_page(
            "a.png",
            0,
            json!({
                "ספק": "משרד ופרינט",
                "invoice_summary": {
                    "total_charge": 117,
                    "vat_amount": 17,
                    "invoice_number": "1001",
                    "expense_type": "office"
                }
            }),
        )
        .with_page(
            "b.png",
            0,
            json!({
                "חניון": "עזריאלי",
                "רכב": "12-345-67",
                "invoice_summary": {
                    "total_charge": 18,
                    "invoice_number": "1001",
                    "expense_type": "parking"
                }
            }),
        )
        .with_page("c.png", 0, json!([1, 2, 3]))
        .with_raw("d.png", 0, "I cannot read this receipt.")
        .with_page(
            "e.png",
            0,
            json!({
                "item": "boots",
                "invoice_summary": {
                    "total_charge": 50,
                    "invoice_number": "INV/7",
                    "currency": "USD",
                    "expense_type": "clothing"
                }
            }),
        )
}

fn seed_inputs(root: &Path) {
    let input = root.join("in");
    std::fs::create_dir_all(&input).unwrap();
    for name in ["a.png", "b.png", "c.png", "d.png", "e.png", ".scan.png"] {
        scan(&input, name);
    }
    std::fs::write(input.join("notes.txt"), "not an invoice").unwrap();
}

#[tokio::test]
async fn test_batch_isolates_failures_and_rebuilds_ledger() {
    let root = TempDir::new().unwrap();
    seed_inputs(root.path());

    let extractor = Arc::new(scripted());
    let uploader = Arc::new(FakeUploader::new());
    let rates = Arc::new(FixedRates::default().with_rate("USD", d("3.7")));
    let pipeline = Pipeline::new(
        config(root.path()),
        extractor.clone(),
        uploader.clone(),
        rates,
    );

    let report = pipeline.run_batch().await.unwrap();

    assert_eq!(report.attempted, 6);
    assert!(!report.is_clean());

    let ids: Vec<_> = report.persisted.iter().map(|p| p.storage_id.as_str()).collect();
    assert_eq!(ids, vec!["1001", "1001_1", "INV_7"]);

    let mut failed: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["c.png", "d.png", "notes.txt"]);
    for failure in &report.failures {
        let name = failure.path.file_name().unwrap().to_string_lossy().into_owned();
        match name.as_str() {
            "c.png" => assert!(matches!(failure.error, KabalotError::Normalization(_))),
            "d.png" => assert!(matches!(failure.error, KabalotError::Extraction(_))),
            _ => assert!(matches!(failure.error, KabalotError::UnsupportedFormat { .. })),
        }
    }

    // Unsupported and hidden files never reach the extraction service
    let extracted: Vec<_> = extractor.calls().into_iter().map(|(name, _)| name).collect();
    assert_eq!(extracted, vec!["a.png", "b.png", "c.png", "d.png", "e.png"]);
    assert_eq!(uploader.uploads().len(), 3);

    let parking = pipeline.store().load("1001_1").unwrap();
    let summary = parking.summary().unwrap();
    assert_eq!(summary.type_code, ExpenseType::Parking);
    assert_eq!(summary.total_charge, d("18"));
    assert_eq!(summary.related_items, Some(1));
    assert_eq!(summary.total_items, Some(1));
    assert_eq!(summary.dropbox_link.as_deref(), Some("https://dropbox.test/s/b.png"));

    let foreign = pipeline.store().load("INV_7").unwrap();
    let summary = foreign.summary().unwrap();
    assert_eq!(summary.currency.as_deref(), Some("USD"));
    assert_eq!(summary.exchange_rate, Some(d("3.7")));

    let ledger = report.ledger.unwrap();
    assert_eq!(ledger.rows.len(), 3);
    assert_eq!(ledger.skipped, 0);

    let csv = std::fs::read_to_string(root.path().join("ledger.csv")).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "type_code,total_charge,company_id,invoice_number,date_of_invoice,input_file,dropbox_link,expense_type"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("office,117.00,,1001,,"));
    assert!(lines[1].ends_with(",https://dropbox.test/s/a.png,Office expenses"));
    assert!(lines[2].starts_with("parking,18.00,,1001,,"));
    assert!(lines[3].starts_with("clothing,50.00,,INV/7,,"));

    let rollup = std::fs::read_to_string(root.path().join("ledger_rollup.csv")).unwrap();
    assert!(rollup.contains("parking,18.00,1"));
    assert!(!root.path().join("ledger.csv.lock").exists());
}

#[tokio::test]
async fn test_upload_failure_still_persists_record() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in");
    std::fs::create_dir_all(&input).unwrap();
    scan(&input, "a.png");

    let pipeline = Pipeline::new(
        config(root.path()),
        Arc::new(scripted()),
        Arc::new(FakeUploader::failing("token expired")),
        Arc::new(FixedRates::default()),
    );

    let report = pipeline.run_batch().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.persisted.len(), 1);
    assert_eq!(report.persisted[0].dropbox_link, None);

    let record = pipeline.store().load("1001").unwrap();
    let summary = record.summary().unwrap();
    assert_eq!(summary.dropbox_link, None);
    assert!(summary.notes.iter().any(|n| n.contains("upload failed")));

    let csv = std::fs::read_to_string(root.path().join("ledger.csv")).unwrap();
    assert!(csv.lines().nth(1).unwrap().starts_with("office,117.00,"));
}

#[tokio::test]
async fn test_missing_input_directory_is_a_config_error() {
    let root = TempDir::new().unwrap();

    let pipeline = Pipeline::new(
        config(root.path()),
        Arc::new(FakeExtractionClient::new()),
        Arc::new(FakeUploader::new()),
        Arc::new(FixedRates::default()),
    );

    let err = pipeline.run_batch().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(!root.path().join("ledger.csv").exists());
}

#[tokio::test]
async fn test_process_file_reports_pages_and_progress() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in");
    std::fs::create_dir_all(&input).unwrap();
    let path = scan(&input, "e.png");

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let pipeline = Pipeline::new(
        config(root.path()),
        Arc::new(scripted()),
        Arc::new(FakeUploader::new()),
        Arc::new(FixedRates::default()),
    )
    .with_progress(Arc::new(move |path: &Path, ok: bool| {
        sink.lock().unwrap().push((path.to_path_buf(), ok));
    }));

    let report = pipeline.run_files(vec![path.clone()]).await;
    assert_eq!(report.persisted[0].pages, 1);
    assert_eq!(report.persisted[0].storage_id, "INV_7");

    // No rate configured for USD: the record is kept and the gap noted
    let record = pipeline.store().load("INV_7").unwrap();
    let summary = record.summary().unwrap();
    assert_eq!(summary.exchange_rate, None);
    assert!(summary.notes.iter().any(|n| n.contains("no exchange rate")));

    assert_eq!(*seen.lock().unwrap(), vec![(path, true)]);
}

#[tokio::test]
async fn test_amount_overflow_fails_only_that_file() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in");
    std::fs::create_dir_all(&input).unwrap();
    let good = scan(&input, "a.png");
    let huge = scan(&input, "f.png");

    let extractor = scripted().with_page(
        "f.png",
        0,
        json!({
            "items": [
                {"description": "A", "amount": "79228162514264337593543950335"},
                {"description": "B", "amount": "1"}
            ],
            "invoice_summary": {"total_charge": 1, "expense_type": "supplies"}
        }),
    );
    let pipeline = Pipeline::new(
        config(root.path()),
        Arc::new(extractor),
        Arc::new(FakeUploader::new()),
        Arc::new(FixedRates::default()),
    );

    let report = pipeline.run_files(vec![good, huge.clone()]).await;

    assert_eq!(report.persisted.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, huge);
    assert!(matches!(report.failures[0].error, KabalotError::Normalization(_)));
    assert_eq!(report.ledger.unwrap().rows.len(), 1);
}
