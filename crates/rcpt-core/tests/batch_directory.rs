//! End-to-end directory runs against a scripted provider.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use pretty_assertions::assert_eq;

use rcpt_core::models::config::RcptConfig;
use rcpt_core::{
    BatchEvent, BatchProcessor, ExtractedRecord, ExtractionError, FieldName, FileOutcome, RcptError,
    ScriptedClient,
};

fn fast_config() -> RcptConfig {
    let mut config = RcptConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.pacing_delay_ms = 0;
    config.retry.poll_interval_ms = 1;
    config
}

fn record(date: &str, place: &str, amount: &str, currency: &str) -> Result<ExtractedRecord, ExtractionError> {
    Ok(ExtractedRecord {
        date: Some(date.to_string()),
        place: Some(place.to_string()),
        amount: Some(amount.to_string()),
        currency: Some(currency.to_string()),
        raw_text: Some(format!(r#"{{"date": "{}", "place": "{}"}}"#, date, place)),
    })
}

fn starbucks() -> Result<ExtractedRecord, ExtractionError> {
    record("2023-05-16", "Starbucks Gangnam", "6,500", "KRW")
}

fn png_bytes() -> Vec<u8> {
    let mut data = Vec::new();
    DynamicImage::new_rgb8(16, 12)
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .unwrap();
    data
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_one_processed_one_auth_failure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"%PDF-1.4 GOOD").unwrap();
    fs::write(dir.path().join("b.pdf"), b"%PDF-1.4 BADKEY").unwrap();

    let client = Arc::new(
        ScriptedClient::new()
            .when_contains("GOOD", starbucks())
            .when_contains("BADKEY", Err(ExtractionError::Auth("403 Forbidden".into()))),
    );
    let processor = BatchProcessor::new(client.clone(), &fast_config());
    let summary = processor.process_directory(dir.path()).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(client.calls(), 2);

    let failed = summary.failed_files();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].0.ends_with("b.pdf"));
    assert!(failed[0].1.contains("API key"));

    let renamed = dir.path().join("230516_Starbucks_Gangnam_6500_KRW.pdf");
    assert!(renamed.exists());
    assert_eq!(summary.outcomes[0].final_path(), Some(renamed.as_path()));
    assert!(dir.path().join("b.pdf").exists());

    let temp = dir.path().join("temp_ocr_processing");
    assert_eq!(names(&temp), vec!["a.json", "a.txt"]);

    let artifact: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.join("a.json")).unwrap()).unwrap();
    assert_eq!(artifact["place"], "Starbucks_Gangnam");
    assert_eq!(artifact["amount"], 6500);
    assert_eq!(artifact["provider"], "scripted");
    assert_eq!(artifact["final_path"], renamed.display().to_string());
}

#[tokio::test]
async fn test_image_is_converted_and_original_removed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scan.png"), png_bytes()).unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(record("20240302", "GS25", "1200", "KRW")));
    let summary = BatchProcessor::new(client, &fast_config())
        .process_directory(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert!(!dir.path().join("scan.png").exists());

    let renamed = dir.path().join("240302_GS25_1200_KRW.pdf");
    let bytes = fs::read(&renamed).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_unconvertible_image_fails_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_broken.jpg"), b"not really a jpeg").unwrap();
    fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    let summary = BatchProcessor::new(client.clone(), &fast_config())
        .process_directory(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(client.calls(), 1);
    assert!(summary.failed_files()[0].1.contains("conversion"));
    assert!(dir.path().join("a_broken.jpg").exists());
}

#[tokio::test]
async fn test_collisions_get_numeric_suffix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("one.pdf"), b"1").unwrap();
    fs::write(dir.path().join("two.pdf"), b"2").unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    BatchProcessor::new(client, &fast_config())
        .process_directory(dir.path())
        .await
        .unwrap();

    let files: Vec<String> = names(dir.path())
        .into_iter()
        .filter(|n| n.ends_with(".pdf"))
        .collect();
    assert_eq!(
        files,
        vec![
            "230516_Starbucks_Gangnam_6500_KRW.pdf",
            "230516_Starbucks_Gangnam_6500_KRW_1.pdf",
        ]
    );
}

#[tokio::test]
async fn test_missing_fields_fall_back_and_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("blurry.pdf"), b"x").unwrap();

    let mut config = fast_config();
    config.normalize.default_currency = None;
    let client = Arc::new(ScriptedClient::new().repeat(Ok(ExtractedRecord::empty())));
    let summary = BatchProcessor::new(client, &config)
        .process_directory(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    for field in FieldName::ALL {
        assert_eq!(summary.missing_count(field), 1);
    }
    assert!(dir.path().join("blurry_receipt.pdf").exists());
    assert_eq!(summary.files_with_missing().len(), 1);
}

#[tokio::test]
async fn test_rerun_skips_existing_json_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let mut config = fast_config();
    config.batch.rename_on_success = false;

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    let processor = BatchProcessor::new(client.clone(), &config);

    let first = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(first.outcomes[0].final_path(), None);
    assert!(dir.path().join("a.pdf").exists());

    let second = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(client.calls(), 1);

    config.batch.force = true;
    let forced = BatchProcessor::new(client.clone(), &config)
        .process_directory(dir.path())
        .await
        .unwrap();
    assert_eq!(forced.processed, 1);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_rerun_after_rename_does_not_extract_again() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("scan.pdf"), b"%PDF-1.4").unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    let processor = BatchProcessor::new(client.clone(), &fast_config());

    let first = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(first.processed, 1);
    assert!(dir.path().join("230516_Starbucks_Gangnam_6500_KRW.pdf").exists());

    let second = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(second.total, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(client.calls(), 1);
    assert_eq!(
        names(dir.path())
            .into_iter()
            .filter(|n| n.ends_with(".pdf"))
            .collect::<Vec<_>>(),
        vec!["230516_Starbucks_Gangnam_6500_KRW.pdf"]
    );
}

#[tokio::test]
async fn test_shared_stems_keep_separate_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"JPEG receipt").unwrap();
    fs::write(dir.path().join("a.pdf"), b"PDF receipt").unwrap();

    let mut config = fast_config();
    config.batch.rename_on_success = false;
    config.batch.convert_images = false;

    let client = Arc::new(
        ScriptedClient::new()
            .when_contains("JPEG", record("20240101", "Bakery", "3000", "KRW"))
            .when_contains("PDF", record("20240202", "Books", "15000", "KRW")),
    );
    let processor = BatchProcessor::new(client.clone(), &config);
    let first = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(first.processed, 2);

    let temp = dir.path().join("temp_ocr_processing");
    assert_eq!(names(&temp), vec!["a.json", "a.pdf.json", "a.pdf.txt", "a.txt"]);

    let read = |name: &str| -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(temp.join(name)).unwrap()).unwrap()
    };
    assert_eq!(read("a.json")["place"], "Bakery");
    assert_eq!(read("a.pdf.json")["place"], "Books");

    let second = processor.process_directory(dir.path()).await.unwrap();
    assert_eq!(second.skipped, 2);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_stop_during_last_backoff_marks_run_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let mut config = fast_config();
    config.retry.initial_delay_ms = 60_000;
    let client = Arc::new(ScriptedClient::new().repeat(Err(ExtractionError::RateLimited { retry_after: None })));
    let processor = BatchProcessor::new(client.clone(), &config);

    let stop = processor.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop.stop();
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let summary = processor
        .process_directory_with_events(dir.path(), tx)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.skipped, 1);
    assert!(summary.outcomes[0].is_cancelled());
    assert_eq!(client.calls(), 1);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.iter().any(|e| matches!(e, BatchEvent::Cancelled { remaining: 0 })));
}

#[tokio::test]
async fn test_copy_mode_keeps_source_and_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let mut config = fast_config();
    config.batch.output_dir = Some(out.path().join("renamed"));
    config.batch.write_summary = true;

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    BatchProcessor::new(client, &config)
        .process_directory(dir.path())
        .await
        .unwrap();

    assert!(dir.path().join("a.pdf").exists());
    let renamed = out.path().join("renamed");
    assert_eq!(
        names(&renamed),
        vec!["230516_Starbucks_Gangnam_6500_KRW.pdf", "summary.csv"]
    );
}

#[tokio::test]
async fn test_sustained_rate_limit_fails_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let mut config = fast_config();
    config.retry.max_retries = 3;
    let client = Arc::new(ScriptedClient::new().repeat(Err(ExtractionError::RateLimited { retry_after: None })));
    let summary = BatchProcessor::new(client.clone(), &config)
        .process_directory(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(client.calls(), 3);
    assert!(summary.failed_files()[0].1.contains("3 attempts"));
    assert!(dir.path().join("a.pdf").exists());
    assert!(!dir.path().join("temp_ocr_processing").exists());
}

#[tokio::test]
async fn test_spawned_run_reports_events() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();
    fs::write(dir.path().join("b.pdf"), b"b").unwrap();

    let client = Arc::new(
        ScriptedClient::new()
            .with_results([Err(ExtractionError::RateLimited { retry_after: None })])
            .repeat(starbucks()),
    );
    let mut task = BatchProcessor::new(client, &fast_config()).spawn_directory(dir.path().to_path_buf());

    let mut events = Vec::new();
    while let Some(event) = task.events.recv().await {
        events.push(event);
    }
    let summary = task.handle.await.unwrap().unwrap();
    assert_eq!(summary.processed, 2);

    assert!(matches!(events.first(), Some(BatchEvent::Started { total: 2 })));
    assert!(matches!(events.last(), Some(BatchEvent::Completed { .. })));
    let started = events.iter().filter(|e| matches!(e, BatchEvent::FileStarted { .. })).count();
    let limited = events.iter().filter(|e| matches!(e, BatchEvent::RateLimited { attempt: 1, .. })).count();
    let paused = events.iter().filter(|e| matches!(e, BatchEvent::Paused { .. })).count();
    assert_eq!(started, 2);
    assert_eq!(limited, 1);
    assert_eq!(paused, 1);
}

#[tokio::test]
async fn test_stop_before_start_cancels_everything() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(starbucks()));
    let processor = BatchProcessor::new(client.clone(), &fast_config());
    processor.stop_handle().stop();

    let summary = processor.process_directory(dir.path()).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new());
    let result = BatchProcessor::new(client, &fast_config())
        .process_directory(&dir.path().join("missing"))
        .await;
    assert!(matches!(result, Err(RcptError::Input(_))));
}

#[tokio::test]
async fn test_process_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipt.pdf");
    fs::write(&path, b"x").unwrap();

    let client = Arc::new(ScriptedClient::new().repeat(record("250101", "Cafe", "12.50", "usd")));
    let processor = BatchProcessor::new(client, &fast_config());
    let outcome = processor.process_file(&path).await.unwrap();

    match outcome {
        FileOutcome::Processed { final_path, record, .. } => {
            assert_eq!(final_path, Some(dir.path().join("250101_Cafe_12.5_USD.pdf")));
            assert!(record.missing_fields.is_empty());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let unsupported = dir.path().join("notes.txt");
    fs::write(&unsupported, b"x").unwrap();
    assert!(matches!(
        processor.process_file(&unsupported).await,
        Err(RcptError::Input(_))
    ));
}
