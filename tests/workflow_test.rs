// Workflow tests against the fixture portal.
// The browser-driven ones need Chrome and chromedriver and only run with `--ignored`.

use serial_test::serial;
use shipflow::config::{Config, Timeouts};
use shipflow::progress::{Progress, Stage};
use shipflow::reconcile::MethodCount;
use shipflow::types::{Credentials, TaskId};
use shipflow::workflows::{run_label_barcodes, run_store_scan, run_wms_scrape};
use tempfile::TempDir;

use portal_server::{BROKEN_PIN, WMS_ROWS, barcode_for, ensure_portal_server};

fn fixture_config(base_url: &str, diagnostics: &TempDir) -> Config {
    let mut config = Config::default();
    config.session.headless = true;
    config.diagnostics_dir = Some(diagnostics.path().to_path_buf());
    config.timeouts = Timeouts {
        element_ms: 5_000,
        interactable_ms: 1_000,
        login_marker_ms: 5_000,
        navigation_ms: 10_000,
        row_presence_ms: 3_000,
        page_refresh_ms: 5_000,
        poll_interval_ms: 200,
        scroll_settle_ms: 200,
        task_detect_ms: 20_000,
        artifact_ready_ms: 20_000,
        new_window_ms: 5_000,
        print_settle_ms: 500,
        item_ack_ms: 2_000,
        item_pause_ms: 100,
    };
    config.wms.login.url = format!("{}/wms/", base_url);
    config.label.login.url = format!("{}/label/task/", base_url);
    config.store.login.url = format!("{}/store/ECGO/C2CPickup", base_url);
    config
}

fn credentials() -> Credentials {
    Credentials::new("tester@example.com", "secret")
}

#[tokio::test]
#[serial]
async fn test_fixture_pages_serve_complete_markup() {
    let server = ensure_portal_server().await;

    for (path, marker) in [
        ("/label/board", r##"<a href="#others">其他用戶任務</a>"##),
        ("/label/board", "shipping-list-submit-form"),
        ("/admin/pickup", "下一頁"),
        ("/store/c2c", "QueryPickUp"),
    ] {
        let body = reqwest::get(format!("{}{}", server.base_url, path))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains(marker), "{} is missing {:?}", path, marker);
        assert!(body.trim_end().ends_with("</html>"), "{} is truncated", path);
    }
}

#[tokio::test]
#[ignore = "requires Chrome and chromedriver"]
#[serial]
async fn test_wms_scrape_walks_every_page() {
    let server = ensure_portal_server().await;
    let diagnostics = TempDir::new().unwrap();
    let config = fixture_config(&server.base_url, &diagnostics);

    let report = run_wms_scrape(&config, &credentials(), &Progress::silent(Stage::Wms))
        .await
        .expect("WMS scrape failed");

    assert_eq!(report.pages, 3);
    assert_eq!(report.skipped_rows, 0);
    assert_eq!(report.reconciliation.all.total, WMS_ROWS.len());

    // Digit-led 7-11 codes move to bulk logistics; home delivery is outside the default view
    assert_eq!(
        report.reconciliation.all.grouped_counts,
        vec![
            MethodCount { method: "7-11".to_string(), count: 6 },
            MethodCount { method: "711大物流".to_string(), count: 4 },
            MethodCount { method: "全家".to_string(), count: 5 },
            MethodCount { method: "萊爾富".to_string(), count: 3 },
            MethodCount { method: "OK".to_string(), count: 2 },
            MethodCount { method: "宅配".to_string(), count: 2 },
        ]
    );
    assert_eq!(report.reconciliation.filtered.total, 20);
    assert_eq!(
        report.reconciliation.seven_eleven_codes,
        vec![
            "F10000001",
            "F10000002",
            "F10000003",
            "F10000004",
            "F10000005",
            "F10000006",
        ]
    );
}

#[tokio::test]
#[ignore = "requires Chrome and chromedriver"]
#[serial]
async fn test_label_workflow_detects_new_task() {
    let server = ensure_portal_server().await;
    let diagnostics = TempDir::new().unwrap();
    let config = fixture_config(&server.base_url, &diagnostics);
    let codes = vec!["A1001".to_string(), "A1002".to_string()];

    let report = run_label_barcodes(
        &config,
        &credentials(),
        &codes,
        &Progress::silent(Stage::Labels),
    )
    .await
    .expect("label workflow failed");

    assert_eq!(report.high_water_mark, TaskId(12));
    assert_eq!(report.task_id, TaskId(13));
    assert_eq!(report.submitted, 2);
    // Chrome's PDF text layer is font dependent, so only check what was found
    for barcode in &report.barcodes {
        assert!(
            codes.iter().any(|code| barcode_for(code) == *barcode),
            "unexpected barcode {}",
            barcode
        );
    }
}

#[tokio::test]
#[ignore = "requires Chrome and chromedriver"]
#[serial]
async fn test_store_scan_isolates_broken_item() {
    let server = ensure_portal_server().await;
    let diagnostics = TempDir::new().unwrap();
    let config = fixture_config(&server.base_url, &diagnostics);
    let barcodes = vec![
        "S0001".to_string(),
        BROKEN_PIN.to_string(),
        "S0002".to_string(),
    ];

    let tally = run_store_scan(
        &config,
        &credentials(),
        "0912345678",
        &barcodes,
        &Progress::silent(Stage::StoreScan),
    )
    .await
    .expect("store scan failed");

    assert_eq!(tally.total, 3);
    assert_eq!(tally.success, 2);
    assert_eq!(tally.failed_list, vec![BROKEN_PIN.to_string()]);

    let scans: Vec<String> = reqwest::get(format!("{}/store/api/scans", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(scans, vec!["S0001", "S0002"]);
}

#[tokio::test]
#[ignore = "requires Chrome and chromedriver"]
#[serial]
async fn test_login_failure_captures_diagnostics() {
    let server = ensure_portal_server().await;
    let diagnostics = TempDir::new().unwrap();
    let mut config = fixture_config(&server.base_url, &diagnostics);
    // The home page never shows this marker
    config.wms.login.post_login_marker = shipflow::locator::Locator::id("never-rendered");
    config.timeouts.login_marker_ms = 1_000;

    let err = run_wms_scrape(&config, &credentials(), &Progress::silent(Stage::Wms))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    let captured: Vec<_> = std::fs::read_dir(diagnostics.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .collect();
    assert!(!captured.is_empty(), "no diagnostics captured");
}
