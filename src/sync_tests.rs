//! Tests for full sync runs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::error::SyncError;
use crate::reconcile::{RecordCreate, RecordUpdate};
use crate::remote::RemoteRecord;
use crate::table::RecordPage;

const STOCK_FEED: &str = "\
sku;Einkaufspreis netto;Bestand
W-100;5,00;12
W-200;15,00;3
W-999;4,00;1
";

const PRODUCT_FEED: &str = "\
SKU;Produktname lang;Land;Rebsorten_label
W-100;Riesling Kabinett;Deutschland;Riesling
W-200;Barolo DOCG;Italien;Nebbiolo
W-300;Cava Brut;Spanien;Macabeo
";

/// Remote table kept in memory, assigning ids on create
#[derive(Default)]
struct InMemoryTable {
    records: StdMutex<Vec<RemoteRecord>>,
    next_id: AtomicUsize,
    lists: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryTable {
    fn with_records(records: Vec<Value>) -> Self {
        let records = records
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        Self {
            records: StdMutex::new(records),
            ..Self::default()
        }
    }

    fn by_sku(&self, sku: &str) -> Option<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.text("variants.sku").as_deref() == Some(sku))
            .cloned()
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl TableApi for InMemoryTable {
    async fn list_page(&self, _offset: Option<&str>) -> Result<RecordPage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(RecordPage {
            records: self.records.lock().unwrap().clone(),
            offset: None,
        })
    }

    async fn create_records(&self, batch: &[RecordCreate]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        for create in batch {
            let id = format!("recNew{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let fields = create
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            records.push(RemoteRecord { id, fields });
        }
        Ok(())
    }

    async fn update_records(&self, batch: &[RecordUpdate]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        for update in batch {
            if let Some(record) = records.iter_mut().find(|r| r.id == update.id) {
                for (k, v) in &update.fields {
                    record.fields.insert(k.clone(), Value::String(v.clone()));
                }
            }
        }
        Ok(())
    }

    async fn delete_records(&self, ids: &[String]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().retain(|r| !ids.contains(&r.id));
        Ok(())
    }
}

async fn feed_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STOCK_FEED))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/productdata.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_FEED))
        .mount(&mock_server)
        .await;
    mock_server
}

fn test_config(mock_uri: &str) -> SyncConfig {
    let mut config = SyncConfig::new(
        "test_token",
        "appBase",
        "Products",
        format!("{mock_uri}/stock.csv"),
        format!("{mock_uri}/productdata.csv"),
    )
    .with_rate_limit_delay(Duration::ZERO);
    config.api_url = mock_uri.to_string();
    config
}

fn initial_remote() -> InMemoryTable {
    InMemoryTable::with_records(vec![
        json!({ "id": "recOld", "fields": { "variants.sku": "W-050", "title": "Ausgelistet" } }),
        json!({ "id": "rec200", "fields": { "variants.sku": "W-200", "Land": "Piemont" } }),
    ])
}

fn field(record: &RemoteRecord, name: &str) -> Option<String> {
    record.text(name)
}

// ── in-memory table ──────────────────────────────────────────────────

#[tokio::test]
async fn first_run_creates_updates_and_deletes() {
    let feeds = feed_server().await;
    let syncer = Syncer::with_table(
        test_config(&feeds.uri()),
        reqwest::Client::new(),
        initial_remote(),
    )
    .unwrap();

    let report = syncer.run().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            merged: 3,
            remote: 2,
            updates: 1,
            creates: 2,
            deletes: 1,
            skipped_updates: 0,
            dry_run: false,
        }
    );

    let table = syncer.table().inner();
    assert_eq!(table.len(), 3);
    assert!(table.by_sku("W-050").is_none());
    assert!(table.by_sku("W-999").is_none());

    let riesling = table.by_sku("W-100").unwrap();
    assert_eq!(field(&riesling, "title").as_deref(), Some("Riesling Kabinett"));
    assert_eq!(field(&riesling, "Land").as_deref(), Some("Deutschland"));
    assert_eq!(field(&riesling, "metafield.custom.rebsorte").as_deref(), Some("Riesling"));
    assert_eq!(field(&riesling, "variants.price").as_deref(), Some("10.45"));
    assert_eq!(field(&riesling, "Einkaufspreis netto").as_deref(), Some("5,00"));
    assert_eq!(field(&riesling, "price.margin").as_deref(), Some("3.71"));

    let barolo = table.by_sku("W-200").unwrap();
    assert_eq!(barolo.id, "rec200");
    // protected on update
    assert_eq!(field(&barolo, "Land").as_deref(), Some("Piemont"));
    assert!(field(&barolo, "metafield.custom.rebsorte").is_none());
    assert_eq!(field(&barolo, "variants.price").as_deref(), Some("24.45"));
    assert_eq!(field(&barolo, "price.margin").as_deref(), Some("5.38"));

    // product without stock row still gets a price
    let cava = table.by_sku("W-300").unwrap();
    assert_eq!(field(&cava, "variants.price").as_deref(), Some("0.45"));
    assert!(field(&cava, "Einkaufspreis netto").is_none());
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let feeds = feed_server().await;
    let syncer = Syncer::with_table(
        test_config(&feeds.uri()),
        reqwest::Client::new(),
        initial_remote(),
    )
    .unwrap();

    syncer.run().await.unwrap();
    let second = syncer.plan().await.unwrap();

    assert!(second.plan.creates.is_empty());
    assert!(second.plan.deletes.is_empty());
    assert_eq!(second.plan.updates.len(), 3);
    assert_eq!(second.remote, 3);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let feeds = feed_server().await;
    let mut config = test_config(&feeds.uri());
    config.dry_run = true;
    let syncer = Syncer::with_table(config, reqwest::Client::new(), initial_remote()).unwrap();

    let report = syncer.run().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.creates, 2);
    assert_eq!(syncer.table().inner().writes.load(Ordering::SeqCst), 0);
    assert!(syncer.table().inner().by_sku("W-050").is_some());
}

#[tokio::test]
async fn broken_feed_aborts_before_touching_remote() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STOCK_FEED))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/productdata.csv"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let syncer = Syncer::with_table(
        test_config(&mock_server.uri()),
        reqwest::Client::new(),
        initial_remote(),
    )
    .unwrap();

    let err = syncer.run().await.unwrap_err();

    assert!(matches!(err, SyncError::FeedUnavailable { .. }));
    let table = syncer.table().inner();
    assert_eq!(table.lists.load(Ordering::SeqCst), 0);
    assert_eq!(table.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_cost_aborts_before_writes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sku;Einkaufspreis netto\nW-100;auf Anfrage\n"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/productdata.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_FEED))
        .mount(&mock_server)
        .await;

    let syncer = Syncer::with_table(
        test_config(&mock_server.uri()),
        reqwest::Client::new(),
        initial_remote(),
    )
    .unwrap();

    let err = syncer.run().await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidCostFormat { .. }));
    assert_eq!(syncer.table().inner().writes.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_setting_fails_before_network() {
    let mut config = test_config("http://127.0.0.1:9");
    config.api_key.clear();

    let result = Syncer::with_table(config, reqwest::Client::new(), InMemoryTable::default());
    assert!(matches!(
        result.err(),
        Some(SyncError::MissingConfig("AIRTABLE_API_KEY"))
    ));
}

// ── Airtable over HTTP ───────────────────────────────────────────────

#[tokio::test]
async fn run_once_against_airtable_api() {
    let mock_server = feed_server().await;

    Mock::given(method("GET"))
        .and(path("/appBase/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                { "id": "rec200", "fields": { "variants.sku": "W-200" } },
                { "id": "recOld", "fields": { "variants.sku": "W-050" } }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/appBase/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/appBase/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/appBase/Products"))
        .and(query_param("records[]", "recOld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = run_once(test_config(&mock_server.uri())).await.unwrap();

    assert_eq!(report.updates, 1);
    assert_eq!(report.creates, 2);
    assert_eq!(report.deletes, 1);
}

#[tokio::test]
async fn remote_write_failure_is_not_success() {
    let mock_server = feed_server().await;

    Mock::given(method("GET"))
        .and(path("/appBase/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/appBase/Products"))
        .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_MULTIPLE_CHOICE_OPTIONS"))
        .mount(&mock_server)
        .await;

    let err = run_once(test_config(&mock_server.uri())).await.unwrap_err();
    match err {
        SyncError::BatchFailed { operation, source, .. } => {
            assert_eq!(operation, "create");
            assert!(source.to_string().contains("INVALID_MULTIPLE_CHOICE_OPTIONS"));
        }
        other => panic!("Expected BatchFailed, got: {other:?}"),
    }
}
