use serde_json::json;
use storage::repository::{SheetStore, StorageError};
use storage::sheets_api::{SheetsApiConfig, SheetsApiStore};
use tracker_core::model::{CellValue, ColumnIndex, RowIndex};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const META_PATH: &str = "/v4/spreadsheets/cohort42";

fn store(server: &MockServer, header_rows: usize) -> SheetsApiStore {
    SheetsApiStore::new(SheetsApiConfig {
        base_url: format!("{}/v4", server.uri()),
        spreadsheet_id: "cohort42".into(),
        worksheet: "Progress".into(),
        token: "secret".into(),
        header_rows,
    })
}

async fn mount_tabs(server: &MockServer, titles: &[&str]) {
    let sheets: Vec<_> = titles
        .iter()
        .map(|title| json!({ "properties": { "title": title } }))
        .collect();
    Mock::given(method("GET"))
        .and(path(META_PATH))
        .and(query_param("fields", "sheets.properties.title"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": sheets })))
        .mount(server)
        .await;
}

async fn mount_values(server: &MockServer, range: &str, values: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("{META_PATH}/values/{range}")))
        .and(query_param("valueRenderOption", "UNFORMATTED_VALUE"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "range": range, "values": values })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn snapshot_uses_the_last_header_row() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Summary", "Progress"]).await;
    mount_values(
        &server,
        "'Progress'",
        json!([
            ["Cohort 2024"],
            ["Subject", "Week", "Lesson", "LastSeen", "Alice"],
            ["Cardiology", 1, "Heart failure", "ALICE_14/11/2023_22:13_CARDIOLOGY", true],
            ["Neurology", 2, "Stroke"]
        ]),
    )
    .await;

    let snapshot = store(&server, 2).read_snapshot().await.unwrap();

    assert_eq!(snapshot.headers()[4], "Alice");
    assert_eq!(snapshot.row_count(), 2);
    assert!(snapshot.flag(RowIndex::new(0), ColumnIndex::new(4)));
    assert!(!snapshot.flag(RowIndex::new(1), ColumnIndex::new(4)));
    assert_eq!(
        snapshot.cell(RowIndex::new(0), ColumnIndex::new(1)),
        &CellValue::Number(1.0)
    );
}

#[tokio::test]
async fn missing_tab_falls_back_to_the_first_one() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Cohort A", "Archive"]).await;
    mount_values(
        &server,
        "'Cohort%20A'",
        json!([["Subject", "Week", "Lesson", "LastSeen", "Bob"], ["Surgery", 3, "Sutures", "", "TRUE"]]),
    )
    .await;

    let snapshot = store(&server, 1).read_snapshot().await.unwrap();

    assert_eq!(snapshot.find_column("Bob"), Some(ColumnIndex::new(4)));
    assert!(snapshot.flag(RowIndex::new(0), ColumnIndex::new(4)));
}

#[tokio::test]
async fn spreadsheet_without_tabs_is_not_found() {
    let server = MockServer::start().await;
    mount_tabs(&server, &[]).await;

    let err = store(&server, 1).read_snapshot().await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn write_cell_puts_a_single_a1_cell_below_the_header() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Progress"]).await;
    Mock::given(method("PUT"))
        .and(path(format!("{META_PATH}/values/'Progress'!E3")))
        .and(query_param("valueInputOption", "RAW"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({ "range": "'Progress'!E3", "values": [[true]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, 1)
        .write_cell(RowIndex::new(1), ColumnIndex::new(4), CellValue::Bool(true))
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_cells_are_written_as_blank_text() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Progress"]).await;
    Mock::given(method("PUT"))
        .and(path(format!("{META_PATH}/values/'Progress'!D2")))
        .and(body_json(json!({ "range": "'Progress'!D2", "values": [[""]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, 1)
        .write_cell(RowIndex::new(0), ColumnIndex::new(3), CellValue::Empty)
        .await
        .unwrap();
}

#[tokio::test]
async fn append_header_only_writes_new_names() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Progress"]).await;
    mount_values(
        &server,
        "'Progress'!1:1",
        json!([["Subject", "Week", "Lesson", "LastSeen", "Alice"]]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path(format!("{META_PATH}/values/'Progress'!F1")))
        .and(body_json(json!({ "range": "'Progress'!F1", "values": [["Bob"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sheet = store(&server, 1);
    assert_eq!(sheet.append_header("Alice").await.unwrap(), ColumnIndex::new(4));
    assert_eq!(sheet.append_header("Bob").await.unwrap(), ColumnIndex::new(5));

    let puts = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "PUT")
        .count();
    assert_eq!(puts, 1);
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(META_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend busy"))
        .mount(&server)
        .await;

    let err = store(&server, 1).read_snapshot().await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
}
