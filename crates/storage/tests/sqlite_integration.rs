use storage::repository::{SheetStore, StorageError};
use storage::sqlite::SqliteSheet;
use tracker_core::model::{CellValue, ColumnIndex, RowIndex};

async fn sheet(db: &str, worksheet: &str) -> SqliteSheet {
    let url = format!("sqlite:file:{db}?mode=memory&cache=shared");
    let repo = SqliteSheet::connect(&url, worksheet)
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_headers_and_cells() {
    let repo = sheet("memdb_roundtrip", "Progress").await;
    repo.create_worksheet("Progress").await.unwrap();

    for name in ["Subject", "Week", "Lesson", "Alice"] {
        repo.append_header(name).await.unwrap();
    }
    repo.write_cell(RowIndex::new(0), ColumnIndex::new(0), "Cardiology".into())
        .await
        .unwrap();
    repo.write_cell(RowIndex::new(0), ColumnIndex::new(1), CellValue::Number(1.0))
        .await
        .unwrap();
    repo.write_cell(RowIndex::new(2), ColumnIndex::new(3), CellValue::Bool(true))
        .await
        .unwrap();

    let snapshot = repo.read_snapshot().await.unwrap();
    assert_eq!(snapshot.headers(), ["Subject", "Week", "Lesson", "Alice"]);
    assert_eq!(snapshot.row_count(), 3);
    assert_eq!(
        snapshot.cell(RowIndex::new(0), ColumnIndex::new(0)),
        &CellValue::from("Cardiology")
    );
    assert_eq!(
        snapshot.cell(RowIndex::new(0), ColumnIndex::new(1)),
        &CellValue::Number(1.0)
    );
    assert!(snapshot.flag(RowIndex::new(2), ColumnIndex::new(3)));
    assert!(!snapshot.flag(RowIndex::new(1), ColumnIndex::new(3)));
}

#[tokio::test]
async fn empty_write_clears_a_cell() {
    let repo = sheet("memdb_clear", "Progress").await;
    repo.create_worksheet("Progress").await.unwrap();
    let alice = repo.append_header("Alice").await.unwrap();

    repo.write_cell(RowIndex::new(0), alice, CellValue::Bool(true))
        .await
        .unwrap();
    repo.write_cell(RowIndex::new(0), alice, CellValue::Empty)
        .await
        .unwrap();

    let snapshot = repo.read_snapshot().await.unwrap();
    assert_eq!(snapshot.row_count(), 1);
    assert!(snapshot.cell(RowIndex::new(0), alice).is_empty());
}

#[tokio::test]
async fn append_header_is_idempotent() {
    let repo = sheet("memdb_headers", "Progress").await;
    repo.create_worksheet("Progress").await.unwrap();
    repo.append_header("Subject").await.unwrap();

    let first = repo.append_header("Bob").await.unwrap();
    let again = repo.append_header("Bob").await.unwrap();
    assert_eq!(first, ColumnIndex::new(1));
    assert_eq!(first, again);
    assert_eq!(repo.find_column("Bob").await.unwrap(), Some(first));
    assert_eq!(repo.find_column("bob").await.unwrap(), None);
}

#[tokio::test]
async fn missing_worksheet_falls_back_to_first() {
    let repo = sheet("memdb_fallback", "Renamed").await;
    repo.create_worksheet("Original").await.unwrap();
    repo.create_worksheet("Other").await.unwrap();
    repo.append_header("Subject").await.unwrap();

    let original = sheet("memdb_fallback", "Original").await;
    let snapshot = original.read_snapshot().await.unwrap();
    assert_eq!(snapshot.headers(), ["Subject"]);
    assert_eq!(
        repo.worksheet_names().await.unwrap(),
        vec!["Original".to_string(), "Other".to_string()]
    );
}

#[tokio::test]
async fn no_worksheet_is_not_found() {
    let repo = sheet("memdb_empty", "Progress").await;
    let err = repo.read_snapshot().await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}
