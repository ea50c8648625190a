//! Integration tests for paginated queries.

mod common;

use common::{Movie, setup};
use dao_binder::dao::DaoContext;
use dao_binder::models::{DatabaseType, Page};
use dao_binder::pagination::SqliteDialect;
use dao_binder::{CommonDao, DaoError, DataSource, Paginator, SqlValue};

const NEWEST: &str = "SELECT * FROM movies ORDER BY id DESC";

fn ids(movies: &[Movie]) -> Vec<i64> {
    movies.iter().filter_map(|m| m.id).collect()
}

#[tokio::test]
async fn test_consecutive_pages() {
    let fixture = setup().await;

    let first = fixture
        .dao
        .query_page::<Movie>(NEWEST, &[], Page::new(1, 5))
        .await
        .unwrap();
    assert_eq!(ids(&first.items), vec![12, 11, 10, 9, 8]);
    assert_eq!(first.total, 12);
    assert!(first.has_next());

    let second = fixture
        .dao
        .query_page::<Movie>(NEWEST, &[], Page::new(2, 5))
        .await
        .unwrap();
    assert_eq!(ids(&second.items), vec![7, 6, 5, 4, 3]);
    assert_eq!(second.page_num, 2);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let fixture = setup().await;
    let page = fixture
        .dao
        .query_page::<Movie>(NEWEST, &[], Page::new(9, 5))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 12);
}

#[tokio::test]
async fn test_page_with_parameters() {
    let fixture = setup().await;
    let page = fixture
        .dao
        .query_page_records(
            "SELECT name FROM movies WHERE year >= ? ORDER BY year",
            &[SqlValue::Int(2000)],
            Page::new(1, 2),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 6);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].get(0), Some(&SqlValue::from("Memento")));
}

#[tokio::test]
async fn test_invalid_page() {
    let fixture = setup().await;
    let err = fixture
        .dao
        .query_page::<Movie>(NEWEST, &[], Page::new(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, DaoError::Configuration { .. }));
}

#[tokio::test]
async fn test_missing_dialect() {
    let fixture = setup().await;
    let source = DataSource::from_url(&fixture.url).await.unwrap();

    let bare = DaoContext::new(DatabaseType::SQLite).with_paginator(Paginator::new());
    let dao = CommonDao::with_context(source.clone(), bare).unwrap();
    let err = dao
        .query_page::<Movie>(NEWEST, &[], Page::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DaoError::UnsupportedDialect { .. }));

    let mut paginator = Paginator::new();
    paginator.add_dialect(SqliteDialect);
    let dao = CommonDao::with_context(
        source,
        DaoContext::new(DatabaseType::SQLite).with_paginator(paginator),
    )
    .unwrap();
    let page = dao
        .query_page::<Movie>(NEWEST, &[], Page::new(3, 5))
        .await
        .unwrap();
    assert_eq!(ids(&page.items), vec![2, 1]);
}
