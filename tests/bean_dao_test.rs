//! Integration tests for bean operations through the synchronous facade.

mod common;

use common::{Movie, setup};
use dao_binder::bean::Bean;
use dao_binder::models::OperationKind;
use dao_binder::{DaoError, SqlValue};
use serde::Deserialize;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Default, PartialEq, Deserialize)]
struct Listing {
    id: i64,
    name: String,
    year: i32,
}

dao_binder::entity!(Listing, table = "movies", key = id, fields = [id, name, year]);

#[tokio::test]
async fn test_insert_then_select_by_key() {
    let fixture = setup().await;
    let dao = &fixture.dao;

    let affected = dao
        .insert(&Movie::new(100, "Stalker", "Andrei Tarkovsky", 1979))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let found = dao
        .select(&Movie {
            id: Some(100),
            ..Movie::default()
        })
        .await
        .unwrap();
    assert_eq!(found, vec![Movie::new(100, "Stalker", "Andrei Tarkovsky", 1979)]);
}

#[tokio::test]
async fn test_insert_skips_null_fields() {
    let fixture = setup().await;
    let dao = &fixture.dao;

    let movie = Movie {
        id: Some(101),
        name: Some("Untitled".to_string()),
        director: None,
        year: None,
    };
    assert_ok!(dao.insert(&movie).await);

    let row = dao
        .query_one::<Movie>("SELECT * FROM movies WHERE id = ?", &[SqlValue::Int(101)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.director, None);
    assert_eq!(row.year, None);
}

#[tokio::test]
async fn test_update_only_touches_set_fields() {
    let fixture = setup().await;
    let dao = &fixture.dao;

    let patch = Movie {
        id: Some(3),
        year: Some(1996),
        ..Movie::default()
    };
    assert_eq!(dao.update(&patch).await.unwrap(), 1);

    let heat = dao
        .query_one::<Movie>("SELECT * FROM movies WHERE id = ?", &[SqlValue::Int(3)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(heat, Movie::new(3, "Heat", "Michael Mann", 1996));
}

#[tokio::test]
async fn test_update_without_key_is_rejected() {
    let fixture = setup().await;
    let patch = Movie {
        name: Some("Nameless".to_string()),
        ..Movie::default()
    };
    let err = fixture.dao.update(&patch).await.unwrap_err();
    assert!(matches!(err, DaoError::Configuration { .. }));
}

#[tokio::test]
async fn test_delete_by_fields() {
    let fixture = setup().await;
    let dao = &fixture.dao;

    let by_director = Movie {
        director: Some("David Fincher".to_string()),
        ..Movie::default()
    };
    assert_eq!(dao.delete(&by_director).await.unwrap(), 2);

    let remaining: i64 = dao
        .query_scalar("SELECT COUNT(*) FROM movies", &[])
        .await
        .unwrap();
    assert_eq!(remaining, 10);

    // An all-null bean has no condition
    assert_err!(dao.delete(&Movie::default()).await);
}

#[tokio::test]
async fn test_select_by_non_null_fields() {
    let fixture = setup().await;
    let filter = Movie {
        director: Some("Ridley Scott".to_string()),
        year: Some(1982),
        ..Movie::default()
    };
    let found = fixture.dao.select(&filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name.as_deref(), Some("Blade Runner"));
}

#[tokio::test]
async fn test_query_as_maps_columns_case_insensitively() {
    let fixture = setup().await;
    let movies = fixture
        .dao
        .query_as::<Movie>(
            "SELECT id AS ID, name AS Name, 'ignored' AS extra FROM movies WHERE id <= ? ORDER BY id",
            &[SqlValue::Int(2)],
        )
        .await
        .unwrap();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[1].id, Some(2));
    assert_eq!(movies[1].name.as_deref(), Some("Blade Runner"));
    // Unselected fields keep their defaults
    assert_eq!(movies[1].year, None);
}

#[tokio::test]
async fn test_partial_row_keeps_plain_defaults() {
    let fixture = setup().await;
    let listing = fixture
        .dao
        .query_one::<Listing>("SELECT id, name FROM movies WHERE id = ?", &[SqlValue::Int(3)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        listing,
        Listing {
            id: 3,
            name: "Heat".to_string(),
            year: 0,
        }
    );
}

#[tokio::test]
async fn test_mapping_failure_is_reported() {
    let fixture = setup().await;
    let err = fixture
        .dao
        .query_as::<Movie>("SELECT 'nineteen' AS year", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DaoError::Mapping { .. }));
}

#[tokio::test]
async fn test_write_bean_rejects_select() {
    let fixture = setup().await;
    let bean = Bean::of(&Movie::new(1, "Alien", "Ridley Scott", 1979));
    let err = fixture
        .dao
        .write_bean(&bean, OperationKind::Select)
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_records_expose_columns() {
    let fixture = setup().await;
    let rows = fixture
        .dao
        .query("SELECT id, name FROM movies WHERE year < ? ORDER BY year", &[SqlValue::Int(1980)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_by_name("name"), Some(&SqlValue::from("Jaws")));
    assert_eq!(rows[1].get(0), Some(&SqlValue::Int(1)));
}

#[tokio::test]
async fn test_placeholder_mismatch_is_build_error() {
    let fixture = setup().await;
    let err = fixture
        .dao
        .query("SELECT * FROM movies WHERE id = ? AND year = ?", &[SqlValue::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DaoError::Build { .. }));
}
