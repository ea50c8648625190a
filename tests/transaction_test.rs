//! Integration tests for transactional units of work.

mod common;

use common::{Movie, MovieDao, setup};
use dao_binder::{DaoError, SqlValue, args};

async fn count(fixture: &common::Fixture) -> i64 {
    fixture
        .dao
        .query_scalar("SELECT COUNT(*) FROM movies", &[])
        .await
        .unwrap()
}

#[tokio::test]
async fn test_commit_on_success() {
    let fixture = setup().await;
    let executor = fixture.dao.transaction_executor();

    let movie = Movie::new(30, "Rashomon", "Akira Kurosawa", 1950);
    let affected = executor
        .execute(move |tx| {
            Box::pin(async move {
                let inserted = tx.insert(&movie).await?;
                let updated = tx
                    .execute(
                        "UPDATE movies SET year = ? WHERE director = ?",
                        &[SqlValue::Int(1951), SqlValue::from("Akira Kurosawa")],
                    )
                    .await?;
                Ok(inserted + updated)
            })
        })
        .await
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(count(&fixture).await, 13);

    let years: Vec<i64> = fixture
        .dao
        .query(
            "SELECT year FROM movies WHERE director = ?",
            &[SqlValue::from("Akira Kurosawa")],
        )
        .await
        .unwrap()
        .iter()
        .map(|r| r.scalar().unwrap())
        .collect();
    assert_eq!(years, vec![1951, 1951]);
}

#[tokio::test]
async fn test_rollback_on_error_keeps_data() {
    let fixture = setup().await;
    let executor = fixture.dao.transaction_executor();

    let result: Result<(), DaoError> = executor
        .execute(|tx| {
            Box::pin(async move {
                tx.execute("DELETE FROM movies", &[]).await?;
                let left: i64 = tx.query_scalar("SELECT COUNT(*) FROM movies", &[]).await?;
                assert_eq!(left, 0);
                Err(DaoError::configuration("abort unit of work"))
            })
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("abort unit of work"));
    assert_eq!(count(&fixture).await, 12);
}

#[tokio::test]
async fn test_rollback_restores_replaced_row() {
    let fixture = setup().await;
    let executor = fixture.dao.transaction_executor();

    let result: Result<(), DaoError> = executor
        .execute(|tx| {
            Box::pin(async move {
                tx.delete(&Movie {
                    id: Some(3),
                    ..Movie::default()
                })
                .await?;
                tx.insert(&Movie::new(3, "Heat 2", "Michael Mann", 2026)).await?;
                let replaced: Option<Movie> = tx
                    .query_one("SELECT * FROM movies WHERE id = ?", &[SqlValue::Int(3)])
                    .await?;
                assert_eq!(replaced.and_then(|m| m.name).as_deref(), Some("Heat 2"));
                Err(DaoError::configuration("abort replacement"))
            })
        })
        .await;
    assert!(result.is_err());

    let heat = fixture
        .dao
        .query_one::<Movie>("SELECT * FROM movies WHERE id = ?", &[SqlValue::Int(3)])
        .await
        .unwrap();
    assert_eq!(heat, Some(Movie::new(3, "Heat", "Michael Mann", 1995)));
}

#[tokio::test]
async fn test_driver_error_rolls_back() {
    let fixture = setup().await;
    let executor = fixture.dao.transaction_executor();

    let result = executor
        .execute(|tx| {
            Box::pin(async move {
                tx.insert(&Movie::new(40, "Ugetsu", "Kenji Mizoguchi", 1953)).await?;
                // Duplicate key
                tx.insert(&Movie::new(1, "Alien", "Ridley Scott", 1979)).await
            })
        })
        .await;
    assert!(matches!(result, Err(DaoError::Execution { .. })));
    assert_eq!(count(&fixture).await, 12);
}

#[tokio::test]
async fn test_bound_dao_inside_transaction() {
    let fixture = setup().await;
    let movies = fixture.dao.get_dao::<MovieDao>().await.unwrap();
    let executor = fixture.dao.transaction_executor();

    let bound = movies.clone();
    let result: Result<u64, DaoError> = executor
        .execute(move |tx| {
            Box::pin(async move {
                bound.on(tx).execute("delete_by_id", args![1]).await?;
                let total: i64 = bound.on(tx).scalar("count", args![]).await?;
                assert_eq!(total, 11);
                Err(DaoError::configuration("undo"))
            })
        })
        .await;
    assert!(result.is_err());

    let alien = movies
        .fetch_one::<Movie>("get_movie_by_id", args![1])
        .await
        .unwrap();
    assert!(alien.is_some());
}
