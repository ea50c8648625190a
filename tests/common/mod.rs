//! Shared fixtures: a temp-file SQLite movie database.

#![allow(dead_code)]

use dao_binder::bean::{Entity, EntityDescriptor};
use dao_binder::bind::{DaoInterface, DaoMethod, ParamType, ReturnShape};
use dao_binder::{CommonDao, DaoConfig, SqlValue};
use serde::Deserialize;
use tempfile::TempDir;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Movie {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub director: Option<String>,
    pub year: Option<i32>,
}

dao_binder::entity!(Movie, table = "movies", key = id, fields = [id, name, director, year]);

impl Movie {
    pub fn new(id: i64, name: &str, director: &str, year: i32) -> Self {
        Self {
            id: Some(id),
            name: Some(name.to_string()),
            director: Some(director.to_string()),
            year: Some(year),
        }
    }
}

/// Keyed by IMDb id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Title {
    pub id: String,
    pub name: String,
    pub year: i32,
}

dao_binder::entity!(Title, table = "titles", key = id, fields = [id, name, year]);

pub struct TitleDao;

impl DaoInterface for TitleDao {
    const NAME: &'static str = "TitleDao";

    fn entity() -> Option<&'static EntityDescriptor> {
        Some(Title::descriptor())
    }

    fn methods() -> Vec<DaoMethod> {
        vec![
            DaoMethod::new(Self::NAME, "get_title_by_id")
                .param(ParamType::Text)
                .returns(ReturnShape::One),
        ]
    }
}

pub const TITLES: [(&str, &str, i32); 2] = [
    ("tt0468569", "The Dark Knight", 2008),
    ("tt0133093", "The Matrix", 1999),
];

pub struct MovieDao;

impl DaoInterface for MovieDao {
    const NAME: &'static str = "MovieDao";

    fn entity() -> Option<&'static EntityDescriptor> {
        Some(Movie::descriptor())
    }

    fn methods() -> Vec<DaoMethod> {
        vec![
            DaoMethod::new(Self::NAME, "get_movie_by_id")
                .param(ParamType::Int)
                .returns(ReturnShape::One),
            DaoMethod::new(Self::NAME, "find_all")
                .param(ParamType::Page)
                .returns(ReturnShape::Page),
            DaoMethod::new(Self::NAME, "count").returns(ReturnShape::Scalar),
            DaoMethod::new(Self::NAME, "save")
                .param(ParamType::Bean("Movie"))
                .returns(ReturnShape::Affected),
            DaoMethod::new(Self::NAME, "delete_by_id")
                .param(ParamType::Int)
                .returns(ReturnShape::Affected),
            DaoMethod::new(Self::NAME, "find_by_director")
                .param(ParamType::Text)
                .sql("SELECT * FROM movies WHERE director = ? ORDER BY id")
                .returns(ReturnShape::Beans),
            DaoMethod::new(Self::NAME, "find_by_year")
                .param(ParamType::Int)
                .sql("SELECT * FROM movies WHERE year = ? ORDER BY id")
                .returns(ReturnShape::Beans),
            DaoMethod::new(Self::NAME, "find_by_year")
                .param(ParamType::Float)
                .sql("SELECT * FROM movies WHERE year >= ? ORDER BY id")
                .returns(ReturnShape::Beans),
            DaoMethod::new(Self::NAME, "newest")
                .param(ParamType::Page)
                .sql("SELECT * FROM movies ORDER BY id DESC;")
                .returns(ReturnShape::Page),
        ]
    }
}

pub const MOVIES: [(i64, &str, &str, i32); 12] = [
    (1, "Alien", "Ridley Scott", 1979),
    (2, "Blade Runner", "Ridley Scott", 1982),
    (3, "Heat", "Michael Mann", 1995),
    (4, "Collateral", "Michael Mann", 2004),
    (5, "Arrival", "Denis Villeneuve", 2016),
    (6, "Sicario", "Denis Villeneuve", 2015),
    (7, "Memento", "Christopher Nolan", 2000),
    (8, "Inception", "Christopher Nolan", 2010),
    (9, "Zodiac", "David Fincher", 2007),
    (10, "Se7en", "David Fincher", 1995),
    (11, "Jaws", "Steven Spielberg", 1975),
    (12, "Ran", "Akira Kurosawa", 1985),
];

/// A seeded database that lives as long as the fixture.
pub struct Fixture {
    pub dao: CommonDao,
    pub url: String,
    _dir: TempDir,
}

pub async fn setup() -> Fixture {
    setup_with("max_connections=2").await
}

/// Seeded database; `options` is appended to the connection URL query.
pub async fn setup_with(options: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movies.db");
    let url = format!("sqlite:{}?acquire_timeout=2&{}", path.display(), options);

    let dao = CommonDao::connect(DaoConfig::parse(&url).unwrap())
        .await
        .unwrap();
    dao.execute(
        "CREATE TABLE movies (id INTEGER PRIMARY KEY, name TEXT NOT NULL, director TEXT, year INTEGER)",
        &[],
    )
    .await
    .unwrap();
    for (id, name, director, year) in MOVIES {
        let params: [SqlValue; 4] = [id.into(), name.into(), director.into(), year.into()];
        dao.execute(
            "INSERT INTO movies(id, name, director, year) VALUES (?, ?, ?, ?)",
            &params,
        )
        .await
        .unwrap();
    }

    dao.execute(
        "CREATE TABLE titles (id TEXT PRIMARY KEY, name TEXT NOT NULL, year INTEGER NOT NULL)",
        &[],
    )
    .await
    .unwrap();
    for (id, name, year) in TITLES {
        let params: [SqlValue; 3] = [id.into(), name.into(), year.into()];
        dao.execute("INSERT INTO titles(id, name, year) VALUES (?, ?, ?)", &params)
            .await
            .unwrap();
    }

    Fixture {
        dao,
        url,
        _dir: dir,
    }
}
