//! PostgreSQL harness shared by the fitplan integration tests.
//!
//! One server per test binary, one freshly migrated database per test.
//!
//! - With `FITPLAN_TEST_PG_URL` set, that server is used as-is.
//! - Otherwise a `postgres:17` container is started through testcontainers
//!   on first use and kept alive for the life of the binary.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use fitplan_db::pool;

struct Server {
    /// Server root URL, no database name.
    root_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var("FITPLAN_TEST_PG_URL") {
        return Server {
            root_url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");

    Server {
        root_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

async fn root_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.root_url
}

async fn connect(url: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"))
}

/// A migrated, uniquely named database.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
    pub url: String,
}

impl TestDb {
    /// Close the pool and drop the database.
    pub async fn teardown(self) {
        self.pool.close().await;
        drop_test_db(&self.name).await;
    }
}

/// Create a fresh database with all migrations applied.
pub async fn create_test_db() -> TestDb {
    let root = root_url().await;

    let maint = connect(&format!("{root}/postgres"), 1).await;
    let name = format!("fitplan_test_{}", Uuid::new_v4().simple());
    maint
        .execute(format!("CREATE DATABASE {name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create {name}: {e}"));
    maint.close().await;

    let url = format!("{root}/{name}");
    let pool = connect(&url, 5).await;
    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");

    TestDb { pool, name, url }
}

/// Drop a test database, terminating any connections still open on it.
pub async fn drop_test_db(name: &str) {
    let root = root_url().await;
    let maint = connect(&format!("{root}/postgres"), 1).await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = '{name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint.execute(terminate.as_str()).await;
    let _ = maint
        .execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
        .await;
    maint.close().await;
}
