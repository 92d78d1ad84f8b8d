// db.rs
// Database connection and pooling setup

use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

// Type alias for a pooled SQLite connection
pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Create a new database connection pool and run pending migrations against it.
pub fn establish_connection_pool(database_url: &str, pool_size: u32) -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let pool = r2d2::Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .expect("failed to create connection pool");

    let mut conn = get_connection(&pool);
    conn.run_pending_migrations(MIGRATIONS)
        .expect("failed to run pending migrations");

    pool
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> DbConnection {
    pool.get().expect("failed to get a connection from the pool")
}
