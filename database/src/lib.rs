mod db;
mod models;
mod mock;
mod persistence;
mod repository;
mod schema;

pub use db::{establish_connection_pool, DbConnection, DbPool};
pub use mock::MockPersistence;
pub use models::*;
pub use persistence::{Persistence, TradeSettlement};
pub use repository::SqlitePersistence;

/// Opens (creating and migrating if necessary) the SQLite database at
/// `database_url` and returns a ready-to-use persistence handle.
pub fn open(database_url: &str, pool_size: u32) -> SqlitePersistence {
    let pool = establish_connection_pool(database_url, pool_size);
    SqlitePersistence::new(pool)
}
