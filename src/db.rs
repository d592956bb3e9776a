use diesel_migrations::embed_migrations;
use gotham::state::FromState;
use gotham_derive::StateData;

use std::sync::{Arc, Mutex, MutexGuard};

pub use diesel::pg::PgConnection as Connection;

embed_migrations!();

/// The wrapper for a database connection that can shared via gotham's state data
#[derive(Clone, StateData)]
pub struct DbConnection {
    connection: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn from_url(url: &str) -> Result<Self, failure::Error> {
        Ok(Self {
            connection: Arc::new(Mutex::new(connect(url)?)),
        })
    }

    /// Shares an open connection, such as a test connection inside its transaction.
    #[cfg(test)]
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    pub fn from_state(
        state: &gotham::state::State,
    ) -> Result<MutexGuard<Connection>, failure::Error> {
        Self::borrow_from(state).lock()
    }

    pub fn lock(&self) -> Result<MutexGuard<Connection>, failure::Error> {
        match self.connection.lock() {
            Ok(lock) => Ok(lock),
            Err(_) => Err(failure::err_msg("failed to get lock")),
        }
    }
}

pub fn connect(url: &str) -> Result<Connection, failure::Error> {
    let connection = diesel::Connection::establish(url)?;

    // Run migrations.
    embedded_migrations::run(&connection)?;
    log::info!("Database migrations are up to date");

    Ok(connection)
}

/// Whether a query failed on a unique constraint.
pub fn is_unique_violation(error: &diesel::result::Error) -> bool {
    use diesel::result::{DatabaseErrorKind, Error};

    match error {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => true,
        _ => false,
    }
}

/// Connection for tests that need postgres, inside a transaction that is never committed.
///
/// Returns `None` when `BLOGICUM_TEST_DATABASE_URL` isn't set, so those tests are skipped.
#[cfg(test)]
pub fn test_connection() -> Option<Connection> {
    let url = std::env::var("BLOGICUM_TEST_DATABASE_URL").ok()?;
    let connection = connect(&url).expect("test database unavailable");
    diesel::Connection::begin_test_transaction(&connection).expect("test transaction");
    Some(connection)
}
