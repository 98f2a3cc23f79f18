use sqlx::PgPool;

/// Executes `kanau` query objects against the connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
