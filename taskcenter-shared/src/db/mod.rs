/// Database layer
///
/// - `pool`: PostgreSQL connection pools for the directory and region shards
/// - `migrations`: Embedded schema migrations

pub mod migrations;
pub mod pool;
