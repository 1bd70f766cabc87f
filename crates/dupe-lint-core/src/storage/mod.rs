pub mod models;
pub mod queries;
pub mod rewriter;
pub mod sqlite;

pub use rewriter::SqliteRewriter;
pub use sqlite::Database;
