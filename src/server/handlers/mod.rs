pub mod documents;
pub mod health;
pub mod ingest;
pub mod search;
