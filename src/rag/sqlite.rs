//! SQLite-backed embedding store.
//!
//! Documents and chunks live in two tables; embeddings are stored as JSON
//! arrays in TEXT columns. The textual embedding codec is confined to this
//! adapter — the ranker and assembler only ever see numeric vectors.
//!
//! SQLite has no nearest-neighbor index, so `supports_vector_search` is
//! false and every search goes through the ranker's full-scan fallback.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{
    ChunkKind, Document, EmbeddingStore, ImageRef, NewChunk, NewDocument, StoredChunk,
};
use crate::core::errors::ApiError;

pub struct SqliteEmbeddingStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteEmbeddingStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                source_path TEXT NOT NULL,
                content_hash TEXT NOT NULL DEFAULT '',
                owner TEXT NOT NULL DEFAULT '',
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES rag_documents(id),
                chunk_type TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT,
                text_embedding TEXT,
                image_embedding TEXT,
                image_base64 TEXT,
                linked_chunk_id INTEGER,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE (document_id, page_number, chunk_type, chunk_index)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_type ON rag_chunks(chunk_type)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_linked ON rag_chunks(linked_chunk_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn parse_metadata(raw: Option<String>) -> Value {
        raw.and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
        Document {
            id: row.get("id"),
            filename: row.get("filename"),
            source_path: row.get("source_path"),
            content_hash: row.get("content_hash"),
            owner: row.get("owner"),
            metadata: Self::parse_metadata(row.get("metadata")),
        }
    }

    fn placeholders(count: usize) -> String {
        (1..=count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
    }
}

/// Decode an embedding stored as a JSON array string.
///
/// `None` input, malformed JSON, or non-numeric elements all decode to
/// `None` — a chunk with an unreadable embedding is skipped by the ranker,
/// never an error.
pub fn parse_embedding(raw: Option<&str>) -> Option<Vec<f32>> {
    let raw = raw?;
    let values: Vec<Value> = serde_json::from_str(raw).ok()?;
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(value.as_f64()? as f32);
    }
    Some(out)
}

/// Encode an embedding as a JSON array string for storage.
pub fn encode_embedding(embedding: &[f32]) -> String {
    let values: Vec<Value> = embedding
        .iter()
        .map(|f| serde_json::json!(*f as f64))
        .collect();
    Value::Array(values).to_string()
}

#[async_trait]
impl EmbeddingStore for SqliteEmbeddingStore {
    async fn insert_document(&self, doc: NewDocument) -> Result<i64, ApiError> {
        let metadata = doc.metadata.to_string();
        let result = sqlx::query(
            "INSERT INTO rag_documents (filename, source_path, content_hash, owner, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&doc.filename)
        .bind(&doc.source_path)
        .bind(&doc.content_hash)
        .bind(&doc.owner)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    async fn update_document(&self, document_id: i64, doc: NewDocument) -> Result<(), ApiError> {
        let metadata = doc.metadata.to_string();
        let result = sqlx::query(
            "UPDATE rag_documents
             SET filename = ?1, source_path = ?2, content_hash = ?3, owner = ?4, metadata = ?5
             WHERE id = ?6",
        )
        .bind(&doc.filename)
        .bind(&doc.source_path)
        .bind(&doc.content_hash)
        .bind(&doc.owner)
        .bind(&metadata)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Document not found".to_string()));
        }
        Ok(())
    }

    async fn delete_chunks_for_document(&self, document_id: i64) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM rag_chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected())
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<i64, ApiError> {
        let text_embedding = chunk.text_embedding.as_deref().map(encode_embedding);
        let image_embedding = chunk.image_embedding.as_deref().map(encode_embedding);
        let metadata = chunk.metadata.to_string();

        let result = sqlx::query(
            "INSERT INTO rag_chunks (
                document_id, chunk_type, page_number, chunk_index, content,
                text_embedding, image_embedding, image_base64, linked_chunk_id, metadata
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(chunk.document_id)
        .bind(chunk.kind.as_str())
        .bind(chunk.page_number)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&text_embedding)
        .bind(&image_embedding)
        .bind(&chunk.image_base64)
        .bind(chunk.linked_chunk_id)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch_text_chunks(&self, limit: usize) -> Result<Vec<StoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, document_id, page_number, chunk_index, content, text_embedding, metadata
             FROM rag_chunks
             WHERE chunk_type = 'text' AND text_embedding IS NOT NULL
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let raw_embedding: Option<String> = row.get("text_embedding");
                StoredChunk {
                    id: row.get("id"),
                    document_id: row.get("document_id"),
                    page_number: row.get("page_number"),
                    chunk_index: row.get("chunk_index"),
                    content: row.get::<Option<String>, _>("content").unwrap_or_default(),
                    embedding: parse_embedding(raw_embedding.as_deref()),
                    metadata: Self::parse_metadata(row.get("metadata")),
                }
            })
            .collect())
    }

    async fn fetch_images_for_chunks(
        &self,
        chunk_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ImageRef>>, ApiError> {
        if chunk_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, linked_chunk_id, page_number, chunk_index, image_base64, metadata
             FROM rag_chunks
             WHERE chunk_type = 'image' AND linked_chunk_id IN ({})
             ORDER BY id",
            Self::placeholders(chunk_ids.len()),
        );

        let mut query = sqlx::query(&sql);
        for id in chunk_ids {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut grouped: HashMap<i64, Vec<ImageRef>> = HashMap::new();
        for row in &rows {
            let image = ImageRef {
                id: row.get("id"),
                linked_chunk_id: row.get("linked_chunk_id"),
                page_number: row.get("page_number"),
                chunk_index: row.get("chunk_index"),
                image_base64: row
                    .get::<Option<String>, _>("image_base64")
                    .unwrap_or_default(),
                metadata: Self::parse_metadata(row.get("metadata")),
            };
            grouped.entry(image.linked_chunk_id).or_default().push(image);
        }
        Ok(grouped)
    }

    async fn fetch_documents_by_ids(
        &self,
        document_ids: &[i64],
    ) -> Result<HashMap<i64, Document>, ApiError> {
        let mut unique: Vec<i64> = document_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, filename, source_path, content_hash, owner, metadata
             FROM rag_documents
             WHERE id IN ({})",
            Self::placeholders(unique.len()),
        );

        let mut query = sqlx::query(&sql);
        for id in &unique {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let doc = Self::row_to_document(row);
                (doc.id, doc)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteEmbeddingStore {
        let tmp = std::env::temp_dir().join(format!("docatlas-test-{}.db", uuid::Uuid::new_v4()));
        SqliteEmbeddingStore::new(tmp).await.unwrap()
    }

    fn make_document(filename: &str) -> NewDocument {
        NewDocument {
            filename: filename.to_string(),
            source_path: format!("/uploads/{filename}"),
            content_hash: "abc123".to_string(),
            owner: "tester".to_string(),
            metadata: serde_json::json!({ "source": "pdf_upload" }),
        }
    }

    fn text_chunk(document_id: i64, page: i64, index: i64, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            document_id,
            kind: ChunkKind::Text,
            page_number: page,
            chunk_index: index,
            content: Some(format!("chunk {page}/{index}")),
            text_embedding: Some(embedding),
            image_embedding: None,
            image_base64: None,
            linked_chunk_id: None,
            metadata: serde_json::json!({ "type": "text" }),
        }
    }

    #[test]
    fn embedding_codec_round_trips() {
        let raw = encode_embedding(&[1.0, 2.5, -0.25]);
        assert_eq!(parse_embedding(Some(&raw)), Some(vec![1.0, 2.5, -0.25]));
    }

    #[test]
    fn parse_embedding_accepts_spaced_json() {
        assert_eq!(
            parse_embedding(Some("[1.0, 2.0, 3.0]")),
            Some(vec![1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn parse_embedding_rejects_garbage_without_panicking() {
        assert_eq!(parse_embedding(None), None);
        assert_eq!(parse_embedding(Some("not json")), None);
        assert_eq!(parse_embedding(Some("{\"a\": 1}")), None);
        assert_eq!(parse_embedding(Some("[1.0, \"x\"]")), None);
    }

    #[tokio::test]
    async fn insert_and_fetch_text_chunks() {
        let store = test_store().await;
        let doc_id = store.insert_document(make_document("manual.pdf")).await.unwrap();

        store
            .insert_chunk(text_chunk(doc_id, 1, 1, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert_chunk(text_chunk(doc_id, 1, 2, vec![0.0, 1.0]))
            .await
            .unwrap();

        let chunks = store.fetch_text_chunks(10).await.unwrap();
        assert_eq!(chunks.len(), 2);
        // most recent insert first
        assert_eq!(chunks[0].chunk_index, 2);
        assert_eq!(chunks[0].embedding, Some(vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn images_group_under_their_linked_chunk() {
        let store = test_store().await;
        let doc_id = store.insert_document(make_document("figures.pdf")).await.unwrap();

        let text_id = store
            .insert_chunk(text_chunk(doc_id, 1, 1, vec![1.0]))
            .await
            .unwrap();

        for i in 1..=2 {
            store
                .insert_chunk(NewChunk {
                    document_id: doc_id,
                    kind: ChunkKind::Image,
                    page_number: 1,
                    chunk_index: i,
                    content: None,
                    text_embedding: None,
                    image_embedding: Some(vec![0.5, 0.5]),
                    image_base64: Some("aGVsbG8=".to_string()),
                    linked_chunk_id: Some(text_id),
                    metadata: serde_json::json!({ "type": "image" }),
                })
                .await
                .unwrap();
        }

        let grouped = store.fetch_images_for_chunks(&[text_id]).await.unwrap();
        assert_eq!(grouped[&text_id].len(), 2);
        assert!(grouped[&text_id].iter().all(|img| img.linked_chunk_id == text_id));

        let empty = store.fetch_images_for_chunks(&[]).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn documents_batch_fetch_dedupes_ids() {
        let store = test_store().await;
        let a = store.insert_document(make_document("a.pdf")).await.unwrap();
        let b = store.insert_document(make_document("b.pdf")).await.unwrap();

        let docs = store.fetch_documents_by_ids(&[a, b, a, a]).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[&a].filename, "a.pdf");
        assert_eq!(docs[&a].file_url(), format!("/api/documents/{a}/file"));

        assert!(store.fetch_document(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_document_overwrites_record_in_place() {
        let store = test_store().await;
        let doc_id = store.insert_document(make_document("draft.pdf")).await.unwrap();

        store
            .update_document(
                doc_id,
                NewDocument {
                    filename: "final.pdf".to_string(),
                    source_path: "/uploads/final.pdf".to_string(),
                    content_hash: "def456".to_string(),
                    owner: "tester".to_string(),
                    metadata: serde_json::json!({ "source": "replace" }),
                },
            )
            .await
            .unwrap();

        let doc = store.fetch_document(doc_id).await.unwrap().unwrap();
        assert_eq!(doc.filename, "final.pdf");
        assert_eq!(doc.content_hash, "def456");
        assert_eq!(doc.metadata["source"], "replace");

        let err = store
            .update_document(9999, make_document("ghost.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_chunks_clears_only_the_given_document() {
        let store = test_store().await;
        let keep = store.insert_document(make_document("keep.pdf")).await.unwrap();
        let stale = store.insert_document(make_document("stale.pdf")).await.unwrap();

        store.insert_chunk(text_chunk(keep, 1, 1, vec![1.0])).await.unwrap();
        store.insert_chunk(text_chunk(stale, 1, 1, vec![1.0])).await.unwrap();
        store.insert_chunk(text_chunk(stale, 1, 2, vec![0.5])).await.unwrap();

        let removed = store.delete_chunks_for_document(stale).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = store.fetch_text_chunks(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].document_id, keep);
    }

    #[tokio::test]
    async fn vector_search_reports_unsupported() {
        let store = test_store().await;
        assert!(!store.supports_vector_search());
        let err = store.vector_search(&[1.0], 5).await.unwrap_err();
        assert!(matches!(err, ApiError::Unsupported(_)));
    }
}
