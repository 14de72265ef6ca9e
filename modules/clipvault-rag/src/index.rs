//! Vector index build and persistence.
//!
//! The index is a pair of files under `{profile}/rag/index/`: `embeddings.bin`
//! (row-major f32 matrix) and `metadata.json` (model, ids, per-item meta).
//! Rebuilding replaces the whole pair; there is no incremental append.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use ai_client::EmbedAgent;
use clipvault_common::{store::write_json, ClipVaultError, ProfileStore, VideoRecord};

use crate::matrix::VectorMatrix;

pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Cooperative pause between embedding batches. Politeness, not correctness.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Per-item metadata persisted in the sidecar, row-aligned with the matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub text_len: usize,
}

/// The index sidecar. `ids[i]` corresponds to row `i` of the matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub count: usize,
    pub dim: usize,
    pub ids: Vec<String>,
    pub meta: Vec<ItemMeta>,
}

/// File locations for a profile's index.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    dir: PathBuf,
}

impl IndexPaths {
    pub fn new(store: &ProfileStore) -> Self {
        Self {
            dir: store.rag_dir().join("index"),
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.dir.join("embeddings.bin")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join("metadata.json")
    }
}

/// One embeddable document derived from a record.
#[derive(Debug, Clone)]
pub struct IndexDoc {
    pub id: String,
    pub url: Option<String>,
    pub timestamp: Option<i64>,
    pub text: String,
}

/// Derive embeddable documents from records: title/description prefixed to the
/// transcript text. Records without any text are skipped.
pub fn collect_docs(records: &[VideoRecord]) -> Vec<IndexDoc> {
    records
        .iter()
        .filter_map(|rec| {
            let title = rec.title_or_description().unwrap_or("");
            let transcript = rec.transcript_text().unwrap_or("");
            let text = format!("{title}\n\n{transcript}").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(IndexDoc {
                id: rec.id.clone(),
                url: rec.url.clone(),
                timestamp: rec.timestamp,
                text,
            })
        })
        .collect()
}

/// Derive documents from pre-rendered markdown files under `rag/items/`.
/// Records without a rendered document are skipped.
pub fn collect_rendered_docs(
    store: &ProfileStore,
    records: &[VideoRecord],
) -> Result<Vec<IndexDoc>, ClipVaultError> {
    let items_dir = store.rag_dir().join("items");
    let mut docs = Vec::new();
    for rec in records {
        let path = items_dir.join(format!("{}.md", rec.id));
        if !path.exists() {
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?
            .trim()
            .to_string();
        if text.is_empty() {
            continue;
        }
        docs.push(IndexDoc {
            id: rec.id.clone(),
            url: rec.url.clone(),
            timestamp: rec.timestamp,
            text,
        });
    }
    Ok(docs)
}

pub struct IndexBuilder<'a> {
    embedder: &'a dyn EmbedAgent,
    batch_size: usize,
    pause: Duration,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn EmbedAgent) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            pause: DEFAULT_BATCH_PAUSE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Embed all documents and assemble the index. Vectors are appended in
    /// document enumeration order, batch by batch; a provider error for any
    /// batch aborts the whole build.
    pub async fn build(&self, docs: &[IndexDoc]) -> Result<(IndexMeta, VectorMatrix), ClipVaultError> {
        if docs.is_empty() {
            return Err(ClipVaultError::Embedding(
                "no records with usable text to index".to_string(),
            ));
        }

        let model = self.embedder.embedding_model();
        info!(count = docs.len(), model, "Building vector index");

        let mut matrix: Option<VectorMatrix> = None;
        let batches = docs.chunks(self.batch_size).count();

        for (batch_idx, chunk) in docs.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|d| d.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| ClipVaultError::Embedding(e.to_string()))?;

            if vectors.len() != chunk.len() {
                return Err(ClipVaultError::Embedding(format!(
                    "provider returned {} vectors for a batch of {}",
                    vectors.len(),
                    chunk.len()
                )));
            }

            for vector in &vectors {
                let m = matrix.get_or_insert_with(|| VectorMatrix::new(vector.len()));
                m.push_row(vector)?;
            }

            let done = (batch_idx * self.batch_size + chunk.len()).min(docs.len());
            info!(embedded = done, total = docs.len(), "Embedded batch");

            if batch_idx + 1 < batches && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        // docs is non-empty, so at least one batch ran
        let matrix = matrix.expect("at least one embedding batch");

        let meta = IndexMeta {
            model: model.to_string(),
            created_at: Utc::now(),
            count: docs.len(),
            dim: matrix.dim(),
            ids: docs.iter().map(|d| d.id.clone()).collect(),
            meta: docs
                .iter()
                .map(|d| ItemMeta {
                    id: d.id.clone(),
                    url: d.url.clone(),
                    timestamp: d.timestamp,
                    text_len: d.text.len(),
                })
                .collect(),
        };

        Ok((meta, matrix))
    }
}

/// Persist the index as one unit. The matrix lands first; the sidecar is
/// written last so a torn write never leaves a loadable index pointing at a
/// stale matrix.
pub fn save_index(
    paths: &IndexPaths,
    meta: &IndexMeta,
    matrix: &VectorMatrix,
) -> Result<(), ClipVaultError> {
    std::fs::create_dir_all(paths.dir())
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", paths.dir().display())))?;

    std::fs::write(paths.matrix_path(), matrix.to_bytes())
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", paths.matrix_path().display())))?;
    write_json(&paths.meta_path(), meta)?;

    info!(
        dir = %paths.dir().display(),
        rows = matrix.rows(),
        dim = matrix.dim(),
        "Vector index saved"
    );
    Ok(())
}

/// Load and validate a persisted index. A missing index is a typed
/// missing-prerequisite error; an inconsistent one is a fatal store error.
pub fn load_index(paths: &IndexPaths) -> Result<(IndexMeta, VectorMatrix), ClipVaultError> {
    let meta_path = paths.meta_path();
    let matrix_path = paths.matrix_path();
    if !meta_path.exists() || !matrix_path.exists() {
        return Err(ClipVaultError::IndexMissing(paths.dir().to_path_buf()));
    }

    let raw = std::fs::read_to_string(&meta_path)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", meta_path.display())))?;
    let meta: IndexMeta = serde_json::from_str(&raw)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", meta_path.display())))?;

    if meta.ids.len() != meta.count || meta.meta.len() != meta.count {
        return Err(ClipVaultError::Store(format!(
            "index sidecar inconsistent: count={} ids={} meta={}",
            meta.count,
            meta.ids.len(),
            meta.meta.len()
        )));
    }

    let bytes = std::fs::read(&matrix_path)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", matrix_path.display())))?;
    let matrix = VectorMatrix::from_bytes(meta.dim, meta.count, &bytes)?;

    Ok((meta, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FakeEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl EmbedAgent for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_batch(std::slice::from_ref(&text.to_string()))
                .await
                .map(|mut v| v.remove(0))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; self.dim];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }

        fn embedding_model(&self) -> &str {
            "fake-embedding"
        }
    }

    fn doc(id: &str, text: &str) -> IndexDoc {
        IndexDoc {
            id: id.to_string(),
            url: None,
            timestamp: None,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn build_keeps_enumeration_order_across_batches() {
        let embedder = FakeEmbedder { dim: 4 };
        let builder = IndexBuilder::new(&embedder)
            .with_batch_size(2)
            .with_pause(Duration::ZERO);

        let docs: Vec<IndexDoc> = (0..5)
            .map(|i| doc(&format!("id{i}"), &"x".repeat(i + 1)))
            .collect();

        let (meta, matrix) = builder.build(&docs).await.unwrap();

        assert_eq!(meta.count, 5);
        assert_eq!(matrix.rows(), 5);
        assert_eq!(meta.ids, vec!["id0", "id1", "id2", "id3", "id4"]);
        // row i encodes the text length of doc i
        for i in 0..5 {
            assert_eq!(matrix.row(i)[0], (i + 1) as f32);
        }
    }

    #[tokio::test]
    async fn build_rejects_empty_corpus() {
        let embedder = FakeEmbedder { dim: 4 };
        let builder = IndexBuilder::new(&embedder);
        match builder.build(&[]).await {
            Err(ClipVaultError::Embedding(_)) => {}
            other => panic!("expected embedding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn index_round_trips_through_disk() {
        let embedder = FakeEmbedder { dim: 3 };
        let builder = IndexBuilder::new(&embedder).with_pause(Duration::ZERO);
        let docs = vec![doc("a", "one"), doc("b", "three")];
        let (meta, matrix) = builder.build(&docs).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_dir(dir.path().join("index"));
        save_index(&paths, &meta, &matrix).unwrap();

        let (loaded_meta, loaded_matrix) = load_index(&paths).unwrap();
        assert_eq!(loaded_meta.ids, meta.ids);
        assert_eq!(loaded_meta.model, "fake-embedding");
        assert_eq!(loaded_matrix, matrix);
    }

    #[test]
    fn missing_index_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_dir(dir.path().join("index"));
        match load_index(&paths) {
            Err(ClipVaultError::IndexMissing(p)) => assert!(p.ends_with("index")),
            other => panic!("expected index-missing error, got {other:?}"),
        }
    }

    #[test]
    fn collect_docs_skips_textless_records() {
        let mut with_text = VideoRecord::new("1");
        with_text.title = Some("Title".to_string());
        with_text.transcript = Some(clipvault_common::Transcript {
            text: "spoken words".to_string(),
            model: "m".to_string(),
            provider: "openai".to_string(),
            created_at: Utc::now(),
        });
        let textless = VideoRecord::new("2");

        let docs = collect_docs(&[with_text, textless]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1");
        assert_eq!(docs[0].text, "Title\n\nspoken words");
    }
}
