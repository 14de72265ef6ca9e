//! Cosine top-k retrieval over a loaded index.
//!
//! Pure computation over immutable arrays; no synchronization, no I/O after
//! load.

use tracing::debug;

use clipvault_common::ClipVaultError;

use crate::index::{load_index, IndexMeta, IndexPaths};
use crate::matrix::VectorMatrix;

/// Norm floor for degenerate zero vectors.
const NORM_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub url: Option<String>,
    pub timestamp: Option<i64>,
}

pub struct Retriever {
    meta: IndexMeta,
    matrix: VectorMatrix,
}

impl Retriever {
    /// Assemble a retriever, enforcing the ids/rows invariant.
    pub fn new(meta: IndexMeta, matrix: VectorMatrix) -> Result<Self, ClipVaultError> {
        if meta.ids.len() != matrix.rows() {
            return Err(ClipVaultError::Store(format!(
                "index holds {} ids but matrix has {} rows",
                meta.ids.len(),
                matrix.rows()
            )));
        }
        Ok(Self { meta, matrix })
    }

    /// Load a persisted index from disk.
    pub fn load(paths: &IndexPaths) -> Result<Self, ClipVaultError> {
        let (meta, matrix) = load_index(paths)?;
        Self::new(meta, matrix)
    }

    /// Embedding model the index was built with. Queries must be embedded with
    /// the same model.
    pub fn model(&self) -> &str {
        &self.meta.model
    }

    pub fn len(&self) -> usize {
        self.matrix.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rank the corpus against a query vector. Returns `min(k, N)` hits in
    /// descending cosine similarity; `k == 0` means all. Equal scores keep
    /// their original row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, ClipVaultError> {
        if query.len() != self.matrix.dim() {
            return Err(ClipVaultError::DimensionMismatch {
                query: query.len(),
                index: self.matrix.dim(),
            });
        }

        let q = normalize(query);
        let scores: Vec<f32> = (0..self.matrix.rows())
            .map(|i| dot(&normalize(self.matrix.row(i)), &q))
            .collect();

        let mut order: Vec<usize> = (0..scores.len()).collect();
        // stable sort: ties keep ascending row order
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let take = if k == 0 { order.len() } else { k.min(order.len()) };
        debug!(corpus = scores.len(), k, returned = take, "Similarity search");

        Ok(order[..take]
            .iter()
            .map(|&i| SearchHit {
                id: self.meta.ids[i].clone(),
                score: scores[i],
                url: self.meta.meta[i].url.clone(),
                timestamp: self.meta.meta[i].timestamp,
            })
            .collect())
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ItemMeta;
    use chrono::Utc;

    fn retriever(rows: &[&[f32]], ids: &[&str]) -> Retriever {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut matrix = VectorMatrix::new(dim);
        for row in rows {
            matrix.push_row(row).unwrap();
        }
        let meta = IndexMeta {
            model: "test-embedding".to_string(),
            created_at: Utc::now(),
            count: ids.len(),
            dim,
            ids: ids.iter().map(|s| s.to_string()).collect(),
            meta: ids
                .iter()
                .map(|s| ItemMeta {
                    id: s.to_string(),
                    url: None,
                    timestamp: None,
                    text_len: 0,
                })
                .collect(),
        };
        Retriever::new(meta, matrix).unwrap()
    }

    #[test]
    fn cosine_of_vector_with_itself_is_one() {
        let r = retriever(&[&[0.3, -1.7, 2.2]], &["a"]);
        let hits = r.search(&[0.3, -1.7, 2.2], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ranks_corpus_by_similarity() {
        let r = retriever(&[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0]], &["a", "b", "c"]);
        let hits = r.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].id, "c");
        assert!((hits[1].score - 0.70710677).abs() < 1e-5);
    }

    #[test]
    fn k_zero_returns_all_sorted_descending() {
        let r = retriever(&[&[0.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]], &["a", "b", "c"]);
        let hits = r.search(&[1.0, 0.0], 0).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn k_larger_than_corpus_is_clamped() {
        let r = retriever(&[&[1.0, 0.0]], &["a"]);
        let hits = r.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn equal_scores_keep_row_order() {
        let r = retriever(
            &[&[1.0, 0.0], &[2.0, 0.0], &[3.0, 0.0]],
            &["first", "second", "third"],
        );
        let hits = r.search(&[1.0, 0.0], 0).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn zero_vector_does_not_divide_by_zero() {
        let r = retriever(&[&[0.0, 0.0], &[1.0, 0.0]], &["zero", "one"]);
        let hits = r.search(&[1.0, 0.0], 0).unwrap();
        assert_eq!(hits[0].id, "one");
        assert!(hits.iter().all(|h| h.score.is_finite()));
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let r = retriever(&[&[1.0, 0.0]], &["a"]);
        match r.search(&[1.0, 0.0, 0.0], 1) {
            Err(ClipVaultError::DimensionMismatch { query, index }) => {
                assert_eq!(query, 3);
                assert_eq!(index, 2);
            }
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
    }
}
