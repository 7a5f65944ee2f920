use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use siphasher::sip::SipHasher13;
use thiserror::Error;

use crate::extraction::StructuredRecord;
use crate::ranking::embedding::{cosine_similarity, Embedding, EmbeddingSource};
use crate::ranking::tokenizer::{self, WeightedToken};

/// Fixed seeds keep the hash embedding deterministic across runs and Rust
/// versions. Changing them changes every embedding, so bump the embedder
/// version alongside.
const HASH_SEED_K0: u64 = 0x5e15_ab12_9c04_77d1;
const HASH_SEED_K1: u64 = 0x23f8_6d0e_41ba_95c6;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("record produced no tokens to embed")]
    EmptyInput,
}

/// Bi-encoder seam. Job and candidates embed independently into one shared
/// space; similarity is plain cosine over the resulting vectors.
pub trait Embedder: Send + Sync {
    /// Implementation name, recorded in the bi-encoder artifact.
    fn name(&self) -> &'static str;
    /// Version tag for embedding-generation management.
    fn version(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed_record(
        &self,
        record: &StructuredRecord,
        source: EmbeddingSource,
    ) -> Result<Embedding, EmbedError>;
}

/// Deterministic feature-hashing embedder: no model download, no training,
/// O(tokens) per document. Weighted tokens from the structured record are
/// sign-hashed into a fixed-dimension vector and L2-normalized.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn tokens_to_embedding(
        &self,
        tokens: &[WeightedToken],
        source: EmbeddingSource,
    ) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for wt in tokens {
            let idx = self.hash_token(&wt.token);
            let sign = if self.hash_token(&format!("{}_sign", wt.token)) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign * wt.weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Embedding {
            vector,
            source,
            created_at: chrono::Utc::now(),
        }
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn version(&self) -> &str {
        "v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_record(
        &self,
        record: &StructuredRecord,
        source: EmbeddingSource,
    ) -> Result<Embedding, EmbedError> {
        let tokens = tokenizer::tokenize_record(record);
        if tokens.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        Ok(self.tokens_to_embedding(&tokens, source))
    }
}

/// Embedder factory. Unknown names fall back to the hash embedder.
pub fn create_embedder(name: &str, dimension: usize) -> Box<dyn Embedder> {
    match name {
        "hash" => Box::new(HashEmbedder::new(dimension)),
        other => {
            tracing::warn!(requested = other, "unknown embedder; falling back to hash");
            Box::new(HashEmbedder::new(dimension))
        }
    }
}

/// One surviving candidate from the bi-encoder gate.
#[derive(Debug, Clone, Serialize)]
pub struct ShortlistEntry {
    /// Original insertion index; the final deterministic tiebreak.
    pub index: usize,
    pub id: String,
    /// Raw cosine similarity to the job, in [-1, 1].
    pub similarity: f32,
}

/// Rank candidates by cosine similarity to the job and keep the top `k`.
/// Candidates arrive in insertion order; the stable sort preserves that order
/// on ties. Pruning here is irreversible: anything cut can never reappear
/// downstream.
pub fn shortlist(
    job: &Embedding,
    candidates: &[(String, Embedding)],
    k: usize,
) -> Vec<ShortlistEntry> {
    let mut entries: Vec<ShortlistEntry> = candidates
        .iter()
        .enumerate()
        .map(|(index, (id, embedding))| ShortlistEntry {
            index,
            id: id.clone(),
            similarity: cosine_similarity(&job.vector, &embedding.vector),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    entries.truncate(k);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(skills: &[&str], years: f64, summary: &str) -> StructuredRecord {
        StructuredRecord {
            skills: skills.iter().map(|s| s.to_string()).collect(),
            years_experience: years,
            qualifications: vec![],
            summary: summary.into(),
        }
    }

    fn embed(embedder: &HashEmbedder, record: &StructuredRecord) -> Embedding {
        embedder.embed_record(record, EmbeddingSource::Candidate).unwrap()
    }

    #[test]
    fn embeddings_are_l2_normalized() {
        let embedder = HashEmbedder::new(256);
        let emb = embed(&embedder, &record(&["rust", "python"], 5.0, "engineer"));

        let norm: f32 = emb.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn embedding_is_deterministic_across_calls() {
        let embedder = HashEmbedder::new(128);
        let r = record(&["python"], 3.0, "backend");

        let a = embed(&embedder, &r);
        let b = embed(&embedder, &r);

        assert_eq!(a.vector, b.vector);
    }

    #[test]
    fn empty_record_fails_to_embed() {
        let embedder = HashEmbedder::new(64);
        let result = embedder.embed_record(&StructuredRecord::default(), EmbeddingSource::Candidate);
        assert!(matches!(result, Err(EmbedError::EmptyInput)));
    }

    #[test]
    fn matching_skills_beat_disjoint_skills() {
        let embedder = HashEmbedder::new(256);
        let job = embedder
            .embed_record(
                &record(&["Python"], 3.0, "Python developer"),
                EmbeddingSource::Job,
            )
            .unwrap();

        let python_dev = embed(&embedder, &record(&["Python"], 5.0, "Python developer"));
        let java_dev = embed(&embedder, &record(&["Java"], 2.0, "Java developer"));

        let sim_python = cosine_similarity(&job.vector, &python_dev.vector);
        let sim_java = cosine_similarity(&job.vector, &java_dev.vector);

        assert!(sim_python > sim_java);
    }

    #[test]
    fn shortlist_is_bounded_and_sorted() {
        let embedder = HashEmbedder::new(256);
        let job = embedder
            .embed_record(&record(&["python"], 3.0, ""), EmbeddingSource::Job)
            .unwrap();

        let candidates: Vec<(String, Embedding)> = (0..10)
            .map(|i| {
                let skills: Vec<String> =
                    if i % 2 == 0 { vec!["python".into()] } else { vec!["cobol".into()] };
                let r = StructuredRecord {
                    skills,
                    years_experience: i as f64 + 1.0,
                    ..Default::default()
                };
                (format!("c{i}"), embed(&embedder, &r))
            })
            .collect();

        let top = shortlist(&job, &candidates, 3);

        assert_eq!(top.len(), 3);
        assert!(top.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn shortlist_returns_all_when_k_exceeds_pool() {
        let embedder = HashEmbedder::new(64);
        let job = embedder
            .embed_record(&record(&["go"], 1.0, ""), EmbeddingSource::Job)
            .unwrap();
        let candidates = vec![(
            "only".to_string(),
            embed(&embedder, &record(&["go"], 2.0, "")),
        )];

        assert_eq!(shortlist(&job, &candidates, 5).len(), 1);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let embedder = HashEmbedder::new(64);
        let r = record(&["go"], 2.0, "");
        let job = embedder.embed_record(&r, EmbeddingSource::Job).unwrap();

        // Identical records embed identically, forcing an exact tie.
        let candidates = vec![
            ("first".to_string(), embed(&embedder, &r)),
            ("second".to_string(), embed(&embedder, &r)),
        ];

        let top = shortlist(&job, &candidates, 2);
        assert_eq!(top[0].id, "first");
        assert_eq!(top[1].id, "second");
    }
}
