pub mod bi_encoder;
pub mod cross_encoder;
pub mod embedding;
pub mod ensemble;
pub mod judge;
pub mod pipeline;
pub mod tokenizer;

pub use bi_encoder::{create_embedder, shortlist, Embedder, HashEmbedder, ShortlistEntry};
pub use cross_encoder::{PairwiseScorer, SidecarCrossEncoder};
pub use embedding::{cosine_similarity, Embedding, EmbeddingSource};
pub use ensemble::{combine, EnsembleWeights, RankedCandidate, RankedResult, ScoreSheet, Stage};
pub use judge::{JudgeScorer, JudgeVerdict};
pub use pipeline::{PipelineInput, PipelineOutput, PipelineState, RankingPipeline};
