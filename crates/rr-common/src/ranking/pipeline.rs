use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{PipelineConfig, RetryPolicy};
use crate::error::{CallOutcome, RunError};
use crate::extraction::{prompts, Extracted, SchemaKind, StructuredExtractor, StructuredRecord};
use crate::oracle::call_with_retry;
use crate::ranking::bi_encoder::{shortlist, Embedder, ShortlistEntry};
use crate::ranking::embedding::EmbeddingSource;
use crate::ranking::ensemble::{combine, EnsembleWeights, ExcludedCandidate, RankedResult};
use crate::ranking::judge::{JudgeScorer, JudgeVerdict};
use crate::ranking::PairwiseScorer;
use crate::Document;

/// Pipeline progress. Stages run strictly in this order; none may be
/// skipped, and output is persisted only from `Ranked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Loaded,
    Extracted,
    Shortlisted,
    Rescored,
    Ranked,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Loaded => "loaded",
            PipelineState::Extracted => "extracted",
            PipelineState::Shortlisted => "shortlisted",
            PipelineState::Rescored => "rescored",
            PipelineState::Ranked => "ranked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub job: Document,
    /// Candidates in insertion order; that order is the final tiebreak.
    pub candidates: Vec<Document>,
}

/// One candidate's structured record, as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredCandidate {
    pub id: String,
    pub record: StructuredRecord,
}

/// Bi-encoder stage artifact: which embedder produced the shortlist and what
/// survived the gate.
#[derive(Debug, Clone, Serialize)]
pub struct BiEncoderRanking {
    pub embedder: String,
    pub embedder_version: String,
    pub entries: Vec<ShortlistEntry>,
}

pub struct PipelineOutput {
    pub structured_job: StructuredRecord,
    pub structured_candidates: Vec<StructuredCandidate>,
    pub bi_encoder_ranking: BiEncoderRanking,
    pub result: RankedResult,
}

/// The whole cascade: extract, embed + shortlist, rescore, combine. Stages
/// execute sequentially; per-candidate work inside a stage runs concurrently
/// under a bounded permit count.
pub struct RankingPipeline {
    top_n: usize,
    concurrency: usize,
    weights: EnsembleWeights,
    retry: RetryPolicy,
    extractor: StructuredExtractor,
    embedder: Box<dyn Embedder>,
    cross: Arc<dyn PairwiseScorer>,
    judge: JudgeScorer,
    cancel: Arc<AtomicBool>,
}

impl RankingPipeline {
    pub fn new(
        config: &PipelineConfig,
        retry: RetryPolicy,
        extractor: StructuredExtractor,
        embedder: Box<dyn Embedder>,
        cross: Arc<dyn PairwiseScorer>,
        judge: JudgeScorer,
    ) -> Result<Self, RunError> {
        let weights = EnsembleWeights::new(config.judge_weight, config.cross_weight)?;
        Ok(Self {
            top_n: config.top_n,
            concurrency: config.concurrency.max(1),
            weights,
            retry,
            extractor,
            embedder,
            cross,
            judge,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag for cancelling the run between stages. In-flight
    /// per-candidate calls of the current stage still complete and are
    /// recorded.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn check_cancelled(&self, state: PipelineState) -> Result<(), RunError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(RunError::Cancelled {
                state: state.as_str(),
            });
        }
        Ok(())
    }

    pub async fn run(&self, input: PipelineInput) -> Result<PipelineOutput, RunError> {
        let mut warnings: Vec<String> = Vec::new();
        let mut excluded: Vec<ExcludedCandidate> = Vec::new();

        if input.candidates.is_empty() {
            return Err(RunError::NoSurvivors {
                state: PipelineState::Loaded.as_str(),
            });
        }
        self.check_cancelled(PipelineState::Loaded)?;

        // Stage 1: structured extraction.
        let structured_job = {
            let extracted = self
                .extractor
                .extract(&input.job.id, &input.job.text, SchemaKind::JobDescription)
                .await;
            if let Some(warning) = extracted.warning {
                warnings.push(warning);
            }
            extracted.record
        };
        let structured_candidates = self
            .extract_candidates(&input.candidates, &mut warnings)
            .await;
        info!(
            candidates = structured_candidates.len(),
            "structured extraction complete"
        );
        self.check_cancelled(PipelineState::Extracted)?;

        // Stage 2: bi-encoder shortlist. The sole gate: anything excluded
        // here never reappears downstream.
        let job_embedding = match self
            .embedder
            .embed_record(&structured_job, EmbeddingSource::Job)
        {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "job description produced no embedding");
                return Err(RunError::NoSurvivors {
                    state: PipelineState::Shortlisted.as_str(),
                });
            }
        };

        let mut candidate_embeddings = Vec::new();
        for candidate in &structured_candidates {
            match self
                .embedder
                .embed_record(&candidate.record, EmbeddingSource::Candidate)
            {
                Ok(embedding) => candidate_embeddings.push((candidate.id.clone(), embedding)),
                Err(err) => {
                    warn!(id = %candidate.id, error = %err, "embedding failed; excluding candidate");
                    excluded.push(ExcludedCandidate {
                        id: candidate.id.clone(),
                        reason: format!("embedding failed: {err}"),
                    });
                }
            }
        }

        let entries = shortlist(&job_embedding, &candidate_embeddings, self.top_n);
        if entries.is_empty() {
            return Err(RunError::NoSurvivors {
                state: PipelineState::Shortlisted.as_str(),
            });
        }
        info!(
            shortlisted = entries.len(),
            of = candidate_embeddings.len(),
            "bi-encoder shortlist complete"
        );
        self.check_cancelled(PipelineState::Shortlisted)?;

        // Stage 3: cross-encoder + judge rescoring, shortlist only.
        let (cross_scores, judge_verdicts) = self
            .rescore(&structured_job, &structured_candidates, &entries, &mut warnings)
            .await;
        self.check_cancelled(PipelineState::Rescored)?;

        // Stage 4: ensemble merge.
        let mut result = combine(&entries, &cross_scores, &judge_verdicts, self.weights);
        result.excluded.extend(excluded);
        result.warnings = warnings;
        if result.ranked.is_empty() {
            return Err(RunError::NoSurvivors {
                state: PipelineState::Ranked.as_str(),
            });
        }
        info!(ranked = result.ranked.len(), "final ranking complete");

        Ok(PipelineOutput {
            structured_job,
            structured_candidates,
            bi_encoder_ranking: BiEncoderRanking {
                embedder: self.embedder.name().to_string(),
                embedder_version: self.embedder.version().to_string(),
                entries,
            },
            result,
        })
    }

    /// Extract every candidate concurrently under the permit bound. Results
    /// come back keyed by insertion index, so output order is deterministic
    /// regardless of completion order.
    async fn extract_candidates(
        &self,
        candidates: &[Document],
        warnings: &mut Vec<String>,
    ) -> Vec<StructuredCandidate> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, String, Extracted)> = JoinSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let extractor = self.extractor.clone();
            let id = candidate.id.clone();
            let text = candidate.text.clone();
            tasks.spawn(async move {
                // The semaphore is never closed while tasks run.
                let _permit = semaphore.acquire_owned().await.ok();
                let extracted = extractor.extract(&id, &text, SchemaKind::Resume).await;
                (index, id, extracted)
            });
        }

        let mut slots: Vec<Option<StructuredCandidate>> = (0..candidates.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, id, extracted)) => {
                    if let Some(warning) = extracted.warning {
                        warnings.push(warning);
                    }
                    slots[index] = Some(StructuredCandidate {
                        id,
                        record: extracted.record,
                    });
                }
                Err(err) => warn!(error = %err, "extraction task failed"),
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Run cross-encoder and judge for each shortlisted candidate. A failed
    /// call leaves that stage unscored for that candidate (sentinel); the
    /// other stage's score, if present, is still usable.
    async fn rescore(
        &self,
        structured_job: &StructuredRecord,
        structured_candidates: &[StructuredCandidate],
        entries: &[ShortlistEntry],
        warnings: &mut Vec<String>,
    ) -> (HashMap<String, f64>, HashMap<String, JudgeVerdict>) {
        let records: HashMap<&str, &StructuredRecord> = structured_candidates
            .iter()
            .map(|c| (c.id.as_str(), &c.record))
            .collect();

        let job_record = Arc::new(structured_job.clone());
        let job_signal = Arc::new(prompts::signal_text(structured_job));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(String, Option<f64>, Option<JudgeVerdict>, Vec<String>)> =
            JoinSet::new();

        for entry in entries {
            let Some(record) = records.get(entry.id.as_str()) else {
                // Shortlist entries come from the candidate set; a miss here
                // would be a bug, not an input problem.
                warn!(id = %entry.id, "shortlisted candidate has no structured record");
                continue;
            };
            let id = entry.id.clone();
            let candidate_record = (*record).clone();
            let candidate_signal = prompts::signal_text(record);
            let job_record = Arc::clone(&job_record);
            let job_signal = Arc::clone(&job_signal);
            let cross = Arc::clone(&self.cross);
            let judge = self.judge.clone();
            let retry = self.retry;
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let mut task_warnings = Vec::new();

                let cross_score = match call_with_retry("cross-encoder", retry, || {
                    cross.score(&job_signal, &candidate_signal)
                })
                .await
                {
                    CallOutcome::Ok(score) => Some(score),
                    CallOutcome::Transient(err) | CallOutcome::Permanent(err) => {
                        task_warnings.push(format!("cross-encoder unscored for {id}: {err}"));
                        None
                    }
                };

                let verdict = match judge.judge(&job_record, &candidate_record).await {
                    Ok(verdict) => Some(verdict),
                    Err(err) => {
                        task_warnings.push(format!("judge unscored for {id}: {err}"));
                        None
                    }
                };

                (id, cross_score, verdict, task_warnings)
            });
        }

        let mut cross_scores = HashMap::new();
        let mut judge_verdicts = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, cross_score, verdict, task_warnings)) => {
                    warnings.extend(task_warnings);
                    if let Some(score) = cross_score {
                        cross_scores.insert(id.clone(), score);
                    }
                    if let Some(verdict) = verdict {
                        judge_verdicts.insert(id, verdict);
                    }
                }
                Err(err) => warn!(error = %err, "rescore task failed"),
            }
        }

        (cross_scores, judge_verdicts)
    }
}
