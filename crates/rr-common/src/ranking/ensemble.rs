use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use strum::Display;
use tracing::warn;

use crate::error::ConfigurationError;
use crate::ranking::bi_encoder::ShortlistEntry;
use crate::ranking::judge::JudgeVerdict;

/// Scoring stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    BiEncoder,
    CrossEncoder,
    Judge,
}

/// Documented raw-score range of a stage, used to bring heterogeneous scales
/// onto [0, 1] before weighting (a judge scale of 0..10 must not dominate a
/// cosine in -1..1).
#[derive(Debug, Clone, Copy)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    /// Normalize a raw score into [0, 1], clamping outliers.
    pub fn normalize(&self, raw: f64) -> f64 {
        if self.max <= self.min {
            return raw.clamp(0.0, 1.0);
        }
        ((raw - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

pub const BI_ENCODER_RANGE: ScoreRange = ScoreRange { min: -1.0, max: 1.0 };
pub const CROSS_ENCODER_RANGE: ScoreRange = ScoreRange { min: 0.0, max: 10.0 };
pub const JUDGE_RANGE: ScoreRange = ScoreRange { min: 0.0, max: 10.0 };

pub fn stage_range(stage: Stage) -> ScoreRange {
    match stage {
        Stage::BiEncoder => BI_ENCODER_RANGE,
        Stage::CrossEncoder => CROSS_ENCODER_RANGE,
        Stage::Judge => JUDGE_RANGE,
    }
}

/// Per-candidate raw scores, keyed by stage. Append-only: each stage owns its
/// key and a second write to the same key is rejected, not overwritten.
#[derive(Debug, Clone, Default)]
pub struct ScoreSheet {
    entries: BTreeMap<Stage, f64>,
}

impl ScoreSheet {
    pub fn record(&mut self, stage: Stage, score: f64) -> bool {
        if self.entries.contains_key(&stage) {
            warn!(%stage, score, "refusing to overwrite existing stage score");
            return false;
        }
        self.entries.insert(stage, score);
        true
    }

    pub fn get(&self, stage: Stage) -> Option<f64> {
        self.entries.get(&stage).copied()
    }

    /// Raw-score breakdown for display/persistence.
    pub fn breakdown(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(stage, score)| (stage.to_string(), *score))
            .collect()
    }
}

/// Ensemble weights, validated at construction. They need not sum to 1; the
/// combiner divides by the sum of weights actually applicable per candidate.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleWeights {
    judge: f64,
    cross: f64,
}

impl EnsembleWeights {
    pub fn new(judge: f64, cross: f64) -> Result<Self, ConfigurationError> {
        if judge < 0.0 {
            return Err(ConfigurationError::NegativeWeight {
                which: "judge",
                value: judge,
            });
        }
        if cross < 0.0 {
            return Err(ConfigurationError::NegativeWeight {
                which: "cross-encoder",
                value: cross,
            });
        }
        if judge + cross == 0.0 {
            return Err(ConfigurationError::ZeroWeightSum);
        }
        Ok(Self { judge, cross })
    }

    pub fn judge(&self) -> f64 {
        self.judge
    }

    pub fn cross(&self) -> f64 {
        self.cross
    }
}

/// One candidate in the final ordering. `final_score` is on [0, 1];
/// per-stage raw scores sit in `breakdown`. An unscored stage shows up as a
/// `None` rather than a silent zero.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub id: String,
    pub final_score: f64,
    /// Raw cosine from the bi-encoder gate; first tiebreak.
    pub bi_encoder_similarity: f64,
    pub cross_score: Option<f64>,
    pub judge_score: Option<f64>,
    /// Judge rationale, carried for inspection only.
    pub judge_verdict: Option<JudgeVerdict>,
    pub breakdown: BTreeMap<String, f64>,
}

/// A candidate dropped from the ranking, with the reason on record so nobody
/// vanishes silently.
#[derive(Debug, Clone, Serialize)]
pub struct ExcludedCandidate {
    pub id: String,
    pub reason: String,
}

/// Final output artifact. Write-once; consumed for display and persistence.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RankedResult {
    pub ranked: Vec<RankedCandidate>,
    pub excluded: Vec<ExcludedCandidate>,
    pub warnings: Vec<String>,
}

/// Merge cross-encoder and judge scores into one ordering over the shortlist.
///
/// Each available raw score normalizes to [0, 1] by its stage range, then
/// combines as a weighted mean over the weights actually applicable: a
/// candidate missing one score is ranked on the other at full relative
/// weight. A candidate missing both is excluded with a reason. Ordering:
/// final score desc, then bi-encoder similarity desc, then insertion order.
pub fn combine(
    shortlist: &[ShortlistEntry],
    cross_scores: &HashMap<String, f64>,
    judge_verdicts: &HashMap<String, JudgeVerdict>,
    weights: EnsembleWeights,
) -> RankedResult {
    let mut result = RankedResult::default();
    let mut scored: Vec<(usize, RankedCandidate)> = Vec::new();

    for entry in shortlist {
        let mut sheet = ScoreSheet::default();
        sheet.record(Stage::BiEncoder, entry.similarity as f64);

        let cross = cross_scores.get(&entry.id).copied();
        if let Some(score) = cross {
            sheet.record(Stage::CrossEncoder, score);
        }

        let verdict = judge_verdicts.get(&entry.id).cloned();
        let judge = verdict.as_ref().map(|v| v.final_score);
        if let Some(score) = judge {
            sheet.record(Stage::Judge, score);
        }

        let mut weighted_sum = 0.0;
        let mut weight_used = 0.0;
        if let Some(score) = judge {
            weighted_sum += weights.judge() * JUDGE_RANGE.normalize(score);
            weight_used += weights.judge();
        }
        if let Some(score) = cross {
            weighted_sum += weights.cross() * CROSS_ENCODER_RANGE.normalize(score);
            weight_used += weights.cross();
        }

        if weight_used == 0.0 {
            warn!(id = %entry.id, "no rescoring signal; excluding from final ranking");
            result.excluded.push(ExcludedCandidate {
                id: entry.id.clone(),
                reason: "unscored by both cross-encoder and judge".into(),
            });
            continue;
        }

        scored.push((
            entry.index,
            RankedCandidate {
                id: entry.id.clone(),
                final_score: weighted_sum / weight_used,
                bi_encoder_similarity: entry.similarity as f64,
                cross_score: cross,
                judge_score: judge,
                judge_verdict: verdict,
                breakdown: sheet.breakdown(),
            },
        ));
    }

    scored.sort_by(|(index_a, a), (index_b, b)| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.bi_encoder_similarity
                    .partial_cmp(&a.bi_encoder_similarity)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| index_a.cmp(index_b))
    });

    result.ranked = scored.into_iter().map(|(_, candidate)| candidate).collect();
    result
}
