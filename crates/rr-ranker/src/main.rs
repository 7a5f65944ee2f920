use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use rr_common::config::{CrossEncoderConfig, OracleConfig, PipelineConfig};
use rr_common::extraction::StructuredExtractor;
use rr_common::oracle::{ChatCompletionsClient, OracleClient};
use rr_common::persist::{self, ArtifactPaths};
use rr_common::ranking::ensemble::ExcludedCandidate;
use rr_common::ranking::{
    create_embedder, JudgeScorer, PairwiseScorer, PipelineInput, RankingPipeline,
    SidecarCrossEncoder,
};
use rr_common::textract;
use rr_common::{logging, Document};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "rr-ranker",
    about = "Rank a directory of resumes against a job description"
)]
struct Cli {
    /// Job description file (.pdf, .docx or .txt)
    #[arg(long)]
    job_description: PathBuf,

    /// Directory of candidate resumes
    #[arg(long)]
    resumes_dir: PathBuf,

    /// Where the JSON artifacts are written
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// How many candidates the final ranking keeps
    #[arg(long, default_value_t = 5)]
    top_resumes: usize,

    /// Ensemble weight of the judge score
    #[arg(long, default_value_t = 0.7)]
    judge_weight: f64,

    /// Ensemble weight of the cross-encoder score
    #[arg(long, default_value_t = 0.3)]
    cross_encoder_weight: f64,

    /// Concurrent oracle calls per stage
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Bi-encoder backend name
    #[arg(long, default_value = "hash")]
    embedder: String,

    /// Bi-encoder vector dimension
    #[arg(long, default_value_t = 256)]
    embedding_dimension: usize,
}

impl Cli {
    fn into_config(self) -> PipelineConfig {
        PipelineConfig {
            top_n: self.top_resumes,
            judge_weight: self.judge_weight,
            cross_weight: self.cross_encoder_weight,
            job_description_path: self.job_description,
            resumes_dir: self.resumes_dir,
            data_dir: self.data_dir,
            concurrency: self.concurrency,
            embedder: self.embedder,
            embedding_dimension: self.embedding_dimension,
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_tracing_subscriber("rr-ranker");
    logging::install_tracing_panic_hook("rr-ranker");

    let config = Cli::parse().into_config();
    config.validate()?;

    let job_text = textract::extract_text(&config.job_description_path)?;
    let (candidates, skipped) = textract::load_documents(&config.resumes_dir)?;
    for file in &skipped {
        warn!(path = %file.path.display(), reason = %file.reason, "skipping resume file");
    }
    info!(
        candidates = candidates.len(),
        skipped = skipped.len(),
        job = %config.job_description_path.display(),
        "loaded input documents"
    );

    let oracle_config = OracleConfig::from_env()?;
    info!(
        provider = %oracle_config.provider,
        model = %oracle_config.model,
        endpoint = %oracle_config.endpoint,
        "configured extraction and judge oracle"
    );
    let oracle: Arc<dyn OracleClient> = Arc::new(ChatCompletionsClient::new(&oracle_config)?);

    let cross_config = CrossEncoderConfig::from_env();
    let cross: Arc<dyn PairwiseScorer> = Arc::new(SidecarCrossEncoder::new(&cross_config)?);

    let retry = oracle_config.retry;
    let extractor = StructuredExtractor::new(Arc::clone(&oracle), retry);
    let judge = JudgeScorer::new(Arc::clone(&oracle), retry);
    let embedder = create_embedder(&config.embedder, config.embedding_dimension);

    let pipeline = RankingPipeline::new(&config, retry, extractor, embedder, cross, judge)?;
    let input = PipelineInput {
        job: Document::new("job_description", job_text),
        candidates,
    };
    let mut output = pipeline.run(input).await?;

    // Files skipped at load time join the exclusion record so the artifact
    // accounts for every file found in the resumes directory.
    for file in skipped {
        let id = file
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.display().to_string());
        output
            .result
            .excluded
            .push(ExcludedCandidate {
                id,
                reason: file.reason,
            });
    }

    let paths = ArtifactPaths::new(&config.data_dir);
    persist::write_json(&paths.structured_job_description, &output.structured_job)?;
    persist::write_json(&paths.structured_resumes, &output.structured_candidates)?;
    persist::write_json(&paths.bi_encoder_ranking, &output.bi_encoder_ranking)?;
    persist::write_json(&paths.final_ranking, &output.result)?;

    println!("Final ranking (top {}):", config.top_n);
    for (position, candidate) in output.result.ranked.iter().enumerate() {
        println!(
            "{:>3}. {:<32} score {:.4}  (bi-encoder {:.4})",
            position + 1,
            candidate.id,
            candidate.final_score,
            candidate.bi_encoder_similarity,
        );
    }
    if !output.result.excluded.is_empty() {
        println!("Excluded {} candidate(s):", output.result.excluded.len());
        for excluded in &output.result.excluded {
            println!("  - {}: {}", excluded.id, excluded.reason);
        }
    }
    for warning in &output.result.warnings {
        warn!("{warning}");
    }
    info!(
        ranked = output.result.ranked.len(),
        excluded = output.result.excluded.len(),
        data_dir = %config.data_dir.display(),
        "run complete"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("rr-ranker failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn defaults_match_the_documented_contract() {
        let cli = parse(&[
            "rr-ranker",
            "--job-description",
            "jd.txt",
            "--resumes-dir",
            "resumes",
        ]);
        let config = cli.into_config();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.judge_weight, 0.7);
        assert_eq!(config.cross_weight, 0.3);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.embedder, "hash");
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn weights_and_top_n_are_overridable() {
        let cli = parse(&[
            "rr-ranker",
            "--job-description",
            "jd.txt",
            "--resumes-dir",
            "resumes",
            "--top-resumes",
            "10",
            "--judge-weight",
            "0.5",
            "--cross-encoder-weight",
            "0.5",
        ]);
        let config = cli.into_config();
        assert_eq!(config.top_n, 10);
        assert_eq!(config.judge_weight, 0.5);
        assert_eq!(config.cross_weight, 0.5);
    }

    #[test]
    fn validation_rejects_a_missing_job_description() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&[
            "rr-ranker",
            "--job-description",
            dir.path().join("absent.txt").to_str().unwrap(),
            "--resumes-dir",
            dir.path().to_str().unwrap(),
        ]);
        assert!(cli.into_config().validate().is_err());
    }
}
