use crate::extraction::StructuredRecord;

/// Weighted token feeding the feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct WeightedToken {
    pub token: String,
    pub weight: f32,
}

impl WeightedToken {
    pub fn new(token: impl Into<String>, weight: f32) -> Self {
        Self {
            token: token.into(),
            weight,
        }
    }
}

/// Token prefixes (shared between job and candidate so matching fields land
/// in the same hash buckets):
/// - skill:<lowercased>    weight 3.0
/// - qual:<lowercased>     weight 1.5
/// - exp:<bucket>          weight 2.0
/// - word:<summary word>   weight 1.0
pub fn tokenize_record(record: &StructuredRecord) -> Vec<WeightedToken> {
    let mut tokens = Vec::new();

    for skill in &record.skills {
        let skill = skill.trim().to_lowercase();
        if !skill.is_empty() {
            tokens.push(WeightedToken::new(format!("skill:{skill}"), 3.0));
        }
    }

    for qual in &record.qualifications {
        let qual = qual.trim().to_lowercase();
        if !qual.is_empty() {
            tokens.push(WeightedToken::new(format!("qual:{qual}"), 1.5));
        }
    }

    if record.years_experience > 0.0 {
        tokens.push(WeightedToken::new(
            format!("exp:{}", experience_bucket(record.years_experience)),
            2.0,
        ));
    }

    for word in summary_words(&record.summary) {
        tokens.push(WeightedToken::new(format!("word:{word}"), 1.0));
    }

    tokens
}

/// Buckets keep "5 years" and "6 years" close without making "1 year" and
/// "10 years" collide.
fn experience_bucket(years: f64) -> &'static str {
    match years {
        y if y < 1.0 => "lt1",
        y if y < 3.0 => "1-2",
        y if y < 5.0 => "3-4",
        y if y < 8.0 => "5-7",
        y if y < 12.0 => "8-11",
        _ => "12plus",
    }
}

fn summary_words(summary: &str) -> impl Iterator<Item = String> + '_ {
    summary
        .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|w| w.len() >= 3)
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_outweigh_summary_words() {
        let record = StructuredRecord {
            skills: vec!["Rust".into()],
            summary: "systems engineer".into(),
            ..Default::default()
        };

        let tokens = tokenize_record(&record);
        let skill = tokens.iter().find(|t| t.token == "skill:rust").unwrap();
        let word = tokens.iter().find(|t| t.token == "word:systems").unwrap();

        assert!(skill.weight > word.weight);
    }

    #[test]
    fn shared_prefixes_align_job_and_candidate_tokens() {
        let job = StructuredRecord {
            skills: vec!["Python".into()],
            ..Default::default()
        };
        let candidate = StructuredRecord {
            skills: vec!["python".into()],
            ..Default::default()
        };

        let job_tokens = tokenize_record(&job);
        let candidate_tokens = tokenize_record(&candidate);

        assert_eq!(job_tokens[0].token, candidate_tokens[0].token);
    }

    #[test]
    fn experience_buckets_are_stable() {
        assert_eq!(experience_bucket(0.5), "lt1");
        assert_eq!(experience_bucket(2.0), "1-2");
        assert_eq!(experience_bucket(5.0), "5-7");
        assert_eq!(experience_bucket(20.0), "12plus");
    }

    #[test]
    fn empty_record_yields_no_tokens() {
        assert!(tokenize_record(&StructuredRecord::default()).is_empty());
    }
}
