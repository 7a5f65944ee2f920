use crate::extraction::StructuredRecord;

/// Schema fragment shared by both extraction prompts. The oracle is asked for
/// exactly the fields `StructuredRecord` carries.
const RECORD_SCHEMA: &str = r#"{
  "skills": ["list of skill keywords"],
  "years_experience": 0.0,
  "qualifications": ["degrees, certifications, notable credentials"],
  "summary": "two or three sentence free-text summary"
}"#;

pub fn resume_extraction_system() -> String {
    format!(
        "You are a resume analyzer.\n\
         Extract the key information from the resume into this JSON schema:\n\
         {RECORD_SCHEMA}\n\
         Expand all abbreviations. Estimate total professional years_experience \
         from the work history. Use an empty list or 0 for anything unavailable. \
         Respond with JSON only."
    )
}

pub fn job_extraction_system() -> String {
    format!(
        "You are a job description analyzer.\n\
         Extract the requirements from the job description into this JSON schema:\n\
         {RECORD_SCHEMA}\n\
         skills are the must-have and preferred skills and tools; \
         years_experience is the minimum required; qualifications are required \
         education or certifications. Use an empty list or 0 for anything \
         unavailable. Respond with JSON only."
    )
}

pub const JUDGE_SYSTEM: &str = "You are a strict resume ranker.";

/// Judge prompt. Both records go in as pretty-printed JSON; the verdict comes
/// back as JSON with a 0-10 score and a written rationale.
pub fn judge_prompt(job_json: &str, resume_json: &str) -> String {
    format!(
        "You are an expert technical recruiter acting as an impartial judge.\n\
         Evaluate the candidate against the job requirements.\n\n\
         Follow these steps precisely:\n\
         1. Compare the job's years_experience requirement with the candidate's.\n\
         2. For each required skill, check whether the candidate demonstrates it.\n\
         3. Check qualifications against the job's required qualifications.\n\
         4. Synthesize: a candidate missing a must-have skill cannot score above 6; \
            one meeting every requirement and several extras scores 8-9; \
            10 is reserved for an exceptionally perfect match.\n\n\
         Respond with JSON only, in this schema:\n\
         {{\n\
           \"final_score\": 0.0,\n\
           \"detailed_analysis\": \"step-by-step reasoning\",\n\
           \"pros\": [\"key strengths\"],\n\
           \"cons\": [\"key gaps\"]\n\
         }}\n\
         final_score is a number from 0 to 10.\n\n\
         1. JOB_REQUIREMENTS:\n```json\n{job_json}\n```\n\n\
         2. CANDIDATE_RESUME:\n```json\n{resume_json}\n```\n"
    )
}

/// Canonical text rendering of a structured record, used as the comparison
/// signal for both the bi-encoder and the cross-encoder. Keeping one format
/// for both stages keeps their scores comparable run over run.
pub fn signal_text(record: &StructuredRecord) -> String {
    format!(
        "Summary:\n{}\n\nSkills:\n{}\n\nYears of experience: {}\n\nQualifications:\n{}\n",
        record.summary,
        record.skills.join(", "),
        record.years_experience,
        record.qualifications.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_text_contains_every_field() {
        let record = StructuredRecord {
            skills: vec!["Python".into(), "Django".into()],
            years_experience: 5.0,
            qualifications: vec!["BSc Computer Science".into()],
            summary: "Backend engineer.".into(),
        };

        let text = signal_text(&record);

        assert!(text.contains("Python, Django"));
        assert!(text.contains("Years of experience: 5"));
        assert!(text.contains("BSc Computer Science"));
        assert!(text.contains("Backend engineer."));
    }

    #[test]
    fn judge_prompt_embeds_both_records() {
        let prompt = judge_prompt("{\"job\":1}", "{\"resume\":2}");
        assert!(prompt.contains("{\"job\":1}"));
        assert!(prompt.contains("{\"resume\":2}"));
        assert!(prompt.contains("final_score"));
    }
}
