use std::collections::HashSet;

use promptbatch_common::error::{PromptbatchError, Result};

use crate::{job::JobInput, params::GenerationParams};

#[derive(Debug, Clone)]
pub struct Ingestion {
    pub jobs: Vec<(String, JobInput)>,
    pub params: GenerationParams,
}

impl Ingestion {
    pub fn new(jobs: Vec<(String, JobInput)>, params: GenerationParams) -> Result<Self> {
        if jobs.is_empty() {
            return Err(PromptbatchError::Ingestion("batch contains no jobs".to_string()));
        }

        let mut seen = HashSet::with_capacity(jobs.len());
        for (id, input) in &jobs {
            if id.trim().is_empty() {
                return Err(PromptbatchError::Ingestion("job id must not be empty".to_string()));
            }
            if input.prompt.trim().is_empty() {
                return Err(PromptbatchError::Ingestion(format!("job {id} has an empty prompt")));
            }
            if !seen.insert(id.as_str()) {
                return Err(PromptbatchError::Ingestion(format!("duplicate job id {id}")));
            }
        }

        params.validate()?;
        Ok(Self { jobs, params })
    }

    /// Builds jobs from raw prompt rows.
    ///
    /// Surrounding whitespace and quotes are stripped and blank rows skipped.
    /// Ids follow the row position, so a skipped row leaves a gap.
    pub fn from_prompts<I, S>(prompts: I, params: GenerationParams) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_rows(prompts.into_iter().map(|prompt| (None, prompt)), params)
    }

    pub fn from_rows<I, S>(rows: I, params: GenerationParams) -> Result<Self>
    where
        I: IntoIterator<Item = (Option<String>, S)>,
        S: AsRef<str>,
    {
        let jobs = rows
            .into_iter()
            .enumerate()
            .filter_map(|(row, (id, raw))| {
                let prompt = clean_prompt(raw.as_ref());
                if prompt.is_empty() {
                    return None;
                }
                let id = id
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("job_{:03}", row + 1));
                Some((id, JobInput::new(prompt)))
            })
            .collect();
        Self::new(jobs, params)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn clean_prompt(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::phoenix;

    #[test]
    fn numbers_prompts_by_row() {
        let ingestion =
            Ingestion::from_prompts(["  \"a red fox\" ", "", "a blue whale"], phoenix()).unwrap();

        let ids: Vec<_> = ingestion.jobs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["job_001", "job_003"]);
        assert_eq!(ingestion.jobs[0].1.prompt, "a red fox");
    }

    #[test]
    fn explicit_ids_win_over_row_numbers() {
        let rows = [
            (Some("hero".to_string()), "a castle"),
            (None, "a moat"),
            (Some("  ".to_string()), "a drawbridge"),
        ];
        let ingestion = Ingestion::from_rows(rows, phoenix()).unwrap();

        let ids: Vec<_> = ingestion.jobs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["hero", "job_002", "job_003"]);
    }

    #[test]
    fn rejects_empty_batches() {
        let err = Ingestion::from_prompts(["   ", "\"\""], phoenix()).unwrap_err();
        assert_eq!(err.error_code(), "InvalidBatch");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let jobs = vec![
            ("a".to_string(), JobInput::new("one")),
            ("a".to_string(), JobInput::new("two")),
        ];
        assert!(Ingestion::new(jobs, phoenix()).is_err());
    }

    #[test]
    fn rejects_invalid_params() {
        let mut params = crate::params::PhoenixParams::default();
        params.image.width = 333;
        let jobs = vec![("a".to_string(), JobInput::new("one"))];
        let err = Ingestion::new(jobs, GenerationParams::Phoenix(params)).unwrap_err();
        assert_eq!(err.error_code(), "InvalidArgument");
    }
}
