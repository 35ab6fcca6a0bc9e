//! External judgment of pull-request quality.

pub mod chat;
pub mod prompt;

use crate::error::JudgeError;
use async_trait::async_trait;
use serde::Deserialize;

pub use chat::ChatJudge;
pub use prompt::describe_pull_request;

pub const MIN_RUBRIC_SCORE: u8 = 1;
pub const MAX_RUBRIC_SCORE: u8 = 5;

#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, prompt: &str) -> Result<QualityVerdict, JudgeError>;
}

/// Four rubric scores (each 1..=5) plus the judge's explanation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawVerdict")]
pub struct QualityVerdict {
    substance: u8,
    product_impact: u8,
    technical_quality: u8,
    blast_radius: u8,
    reasoning: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    substance_score: i64,
    product_impact_score: i64,
    technical_quality_score: i64,
    blast_radius_score: i64,
    #[serde(default)]
    reasoning: String,
}

impl TryFrom<RawVerdict> for QualityVerdict {
    type Error = JudgeError;

    fn try_from(raw: RawVerdict) -> Result<Self, Self::Error> {
        Self::new(
            rubric("substance_score", raw.substance_score)?,
            rubric("product_impact_score", raw.product_impact_score)?,
            rubric("technical_quality_score", raw.technical_quality_score)?,
            rubric("blast_radius_score", raw.blast_radius_score)?,
            raw.reasoning,
        )
    }
}

fn rubric(field: &str, value: i64) -> Result<u8, JudgeError> {
    u8::try_from(value)
        .ok()
        .filter(|score| (MIN_RUBRIC_SCORE..=MAX_RUBRIC_SCORE).contains(score))
        .ok_or_else(|| JudgeError::InvalidVerdict(format!("{field} out of range: {value}")))
}

impl QualityVerdict {
    pub fn new(
        substance: u8,
        product_impact: u8,
        technical_quality: u8,
        blast_radius: u8,
        reasoning: impl Into<String>,
    ) -> Result<Self, JudgeError> {
        for (field, value) in [
            ("substance", substance),
            ("product_impact", product_impact),
            ("technical_quality", technical_quality),
            ("blast_radius", blast_radius),
        ] {
            if !(MIN_RUBRIC_SCORE..=MAX_RUBRIC_SCORE).contains(&value) {
                return Err(JudgeError::InvalidVerdict(format!(
                    "{field} out of range: {value}"
                )));
            }
        }
        Ok(Self {
            substance,
            product_impact,
            technical_quality,
            blast_radius,
            reasoning: reasoning.into(),
        })
    }

    /// Weighted mean of the rubric, in [1, 5]. Substance and product impact
    /// weigh 1.5 each, the other two 1.0.
    pub fn quality_score(&self) -> f64 {
        (f64::from(self.substance) * 1.5
            + f64::from(self.product_impact) * 1.5
            + f64::from(self.technical_quality)
            + f64::from(self.blast_radius))
            / 5.0
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}
