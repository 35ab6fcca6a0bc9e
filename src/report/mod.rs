pub mod json;
pub mod md;

use crate::error::ImpactError;
use crate::types::model::ImpactSnapshot;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Md,
}

/// Renders at most `top` contributors; the JSON form is always the full snapshot.
pub fn render(
    snapshot: &ImpactSnapshot,
    format: OutputFormat,
    top: usize,
) -> Result<String, ImpactError> {
    match format {
        OutputFormat::Json => json::to_json(snapshot).map_err(ImpactError::Json),
        OutputFormat::Md => Ok(md::to_markdown(snapshot, top)),
    }
}
