use serde::Serialize;

pub type Score = f64;

/// Baseline score split into its four log-normalized dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub shipping: Score,
    pub reviews: Score,
    pub volume: Score,
    pub issues: Score,
}

impl ScoreBreakdown {
    pub fn total(&self) -> Score {
        self.shipping + self.reviews + self.volume + self.issues
    }

    /// Named components in display order.
    pub fn components(&self) -> [(&'static str, Score); 4] {
        [
            ("shipping", self.shipping),
            ("reviews", self.reviews),
            ("volume", self.volume),
            ("issues", self.issues),
        ]
    }
}
