use studydb_core::config::ConfidenceSettings;

/// Maps retrieval quality and answer provenance to a score in `[0, 1]`.
///
/// Corpus answers: `top_weight * top_similarity + corroboration_weight *
/// min(n, full) / full`, where `n` counts sources at or above the similarity
/// floor. Fallback answers get the fixed `fallback_confidence`, which
/// validation keeps below 1, the score of a fully corroborated exact hit.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    settings: ConfidenceSettings,
}

impl ConfidenceScorer {
    pub fn new(settings: ConfidenceSettings) -> Self {
        Self { settings }
    }

    pub fn score(&self, similarities: &[f32], used_fallback: bool) -> f32 {
        if used_fallback {
            return self.settings.fallback_confidence.clamp(0.0, 1.0);
        }
        let top = similarities.iter().copied().filter(|s| s.is_finite()).fold(f32::NEG_INFINITY, f32::max);
        if !top.is_finite() {
            return 0.0;
        }
        let full = self.settings.full_corroboration.max(1);
        let corroborating = similarities.iter().filter(|s| **s >= self.settings.similarity_floor).count().min(full);
        let value = self.settings.top_weight * top.clamp(0.0, 1.0)
            + self.settings.corroboration_weight * corroborating as f32 / full as f32;
        value.clamp(0.0, 1.0)
    }

    /// Similarity below which a passage does not count as evidence.
    pub fn similarity_floor(&self) -> f32 {
        self.settings.similarity_floor
    }

    pub fn fallback_confidence(&self) -> f32 {
        self.settings.fallback_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(ConfidenceSettings::default())
    }

    #[test]
    fn empty_retrieval_scores_zero() {
        assert_eq!(scorer().score(&[], false), 0.0);
    }

    #[test]
    fn full_corroboration_reaches_one() {
        assert!((scorer().score(&[1.0, 0.9, 0.8], false) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fallback_is_fixed_and_below_max() {
        let s = scorer();
        assert_eq!(s.score(&[0.99, 0.99, 0.99], true), 0.5);
        assert!(s.score(&[], true) < s.score(&[1.0, 1.0, 1.0], false));
    }

    #[test]
    fn stays_in_unit_interval_and_is_monotonic() {
        let s = scorer();
        let mut prev = 0.0;
        for i in 0..=20 {
            let top = -0.5 + i as f32 * 0.1;
            let v = s.score(&[top, 0.1], false);
            assert!((0.0..=1.0).contains(&v));
            assert!(v >= prev);
            prev = v;
        }
        assert!(s.score(&[0.6, 0.3], false) > s.score(&[0.6, 0.1], false));
        assert_eq!(s.score(&[f32::NAN], false), 0.0);
    }
}
