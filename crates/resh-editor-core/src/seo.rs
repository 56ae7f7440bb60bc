//! SEO scoring for generated title/description candidates.
//!
//! The score is a weighted sum of independent checks, normalised to 0..=100.
//! Every check is case-insensitive and lengths are counted in characters,
//! not bytes, so accented titles are measured the way readers see them.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

const KEYWORD_IN_TITLE_WEIGHT: u32 = 30;
const KEYWORD_IN_DESCRIPTION_WEIGHT: u32 = 25;
const TITLE_LENGTH_WEIGHT: u32 = 20;
const DESCRIPTION_LENGTH_WEIGHT: u32 = 15;
const RELATED_KEYWORDS_WEIGHT: u32 = 10;

/// One generated title/description pairing evaluated for SEO quality.
///
/// Never mutated after construction: re-scoring builds a new score value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub title: String,
    pub description: String,
    /// Primary target phrase.
    pub keyword: String,
    /// Secondary phrases, order irrelevant.
    #[serde(default)]
    pub related_keywords: Vec<String>,
}

impl ScoredCandidate {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            keyword: keyword.into(),
            related_keywords: Vec::new(),
        }
    }

    pub fn with_related<I, S>(mut self, related: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_keywords = related.into_iter().map(Into::into).collect();
        self
    }
}

/// Identifies one of the weighted checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeoCheckKind {
    KeywordInTitle,
    KeywordInDescription,
    TitleLength,
    DescriptionLength,
    RelatedKeywords,
}

impl SeoCheckKind {
    pub fn label(self) -> &'static str {
        match self {
            SeoCheckKind::KeywordInTitle => "keyword in title",
            SeoCheckKind::KeywordInDescription => "keyword in description",
            SeoCheckKind::TitleLength => "title length",
            SeoCheckKind::DescriptionLength => "description length",
            SeoCheckKind::RelatedKeywords => "related keywords",
        }
    }
}

/// Points earned by a single check out of its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoCheck {
    pub kind: SeoCheckKind,
    pub earned: u32,
    pub weight: u32,
}

/// Per-check detail behind a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Only applicable checks are listed; related keywords are absent when
    /// the candidate has none.
    pub checks: Vec<SeoCheck>,
    pub score: u8,
}

impl ScoreBreakdown {
    pub fn earned(&self) -> u32 {
        self.checks.iter().map(|c| c.earned).sum()
    }

    pub fn max_score(&self) -> u32 {
        self.checks.iter().map(|c| c.weight).sum()
    }

    pub fn check(&self, kind: SeoCheckKind) -> Option<&SeoCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::for_score(self.score)
    }
}

/// Coarse quality label for display next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Poor,
    Fair,
    Good,
}

impl ScoreBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            80.. => ScoreBand::Good,
            50..=79 => ScoreBand::Fair,
            _ => ScoreBand::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreBand::Poor => "poor",
            ScoreBand::Fair => "fair",
            ScoreBand::Good => "good",
        }
    }
}

/// Compute the 0..=100 SEO score for a candidate.
pub fn score(candidate: &ScoredCandidate) -> u8 {
    score_breakdown(candidate).score
}

/// Compute the score together with the points earned by each check.
pub fn score_breakdown(candidate: &ScoredCandidate) -> ScoreBreakdown {
    let keyword = candidate.keyword.to_lowercase();
    let title = candidate.title.to_lowercase();
    let description = candidate.description.to_lowercase();

    let mut checks = Vec::with_capacity(5);

    let in_title = !keyword.is_empty() && title.contains(&keyword);
    checks.push(SeoCheck {
        kind: SeoCheckKind::KeywordInTitle,
        earned: if in_title { KEYWORD_IN_TITLE_WEIGHT } else { 0 },
        weight: KEYWORD_IN_TITLE_WEIGHT,
    });

    let occurrences = count_occurrences(&description, &keyword);
    checks.push(SeoCheck {
        kind: SeoCheckKind::KeywordInDescription,
        earned: match occurrences {
            0 => 0,
            1 => 15,
            _ => KEYWORD_IN_DESCRIPTION_WEIGHT,
        },
        weight: KEYWORD_IN_DESCRIPTION_WEIGHT,
    });

    checks.push(SeoCheck {
        kind: SeoCheckKind::TitleLength,
        earned: title_length_points(candidate.title.chars().count()),
        weight: TITLE_LENGTH_WEIGHT,
    });

    checks.push(SeoCheck {
        kind: SeoCheckKind::DescriptionLength,
        earned: description_length_points(candidate.description.chars().count()),
        weight: DESCRIPTION_LENGTH_WEIGHT,
    });

    if !candidate.related_keywords.is_empty() {
        let related: Vec<SmolStr> = candidate
            .related_keywords
            .iter()
            .map(|k| SmolStr::new(k.to_lowercase()))
            .collect();
        let combined = format!("{title} {description}");
        let matched = related.iter().filter(|k| combined.contains(k.as_str())).count();
        let earned =
            (RELATED_KEYWORDS_WEIGHT as f64 * matched as f64 / related.len() as f64).round() as u32;
        checks.push(SeoCheck {
            kind: SeoCheckKind::RelatedKeywords,
            earned,
            weight: RELATED_KEYWORDS_WEIGHT,
        });
    }

    let earned: u32 = checks.iter().map(|c| c.earned).sum();
    let max_score: u32 = checks.iter().map(|c| c.weight).sum();
    let score = if max_score == 0 {
        0
    } else {
        (100.0 * earned as f64 / max_score as f64).round().clamp(0.0, 100.0) as u8
    };

    ScoreBreakdown { checks, score }
}

/// Order candidates best-first. Ties keep their input order.
pub fn rank_candidates(candidates: &[ScoredCandidate]) -> Vec<(usize, u8)> {
    let mut ranked: Vec<(usize, u8)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, score(c)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn title_length_points(len: usize) -> u32 {
    match len {
        50..=60 => 20,
        40..=49 | 61..=70 => 15,
        30..=39 => 10,
        _ => 0,
    }
}

fn description_length_points(len: usize) -> u32 {
    match len {
        150..=160 => 15,
        140..=149 | 161..=165 => 12,
        120..=139 => 8,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pantanal() -> ScoredCandidate {
        ScoredCandidate::new(
            "Cuándo visitar el Pantanal: Mejor época",
            "Descubre cuándo visitar el Pantanal para ver fauna salvaje. Guía con mejores meses y consejos para tu viaje inolvidable hoy.",
            "cuándo visitar el Pantanal",
        )
        .with_related(["fauna", "pantanal", "viaje"])
    }

    #[test]
    fn pantanal_example() {
        let breakdown = score_breakdown(&pantanal());
        assert_eq!(breakdown.check(SeoCheckKind::KeywordInTitle).unwrap().earned, 30);
        assert_eq!(
            breakdown.check(SeoCheckKind::KeywordInDescription).unwrap().earned,
            15
        );
        // 39 characters
        assert_eq!(breakdown.check(SeoCheckKind::TitleLength).unwrap().earned, 10);
        // 124 characters
        assert_eq!(
            breakdown.check(SeoCheckKind::DescriptionLength).unwrap().earned,
            8
        );
        assert_eq!(breakdown.check(SeoCheckKind::RelatedKeywords).unwrap().earned, 10);
        assert_eq!(breakdown.max_score(), 100);
        assert_eq!(breakdown.score, 73);
        assert_eq!(breakdown.band(), ScoreBand::Fair);
    }

    #[test]
    fn scoring_is_repeatable() {
        let candidate = pantanal();
        assert_eq!(score(&candidate), score(&candidate));
    }

    #[test]
    fn keyword_matching_ignores_case() {
        let candidate = ScoredCandidate::new("BEST RUST BOOKS", "", "best rust books");
        let breakdown = score_breakdown(&candidate);
        assert_eq!(breakdown.check(SeoCheckKind::KeywordInTitle).unwrap().earned, 30);
    }

    #[test]
    fn description_keyword_counts() {
        let once = ScoredCandidate::new("", "rust is great", "rust");
        let twice = ScoredCandidate::new("", "rust is great, learn rust", "rust");
        let none = ScoredCandidate::new("", "go is great", "rust");
        let earned = |c: &ScoredCandidate| {
            score_breakdown(c)
                .check(SeoCheckKind::KeywordInDescription)
                .unwrap()
                .earned
        };
        assert_eq!(earned(&once), 15);
        assert_eq!(earned(&twice), 25);
        assert_eq!(earned(&none), 0);
    }

    #[test]
    fn title_length_bands() {
        assert_eq!(title_length_points(29), 0);
        assert_eq!(title_length_points(30), 10);
        assert_eq!(title_length_points(39), 10);
        assert_eq!(title_length_points(40), 15);
        assert_eq!(title_length_points(50), 20);
        assert_eq!(title_length_points(60), 20);
        assert_eq!(title_length_points(61), 15);
        assert_eq!(title_length_points(70), 15);
        assert_eq!(title_length_points(71), 0);
    }

    #[test]
    fn description_length_bands() {
        assert_eq!(description_length_points(119), 0);
        assert_eq!(description_length_points(120), 8);
        assert_eq!(description_length_points(140), 12);
        assert_eq!(description_length_points(150), 15);
        assert_eq!(description_length_points(160), 15);
        assert_eq!(description_length_points(165), 12);
        assert_eq!(description_length_points(166), 0);
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        // 50 two-byte characters
        let title = "é".repeat(50);
        let candidate = ScoredCandidate::new(title, "", "x");
        assert_eq!(
            score_breakdown(&candidate)
                .check(SeoCheckKind::TitleLength)
                .unwrap()
                .earned,
            20
        );
    }

    #[test]
    fn empty_related_keywords_leave_denominator() {
        let candidate = ScoredCandidate::new("rust", "", "rust");
        let breakdown = score_breakdown(&candidate);
        assert!(breakdown.check(SeoCheckKind::RelatedKeywords).is_none());
        assert_eq!(breakdown.max_score(), 90);
        // 30 / 90
        assert_eq!(breakdown.score, 33);
    }

    #[test]
    fn blank_related_keyword_still_counts() {
        // "" is a substring of anything
        let candidate = ScoredCandidate::new("rust", "", "rust").with_related([""]);
        let breakdown = score_breakdown(&candidate);
        assert_eq!(breakdown.max_score(), 100);
        assert_eq!(
            breakdown.check(SeoCheckKind::RelatedKeywords).unwrap().earned,
            10
        );
        assert_eq!(breakdown.score, 40);
    }

    #[test]
    fn related_keywords_match_verbatim() {
        let candidate = ScoredCandidate::new("fauna guide", "", "zzz").with_related([" fauna"]);
        assert_eq!(
            score_breakdown(&candidate)
                .check(SeoCheckKind::RelatedKeywords)
                .unwrap()
                .earned,
            0
        );
    }

    #[test]
    fn padded_keyword_is_not_trimmed() {
        let candidate = ScoredCandidate::new("rust guide", "", " rust ");
        assert_eq!(
            score_breakdown(&candidate)
                .check(SeoCheckKind::KeywordInTitle)
                .unwrap()
                .earned,
            0
        );
        let spaced = ScoredCandidate::new("learn rust today", "", " rust ");
        assert_eq!(
            score_breakdown(&spaced)
                .check(SeoCheckKind::KeywordInTitle)
                .unwrap()
                .earned,
            30
        );
    }

    #[test]
    fn related_coverage_rounds() {
        let candidate = ScoredCandidate::new("rust tokio", "", "zzz").with_related([
            "rust", "tokio", "serde",
        ]);
        // 10 * 2 / 3 = 6.67
        assert_eq!(
            score_breakdown(&candidate)
                .check(SeoCheckKind::RelatedKeywords)
                .unwrap()
                .earned,
            7
        );
    }

    #[test]
    fn empty_keyword_never_matches() {
        let candidate = ScoredCandidate::new("anything", "anything at all", "");
        let breakdown = score_breakdown(&candidate);
        assert_eq!(breakdown.check(SeoCheckKind::KeywordInTitle).unwrap().earned, 0);
        assert_eq!(
            breakdown.check(SeoCheckKind::KeywordInDescription).unwrap().earned,
            0
        );
    }

    #[test]
    fn keyword_in_title_never_lowers_score() {
        let base = pantanal();
        let mut without = base.clone();
        // same length, keyword removed
        without.title = "Xxxxxx xxxxxxx xx xxxxxxxx: Mejor época".into();
        assert_eq!(without.title.chars().count(), base.title.chars().count());
        assert!(score(&base) >= score(&without));
    }

    #[test]
    fn scores_stay_in_bounds() {
        let long = "keyword ".repeat(100);
        let candidates = [
            ScoredCandidate::default(),
            ScoredCandidate::new(long.clone(), long.clone(), "keyword").with_related(["keyword"]),
            ScoredCandidate::new("k".repeat(55), "k".repeat(155), "k").with_related(["k"]),
        ];
        for candidate in &candidates {
            assert!(score(candidate) <= 100);
        }
        assert_eq!(score(&candidates[2]), 100);
    }

    #[test]
    fn ranking_is_best_first_and_stable() {
        let weak = ScoredCandidate::new("nothing", "nothing", "rust");
        let strong = pantanal();
        let ranked = rank_candidates(&[weak.clone(), strong, weak]);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 0);
        assert_eq!(ranked[2].0, 2);
    }
}
