use super::types::{CommunityPost, Recommendation, UserPreferences};
use std::collections::HashSet;

const STYLE_WEIGHT: f64 = 0.6;
const COLOR_WEIGHT: f64 = 0.4;
const POPULAR_LIKES: u32 = 10;
const POPULARITY_BOOST: f64 = 0.2;

/// Fraction of the larger list that also appears in the other one
pub fn overlap_ratio(a: &[String], b: &[String]) -> f64 {
    let shared = a.iter().filter(|item| b.contains(item)).count();
    shared as f64 / a.len().max(b.len()).max(1) as f64
}

/// Weighted style/colour overlap between two users, in `[0, 1]`
pub fn preference_similarity(a: &UserPreferences, b: &UserPreferences) -> f64 {
    overlap_ratio(&a.preferred_styles, &b.preferred_styles) * STYLE_WEIGHT
        + overlap_ratio(&a.preferred_colors, &b.preferred_colors) * COLOR_WEIGHT
}

/// Styles then colours both users list, in `a`'s order
pub fn shared_preferences(a: &UserPreferences, b: &UserPreferences) -> Vec<String> {
    let styles = a
        .preferred_styles
        .iter()
        .filter(|s| b.preferred_styles.contains(s));
    let colors = a
        .preferred_colors
        .iter()
        .filter(|c| b.preferred_colors.contains(c));
    styles.chain(colors).cloned().collect()
}

/// The `n` most frequent values; ties keep first-seen order
pub fn top_by_count<'a>(values: impl IntoIterator<Item = &'a str>, n: usize) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(n)
        .map(|(v, _)| v.to_string())
        .collect()
}

/// How well a community post fits the user's preferred styles
pub fn style_match_score(post: &CommunityPost, style_preferences: &[String]) -> f64 {
    let mut score = 0.0;

    if !style_preferences.is_empty() {
        let matching = post
            .tags
            .iter()
            .filter(|tag| style_preferences.contains(tag))
            .count();
        score += matching as f64 / style_preferences.len() as f64 * STYLE_WEIGHT;
    }

    if post.likes_count > POPULAR_LIKES {
        score += POPULARITY_BOOST;
    }

    score.min(1.0)
}

/// Drop later recommendations for an outfit already seen
pub fn dedupe_by_outfit(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    recommendations
        .into_iter()
        .filter(|rec| seen.insert(rec.outfit.id.clone()))
        .collect()
}

/// Stable sort, highest score first
pub fn sort_by_score(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
}

pub fn style_personality(categories: &[String]) -> &'static str {
    let has = |c: &str| categories.iter().any(|x| x == c);
    if has("formal") {
        "Professional"
    } else if has("casual") {
        "Comfortable"
    } else if has("traditional") {
        "Classic"
    } else if has("sportswear") {
        "Active"
    } else {
        "Explorer"
    }
}

/// Min/max of the non-zero scores, or a neutral default band
pub fn confidence_range(recommendations: &[Recommendation]) -> (f64, f64) {
    let scores: Vec<f64> = recommendations
        .iter()
        .map(|r| r.score)
        .filter(|s| *s > 0.0)
        .collect();

    if scores.is_empty() {
        return (0.5, 0.8);
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}
