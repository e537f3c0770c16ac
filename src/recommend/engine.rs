use super::scoring;
use super::types::{
    Dataset, Insights, InteractionType, Outfit, Recommendation, RecommendationKind,
    RecommendationRequest, RecommendationResult, RecommendationSource, SimilarUser,
    UserPreferences,
};
use std::collections::HashSet;

const SIMILARITY_THRESHOLD: f64 = 0.3;
const MAX_SIMILAR_USERS: usize = 10;
const LIKES_PER_SIMILAR_USER: usize = 5;
const COLLABORATIVE_DISCOUNT: f64 = 0.9;
const CANDIDATE_POSTS: usize = 50;
const STYLE_MATCH_THRESHOLD: f64 = 0.6;
const POSITIVE_ENGAGEMENT: f64 = 0.7;
const EMOTION_SCORE: f64 = 0.85;

/// Outfit recommendations and style insights over a loaded dataset
pub struct Recommender<'a> {
    data: &'a Dataset,
}

impl<'a> Recommender<'a> {
    pub fn new(data: &'a Dataset) -> Self {
        Self { data }
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> RecommendationResult {
        let user_id = request.user_id.as_str();
        tracing::info!(
            "Generating {:?} recommendations for user {}",
            request.recommendation_type,
            user_id
        );

        let (mut recommendations, similar_users) = match request.recommendation_type {
            RecommendationKind::SimilarUsers => self.similar_user_recommendations(user_id),
            RecommendationKind::StyleBased => (self.style_based(user_id), Vec::new()),
            RecommendationKind::EmotionBased => (self.emotion_based(user_id), Vec::new()),
            RecommendationKind::Hybrid => self.hybrid(user_id),
        };

        let insights = self.insights(user_id, &recommendations);
        recommendations.truncate(request.limit);

        tracing::info!(
            "Generated {} recommendations for user {}",
            recommendations.len(),
            user_id
        );

        RecommendationResult {
            recommendations,
            similar_users,
            insights,
        }
    }

    fn preferences(&self, user_id: &str) -> Option<&'a UserPreferences> {
        self.data.preferences.iter().find(|p| p.user_id == user_id)
    }

    pub fn similar_users(&self, user_id: &str) -> Vec<SimilarUser> {
        let Some(mine) = self.preferences(user_id) else {
            return Vec::new();
        };

        let mut similar: Vec<SimilarUser> = self
            .data
            .preferences
            .iter()
            .filter(|other| other.user_id != user_id)
            .filter_map(|other| {
                let score = scoring::preference_similarity(mine, other);
                (score > SIMILARITY_THRESHOLD).then(|| SimilarUser {
                    user_id: other.user_id.clone(),
                    similarity_score: score,
                    shared_preferences: scoring::shared_preferences(mine, other),
                })
            })
            .collect();

        similar.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        similar.truncate(MAX_SIMILAR_USERS);
        similar
    }

    fn similar_user_recommendations(
        &self,
        user_id: &str,
    ) -> (Vec<Recommendation>, Vec<SimilarUser>) {
        let similar = self.similar_users(user_id);

        let recommendations = similar
            .iter()
            .flat_map(|su| {
                self.likes_of(&su.user_id)
                    .take(LIKES_PER_SIMILAR_USER)
                    .map(move |outfit| Recommendation {
                        outfit: outfit.clone(),
                        score: su.similarity_score * COLLABORATIVE_DISCOUNT,
                        reason: "Users with similar style preferences liked this outfit".into(),
                        source: RecommendationSource::CollaborativeFiltering,
                    })
            })
            .collect();

        (finish(recommendations), similar)
    }

    fn likes_of<'s>(
        &'s self,
        user_id: &'s str,
    ) -> impl Iterator<Item = &'a Outfit> + 's {
        self.data
            .interactions
            .iter()
            .filter(move |i| i.user_id == user_id && i.interaction_type == InteractionType::Like)
            .map(|i| &i.outfit)
    }

    /// Top style categories among the user's likes
    pub fn style_preferences(&self, user_id: &str) -> Vec<String> {
        let categories = self
            .data
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id && i.interaction_type == InteractionType::Like)
            .filter_map(|i| i.style_category.as_deref())
            .filter(|c| !c.is_empty());
        scoring::top_by_count(categories, 3)
    }

    /// Top colours among the user's likes and saved outfits
    pub fn color_preferences(&self, user_id: &str) -> Vec<String> {
        let liked = self
            .data
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id && i.interaction_type == InteractionType::Like)
            .flat_map(|i| i.color_palette.iter());
        let saved = self
            .data
            .saved_outfits
            .iter()
            .filter(|s| s.user_id == user_id)
            .flat_map(|s| s.outfit.color_palette.iter());
        scoring::top_by_count(liked.chain(saved).map(String::as_str), 5)
    }

    fn style_based(&self, user_id: &str) -> Vec<Recommendation> {
        let styles = self.style_preferences(user_id);

        let mut posts: Vec<_> = self
            .data
            .posts
            .iter()
            .filter(|p| !p.images.is_empty())
            .collect();
        posts.sort_by(|a, b| b.likes_count.cmp(&a.likes_count));

        let recommendations = posts
            .into_iter()
            .take(CANDIDATE_POSTS)
            .filter_map(|post| {
                let score = scoring::style_match_score(post, &styles);
                (score > STYLE_MATCH_THRESHOLD).then(|| Recommendation {
                    outfit: Outfit {
                        id: post.id.clone(),
                        images: post.images.clone(),
                        tags: post.tags.clone(),
                        color_palette: Vec::new(),
                    },
                    score,
                    reason: format!("Matches your preferred style: {}", styles.join(", ")),
                    source: RecommendationSource::StyleAnalysis,
                })
            })
            .collect();

        finish(recommendations)
    }

    fn emotion_based(&self, user_id: &str) -> Vec<Recommendation> {
        let positive: HashSet<&str> = self
            .data
            .emotions
            .iter()
            .filter(|e| e.user_id == user_id && e.engagement_score > POSITIVE_ENGAGEMENT)
            .map(|e| e.outfit_id.as_str())
            .collect();

        if positive.is_empty() {
            return Vec::new();
        }

        let recommendations = self
            .data
            .interactions
            .iter()
            .filter(|i| positive.contains(i.outfit.id.as_str()))
            .map(|i| Recommendation {
                outfit: i.outfit.clone(),
                score: EMOTION_SCORE,
                reason: "Similar to outfits that made you happy".into(),
                source: RecommendationSource::EmotionAnalysis,
            })
            .collect();

        finish(recommendations)
    }

    fn hybrid(&self, user_id: &str) -> (Vec<Recommendation>, Vec<SimilarUser>) {
        let (collaborative, similar) = self.similar_user_recommendations(user_id);

        let weighted = |recs: Vec<Recommendation>, weight: f64| {
            recs.into_iter().map(move |mut r| {
                r.score *= weight;
                r
            })
        };

        let merged = weighted(collaborative, 0.4)
            .chain(weighted(self.style_based(user_id), 0.4))
            .chain(weighted(self.emotion_based(user_id), 0.2))
            .collect();

        (finish(merged), similar)
    }

    fn insights(&self, user_id: &str, recommendations: &[Recommendation]) -> Insights {
        let top_categories = self.style_preferences(user_id);
        let recommended_colors = self.color_preferences(user_id);

        Insights {
            style_personality: scoring::style_personality(&top_categories).to_string(),
            confidence_range: scoring::confidence_range(recommendations),
            top_categories,
            recommended_colors,
        }
    }
}

fn finish(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut unique = scoring::dedupe_by_outfit(recommendations);
    scoring::sort_by_score(&mut unique);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::types::{CommunityPost, EmotionRecord, Interaction, Outfit, SavedOutfit};

    fn outfit(id: &str, colors: &[&str]) -> Outfit {
        Outfit {
            id: id.into(),
            images: vec![format!("https://cdn.example/{}.jpg", id)],
            tags: vec![],
            color_palette: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn prefs(user: &str, styles: &[&str], colors: &[&str]) -> UserPreferences {
        UserPreferences {
            user_id: user.into(),
            preferred_styles: styles.iter().map(|s| s.to_string()).collect(),
            preferred_colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn like(user: &str, id: &str, category: &str, colors: &[&str]) -> Interaction {
        Interaction {
            user_id: user.into(),
            outfit: outfit(id, colors),
            interaction_type: InteractionType::Like,
            style_category: Some(category.into()),
            color_palette: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn post(id: &str, tags: &[&str], likes: u32) -> CommunityPost {
        CommunityPost {
            id: id.into(),
            images: vec![format!("{}.jpg", id)],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            likes_count: likes,
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            preferences: vec![
                prefs("ana", &["casual", "street"], &["navy", "white"]),
                prefs("ben", &["casual", "street"], &["navy"]),
                prefs("cy", &["formal"], &["black"]),
                prefs("dee", &["casual"], &["navy", "white"]),
            ],
            interactions: vec![
                like("ana", "o1", "casual", &["navy", "white"]),
                like("ana", "o2", "street", &["navy"]),
                like("ana", "o3", "casual", &["white"]),
                like("ben", "o10", "street", &["grey"]),
                like("ben", "o11", "street", &["grey"]),
                like("dee", "o10", "casual", &["navy"]),
                like("cy", "o20", "formal", &["black"]),
                Interaction {
                    interaction_type: InteractionType::View,
                    ..like("ben", "o12", "street", &[])
                },
            ],
            posts: vec![
                post("p1", &["casual", "street"], 40),
                post("p2", &["casual"], 100),
                post("p3", &["formal"], 500),
                CommunityPost {
                    images: vec![],
                    ..post("p4", &["casual", "street"], 900)
                },
            ],
            emotions: vec![
                EmotionRecord {
                    user_id: "ana".into(),
                    outfit_id: "o20".into(),
                    engagement_score: 0.9,
                    dominant_emotion: Some("joy".into()),
                },
                EmotionRecord {
                    user_id: "ana".into(),
                    outfit_id: "o11".into(),
                    engagement_score: 0.2,
                    dominant_emotion: None,
                },
            ],
            saved_outfits: vec![SavedOutfit {
                user_id: "ana".into(),
                outfit: outfit("s1", &["white", "olive"]),
            }],
        }
    }

    fn request(kind: RecommendationKind) -> RecommendationRequest {
        RecommendationRequest {
            user_id: "ana".into(),
            recommendation_type: kind,
            limit: 10,
        }
    }

    #[test]
    fn test_similar_users_above_threshold() {
        let data = dataset();
        let similar = Recommender::new(&data).similar_users("ana");

        let ids: Vec<_> = similar.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(ids, vec!["ben", "dee"]);
        // ben: styles 2/2 * 0.6 + colours 1/2 * 0.4
        assert!((similar[0].similarity_score - 0.8).abs() < 1e-9);
        assert_eq!(similar[0].shared_preferences, vec!["casual", "street", "navy"]);
        // dee: styles 1/2 * 0.6 + colours 2/2 * 0.4
        assert!((similar[1].similarity_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_collaborative_recommendations_dedupe_shared_likes() {
        let data = dataset();
        let result = Recommender::new(&data).recommend(&request(RecommendationKind::SimilarUsers));

        let recs: Vec<_> = result
            .recommendations
            .iter()
            .map(|r| (r.outfit.id.as_str(), (r.score * 100.0).round() / 100.0))
            .collect();
        assert_eq!(recs, vec![("o10", 0.72), ("o11", 0.72)]);
        assert_eq!(result.similar_users.len(), 2);
        assert!(
            result
                .recommendations
                .iter()
                .all(|r| r.source == RecommendationSource::CollaborativeFiltering)
        );
    }

    #[test]
    fn test_style_based_keeps_strong_matches_with_images() {
        let data = dataset();
        let result = Recommender::new(&data).recommend(&request(RecommendationKind::StyleBased));

        let ids: Vec<_> = result.recommendations.iter().map(|r| r.outfit.id.as_str()).collect();
        // p1 matches both preferred styles and is popular; p2 only half
        assert_eq!(ids, vec!["p1"]);
        assert!((result.recommendations[0].score - 0.8).abs() < 1e-9);
        assert_eq!(
            result.recommendations[0].reason,
            "Matches your preferred style: casual, street"
        );
    }

    #[test]
    fn test_emotion_based_uses_high_engagement_only() {
        let data = dataset();
        let result = Recommender::new(&data).recommend(&request(RecommendationKind::EmotionBased));

        let ids: Vec<_> = result.recommendations.iter().map(|r| r.outfit.id.as_str()).collect();
        assert_eq!(ids, vec!["o20"]);
        assert_eq!(result.recommendations[0].score, 0.85);
    }

    #[test]
    fn test_hybrid_weights_and_limit() {
        let data = dataset();
        let mut req = request(RecommendationKind::Hybrid);
        req.limit = 2;
        let result = Recommender::new(&data).recommend(&req);

        let recs: Vec<_> = result
            .recommendations
            .iter()
            .map(|r| (r.outfit.id.as_str(), (r.score * 1000.0).round() / 1000.0))
            .collect();
        // o10/o11 0.72*0.4, p1 0.8*0.4, o20 0.85*0.2
        assert_eq!(recs, vec![("p1", 0.32), ("o10", 0.288)]);
        let (low, high) = result.insights.confidence_range;
        assert!((low - 0.17).abs() < 1e-9);
        assert!((high - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_insights() {
        let data = dataset();
        let result = Recommender::new(&data).recommend(&request(RecommendationKind::StyleBased));

        assert_eq!(result.insights.top_categories, vec!["casual", "street"]);
        assert_eq!(
            result.insights.recommended_colors,
            vec!["white", "navy", "olive"]
        );
        assert_eq!(result.insights.style_personality, "Comfortable");
    }

    #[test]
    fn test_blank_style_category_is_not_counted() {
        let data = Dataset {
            interactions: vec![
                like("eve", "o1", "", &[]),
                like("eve", "o2", "", &[]),
                like("eve", "o3", "boho", &[]),
            ],
            ..Dataset::default()
        };

        assert_eq!(Recommender::new(&data).style_preferences("eve"), vec!["boho"]);
    }

    #[test]
    fn test_unknown_user_gets_defaults() {
        let data = dataset();
        let mut req = request(RecommendationKind::Hybrid);
        req.user_id = "nobody".into();
        let result = Recommender::new(&data).recommend(&req);

        assert!(result.recommendations.is_empty());
        assert!(result.similar_users.is_empty());
        assert_eq!(result.insights.style_personality, "Explorer");
        assert_eq!(result.insights.confidence_range, (0.5, 0.8));
    }

    #[test]
    fn test_dataset_parses_from_json() {
        let json = r#"{
            "preferences": [{"user_id": "ana", "preferred_styles": ["casual"]}],
            "interactions": [{
                "user_id": "ana",
                "outfit": {"id": "o1"},
                "interaction_type": "like",
                "style_category": "casual"
            }]
        }"#;
        let data: Dataset = serde_json::from_str(json).unwrap();
        assert_eq!(data.preferences[0].preferred_colors.len(), 0);
        assert_eq!(data.interactions[0].interaction_type, InteractionType::Like);
        assert!(data.posts.is_empty());

        let req: RecommendationRequest =
            serde_json::from_str(r#"{"user_id": "ana", "recommendation_type": "hybrid"}"#).unwrap();
        assert_eq!(req.limit, 10);
        assert_eq!(req.recommendation_type, RecommendationKind::Hybrid);
    }
}
