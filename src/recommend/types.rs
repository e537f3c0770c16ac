use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    SimilarUsers,
    StyleBased,
    EmotionBased,
    Hybrid,
}

impl std::str::FromStr for RecommendationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "similar_users" => Ok(Self::SimilarUsers),
            "style_based" => Ok(Self::StyleBased),
            "emotion_based" => Ok(Self::EmotionBased),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(anyhow::anyhow!(
                "unknown recommendation type {:?} (expected similar_users, style_based, emotion_based or hybrid)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Like,
    Dislike,
    View,
    Save,
    Share,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outfit {
    pub id: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub preferred_styles: Vec<String>,
    #[serde(default)]
    pub preferred_colors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub outfit: Outfit,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub style_category: Option<String>,
    #[serde(default)]
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub user_id: String,
    pub outfit_id: String,
    pub engagement_score: f64,
    #[serde(default)]
    pub dominant_emotion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedOutfit {
    pub user_id: String,
    pub outfit: Outfit,
}

/// Everything the recommender reads, as loaded from a JSON export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub preferences: Vec<UserPreferences>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub posts: Vec<CommunityPost>,
    #[serde(default)]
    pub emotions: Vec<EmotionRecord>,
    #[serde(default)]
    pub saved_outfits: Vec<SavedOutfit>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse dataset: {:?}", path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub recommendation_type: RecommendationKind,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    CollaborativeFiltering,
    StyleAnalysis,
    EmotionAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub outfit: Outfit,
    pub score: f64,
    pub reason: String,
    pub source: RecommendationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarUser {
    pub user_id: String,
    pub similarity_score: f64,
    pub shared_preferences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub top_categories: Vec<String>,
    pub recommended_colors: Vec<String>,
    pub style_personality: String,
    pub confidence_range: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub recommendations: Vec<Recommendation>,
    pub similar_users: Vec<SimilarUser>,
    pub insights: Insights,
}
