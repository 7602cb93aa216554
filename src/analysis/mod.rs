mod recommend;
mod relationships;
mod templates;

pub use recommend::{
    characteristics, detect_genre, recommend, Characteristics, Genre, Recommendation, RecommendationKind,
    Relationships,
};
pub use relationships::{complementary, reinforcement, support};
pub use templates::{best_match_among, best_template_match, similarity, Template, TemplateMatch};
