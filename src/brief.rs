//! Goal-tag inference from a free-text product brief.

use nutriwave_protocol::Texture;

pub const GOAL_ANTI_BEANY: &str = "anti_beany";
pub const GOAL_SWEET_NOTES: &str = "sweet_notes";
pub const GOAL_EPS: &str = "eps";

const ANTI_BEANY_CJK: &[&str] = &["豆腥"];
const ANTI_BEANY_LATIN: &[&str] = &["beany", "off-flavor"];
const SWEET_CJK: &[&str] = &["甜"];
const SWEET_LATIN: &[&str] = &["sweet"];

/// Goals in fixed order: `anti_beany`, `sweet_notes`, then `eps` for soft and
/// thick textures (exopolysaccharide producers help body).
pub fn infer_goals(brief: &str, texture: Texture) -> Vec<String> {
    let lower = brief.to_lowercase();
    let mentions = |cjk: &[&str], latin: &[&str]| {
        cjk.iter().any(|k| brief.contains(k)) || latin.iter().any(|k| lower.contains(k))
    };

    let mut goals = vec![];
    if mentions(ANTI_BEANY_CJK, ANTI_BEANY_LATIN) {
        goals.push(GOAL_ANTI_BEANY.to_string());
    }
    if mentions(SWEET_CJK, SWEET_LATIN) {
        goals.push(GOAL_SWEET_NOTES.to_string());
    }
    if matches!(texture, Texture::Soft | Texture::Thick) {
        goals.push(GOAL_EPS.to_string());
    }
    goals
}
