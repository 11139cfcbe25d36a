//! Machine-readable NutriWave contracts shared by the engine, the CLI and
//! anything that consumes an exported generation pack.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const GENERATION_PACK_SCHEMA: &str = "nutriwave.generation_pack.v1";

/// Texture target requested for a product. Deserializes leniently through
/// [`Texture::parse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Texture {
    #[default]
    Soft,
    Thick,
    Refreshing,
}

impl Texture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Thick => "thick",
            Self::Refreshing => "refreshing",
        }
    }

    /// Unknown spellings fall back to `Soft`, the default texture.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "thick" => Self::Thick,
            "refreshing" => Self::Refreshing,
            _ => Self::Soft,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Soft, Self::Thick, Self::Refreshing]
    }
}

impl From<String> for Texture {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

/// Output language. Anything other than `zh` renders in English, on the
/// wire as well as through [`Lang::parse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Lang {
    Zh,
    #[default]
    En,
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }

    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("zh") {
            Self::Zh
        } else {
            Self::En
        }
    }

    pub fn pick<'a>(self, zh: &'a str, en: &'a str) -> &'a str {
        match self {
            Self::Zh => zh,
            Self::En => en,
        }
    }
}

impl From<String> for Lang {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

/// Aggregated consumer preference scores. A metric whose column was not
/// selected, or held no numeric cells, is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub rows: usize,
    pub beany_mean: Option<f64>,
    pub sweet_mean: Option<f64>,
    pub texture_mean: Option<f64>,
    pub overall_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductNaming {
    pub name_zh: String,
    pub name_en: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaComponent {
    Water,
    Protein,
    Sweetener,
    Stabilizer,
}

/// One mass-bearing line of a 100 kg batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaLine {
    pub component: FormulaComponent,
    pub item_zh: String,
    pub item_en: String,
    pub kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

/// Inoculum reference; dosed by culture protocol, not by batch mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureLine {
    pub item_zh: String,
    pub item_en: String,
    pub strain_id: String,
    pub name_zh: String,
    pub name_en: String,
    pub supplier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSteps {
    pub heat_treat: String,
    pub cool_to_inoculation: String,
    pub fermentation: String,
    pub post: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    pub goals: Vec<String>,
    pub strain_tags: Vec<String>,
    pub customer_profile_used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub product: ProductNaming,
    pub description: String,
    pub formula_100kg: Vec<FormulaLine>,
    pub culture: CultureLine,
    pub process: ProcessSteps,
    pub targets: Map<String, Value>,
    pub rationale: Rationale,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Candidate {
    pub fn kg_of(&self, component: FormulaComponent) -> Option<f64> {
        self.formula_100kg
            .iter()
            .find(|line| line.component == component)
            .map(|line| line.kg)
    }

    pub fn total_kg(&self) -> f64 {
        self.formula_100kg.iter().map(|line| line.kg).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniPlan {
    pub lang: Lang,
    pub heading: String,
    pub steps: Vec<String>,
    pub pass_criteria: Vec<String>,
}

/// The request as it is echoed back in an exported pack. `lang` is the
/// language code as requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub lang: String,
    pub product_type: String,
    pub base_id: String,
    pub base_name: String,
    pub texture: Texture,
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPack {
    #[serde(default = "default_pack_schema")]
    pub schema: String,
    pub generated_at: String,
    #[serde(default)]
    pub brief: Option<String>,
    pub request: RequestEcho,
    pub customer_profile: Option<CustomerProfile>,
    pub candidates: Vec<Candidate>,
    pub mini_doe: MiniPlan,
}

fn default_pack_schema() -> String {
    GENERATION_PACK_SCHEMA.to_string()
}

impl GenerationPack {
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
