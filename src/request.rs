use itertools::Itertools;
use nutriwave_protocol::{Lang, RequestEcho, Texture};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_PRODUCT_TYPE: &str = "yogurt";
pub const DEFAULT_LANG_CODE: &str = "en";

/// Trimmed goal tags without blanks, first occurrence kept.
pub fn normalize_goals<I, S>(goals: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    goals
        .into_iter()
        .map(Into::into)
        .map(|g: String| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .unique()
        .collect()
}

/// One generation request. Built once per action and read-only afterwards;
/// goal tags are de-duplicated keeping the first occurrence. The language
/// code is kept as given; rendering goes through [`Lang::parse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRequest {
    lang: String,
    product_type: String,
    base_id: String,
    texture: Texture,
    goals: Vec<String>,
    constraints: Map<String, Value>,
}

impl UserRequest {
    pub fn new(base_id: &str, texture: Texture) -> Self {
        Self {
            lang: DEFAULT_LANG_CODE.to_string(),
            product_type: DEFAULT_PRODUCT_TYPE.to_string(),
            base_id: base_id.to_string(),
            texture,
            goals: vec![],
            constraints: Map::new(),
        }
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.trim().to_string();
        self
    }

    pub fn with_product_type(mut self, product_type: &str) -> Self {
        self.product_type = product_type.to_string();
        self
    }

    pub fn with_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goals = normalize_goals(goals);
        self
    }

    pub fn with_constraints(mut self, constraints: Map<String, Value>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn lang(&self) -> Lang {
        Lang::parse(&self.lang)
    }

    pub fn lang_code(&self) -> &str {
        &self.lang
    }

    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn texture(&self) -> Texture {
        self.texture
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn constraints(&self) -> &Map<String, Value> {
        &self.constraints
    }

    pub fn echo(&self, base_name: &str) -> RequestEcho {
        RequestEcho {
            lang: self.lang.clone(),
            product_type: self.product_type.clone(),
            base_id: self.base_id.clone(),
            base_name: base_name.to_string(),
            texture: self.texture,
            goals: self.goals.clone(),
        }
    }
}
