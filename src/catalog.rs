//! Typed reference catalog: bases, strains, ingredients, suppliers and
//! rheology methods, plus per-texture targets and named constraint sets.

use crate::error::{NutriWaveError, Result};
use nutriwave_protocol::{Lang, Texture};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fs, path::Path};

pub const DEFAULT_PROTEIN_PCT: f64 = 10.0;
pub const PLACEHOLDER_STRAIN_ID: &str = "TBD-001";

/// Records that merge by identifier.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Base,
    Strain,
    Ingredient,
    Supplier,
    RheoMethod,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Strain => "strain",
            Self::Ingredient => "ingredient",
            Self::Supplier => "supplier",
            Self::RheoMethod => "rheo_method",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "base" | "bases" => Ok(Self::Base),
            "strain" | "strains" => Ok(Self::Strain),
            "ingredient" | "ingredients" => Ok(Self::Ingredient),
            "supplier" | "suppliers" => Ok(Self::Supplier),
            "rheo_method" | "rheo_methods" | "rheology" => Ok(Self::RheoMethod),
            other => Err(NutriWaveError::UnknownKind(other.to_string())),
        }
    }

    /// Key of the list inside `data.json`; also accepted as the wrapper key of
    /// a JSON import document.
    pub fn list_key(self) -> &'static str {
        match self {
            Self::Base => "bases",
            Self::Strain => "strains",
            Self::Ingredient => "ingredients",
            Self::Supplier => "suppliers",
            Self::RheoMethod => "rheo_methods",
        }
    }

    pub fn id_field(self) -> &'static str {
        match self {
            Self::Base => "id",
            Self::Strain => "strain_id",
            Self::Ingredient => "ingredient_id",
            Self::Supplier => "supplier_id",
            Self::RheoMethod => "rheo_method_id",
        }
    }

    pub fn overlay_file_name(self) -> String {
        format!("{}.jsonl", self.list_key())
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Base,
            Self::Strain,
            Self::Ingredient,
            Self::Supplier,
            Self::RheoMethod,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub name_zh: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(
        default = "default_protein_pct",
        deserialize_with = "protein_pct_or_default"
    )]
    pub default_protein_pct: f64,
}

impl Base {
    /// Stand-in for a base id the catalog does not know.
    pub fn fallback(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name_zh: id.to_string(),
            name_en: id.to_string(),
            default_protein_pct: DEFAULT_PROTEIN_PCT,
        }
    }

    pub fn display_name(&self, lang: Lang) -> &str {
        lang.pick(&self.name_zh, &self.name_en)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    #[default]
    Seed,
    InternalValidated,
    ClientValidated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strain {
    #[serde(default, deserialize_with = "lenient_string")]
    pub strain_id: String,
    #[serde(default)]
    pub name_zh: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub supplier_id: String,
    #[serde(default, deserialize_with = "tag_list")]
    pub benefit_tags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "tag_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub compatibility_tags: Vec<String>,
    #[serde(default, deserialize_with = "tag_list")]
    pub recommended_use_cases: Vec<String>,
    #[serde(default)]
    pub evidence_level: EvidenceLevel,
}

impl Strain {
    pub fn placeholder() -> Self {
        Self {
            strain_id: PLACEHOLDER_STRAIN_ID.to_string(),
            name_zh: "待补充菌株 (TBD)".to_string(),
            name_en: "Strain TBD".to_string(),
            supplier_id: "KT".to_string(),
            benefit_tags: vec![],
            compatibility_tags: vec![],
            recommended_use_cases: vec![],
            evidence_level: EvidenceLevel::Seed,
        }
    }

    /// Benefit tags followed by compatibility tags not already listed.
    pub fn tags(&self) -> Vec<String> {
        let mut tags = self.benefit_tags.clone();
        for tag in &self.compatibility_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientCategory {
    Protein,
    Sweetener,
    Stabilizer,
    Fat,
    Flavor,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ingredient_id: String,
    #[serde(default)]
    pub category: IngredientCategory,
    #[serde(default)]
    pub name_zh: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub supplier_id: String,
    #[serde(default = "default_true", deserialize_with = "bool_or_true")]
    pub clean_label: bool,
    #[serde(default, deserialize_with = "tag_list")]
    pub allergen_flags: Vec<String>,
    #[serde(default, deserialize_with = "tag_list")]
    pub compatibility_tags: Vec<String>,
    #[serde(default = "empty_object", deserialize_with = "specs_object")]
    pub specs: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(default, deserialize_with = "lenient_string")]
    pub supplier_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, flatten)]
    pub details: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RheoMethod {
    #[serde(default, deserialize_with = "lenient_string")]
    pub rheo_method_id: String,
    #[serde(default)]
    pub name_zh: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub geometry: String,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub r1_mm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub r2_mm: Option<f64>,
    #[serde(default)]
    pub processing_version: String,
    #[serde(default)]
    pub lambda_definition: String,
    #[serde(default)]
    pub regime_rule: String,
}

impl Keyed for Base {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Strain {
    fn key(&self) -> &str {
        &self.strain_id
    }
}

impl Keyed for Ingredient {
    fn key(&self) -> &str {
        &self.ingredient_id
    }
}

impl Keyed for Supplier {
    fn key(&self) -> &str {
        &self.supplier_id
    }
}

impl Keyed for RheoMethod {
    fn key(&self) -> &str {
        &self.rheo_method_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub bases: Vec<Base>,
    pub strains: Vec<Strain>,
    pub ingredients: Vec<Ingredient>,
    pub suppliers: Vec<Supplier>,
    pub rheo_methods: Vec<RheoMethod>,
    /// texture -> lang -> target block
    pub targets: BTreeMap<String, BTreeMap<String, Value>>,
    pub constraints: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub base_count: usize,
    pub strain_count: usize,
    pub ingredient_count: usize,
    pub supplier_count: usize,
    pub rheo_method_count: usize,
    pub base_ids: Vec<String>,
    pub strain_ids: Vec<String>,
    pub target_textures: Vec<String>,
}

impl Catalog {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| NutriWaveError::io(path, e))?;
        Self::from_json_str(&text).map_err(|e| NutriWaveError::json(path, e))
    }

    pub fn base(&self, id: &str) -> Option<&Base> {
        self.bases.iter().find(|b| b.id == id)
    }

    pub fn strain(&self, id: &str) -> Option<&Strain> {
        self.strains.iter().find(|s| s.strain_id == id)
    }

    /// Supplier display name, or the id itself when the reference dangles.
    pub fn supplier_name(&self, supplier_id: &str) -> String {
        self.suppliers
            .iter()
            .find(|s| s.supplier_id == supplier_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| supplier_id.to_string())
    }

    /// Targets for `texture` under the exact language code; empty when the
    /// catalog has none.
    pub fn target_for(&self, texture: Texture, lang_code: &str) -> Map<String, Value> {
        self.targets
            .get(texture.as_str())
            .and_then(|by_lang| by_lang.get(lang_code))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn constraint_set(&self, name: &str) -> Map<String, Value> {
        self.constraints
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn default_constraints(&self) -> Map<String, Value> {
        self.constraint_set("default")
    }

    /// Removes records with a blank identifier and reports what was dropped.
    pub fn drop_records_without_id(&mut self) -> Vec<String> {
        let mut warnings = vec![];
        retain_keyed(&mut self.bases, RecordKind::Base, &mut warnings);
        retain_keyed(&mut self.strains, RecordKind::Strain, &mut warnings);
        retain_keyed(&mut self.ingredients, RecordKind::Ingredient, &mut warnings);
        retain_keyed(&mut self.suppliers, RecordKind::Supplier, &mut warnings);
        retain_keyed(&mut self.rheo_methods, RecordKind::RheoMethod, &mut warnings);
        warnings
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            base_count: self.bases.len(),
            strain_count: self.strains.len(),
            ingredient_count: self.ingredients.len(),
            supplier_count: self.suppliers.len(),
            rheo_method_count: self.rheo_methods.len(),
            base_ids: self.bases.iter().map(|b| b.id.clone()).collect(),
            strain_ids: self.strains.iter().map(|s| s.strain_id.clone()).collect(),
            target_textures: self.targets.keys().cloned().collect(),
        }
    }
}

fn retain_keyed<T: Keyed>(records: &mut Vec<T>, kind: RecordKind, warnings: &mut Vec<String>) {
    let before = records.len();
    records.retain(|r| !r.key().trim().is_empty());
    let dropped = before - records.len();
    if dropped > 0 {
        warnings.push(format!(
            "Dropped {dropped} {} record(s) without {}",
            kind.as_str(),
            kind.id_field()
        ));
    }
}

/// Splits a comma-separated tag string, trimming entries and dropping blanks.
pub fn split_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn default_protein_pct() -> f64 {
    DEFAULT_PROTEIN_PCT
}

fn default_true() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrText {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrText {
    Bool(bool),
    Number(i64),
    Text(String),
}

fn tag_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<ListOrText>::deserialize(d)? {
        None => vec![],
        Some(ListOrText::List(items)) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        Some(ListOrText::Text(text)) => split_tags(&text),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(D::Error::custom(format!(
                "expected an identifier string, got {other}"
            )));
        }
    })
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrText>::deserialize(d)? {
        None => Ok(None),
        Some(NumberOrText::Number(v)) => Ok(Some(v)),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, got '{text}'")))
        }
    }
}

fn protein_pct_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(lenient_opt_f64(d)?.unwrap_or(DEFAULT_PROTEIN_PCT))
}

fn bool_or_true<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Option::<BoolOrText>::deserialize(d)? {
        None => Ok(true),
        Some(BoolOrText::Bool(b)) => Ok(b),
        Some(BoolOrText::Number(n)) => Ok(n != 0),
        Some(BoolOrText::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "true" | "yes" | "y" | "1" => Ok(true),
            "false" | "no" | "n" | "0" => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean, got '{other}'"))),
        },
    }
}

/// Specs arrive as an object, or as JSON text from forms and CSV cells.
/// Text that is not a JSON object is kept under `raw`.
fn specs_object<'de, D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => empty_object(),
        Some(Value::String(text)) if text.trim().is_empty() => empty_object(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Value::Object(map),
            _ => {
                let mut map = Map::new();
                map.insert("raw".to_string(), Value::String(text));
                Value::Object(map)
            }
        },
        Some(other) => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Catalog {
        Catalog::from_json_str(
            r#"{
  "bases": [{"id": "soy", "name_zh": "大豆", "name_en": "Soy", "default_protein_pct": 10.0},
            {"id": "oat", "name_en": "Oat"}],
  "strains": [{"strain_id": "S1", "name_en": "L. plantarum", "supplier_id": "KT",
               "benefit_tags": ["anti_beany", "eps"], "compatibility_tags": "soy, eps",
               "evidence_level": "internal_validated"}],
  "suppliers": [{"supplier_id": "KT", "name": "KT Cultures", "country": "DK"}],
  "targets": {"soft": {"en": {"syneresis_pct_max": 10}, "zh": "not an object"}},
  "constraints": {"default": {"clean_label": true}}
}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_protein_defaults_to_ten() {
        let catalog = sample();
        assert_eq!(catalog.base("oat").unwrap().default_protein_pct, 10.0);
        assert_eq!(catalog.base("oat").unwrap().name_zh, "");
    }

    #[test]
    fn test_strain_tags_union_preserves_order() {
        let catalog = sample();
        let strain = catalog.strain("S1").unwrap();
        assert_eq!(strain.compatibility_tags, vec!["soy", "eps"]);
        assert_eq!(strain.tags(), vec!["anti_beany", "eps", "soy"]);
        assert_eq!(strain.evidence_level, EvidenceLevel::InternalValidated);
    }

    #[test]
    fn test_unknown_evidence_level_is_kept_as_unknown() {
        let strain: Strain =
            serde_json::from_value(json!({"strain_id": "X", "evidence_level": "folklore"}))
                .unwrap();
        assert_eq!(strain.evidence_level, EvidenceLevel::Unknown);
        assert!(strain.benefit_tags.is_empty());
    }

    #[test]
    fn test_supplier_name_falls_back_to_id() {
        let catalog = sample();
        assert_eq!(catalog.supplier_name("KT"), "KT Cultures");
        assert_eq!(catalog.supplier_name("NOPE"), "NOPE");
        assert_eq!(
            catalog.suppliers[0].details.get("country"),
            Some(&json!("DK"))
        );
    }

    #[test]
    fn test_target_lookup_degrades_to_empty_object() {
        let catalog = sample();
        let soft_en = catalog.target_for(Texture::Soft, "en");
        assert_eq!(soft_en.get("syneresis_pct_max"), Some(&json!(10)));
        assert!(catalog.target_for(Texture::Soft, "zh").is_empty());
        assert!(catalog.target_for(Texture::Thick, "en").is_empty());
        assert!(catalog.target_for(Texture::Soft, "fr").is_empty());
        assert_eq!(
            catalog.default_constraints().get("clean_label"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_string_spellings_from_csv_imports() {
        let ingredient: Ingredient = serde_json::from_value(json!({
            "ingredient_id": "ING-1",
            "category": "sweetener",
            "clean_label": "False",
            "allergen_flags": "soy, ",
            "specs": "{\"brix\": 65}"
        }))
        .unwrap();
        assert!(!ingredient.clean_label);
        assert_eq!(ingredient.category, IngredientCategory::Sweetener);
        assert_eq!(ingredient.allergen_flags, vec!["soy"]);
        assert_eq!(ingredient.specs, json!({"brix": 65}));

        let method: RheoMethod = serde_json::from_value(json!({
            "rheo_method_id": "RHEO-1", "r1_mm": "12.5", "r2_mm": 13.85
        }))
        .unwrap();
        assert_eq!(method.r1_mm, Some(12.5));
        assert_eq!(method.r2_mm, Some(13.85));
    }

    #[test]
    fn test_unparsable_specs_kept_as_raw() {
        let ingredient: Ingredient =
            serde_json::from_value(json!({"ingredient_id": "ING-2", "specs": "brix 65"}))
                .unwrap();
        assert_eq!(ingredient.specs, json!({"raw": "brix 65"}));
        assert!(ingredient.clean_label);
    }

    #[test]
    fn test_drop_records_without_id() {
        let mut catalog = sample();
        catalog.strains.push(Strain {
            strain_id: "  ".to_string(),
            ..Strain::placeholder()
        });
        let warnings = catalog.drop_records_without_id();
        assert_eq!(catalog.strains.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("strain_id"));
    }

    #[test]
    fn test_shipped_seed_catalog_is_complete() {
        let catalog = Catalog::from_json_str(include_str!("../data/data.json")).unwrap();
        assert_eq!(catalog.bases[0].id, "soy");
        for texture in Texture::all() {
            assert!(!catalog.target_for(texture, "en").is_empty());
            assert!(!catalog.target_for(texture, "zh").is_empty());
        }
        for strain in &catalog.strains {
            assert_ne!(catalog.supplier_name(&strain.supplier_id), strain.supplier_id);
        }
        assert!(catalog.rheo_methods.iter().any(|m| m.rheo_method_id == "NW-Lambda-v1"));
    }

    #[test]
    fn test_record_kind_parse() {
        assert_eq!(RecordKind::parse("rheo-method").unwrap(), RecordKind::RheoMethod);
        assert_eq!(RecordKind::parse("Strains").unwrap(), RecordKind::Strain);
        assert!(RecordKind::parse("runs").is_err());
        assert_eq!(RecordKind::Ingredient.overlay_file_name(), "ingredients.jsonl");
    }
}
