//! Candidate formulations for a 100 kg batch.
//!
//! Sweetener and stabilizer levels are varied around a texture-dependent
//! base point, optionally nudged by a consumer profile. The nine level
//! combinations are shuffled with a locally seeded generator, so the same
//! inputs always yield the same candidates. Water is the remainder, which
//! keeps every candidate summing to 100 kg.

use crate::{
    catalog::{Base, Catalog, Strain},
    ranker::{self, DEFAULT_SHORTLIST_SIZE},
    request::UserRequest,
};
use nutriwave_protocol::{
    Candidate, CultureLine, CustomerProfile, FormulaComponent, FormulaLine, Lang, ProcessSteps,
    ProductNaming, Rationale, Texture,
};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

pub const DEFAULT_CANDIDATE_COUNT: usize = 3;
pub const DEFAULT_SHUFFLE_SEED: u64 = 42;
pub const BATCH_KG: f64 = 100.0;

const LEVEL_STEP: f64 = 0.05;
const SWEETENER_FLOOR: f64 = 0.20;
const STABILIZER_FLOOR: f64 = 0.10;
const PROFILE_BIAS_THRESHOLD: f64 = 3.5;
const PLACEHOLDER_LINE_SUPPLIER: &str = "TBD";

/// Knobs that are not part of the request itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub candidates: usize,
    pub shortlist_size: usize,
    pub seed: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATE_COUNT,
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
            seed: DEFAULT_SHUFFLE_SEED,
        }
    }
}

/// Starting (sweetener, stabilizer) kg for a texture.
pub fn base_levels(texture: Texture) -> (f64, f64) {
    match texture {
        Texture::Thick => (0.55, 0.45),
        Texture::Refreshing => (0.40, 0.15),
        Texture::Soft => (0.50, 0.30),
    }
}

fn biased_levels(texture: Texture, profile: Option<&CustomerProfile>) -> (f64, f64) {
    let (mut sweetener, mut stabilizer) = base_levels(texture);
    if let Some(profile) = profile {
        if profile.sweet_mean.is_some_and(|m| m > PROFILE_BIAS_THRESHOLD) {
            sweetener += LEVEL_STEP;
        }
        if profile.texture_mean.is_some_and(|m| m > PROFILE_BIAS_THRESHOLD) {
            stabilizer += LEVEL_STEP;
        }
    }
    (sweetener, stabilizer)
}

fn three_levels(center: f64, floor: f64) -> [f64; 3] {
    [
        (center - LEVEL_STEP).max(floor),
        center,
        center + LEVEL_STEP,
    ]
}

/// All nine (sweetener, stabilizer) pairs, sweetener-major, shuffled with
/// `seed`.
pub fn level_combinations(sweetener: f64, stabilizer: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut combos: Vec<(f64, f64)> = three_levels(sweetener, SWEETENER_FLOOR)
        .into_iter()
        .flat_map(|s| {
            three_levels(stabilizer, STABILIZER_FLOOR)
                .into_iter()
                .map(move |st| (s, st))
        })
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    combos.shuffle(&mut rng);
    combos
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds up to `settings.candidates` formulations (at most nine). Never
/// fails: unknown bases and empty strain lists fall back to stand-ins.
pub fn generate(
    catalog: &Catalog,
    request: &UserRequest,
    profile: Option<&CustomerProfile>,
    settings: &GenerationSettings,
) -> Vec<Candidate> {
    let base = catalog.base(request.base_id()).cloned().unwrap_or_else(|| {
        tracing::warn!(base_id = request.base_id(), "unknown base, using fallback");
        Base::fallback(request.base_id())
    });

    let mut strains = ranker::shortlist(catalog, request.goals(), settings.shortlist_size);
    if strains.is_empty() {
        tracing::warn!("no strains in catalog, using placeholder strain");
        strains.push(Strain::placeholder());
    }

    let (sweetener, stabilizer) = biased_levels(request.texture(), profile);
    let combos = level_combinations(sweetener, stabilizer, settings.seed);
    let targets = catalog.target_for(request.texture(), request.lang_code());

    let candidates: Vec<Candidate> = combos
        .iter()
        .take(settings.candidates)
        .enumerate()
        .map(|(i, &(sweetener_kg, stabilizer_kg))| {
            let strain = &strains[i % strains.len()];
            let mut candidate = build_candidate(
                catalog,
                request,
                &base,
                strain,
                sweetener_kg,
                stabilizer_kg,
                profile.is_some(),
            );
            candidate.targets = targets.clone();
            candidate
        })
        .collect();

    tracing::info!(
        base = %base.id,
        texture = request.texture().as_str(),
        candidates = candidates.len(),
        profile = profile.is_some(),
        "generated candidates"
    );
    candidates
}

fn build_candidate(
    catalog: &Catalog,
    request: &UserRequest,
    base: &Base,
    strain: &Strain,
    sweetener_kg: f64,
    stabilizer_kg: f64,
    profile_used: bool,
) -> Candidate {
    let texture = request.texture().as_str();
    let protein = round2(base.default_protein_pct);
    let sweetener = round2(sweetener_kg);
    let stabilizer = round2(stabilizer_kg);
    let water = round2(BATCH_KG - protein - sweetener - stabilizer);

    let mut warnings = vec![];
    if water < 0.0 {
        tracing::warn!(
            base = %base.id,
            protein,
            water,
            "water remainder is negative"
        );
        warnings.push(format!(
            "Water is negative ({water} kg): protein {protein} kg leaves no room in a {BATCH_KG} kg batch"
        ));
    }

    let description = match request.lang() {
        Lang::Zh => format!("Clean label: 去豆腥、甜香风味、{texture}口感。"),
        Lang::En => format!("Clean label: reduced beany, sweet notes, {texture} texture."),
    };

    Candidate {
        product: ProductNaming {
            name_zh: format!("{} 发酵酸奶（{texture}）", base.name_zh),
            name_en: format!("{} fermented yogurt ({texture})", base.name_en),
            product_type: request.product_type().to_string(),
        },
        description,
        formula_100kg: vec![
            line(FormulaComponent::Water, "水", "Water", water, None),
            line(
                FormulaComponent::Protein,
                &format!("{}蛋白", base.name_zh),
                &format!("{} protein", base.name_en),
                protein,
                Some(PLACEHOLDER_LINE_SUPPLIER),
            ),
            line(
                FormulaComponent::Sweetener,
                "甜味剂",
                "Sweetener",
                sweetener,
                Some(PLACEHOLDER_LINE_SUPPLIER),
            ),
            line(
                FormulaComponent::Stabilizer,
                "稳定剂/淀粉",
                "Stabilizer/Starch",
                stabilizer,
                Some(PLACEHOLDER_LINE_SUPPLIER),
            ),
        ],
        culture: CultureLine {
            item_zh: "菌株".to_string(),
            item_en: "Strain".to_string(),
            strain_id: strain.strain_id.clone(),
            name_zh: strain.name_zh.clone(),
            name_en: strain.name_en.clone(),
            supplier: catalog.supplier_name(&strain.supplier_id),
        },
        process: fixed_process(),
        targets: Default::default(),
        rationale: Rationale {
            goals: request.goals().to_vec(),
            strain_tags: strain.tags(),
            customer_profile_used: profile_used,
        },
        warnings,
    }
}

fn line(
    component: FormulaComponent,
    item_zh: &str,
    item_en: &str,
    kg: f64,
    supplier: Option<&str>,
) -> FormulaLine {
    FormulaLine {
        component,
        item_zh: item_zh.to_string(),
        item_en: item_en.to_string(),
        kg,
        supplier: supplier.map(str::to_string),
    }
}

pub fn fixed_process() -> ProcessSteps {
    ProcessSteps {
        heat_treat: "85°C 10 min".to_string(),
        cool_to_inoculation: "42°C".to_string(),
        fermentation: "42°C 6–10 h (stop at pH 4.4–4.6)".to_string(),
        post: "4°C cold storage 12–24 h".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::from_json_str(
            r#"{
  "bases": [{"id": "soy", "name_zh": "大豆", "name_en": "Soy", "default_protein_pct": 10.0},
            {"id": "heavy", "name_en": "Heavy", "default_protein_pct": 99.9}],
  "strains": [
    {"strain_id": "S1", "name_en": "Plain", "supplier_id": "X", "benefit_tags": []},
    {"strain_id": "S2", "name_en": "Clean", "supplier_id": "KT", "benefit_tags": ["anti_beany"]},
    {"strain_id": "S3", "name_en": "Body", "supplier_id": "KT", "benefit_tags": ["eps"]}
  ],
  "suppliers": [{"supplier_id": "KT", "name": "KT Cultures"}],
  "targets": {"soft": {"en": {"syneresis_pct_max": 10}}}
}"#,
        )
        .unwrap()
    }

    fn soy(texture: Texture, goals: &[&str]) -> UserRequest {
        UserRequest::new("soy", texture).with_goals(goals.iter().copied())
    }

    fn sweet_fan() -> CustomerProfile {
        CustomerProfile {
            rows: 10,
            sweet_mean: Some(4.0),
            ..CustomerProfile::default()
        }
    }

    fn run(req: &UserRequest, profile: Option<&CustomerProfile>) -> Vec<Candidate> {
        generate(&catalog(), req, profile, &GenerationSettings::default())
    }

    #[test]
    fn test_three_candidates_summing_to_batch() {
        let candidates = run(&soy(Texture::Soft, &["eps"]), None);
        assert_eq!(candidates.len(), 3);
        for c in &candidates {
            assert!((c.total_kg() - BATCH_KG).abs() < 0.01, "{}", c.total_kg());
            assert!(c.warnings.is_empty());
            assert_eq!(c.formula_100kg.len(), 4);
            assert_eq!(c.formula_100kg[0].component, FormulaComponent::Water);
            assert!(c.formula_100kg[0].supplier.is_none());
            assert!(c.formula_100kg[1..].iter().all(|l| l.supplier.as_deref() == Some("TBD")));
        }
    }

    #[test]
    fn test_identical_inputs_give_identical_candidates() {
        let req = soy(Texture::Thick, &["anti_beany", "eps"]);
        assert_eq!(run(&req, Some(&sweet_fan())), run(&req, Some(&sweet_fan())));
    }

    #[test]
    fn test_candidate_count_is_capped_at_nine() {
        let settings = GenerationSettings {
            candidates: 20,
            ..GenerationSettings::default()
        };
        let candidates = generate(&catalog(), &soy(Texture::Soft, &[]), None, &settings);
        assert_eq!(candidates.len(), 9);
        let mut pairs: Vec<(f64, f64)> = candidates
            .iter()
            .map(|c| {
                (
                    c.kg_of(FormulaComponent::Sweetener).unwrap(),
                    c.kg_of(FormulaComponent::Stabilizer).unwrap(),
                )
            })
            .collect();
        pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        pairs.dedup();
        assert_eq!(pairs.len(), 9);
    }

    #[test]
    fn test_thick_levels_exceed_refreshing() {
        let (thick_sw, thick_st) = base_levels(Texture::Thick);
        let (ref_sw, ref_st) = base_levels(Texture::Refreshing);
        assert!(thick_sw > ref_sw && thick_st > ref_st);

        let thick = run(&soy(Texture::Thick, &[]), None);
        let refreshing = run(&soy(Texture::Refreshing, &[]), None);
        for (t, r) in thick.iter().zip(&refreshing) {
            assert!(t.kg_of(FormulaComponent::Stabilizer) > r.kg_of(FormulaComponent::Stabilizer));
            assert!(t.kg_of(FormulaComponent::Sweetener) > r.kg_of(FormulaComponent::Sweetener));
        }
    }

    #[test]
    fn test_sweet_profile_raises_every_sweetener_level() {
        for texture in Texture::all() {
            let req = soy(texture, &[]);
            let plain = run(&req, None);
            let biased = run(&req, Some(&sweet_fan()));
            for (p, b) in plain.iter().zip(&biased) {
                assert!(
                    b.kg_of(FormulaComponent::Sweetener) > p.kg_of(FormulaComponent::Sweetener)
                );
                assert_eq!(
                    b.kg_of(FormulaComponent::Stabilizer),
                    p.kg_of(FormulaComponent::Stabilizer)
                );
                assert!(b.rationale.customer_profile_used);
                assert!(!p.rationale.customer_profile_used);
            }
        }
    }

    #[test]
    fn test_profile_at_threshold_is_ignored() {
        let profile = CustomerProfile {
            rows: 3,
            sweet_mean: Some(3.5),
            texture_mean: Some(3.5),
            ..CustomerProfile::default()
        };
        assert_eq!(
            biased_levels(Texture::Soft, Some(&profile)),
            base_levels(Texture::Soft)
        );
    }

    #[test]
    fn test_anti_beany_soy_scenario() {
        let candidates = run(&soy(Texture::Soft, &["anti_beany"]), None);
        let first = &candidates[0];
        assert_eq!(first.culture.strain_id, "S2");
        assert!(first.rationale.strain_tags.contains(&"anti_beany".to_string()));
        assert_eq!(first.culture.supplier, "KT Cultures");

        let sweetener = first.kg_of(FormulaComponent::Sweetener).unwrap();
        let stabilizer = first.kg_of(FormulaComponent::Stabilizer).unwrap();
        assert_eq!(first.kg_of(FormulaComponent::Protein), Some(10.0));
        assert_eq!(
            first.kg_of(FormulaComponent::Water),
            Some(round2(100.0 - 10.0 - sweetener - stabilizer))
        );

        assert_eq!(first.product.name_en, "Soy fermented yogurt (soft)");
        assert_eq!(first.product.name_zh, "大豆 发酵酸奶（soft）");
        assert_eq!(first.formula_100kg[1].item_en, "Soy protein");
        assert_eq!(first.targets.get("syneresis_pct_max"), Some(&json!(10)));
        assert_eq!(first.process.heat_treat, "85°C 10 min");
    }

    #[test]
    fn test_strains_cycle_through_shortlist() {
        let candidates = run(&soy(Texture::Soft, &["anti_beany"]), None);
        let ids: Vec<&str> = candidates.iter().map(|c| c.culture.strain_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S1", "S3"]);
        // dangling supplier reference shows the id
        assert_eq!(candidates[1].culture.supplier, "X");
    }

    #[test]
    fn test_unknown_base_and_empty_strains_fall_back() {
        let empty = Catalog::default();
        let req = UserRequest::new("hemp", Texture::Refreshing).with_lang("zh");
        let candidates = generate(&empty, &req, None, &GenerationSettings::default());
        assert_eq!(candidates.len(), 3);
        for c in &candidates {
            assert_eq!(c.culture.strain_id, "TBD-001");
            assert_eq!(c.culture.supplier, "KT");
            assert_eq!(c.kg_of(FormulaComponent::Protein), Some(10.0));
            assert_eq!(c.product.name_en, "hemp fermented yogurt (refreshing)");
            assert_eq!(c.description, "Clean label: 去豆腥、甜香风味、refreshing口感。");
            assert!(c.targets.is_empty());
        }
    }

    #[test]
    fn test_zero_shortlist_size_uses_best_ranked_strain() {
        let settings = GenerationSettings {
            shortlist_size: 0,
            ..GenerationSettings::default()
        };
        let candidates =
            generate(&catalog(), &soy(Texture::Soft, &["anti_beany"]), None, &settings);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.culture.strain_id == "S2"));
    }

    #[test]
    fn test_unknown_lang_renders_english_without_targets() {
        let req = soy(Texture::Soft, &[]).with_lang("fr");
        let candidates = run(&req, None);
        assert!(candidates[0].description.starts_with("Clean label: reduced beany"));
        assert!(candidates.iter().all(|c| c.targets.is_empty()));
    }

    #[test]
    fn test_negative_water_is_kept_with_warning() {
        let req = UserRequest::new("heavy", Texture::Thick);
        let candidates = run(&req, None);
        for c in &candidates {
            let water = c.kg_of(FormulaComponent::Water).unwrap();
            assert!(water < 0.0);
            assert_eq!(c.warnings.len(), 1);
            assert!((c.total_kg() - BATCH_KG).abs() < 0.01);
        }
    }

    #[test]
    fn test_level_floors() {
        assert_eq!(three_levels(0.22, SWEETENER_FLOOR)[0], SWEETENER_FLOOR);
        assert_eq!(three_levels(0.12, STABILIZER_FLOOR)[0], STABILIZER_FLOOR);
        assert_eq!(level_combinations(0.5, 0.3, 7).len(), 9);
        assert_eq!(level_combinations(0.5, 0.3, 7), level_combinations(0.5, 0.3, 7));
    }
}
