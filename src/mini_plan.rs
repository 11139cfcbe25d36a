use nutriwave_protocol::{Lang, MiniPlan};

const STEPS_ZH: [&str; 4] = [
    "固定终止 pH（例如 4.6）",
    "记录 pH–时间曲线",
    "每个候选 n=2 重复",
    "测：分水率、G'、τy、滞回",
];
const STEPS_EN: [&str; 4] = [
    "Hold endpoint pH constant (e.g., 4.6)",
    "Record pH–time",
    "n=2 replicates per candidate",
    "Measure syneresis, G', τy, hysteresis",
];
const PASS_ZH: [&str; 2] = [
    "示例通过标准：分水率 < 10%（柔和口感目标）",
    "感官评价确认顺滑度/稳定性改善",
];
const PASS_EN: [&str; 2] = [
    "Example pass: syneresis < 10% (soft target)",
    "Sensory check flags improved smoothness/stability",
];

/// Small-scale test checklist for the generated candidates.
pub fn build_plan(lang: Lang) -> MiniPlan {
    let (heading, steps, pass): (&str, &[&str], &[&str]) = match lang {
        Lang::Zh => ("小试方法", &STEPS_ZH, &PASS_ZH),
        Lang::En => ("mini_test_plan", &STEPS_EN, &PASS_EN),
    };
    MiniPlan {
        lang,
        heading: heading.to_string(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        pass_criteria: pass.iter().map(|s| s.to_string()).collect(),
    }
}
