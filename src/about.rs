pub const NUTRIWAVE_DISPLAY_VERSION: &str = env!("NUTRIWAVE_DISPLAY_VERSION");
pub const NUTRIWAVE_BUILD_N: &str = env!("NUTRIWAVE_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "NutriWave {}\nBuild {}\nFermented-food formulation recommender",
        NUTRIWAVE_DISPLAY_VERSION, NUTRIWAVE_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text_names_build() {
        let text = version_cli_text();
        assert!(text.starts_with("NutriWave "));
        assert!(text.contains(&format!("Build {NUTRIWAVE_BUILD_N}")));
    }
}
