use crate::catalog::{Catalog, Strain};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHORTLIST_SIZE: usize = 3;
const POINTS_PER_MATCHED_GOAL: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrain {
    pub strain: Strain,
    pub score: u32,
    pub matched_goals: Vec<String>,
}

/// Two points for every goal found in the strain's tag set.
pub fn score_strain(strain: &Strain, goals: &[String]) -> u32 {
    let tags = strain.tags();
    let matched = goals.iter().filter(|g| tags.contains(g)).count() as u32;
    matched * POINTS_PER_MATCHED_GOAL
}

/// Every strain with its score, best first. Equal scores keep catalog order.
pub fn rank(catalog: &Catalog, goals: &[String]) -> Vec<RankedStrain> {
    let mut ranked: Vec<RankedStrain> = catalog
        .strains
        .iter()
        .map(|strain| {
            let tags = strain.tags();
            RankedStrain {
                strain: strain.clone(),
                score: score_strain(strain, goals),
                matched_goals: goals.iter().filter(|g| tags.contains(g)).cloned().collect(),
            }
        })
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// The top `k` ranked strains, never fewer than one while the catalog has
/// strains: `k = 0` still yields the best match.
pub fn shortlist_ranked(catalog: &Catalog, goals: &[String], k: usize) -> Vec<RankedStrain> {
    rank(catalog, goals).into_iter().take(k.max(1)).collect()
}

/// The top `k` strains for `goals`, clipped as in [`shortlist_ranked`].
/// Empty only when the catalog has no strains; callers substitute
/// [`Strain::placeholder`].
pub fn shortlist(catalog: &Catalog, goals: &[String], k: usize) -> Vec<Strain> {
    let shortlisted: Vec<Strain> = shortlist_ranked(catalog, goals, k)
        .into_iter()
        .map(|r| r.strain)
        .collect();
    tracing::debug!(
        goals = ?goals,
        shortlisted = ?shortlisted.iter().map(|s| s.strain_id.as_str()).collect::<Vec<_>>(),
        "strain shortlist"
    );
    shortlisted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strain(id: &str, tags: &[&str]) -> Strain {
        Strain {
            strain_id: id.to_string(),
            benefit_tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Strain::placeholder()
        }
    }

    fn catalog(strains: Vec<Strain>) -> Catalog {
        Catalog {
            strains,
            ..Catalog::default()
        }
    }

    fn goals(items: &[&str]) -> Vec<String> {
        items.iter().map(|g| g.to_string()).collect()
    }

    fn ids(strains: &[Strain]) -> Vec<&str> {
        strains.iter().map(|s| s.strain_id.as_str()).collect()
    }

    #[test]
    fn test_score_counts_two_points_per_goal() {
        let s = strain("S", &["anti_beany", "eps"]);
        assert_eq!(score_strain(&s, &goals(&["anti_beany", "eps", "sweet_notes"])), 4);
        assert_eq!(score_strain(&s, &[]), 0);
    }

    #[test]
    fn test_compatibility_tags_count_toward_score() {
        let mut s = strain("S", &["eps"]);
        s.compatibility_tags = vec!["sweet_notes".to_string()];
        assert_eq!(score_strain(&s, &goals(&["sweet_notes"])), 2);
    }

    #[test]
    fn test_shortlist_sorted_and_stable() {
        let cat = catalog(vec![
            strain("A", &["eps"]),
            strain("B", &["anti_beany"]),
            strain("C", &["eps"]),
            strain("D", &["anti_beany", "eps"]),
            strain("E", &[]),
        ]);
        let picked = shortlist(&cat, &goals(&["anti_beany", "eps"]), 3);
        assert_eq!(ids(&picked), vec!["D", "A", "B"]);

        let ranked = rank(&cat, &goals(&["anti_beany", "eps"]));
        let scores: Vec<u32> = ranked.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![4, 2, 2, 2, 0]);
        assert_eq!(ranked[0].matched_goals, goals(&["anti_beany", "eps"]));
    }

    #[test]
    fn test_no_goals_keeps_catalog_order() {
        let cat = catalog(vec![
            strain("A", &["eps"]),
            strain("B", &[]),
            strain("C", &["anti_beany"]),
            strain("D", &[]),
        ]);
        assert_eq!(ids(&shortlist(&cat, &[], 3)), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_k_is_clipped_to_available() {
        let cat = catalog(vec![strain("A", &[]), strain("B", &[])]);
        assert_eq!(shortlist(&cat, &goals(&["eps"]), 5).len(), 2);
        assert!(shortlist(&Catalog::default(), &goals(&["eps"]), 3).is_empty());
        assert!(shortlist(&Catalog::default(), &goals(&["eps"]), 0).is_empty());
    }

    #[test]
    fn test_zero_k_keeps_best_match() {
        let cat = catalog(vec![strain("S1", &[]), strain("S2", &["anti_beany"])]);
        let picked = shortlist(&cat, &goals(&["anti_beany"]), 0);
        assert_eq!(ids(&picked), vec!["S2"]);
        let ranked = shortlist_ranked(&cat, &goals(&["anti_beany"]), 0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 2);
    }
}
