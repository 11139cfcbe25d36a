//! File-backed catalog store: a seed `data.json` overlaid with append-only
//! JSON-lines edits, plus the run and model logs kept beside it.

use crate::{
    catalog::{Base, Catalog, Ingredient, Keyed, RecordKind, RheoMethod, Strain, Supplier},
    error::{NutriWaveError, Result},
    journal::{JsonlLog, ModelRecord, RunRecord},
    table::DataTable,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const SEED_FILE_NAME: &str = "data.json";
pub const RUNS_FILE_NAME: &str = "runs.jsonl";
pub const MODELS_FILE_NAME: &str = "models.jsonl";

/// Merges overlay records into a seed list by identifier.
///
/// Overlay records replace the seed record with the same id in place; ids not
/// present in the seed are appended in order of first appearance. When the
/// overlay repeats an id, the last occurrence wins.
pub fn merge_by_id<T: Keyed>(seed: Vec<T>, overlay: Vec<T>) -> Vec<T> {
    let mut merged = seed;
    let mut position: HashMap<String, usize> = HashMap::new();
    for (idx, record) in merged.iter().enumerate() {
        position.entry(record.key().to_string()).or_insert(idx);
    }
    for record in overlay {
        match position.get(record.key()) {
            Some(&idx) => merged[idx] = record,
            None => {
                position.insert(record.key().to_string(), merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub kind: RecordKind,
    pub source: String,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    data_dir: PathBuf,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl CatalogStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn seed_path(&self) -> PathBuf {
        self.data_dir.join(SEED_FILE_NAME)
    }

    pub fn overlay_log(&self, kind: RecordKind) -> JsonlLog {
        JsonlLog::new(self.data_dir.join(kind.overlay_file_name()))
    }

    pub fn runs_log(&self) -> JsonlLog {
        JsonlLog::new(self.data_dir.join(RUNS_FILE_NAME))
    }

    pub fn models_log(&self) -> JsonlLog {
        JsonlLog::new(self.data_dir.join(MODELS_FILE_NAME))
    }

    /// Seed catalog merged with every overlay file. A missing seed file loads
    /// as an empty catalog.
    pub fn load(&self) -> Result<Catalog> {
        let seed_path = self.seed_path();
        let mut catalog = if seed_path.exists() {
            Catalog::from_json_file(&seed_path)?
        } else {
            tracing::warn!(path = %seed_path.display(), "seed catalog missing, starting empty");
            Catalog::default()
        };

        catalog.bases = merge_by_id(catalog.bases, self.overlay::<Base>(RecordKind::Base)?);
        catalog.strains =
            merge_by_id(catalog.strains, self.overlay::<Strain>(RecordKind::Strain)?);
        catalog.ingredients = merge_by_id(
            catalog.ingredients,
            self.overlay::<Ingredient>(RecordKind::Ingredient)?,
        );
        catalog.suppliers = merge_by_id(
            catalog.suppliers,
            self.overlay::<Supplier>(RecordKind::Supplier)?,
        );
        catalog.rheo_methods = merge_by_id(
            catalog.rheo_methods,
            self.overlay::<RheoMethod>(RecordKind::RheoMethod)?,
        );

        for warning in catalog.drop_records_without_id() {
            tracing::warn!("{warning}");
        }
        tracing::info!(
            data_dir = %self.data_dir.display(),
            bases = catalog.bases.len(),
            strains = catalog.strains.len(),
            ingredients = catalog.ingredients.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    fn overlay<T: DeserializeOwned>(&self, kind: RecordKind) -> Result<Vec<T>> {
        self.overlay_log(kind).read_as::<T>(usize::MAX)
    }

    /// Validates `record` as `kind` and appends it to that kind's overlay.
    pub fn append_record(&self, kind: RecordKind, record: Value) -> Result<Value> {
        match kind {
            RecordKind::Base => self.append_keyed(kind, &parse_record::<Base>(kind, record)?),
            RecordKind::Strain => self.append_keyed(kind, &parse_record::<Strain>(kind, record)?),
            RecordKind::Ingredient => {
                self.append_keyed(kind, &parse_record::<Ingredient>(kind, record)?)
            }
            RecordKind::Supplier => {
                self.append_keyed(kind, &parse_record::<Supplier>(kind, record)?)
            }
            RecordKind::RheoMethod => {
                self.append_keyed(kind, &parse_record::<RheoMethod>(kind, record)?)
            }
        }
    }

    pub fn append_keyed<T: Keyed + Serialize>(&self, kind: RecordKind, record: &T) -> Result<Value> {
        if record.key().trim().is_empty() {
            return Err(NutriWaveError::InvalidRecord(format!(
                "{} record needs a non-empty {}",
                kind.as_str(),
                kind.id_field()
            )));
        }
        let stored = self.overlay_log(kind).append(record)?;
        tracing::info!(kind = kind.as_str(), id = record.key(), "overlay record appended");
        Ok(stored)
    }

    /// Imports records from a CSV file or a JSON document (an array, or an
    /// object holding the array under the kind's list key). Rows without an
    /// identifier or that fail validation are skipped.
    pub fn import_records(&self, kind: RecordKind, path: &Path) -> Result<ImportReport> {
        let rows = read_import_rows(kind, path)?;
        let mut imported = 0;
        let mut skipped = 0;
        for row in rows {
            let has_id = row
                .get(kind.id_field())
                .map(|v| match v {
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Null => false,
                    _ => true,
                })
                .unwrap_or(false);
            if !has_id {
                skipped += 1;
                continue;
            }
            match self.append_record(kind, Value::Object(row)) {
                Ok(_) => imported += 1,
                Err(e) => {
                    tracing::warn!(kind = kind.as_str(), "skipping import row: {e}");
                    skipped += 1;
                }
            }
        }
        tracing::info!(kind = kind.as_str(), imported, skipped, "import finished");
        Ok(ImportReport {
            kind,
            source: path.display().to_string(),
            imported,
            skipped,
        })
    }

    pub fn log_run(&self, run: RunRecord) -> Result<RunRecord> {
        let run = run.normalized();
        let stored = self.runs_log().append(&run)?;
        Ok(serde_json::from_value(stored)?)
    }

    pub fn log_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let model = model.normalized();
        let stored = self.models_log().append(&model)?;
        Ok(serde_json::from_value(stored)?)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        self.runs_log().read_as(limit)
    }

    pub fn recent_models(&self, limit: usize) -> Result<Vec<ModelRecord>> {
        self.models_log().read_as(limit)
    }
}

fn parse_record<T: DeserializeOwned>(kind: RecordKind, record: Value) -> Result<T> {
    serde_json::from_value(record).map_err(|e| {
        NutriWaveError::InvalidRecord(format!("could not read {} record: {e}", kind.as_str()))
    })
}

fn read_import_rows(kind: RecordKind, path: &Path) -> Result<Vec<Map<String, Value>>> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        return Ok(DataTable::from_csv_path(path)?.records_as_json());
    }

    let text = fs::read_to_string(path).map_err(|e| NutriWaveError::io(path, e))?;
    let document: Value = serde_json::from_str(&text).map_err(|e| NutriWaveError::json(path, e))?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(kind.list_key()) {
            Some(Value::Array(items)) => items,
            _ => vec![],
        },
        _ => vec![],
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn strain(id: &str, name: &str) -> Strain {
        Strain {
            strain_id: id.to_string(),
            name_en: name.to_string(),
            ..Strain::placeholder()
        }
    }

    fn ids(strains: &[Strain]) -> Vec<&str> {
        strains.iter().map(|s| s.strain_id.as_str()).collect()
    }

    #[test]
    fn test_merge_overlay_replaces_in_place_and_appends_new() {
        let seed = vec![strain("A", "a"), strain("B", "b")];
        let overlay = vec![strain("B", "b-prime"), strain("C", "c")];
        let merged = merge_by_id(seed, overlay);
        assert_eq!(ids(&merged), vec!["A", "B", "C"]);
        assert_eq!(merged[1].name_en, "b-prime");
    }

    #[test]
    fn test_merge_overlay_duplicate_ids_last_wins() {
        let seed = vec![strain("A", "a")];
        let overlay = vec![
            strain("C", "c1"),
            strain("A", "a1"),
            strain("D", "d"),
            strain("C", "c2"),
            strain("A", "a2"),
        ];
        let merged = merge_by_id(seed, overlay);
        assert_eq!(ids(&merged), vec!["A", "C", "D"]);
        assert_eq!(merged[0].name_en, "a2");
        assert_eq!(merged[1].name_en, "c2");
    }

    fn write_seed(dir: &Path) {
        fs::write(
            dir.join(SEED_FILE_NAME),
            r#"{
  "bases": [{"id": "soy", "name_en": "Soy", "default_protein_pct": 10.0}],
  "strains": [{"strain_id": "A", "name_en": "a", "benefit_tags": ["eps"]},
              {"strain_id": "B", "name_en": "b", "benefit_tags": []}]
}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_applies_overlay_files() {
        let td = tempdir().unwrap();
        write_seed(td.path());
        let store = CatalogStore::new(td.path());
        store
            .append_record(
                RecordKind::Strain,
                json!({"strain_id": "B", "name_en": "b-prime", "benefit_tags": "anti_beany"}),
            )
            .unwrap();
        store
            .append_record(RecordKind::Strain, json!({"strain_id": "C", "name_en": "c"}))
            .unwrap();

        let catalog = store.load().unwrap();
        assert_eq!(ids(&catalog.strains), vec!["A", "B", "C"]);
        assert_eq!(catalog.strains[1].benefit_tags, vec!["anti_beany"]);
        assert_eq!(catalog.bases.len(), 1);
    }

    #[test]
    fn test_load_without_seed_is_empty() {
        let td = tempdir().unwrap();
        let catalog = CatalogStore::new(td.path()).load().unwrap();
        assert!(catalog.bases.is_empty());
        assert!(catalog.strains.is_empty());
    }

    #[test]
    fn test_append_rejects_blank_id() {
        let td = tempdir().unwrap();
        let store = CatalogStore::new(td.path());
        let err = store
            .append_record(RecordKind::Ingredient, json!({"name_en": "Pea protein"}))
            .unwrap_err();
        assert!(err.to_string().contains("ingredient_id"));
        assert!(!store.overlay_log(RecordKind::Ingredient).path().exists());
    }

    #[test]
    fn test_import_csv_skips_rows_without_id() {
        let td = tempdir().unwrap();
        write_seed(td.path());
        let csv_path = td.path().join("strains.csv");
        fs::write(
            &csv_path,
            "strain_id,name_en,benefit_tags,evidence_level\n\
             S10,Imported,\"anti_beany, sweet_notes\",client_validated\n\
             ,Nameless,eps,seed\n",
        )
        .unwrap();
        let store = CatalogStore::new(td.path());
        let report = store.import_records(RecordKind::Strain, &csv_path).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);

        let catalog = store.load().unwrap();
        let imported = catalog.strain("S10").unwrap();
        assert_eq!(imported.benefit_tags, vec!["anti_beany", "sweet_notes"]);
    }

    #[test]
    fn test_import_json_object_wrapper() {
        let td = tempdir().unwrap();
        let json_path = td.path().join("methods.json");
        fs::write(
            &json_path,
            r#"{"rheo_methods": [
                {"rheo_method_id": "RHEO-9", "geometry": "vane", "r1_mm": 12.5},
                {"geometry": "cup"}
            ]}"#,
        )
        .unwrap();
        let store = CatalogStore::new(td.path());
        let report = store
            .import_records(RecordKind::RheoMethod, &json_path)
            .unwrap();
        assert_eq!((report.imported, report.skipped), (1, 1));
        let catalog = store.load().unwrap();
        assert_eq!(catalog.rheo_methods[0].r1_mm, Some(12.5));
    }

    #[test]
    fn test_runs_and_models_logs() {
        let td = tempdir().unwrap();
        let store = CatalogStore::new(td.path());
        let run = store
            .log_run(RunRecord {
                strain_id: "A".to_string(),
                ..RunRecord::default()
            })
            .unwrap();
        assert!(run.run_id.starts_with("RUN-"));
        assert!(run.timestamp_utc.is_some());

        store
            .log_model(ModelRecord {
                model_id: String::new(),
                model_type: "GP (Bayesian)".to_string(),
                target_outputs: vec!["overall".to_string(), "syneresis".to_string()],
                feature_set_version: "v1".to_string(),
                metrics: "TBD".to_string(),
                deployed: true,
                notes: "TBD".to_string(),
                timestamp_utc: None,
            })
            .unwrap();

        assert_eq!(store.recent_runs(10).unwrap().len(), 1);
        let models = store.recent_models(10).unwrap();
        assert_eq!(models.len(), 1);
        assert!(models[0].model_id.starts_with("MODEL-"));
        assert!(models[0].deployed);
    }
}
