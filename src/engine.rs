use crate::{
    brief,
    catalog::{Catalog, CatalogSummary, RecordKind},
    config::NutriWaveConfig,
    error::NutriWaveError,
    formulation::{self, GenerationSettings},
    journal::{utc_timestamp, ModelRecord, RunRecord},
    mini_plan,
    profile::{self, ProfileColumns},
    ranker,
    request::{self, UserRequest, DEFAULT_LANG_CODE, DEFAULT_PRODUCT_TYPE},
    store::CatalogStore,
    table::DataTable,
};
use nutriwave_protocol::{
    CustomerProfile, GenerationPack, Lang, Texture, GENERATION_PACK_SCHEMA,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{error::Error, fmt, path::Path};

pub type OpId = String;
pub type RunId = String;

/// Runs listed when no limit is given; reads are still capped by
/// `runs_read_limit`.
pub const DEFAULT_RUNS_LIST_LIMIT: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileInput {
    /// Survey table on disk with the columns to average.
    Table {
        path: String,
        #[serde(default)]
        columns: ProfileColumns,
    },
    /// Scores already aggregated elsewhere.
    Scores(CustomerProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Generate {
        /// First catalog base when absent.
        #[serde(default)]
        base_id: Option<String>,
        #[serde(default)]
        texture: Texture,
        /// Language code; `zh` renders Chinese, anything else English.
        #[serde(default = "default_lang_code")]
        lang: String,
        #[serde(default)]
        product_type: Option<String>,
        #[serde(default)]
        brief: Option<String>,
        /// Explicit goals, followed by goals inferred from `brief`.
        #[serde(default)]
        goals: Vec<String>,
        #[serde(default)]
        profile: Option<ProfileInput>,
        #[serde(default)]
        candidates: Option<usize>,
    },
    ShortlistStrains {
        #[serde(default)]
        goals: Vec<String>,
        #[serde(default)]
        k: Option<usize>,
    },
    BuildMiniPlan {
        #[serde(default)]
        lang: Lang,
    },
    ExtractProfile {
        path: String,
        #[serde(default)]
        columns: ProfileColumns,
    },
    AddStrain {
        record: Value,
    },
    AddIngredient {
        record: Value,
    },
    AddRheoMethod {
        record: Value,
    },
    AddBase {
        record: Value,
    },
    AddSupplier {
        record: Value,
    },
    ImportRecords {
        kind: RecordKind,
        path: String,
    },
    LogRun {
        run: RunRecord,
    },
    LogModel {
        model: ModelRecord,
    },
    ListRuns {
        #[serde(default)]
        limit: Option<usize>,
    },
    ListModels {
        #[serde(default)]
        limit: Option<usize>,
    },
    Reload,
}

fn default_lang_code() -> String {
    DEFAULT_LANG_CODE.to_string()
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "Generate",
            Self::ShortlistStrains { .. } => "ShortlistStrains",
            Self::BuildMiniPlan { .. } => "BuildMiniPlan",
            Self::ExtractProfile { .. } => "ExtractProfile",
            Self::AddStrain { .. } => "AddStrain",
            Self::AddIngredient { .. } => "AddIngredient",
            Self::AddRheoMethod { .. } => "AddRheoMethod",
            Self::AddBase { .. } => "AddBase",
            Self::AddSupplier { .. } => "AddSupplier",
            Self::ImportRecords { .. } => "ImportRecords",
            Self::LogRun { .. } => "LogRun",
            Self::LogModel { .. } => "LogModel",
            Self::ListRuns { .. } => "ListRuns",
            Self::ListModels { .. } => "ListModels",
            Self::Reload => "Reload",
        }
    }

    pub fn add_record(kind: RecordKind, record: Value) -> Self {
        match kind {
            RecordKind::Base => Self::AddBase { record },
            RecordKind::Strain => Self::AddStrain { record },
            RecordKind::Ingredient => Self::AddIngredient { record },
            RecordKind::Supplier => Self::AddSupplier { record },
            RecordKind::RheoMethod => Self::AddRheoMethod { record },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub run_id: RunId,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResult {
    pub op_id: OpId,
    pub output: Value,
    pub warnings: Vec<String>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub run_id: RunId,
    pub op: Operation,
    pub result: OpResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    EmptyCatalog,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for EngineError {}

impl From<NutriWaveError> for EngineError {
    fn from(e: NutriWaveError) -> Self {
        let code = match &e {
            NutriWaveError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorCode::NotFound
            }
            NutriWaveError::Io { .. } => ErrorCode::Io,
            NutriWaveError::Json { .. }
            | NutriWaveError::Csv(_)
            | NutriWaveError::InvalidRecord(_)
            | NutriWaveError::UnknownKind(_) => ErrorCode::InvalidInput,
            NutriWaveError::EmptyCatalog(_) => ErrorCode::EmptyCatalog,
            NutriWaveError::Serialize(_) => ErrorCode::Internal,
        };
        Self::new(code, e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub pack_schema: String,
    pub supported_operations: Vec<String>,
    pub record_kinds: Vec<String>,
    pub textures: Vec<String>,
    pub deterministic_generation: bool,
}

pub trait Engine {
    fn apply(&mut self, op: Operation) -> Result<OpResult, EngineError>;
    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>, EngineError>;
    fn catalog(&self) -> &Catalog;
}

/// Catalog-backed engine. The catalog is loaded once and reloaded after every
/// operation that writes an overlay record.
#[derive(Debug, Clone)]
pub struct NutriWaveEngine {
    store: CatalogStore,
    config: NutriWaveConfig,
    catalog: Catalog,
    journal: Vec<OperationRecord>,
    op_counter: u64,
}

impl NutriWaveEngine {
    pub fn open(config: NutriWaveConfig) -> Result<Self, EngineError> {
        let store = CatalogStore::new(&config.data_dir);
        let catalog = store.load()?;
        Ok(Self {
            store,
            config,
            catalog,
            journal: vec![],
            op_counter: 0,
        })
    }

    pub fn config(&self) -> &NutriWaveConfig {
        &self.config
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn summary(&self) -> CatalogSummary {
        self.catalog.summary()
    }

    pub fn capabilities() -> Capabilities {
        Capabilities {
            protocol_version: "v1".to_string(),
            pack_schema: GENERATION_PACK_SCHEMA.to_string(),
            supported_operations: [
                "Generate",
                "ShortlistStrains",
                "BuildMiniPlan",
                "ExtractProfile",
                "AddStrain",
                "AddIngredient",
                "AddRheoMethod",
                "AddBase",
                "AddSupplier",
                "ImportRecords",
                "LogRun",
                "LogModel",
                "ListRuns",
                "ListModels",
                "Reload",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            record_kinds: RecordKind::all()
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
            textures: Texture::all()
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            deterministic_generation: true,
        }
    }

    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.journal
    }

    fn next_op_id(&mut self) -> OpId {
        self.op_counter += 1;
        format!("op-{}", self.op_counter)
    }

    pub fn reload(&mut self) -> Result<(), EngineError> {
        self.catalog = self.store.load()?;
        Ok(())
    }

    fn load_profile(
        &self,
        input: &ProfileInput,
        warnings: &mut Vec<String>,
    ) -> Result<CustomerProfile, EngineError> {
        match input {
            ProfileInput::Scores(profile) => Ok(profile.clone()),
            ProfileInput::Table { path, columns } => {
                let table = DataTable::from_csv_path(Path::new(path))?;
                for missing in profile::missing_columns(&table, columns) {
                    warnings.push(format!("Column '{missing}' not found in {path}"));
                }
                Ok(profile::extract(&table, columns))
            }
        }
    }

    /// The request for one generation: the first catalog base when
    /// `base_id` is blank, explicit goals followed by goals inferred from
    /// `brief_text`. Fails only when the catalog has no bases at all.
    pub fn request_for(
        &self,
        base_id: Option<&str>,
        texture: Texture,
        brief_text: Option<&str>,
        goals: &[String],
    ) -> Result<UserRequest, EngineError> {
        let first_base = self
            .catalog
            .bases
            .first()
            .ok_or(NutriWaveError::EmptyCatalog("bases"))?;
        let base_id = base_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(first_base.id.as_str());
        let inferred = brief_text
            .map(|text| brief::infer_goals(text, texture))
            .unwrap_or_default();
        Ok(UserRequest::new(base_id, texture)
            .with_goals(goals.iter().cloned().chain(inferred))
            .with_constraints(self.catalog.default_constraints()))
    }

    /// Candidates plus mini-plan for a built request.
    pub fn generate_pack(
        &self,
        request: &UserRequest,
        brief_text: Option<&str>,
        profile: Option<CustomerProfile>,
        settings: &GenerationSettings,
    ) -> GenerationPack {
        let produced = formulation::generate(&self.catalog, request, profile.as_ref(), settings);
        let base_name = self
            .catalog
            .base(request.base_id())
            .map(|b| b.display_name(request.lang()).to_string())
            .unwrap_or_else(|| request.base_id().to_string());

        GenerationPack {
            schema: GENERATION_PACK_SCHEMA.to_string(),
            generated_at: utc_timestamp(),
            brief: brief_text.map(str::to_string),
            request: request.echo(&base_name),
            customer_profile: profile,
            candidates: produced,
            mini_doe: mini_plan::build_plan(request.lang()),
        }
    }

    fn add(&mut self, kind: RecordKind, record: Value, result: &mut OpResult) -> Result<(), EngineError> {
        let stored = self.store.append_record(kind, record)?;
        let id = stored
            .get(kind.id_field())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.reload()?;
        result
            .messages
            .push(format!("Added {} '{}'", kind.as_str(), id));
        result.output = stored;
        Ok(())
    }

    fn to_output<T: Serialize>(value: &T) -> Result<Value, EngineError> {
        serde_json::to_value(value).map_err(|e| EngineError::from(NutriWaveError::from(e)))
    }

    fn apply_internal(&mut self, op: Operation) -> Result<OpResult, EngineError> {
        let mut result = OpResult {
            op_id: self.next_op_id(),
            output: Value::Null,
            warnings: vec![],
            messages: vec![],
        };
        tracing::debug!(op_id = %result.op_id, op = op.name(), "applying operation");

        match op {
            Operation::Generate {
                base_id,
                texture,
                lang,
                product_type,
                brief,
                goals,
                profile,
                candidates,
            } => {
                let profile = match &profile {
                    Some(input) => Some(self.load_profile(input, &mut result.warnings)?),
                    None => None,
                };
                if let Some(id) = base_id.as_deref().map(str::trim)
                    && !id.is_empty()
                    && self.catalog.base(id).is_none()
                {
                    result
                        .warnings
                        .push(format!("Unknown base '{id}', using default protein level"));
                }
                let request = self
                    .request_for(base_id.as_deref(), texture, brief.as_deref(), &goals)?
                    .with_lang(&lang)
                    .with_product_type(product_type.as_deref().unwrap_or(DEFAULT_PRODUCT_TYPE));
                let mut settings = self.config.generation_settings();
                if let Some(n) = candidates {
                    settings.candidates = n;
                }
                let pack = self.generate_pack(&request, brief.as_deref(), profile, &settings);
                for (i, candidate) in pack.candidates.iter().enumerate() {
                    for warning in &candidate.warnings {
                        result.warnings.push(format!("Candidate {}: {warning}", i + 1));
                    }
                }
                if self.catalog.strains.is_empty() {
                    result
                        .warnings
                        .push("No strains in catalog, placeholder strain used".to_string());
                }
                result.messages.push(format!(
                    "Generated {} candidate(s) for base '{}' ({})",
                    pack.candidates.len(),
                    pack.request.base_id,
                    texture.as_str()
                ));
                result.output = Self::to_output(&pack)?;
            }
            Operation::ShortlistStrains { goals, k } => {
                let k = k.unwrap_or(self.config.shortlist_size);
                let goals = request::normalize_goals(goals);
                let ranked = ranker::shortlist_ranked(&self.catalog, &goals, k);
                if self.catalog.strains.is_empty() {
                    result.warnings.push("Catalog has no strains".to_string());
                }
                result.messages.push(format!("Shortlisted {} strain(s)", ranked.len()));
                result.output = Self::to_output(&ranked)?;
            }
            Operation::BuildMiniPlan { lang } => {
                result.output = Self::to_output(&mini_plan::build_plan(lang))?;
            }
            Operation::ExtractProfile { path, columns } => {
                let input = ProfileInput::Table { path, columns };
                let profile = self.load_profile(&input, &mut result.warnings)?;
                result
                    .messages
                    .push(format!("Profile built from {} row(s)", profile.rows));
                result.output = Self::to_output(&profile)?;
            }
            Operation::AddStrain { record } => {
                self.add(RecordKind::Strain, record, &mut result)?
            }
            Operation::AddIngredient { record } => {
                self.add(RecordKind::Ingredient, record, &mut result)?
            }
            Operation::AddRheoMethod { record } => {
                self.add(RecordKind::RheoMethod, record, &mut result)?
            }
            Operation::AddBase { record } => self.add(RecordKind::Base, record, &mut result)?,
            Operation::AddSupplier { record } => {
                self.add(RecordKind::Supplier, record, &mut result)?
            }
            Operation::ImportRecords { kind, path } => {
                let report = self.store.import_records(kind, Path::new(&path))?;
                self.reload()?;
                if report.skipped > 0 {
                    result.warnings.push(format!(
                        "Skipped {} row(s) without a valid {}",
                        report.skipped,
                        kind.id_field()
                    ));
                }
                result.messages.push(format!(
                    "Imported {} {} record(s) from {}",
                    report.imported,
                    kind.as_str(),
                    report.source
                ));
                result.output = Self::to_output(&report)?;
            }
            Operation::LogRun { run } => {
                let run = self.store.log_run(run)?;
                result.messages.push(format!("Logged run '{}'", run.run_id));
                result.output = Self::to_output(&run)?;
            }
            Operation::LogModel { model } => {
                let model = self.store.log_model(model)?;
                result
                    .messages
                    .push(format!("Registered model '{}'", model.model_id));
                result.output = Self::to_output(&model)?;
            }
            Operation::ListRuns { limit } => {
                let limit = limit
                    .unwrap_or(DEFAULT_RUNS_LIST_LIMIT)
                    .min(self.config.runs_read_limit);
                let runs = self.store.recent_runs(limit)?;
                result.messages.push(format!("{} run(s)", runs.len()));
                result.output = Self::to_output(&runs)?;
            }
            Operation::ListModels { limit } => {
                let limit = limit
                    .unwrap_or(self.config.models_read_limit)
                    .min(self.config.models_read_limit);
                let models = self.store.recent_models(limit)?;
                result.messages.push(format!("{} model(s)", models.len()));
                result.output = Self::to_output(&models)?;
            }
            Operation::Reload => {
                self.reload()?;
                result.output = Self::to_output(&self.catalog.summary())?;
                result.messages.push("Catalog reloaded".to_string());
            }
        }

        if !result.warnings.is_empty() {
            tracing::warn!(op_id = %result.op_id, warnings = ?result.warnings, "operation finished with warnings");
        }
        Ok(result)
    }
}

impl Engine for NutriWaveEngine {
    fn apply(&mut self, op: Operation) -> Result<OpResult, EngineError> {
        let run_id = "interactive".to_string();
        let result = self.apply_internal(op.clone())?;
        self.journal.push(OperationRecord {
            run_id,
            op,
            result: result.clone(),
        });
        Ok(result)
    }

    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>, EngineError> {
        let mut results = Vec::new();
        for op in &wf.ops {
            let result = self.apply_internal(op.clone())?;
            self.journal.push(OperationRecord {
                run_id: wf.run_id.clone(),
                op: op.clone(),
                result: result.clone(),
            });
            results.push(result);
        }
        Ok(results)
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
