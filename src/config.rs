use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level sections a complete configuration is expected to carry.
pub const REQUIRED_SECTIONS: [&str; 3] = ["analysis", "prompt_customization", "feedback_format"];

const SEARCH_PATHS: [&str; 3] = ["config/config.yaml", ".quality-bot.yml", ".quality-bot.yaml"];

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub prompt_customization: PromptCustomization,
    pub feedback_format: FeedbackFormat,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub dry: DryConfig,
    pub solid: SolidConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct DryConfig {
    pub enabled: bool,
    pub weight: f64,
    pub focus_areas: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolidConfig {
    pub enabled: bool,
    pub weight: f64,
    pub principles: BTreeMap<String, PrincipleConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipleConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptCustomization {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: usize,
    pub context_depth: String,
    pub language_specificity: String,
    pub explanation_detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackFormat {
    pub message_template: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputConfig {
    pub feedback_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig {
                dry: DryConfig {
                    enabled: true,
                    weight: default_dry_weight(),
                    focus_areas: default_focus_areas(),
                },
                solid: SolidConfig {
                    enabled: true,
                    weight: default_solid_weight(),
                    principles: default_principles(),
                },
            },
            prompt_customization: PromptCustomization {
                model: default_model(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                context_depth: "medium".to_string(),
                language_specificity: default_language(),
                explanation_detail: "high".to_string(),
            },
            feedback_format: FeedbackFormat {
                message_template: default_message_template(),
            },
            output: OutputConfig {
                feedback_file: default_feedback_file(),
            },
        }
    }
}

impl Config {
    /// Builds a configuration from a merged tree. Every leaf that is missing
    /// or has the wrong type falls back to its built-in default.
    pub fn from_tree(tree: Value) -> Self {
        let defaults = Config::default();

        let dry = DryConfig {
            enabled: bool_at(&tree, &["analysis", "dry", "enabled"])
                .unwrap_or(defaults.analysis.dry.enabled),
            weight: f64_at(&tree, &["analysis", "dry", "weight"])
                .unwrap_or(defaults.analysis.dry.weight),
            focus_areas: match lookup(&tree, &["analysis", "dry", "focus_areas"]) {
                Some(Value::Mapping(map)) => map
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_f64()?)))
                    .collect(),
                _ => defaults.analysis.dry.focus_areas,
            },
        };

        let principles = match lookup(&tree, &["analysis", "solid", "principles"]) {
            Some(Value::Mapping(map)) => read_principles(map, &defaults.analysis.solid.principles),
            _ => defaults.analysis.solid.principles.clone(),
        };

        let solid = SolidConfig {
            enabled: bool_at(&tree, &["analysis", "solid", "enabled"])
                .unwrap_or(defaults.analysis.solid.enabled),
            weight: f64_at(&tree, &["analysis", "solid", "weight"])
                .unwrap_or(defaults.analysis.solid.weight),
            principles,
        };

        let prompt = &defaults.prompt_customization;
        let prompt_customization = PromptCustomization {
            model: str_at(&tree, &["prompt_customization", "model"])
                .unwrap_or_else(|| prompt.model.clone()),
            temperature: f64_at(&tree, &["prompt_customization", "temperature"])
                .unwrap_or(prompt.temperature),
            max_tokens: lookup(&tree, &["prompt_customization", "max_tokens"])
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(prompt.max_tokens),
            context_depth: str_at(&tree, &["prompt_customization", "context_depth"])
                .unwrap_or_else(|| prompt.context_depth.clone()),
            language_specificity: str_at(&tree, &["prompt_customization", "language_specificity"])
                .unwrap_or_else(|| prompt.language_specificity.clone()),
            explanation_detail: str_at(&tree, &["prompt_customization", "explanation_detail"])
                .unwrap_or_else(|| prompt.explanation_detail.clone()),
        };

        let feedback_format = FeedbackFormat {
            message_template: str_at(&tree, &["feedback_format", "message_template"])
                .unwrap_or(defaults.feedback_format.message_template),
        };

        let output = OutputConfig {
            feedback_file: str_at(&tree, &["output", "feedback_file"])
                .map(PathBuf::from)
                .unwrap_or(defaults.output.feedback_file),
        };

        Self {
            analysis: AnalysisConfig { dry, solid },
            prompt_customization,
            feedback_format,
            output,
        }
    }

    /// The built-in default tree, the base layer of every load.
    pub fn default_tree() -> Value {
        match serde_yaml::to_value(Config::default()) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to build default configuration tree: {}", e);
                Value::Mapping(Mapping::new())
            }
        }
    }
}

/// Loads the layered configuration: built-in defaults overlaid with an
/// optional user file. Loading never fails; a broken layer is replaced by
/// an empty tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    explicit_path: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Resolves the user file location. An explicit path is used as given,
    /// even if it does not exist.
    pub fn user_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }

        for candidate in SEARCH_PATHS {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".quality-bot.yml"))
            .filter(|path| path.exists())
    }

    pub fn load(&self) -> Config {
        let mut tree = Config::default_tree();
        match self.user_path() {
            Some(path) => {
                let user = read_tree(&path);
                deep_merge(&mut tree, user);
            }
            None => debug!("No user configuration found, using built-in defaults"),
        }
        Config::from_tree(tree)
    }

    /// Checks the user file alone. Sections it leaves out come from the
    /// built-in defaults.
    pub fn validate_user(&self) -> bool {
        match self.user_path() {
            Some(path) => validate(&read_tree(&path)),
            None => true,
        }
    }
}

/// Reads one YAML layer. Any failure yields an empty tree.
pub fn read_tree(path: &Path) -> Value {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Configuration file {} could not be read ({}), using defaults",
                path.display(),
                e
            );
            return Value::Mapping(Mapping::new());
        }
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(map)) => Value::Mapping(map),
        Ok(Value::Null) => Value::Mapping(Mapping::new()),
        Ok(_) => {
            warn!(
                "Configuration file {} is not a mapping, using defaults",
                path.display()
            );
            Value::Mapping(Mapping::new())
        }
        Err(e) => {
            warn!(
                "Error loading YAML configuration from {}: {}",
                path.display(),
                e
            );
            Value::Mapping(Mapping::new())
        }
    }
}

/// Merges `overlay` into `base`. Mappings merge key by key, recursively;
/// any other overlay value replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Advisory check for the top-level sections. Logs each missing one.
pub fn validate(tree: &Value) -> bool {
    let mut valid = true;
    for section in REQUIRED_SECTIONS {
        if tree.get(section).is_none() {
            warn!("Missing required configuration section: {}", section);
            valid = false;
        }
    }
    valid
}

fn read_principles(
    map: &Mapping,
    defaults: &BTreeMap<String, PrincipleConfig>,
) -> BTreeMap<String, PrincipleConfig> {
    let mut principles = BTreeMap::new();
    for (key, value) in map {
        let Some(name) = key.as_str() else {
            continue;
        };
        let fallback = defaults.get(name);
        let principle = PrincipleConfig {
            enabled: value
                .get("enabled")
                .and_then(Value::as_bool)
                .or_else(|| fallback.map(|p| p.enabled))
                .unwrap_or(false),
            weight: value
                .get("weight")
                .and_then(Value::as_f64)
                .or_else(|| fallback.and_then(|p| p.weight)),
        };
        principles.insert(name.to_string(), principle);
    }
    principles
}

fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, key| node.get(*key))
}

fn f64_at(tree: &Value, path: &[&str]) -> Option<f64> {
    lookup(tree, path).and_then(Value::as_f64)
}

fn bool_at(tree: &Value, path: &[&str]) -> Option<bool> {
    lookup(tree, path).and_then(Value::as_bool)
}

fn str_at(tree: &Value, path: &[&str]) -> Option<String> {
    lookup(tree, path).and_then(Value::as_str).map(str::to_string)
}

fn default_dry_weight() -> f64 {
    0.6
}

fn default_solid_weight() -> f64 {
    0.4
}

fn default_focus_areas() -> BTreeMap<String, f64> {
    [
        ("logic_reuse", 0.4),
        ("data_centralization", 0.3),
        ("abstraction_level", 0.3),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

fn default_principles() -> BTreeMap<String, PrincipleConfig> {
    [
        ("srp", true, Some(0.3)),
        ("ocp", true, Some(0.2)),
        ("lsp", false, None),
        ("isp", false, None),
        ("dip", true, Some(0.5)),
    ]
    .into_iter()
    .map(|(name, enabled, weight)| (name.to_string(), PrincipleConfig { enabled, weight }))
    .collect()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> usize {
    500
}

fn default_language() -> String {
    "python".to_string()
}

fn default_message_template() -> String {
    "## Analysis for {file}\n\n### DRY Score: {dry_score}/10\n{dry_analysis}\n\n### SOLID Score: {solid_score}/10\n{solid_analysis}\n\n".to_string()
}

fn default_feedback_file() -> PathBuf {
    PathBuf::from("analysis_feedback.md")
}
