//! Flow definitions
//!
//! A flow is a named, ordered list of steps for one target form. Step order
//! is significant and fixed; a definition is immutable once loaded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::FlowDefinitionError;
use crate::payload::{is_truthy, value_as_text};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub id: String,
    pub name: String,
    #[serde(alias = "target_url")]
    pub target_url: String,
    pub steps: Vec<Step>,
}

impl FlowDefinition {
    /// Parse a YAML (or JSON, which is valid YAML) definition, suffix
    /// duplicate step ids, then validate.
    pub fn from_yaml_str(source: &str) -> Result<Self, FlowDefinitionError> {
        let mut flow: FlowDefinition = serde_yaml::from_str(source)?;
        flow.disambiguate_step_ids();
        flow.validate()?;
        Ok(flow)
    }

    pub fn from_json_str(source: &str) -> Result<Self, FlowDefinitionError> {
        let mut flow: FlowDefinition = serde_json::from_str(source)?;
        flow.disambiguate_step_ids();
        flow.validate()?;
        Ok(flow)
    }

    /// Keep repeated step ids as separate sequential steps: the second
    /// occurrence becomes `<id>_2`, the third `<id>_3`, and so on.
    /// Returns the renamed ids.
    pub fn disambiguate_step_ids(&mut self) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut renamed = Vec::new();
        let original: Vec<String> = self.steps.iter().map(|s| s.id.clone()).collect();
        for step in &mut self.steps {
            let count = seen.entry(step.id.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                let mut suffix = *count;
                let mut candidate = format!("{}_{}", step.id, suffix);
                while original.contains(&candidate) {
                    suffix += 1;
                    candidate = format!("{}_{}", step.id, suffix);
                }
                warn!(
                    flow_id = %self.id,
                    step_id = %step.id,
                    renamed = %candidate,
                    "duplicate step id kept as a separate step"
                );
                step.id = candidate.clone();
                renamed.push(candidate);
            }
        }
        renamed
    }

    pub fn validate(&self) -> Result<(), FlowDefinitionError> {
        if self.id.trim().is_empty() {
            return Err(FlowDefinitionError::EmptyFlowId);
        }
        if self.steps.is_empty() {
            return Err(FlowDefinitionError::NoSteps(self.id.clone()));
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(FlowDefinitionError::EmptyStepId(index));
            }
            if positions.insert(step.id.as_str(), index).is_some() {
                return Err(FlowDefinitionError::DuplicateStepId(step.id.clone()));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            let Some(conditional) = &step.conditional else {
                continue;
            };
            match positions.get(conditional.prerequisite.as_str()) {
                None => {
                    return Err(FlowDefinitionError::UnknownPrerequisite {
                        step: step.id.clone(),
                        prerequisite: conditional.prerequisite.clone(),
                    })
                }
                Some(&position) if position >= index => {
                    return Err(FlowDefinitionError::ForwardPrerequisite {
                        step: step.id.clone(),
                        prerequisite: conditional.prerequisite.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// One unit of interaction within a flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub locator: LocatorSpec,
    /// Pointer into the payload; `None` for steps that read the whole payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    /// Advisory only; logged, never enforced.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalSpec>,
    #[serde(default)]
    pub options: StepOptions,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            locator: LocatorSpec::default(),
            data_key: None,
            required: false,
            conditional: None,
            options: StepOptions::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.locator.label = Some(label.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.locator.selector = Some(selector.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.locator.section = Some(section.into());
        self
    }

    pub fn with_data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    pub fn with_conditional(mut self, conditional: ConditionalSpec) -> Self {
        self.conditional = Some(conditional);
        self
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }
}

/// Step executor kinds. Unrecognised strings are kept so the orchestrator
/// can report them as `unknown_type` instead of rejecting the definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Checkbox,
    Radio,
    TextInput,
    Button,
    Select,
    CheckboxMulti,
    DiseaseList,
    MultiSelect,
    AccidentConsent,
    HealthFundSignature,
    FinalDeclarations,
    OtherDocuments,
    SecondSignature,
    Unknown(String),
}

impl StepKind {
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Checkbox => "checkbox",
            StepKind::Radio => "radio",
            StepKind::TextInput => "text_input",
            StepKind::Button => "button",
            StepKind::Select => "select",
            StepKind::CheckboxMulti => "checkbox_multi",
            StepKind::DiseaseList => "disease_list",
            StepKind::MultiSelect => "multi_select",
            StepKind::AccidentConsent => "accident_consent",
            StepKind::HealthFundSignature => "health_fund_signature",
            StepKind::FinalDeclarations => "final_declarations",
            StepKind::OtherDocuments => "other_documents",
            StepKind::SecondSignature => "second_signature",
            StepKind::Unknown(name) => name.as_str(),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StepKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "checkbox" => StepKind::Checkbox,
            "radio" => StepKind::Radio,
            "text_input" | "text" | "input" => StepKind::TextInput,
            "button" => StepKind::Button,
            "select" | "dropdown" => StepKind::Select,
            "checkbox_multi" => StepKind::CheckboxMulti,
            "disease_list" => StepKind::DiseaseList,
            "multi_select" => StepKind::MultiSelect,
            "accident_consent" => StepKind::AccidentConsent,
            "health_fund_signature" => StepKind::HealthFundSignature,
            "final_declarations" => StepKind::FinalDeclarations,
            "other_documents" => StepKind::OtherDocuments,
            "second_signature" => StepKind::SecondSignature,
            _ => StepKind::Unknown(value),
        }
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.as_str().to_string()
    }
}

/// How a step finds its element: a stable attribute selector (preferred)
/// and/or visible label text, optionally scoped to a named section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Visible title of the section container that disambiguates
    /// duplicate option sets on the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl LocatorSpec {
    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn by_selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.selector.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Text,
    Date,
    Number,
    Textarea,
}

/// Type-specific options. Every field is optional in the definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepOptions {
    /// Whitelist for radio values; options outside it are disabled on the page.
    pub allowed_values: Option<Vec<String>>,
    /// Type one character at a time instead of assigning the value.
    pub simulate_typing: bool,
    pub typing_delay_ms: Option<u64>,
    pub input_kind: InputKind,
    /// Stable attribute that marks repeated file-upload widgets.
    pub upload_attr: Option<String>,
    /// Budget for a dropdown's option list to render.
    pub dropdown_wait_ms: Option<u64>,
    /// The select control is a searchable input rather than a native select.
    pub searchable: bool,
    /// Pick the first rendered option when nothing matches.
    pub fallback_first_option: bool,
    pub dependent: Option<DependentDropdown>,
    pub retry: Option<RetrySpec>,
    /// Sub-fields filled inside each repeated record section.
    pub record_fields: Vec<RecordField>,
    /// Payload key inside a record naming its category (repeating groups).
    pub category_key: Option<String>,
    /// Payload key inside a record holding its file URLs (repeating groups).
    pub files_key: Option<String>,
}

/// A child dropdown whose options only populate after this one is chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentDropdown {
    /// Short name used in the failure reason (`<name>_dropdown_not_populated`).
    pub name: String,
    pub selector: String,
    /// Attribute on the child control that reflects its populated state.
    pub state_attr: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySpec {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFieldKind {
    Text,
    Date,
    Radio,
    Checkbox,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordField {
    pub key: String,
    pub kind: RecordFieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Gate on a prior step: its recorded outcome plus a rule over its payload value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalSpec {
    pub prerequisite: String,
    #[serde(flatten)]
    pub rule: ConditionRule,
}

impl ConditionalSpec {
    pub fn equals(prerequisite: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            prerequisite: prerequisite.into(),
            rule: ConditionRule::Value(value.into()),
        }
    }

    pub fn predicate(prerequisite: impl Into<String>, predicate: PayloadPredicate) -> Self {
        Self {
            prerequisite: prerequisite.into(),
            rule: ConditionRule::Predicate(predicate),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionRule {
    /// Compare the prerequisite's value in string form.
    Value(Value),
    Predicate(PayloadPredicate),
}

impl ConditionRule {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            ConditionRule::Value(expected) => {
                let expected = value_as_text(expected);
                value.and_then(value_as_text) == expected
            }
            ConditionRule::Predicate(predicate) => predicate.matches(value),
        }
    }
}

/// Predicates over the prerequisite step's payload value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PayloadPredicate {
    Equals { value: Value },
    NotEquals { value: Value },
    OneOf { values: Vec<Value> },
    Truthy,
    Falsy,
    NonEmpty,
    /// Arbitrary closure supplied by a programmatic caller.
    #[serde(skip)]
    Custom(CustomPredicate),
}

impl PayloadPredicate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        PayloadPredicate::Custom(CustomPredicate(Arc::new(f)))
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        let text = value.and_then(value_as_text);
        match self {
            PayloadPredicate::Equals { value: expected } => text == value_as_text(expected),
            PayloadPredicate::NotEquals { value: expected } => text != value_as_text(expected),
            PayloadPredicate::OneOf { values } => values
                .iter()
                .any(|candidate| text.is_some() && text == value_as_text(candidate)),
            PayloadPredicate::Truthy => is_truthy(value),
            PayloadPredicate::Falsy => !is_truthy(value),
            PayloadPredicate::NonEmpty => match value {
                Some(Value::Array(items)) => !items.is_empty(),
                Some(Value::Object(map)) => !map.is_empty(),
                _ => text.map(|t| !t.trim().is_empty()).unwrap_or(false),
            },
            PayloadPredicate::Custom(predicate) => (predicate.0)(value),
        }
    }
}

type PredicateFn = dyn Fn(Option<&Value>) -> bool + Send + Sync;

#[derive(Clone)]
pub struct CustomPredicate(pub Arc<PredicateFn>);

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}
