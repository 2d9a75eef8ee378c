//! Flow definitions known to the engine: the bundled form flow plus any
//! loaded from disk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use formflow_core_types::FlowDefinition;
use tracing::{debug, info};

use crate::errors::FlowError;

pub const DEFAULT_FLOW_ID: &str = "claim_form";

const BUNDLED: &[(&str, &str)] = &[(
    "flows/claim_form.yaml",
    include_str!("../flows/claim_form.yaml"),
)];

#[derive(Clone, Debug, Default)]
pub struct FlowCatalog {
    flows: BTreeMap<String, Arc<FlowDefinition>>,
}

impl FlowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every flow shipped with the engine.
    pub fn bundled() -> Result<Self, FlowError> {
        let mut catalog = Self::new();
        for (name, source) in BUNDLED {
            let flow = FlowDefinition::from_yaml_str(source)?;
            debug!(source = name, flow_id = %flow.id, steps = flow.steps.len(), "Bundled flow loaded");
            catalog.insert(flow);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, flow: FlowDefinition) -> Arc<FlowDefinition> {
        let flow = Arc::new(flow);
        self.flows.insert(flow.id.clone(), flow.clone());
        flow
    }

    pub fn get(&self, id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Arc<FlowDefinition>> {
        self.flows.values()
    }

    /// Load a definition file (`.json`, otherwise YAML) and add it.
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<FlowDefinition>, FlowError> {
        let source = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let flow = if is_json {
            FlowDefinition::from_json_str(&source)?
        } else {
            FlowDefinition::from_yaml_str(&source)?
        };
        info!(path = %path.display(), flow_id = %flow.id, "Flow definition loaded");
        Ok(self.insert(flow))
    }

    /// A catalog id, else a path to a definition file.
    pub fn resolve(&mut self, id_or_path: &str) -> Result<Arc<FlowDefinition>, FlowError> {
        if let Some(flow) = self.get(id_or_path) {
            return Ok(flow);
        }
        let path = Path::new(id_or_path);
        if path.is_file() {
            return self.load_file(path);
        }
        Err(FlowError::UnknownFlow(id_or_path.to_string()))
    }
}
