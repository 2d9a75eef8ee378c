use action_primitives::{wait_for, ActionError};
use async_trait::async_trait;
use formflow_core_types::{value_as_text, Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::fields::fill_field;
use super::upload::{attach_remote, FileRef};
use super::{find_add_control, missing_value, pick_searchable, section_scope, PickFallback};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

/// Searchable category control inside one record section.
const CATEGORY_INPUT: &str = "[data-record-category], input[role=\"combobox\"], .searchable input";
const DEFAULT_CATEGORY_KEY: &str = "category";
const DEFAULT_FILES_KEY: &str = "files";

/// Repeating-record group (e.g. a list of medical conditions): one record
/// section per payload record, each with a category picker, sub-fields and
/// optional attachments.
pub struct RecordGroupExecutor;

impl RecordGroupExecutor {
    async fn sections(&self, ctx: &ExecCtx, scope: Option<NodeId>) -> Result<Vec<NodeId>, ActionError> {
        Ok(ctx
            .page
            .query_selector_all(scope, &ctx.profile.record_section_selector)
            .await?)
    }

    /// Click "add" until there is a section per record. Returns the number
    /// of clicks, or `None` when a click produced no new section.
    async fn ensure_sections(
        &self,
        step: &Step,
        ctx: &ExecCtx,
        scope: Option<NodeId>,
        wanted: usize,
    ) -> Result<Option<usize>, ActionError> {
        let mut adds = 0;
        let mut count = self.sections(ctx, scope).await?.len();
        while count < wanted {
            let Some(add) = find_add_control(ctx, scope, &ctx.profile.add_record_text).await? else {
                warn!(step_id = %step.id, "Add-record control not found");
                return Ok(None);
            };
            ctx.primitives.click(add).await?;
            adds += 1;
            let before = count;
            let grown = wait_for("new record section", ctx.timings.section_wait(), move || async move {
                let now = self.sections(ctx, scope).await?.len();
                Ok::<_, ActionError>((now > before).then_some(now))
            })
            .await;
            match grown {
                Ok(now) => count = now,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(step_id = %step.id, adds, error = %err, "Add click produced no section");
                    return Ok(None);
                }
            }
        }
        debug!(step_id = %step.id, adds, sections = count, "Record sections ready");
        Ok(Some(adds))
    }

    async fn fill_record(
        &self,
        step: &Step,
        ctx: &ExecCtx,
        section: NodeId,
        record: &Map<String, Value>,
    ) -> Result<(Value, Option<ReasonCode>), ActionError> {
        let mut failure = None;
        let category_key = step
            .options
            .category_key
            .as_deref()
            .unwrap_or(DEFAULT_CATEGORY_KEY);

        let category = match record.get(category_key).and_then(value_as_text) {
            None => Value::from("empty"),
            Some(name) => match ctx.page.query_selector(Some(section), CATEGORY_INPUT).await? {
                None => {
                    failure = Some(ReasonCode::SelectNotFound);
                    Value::from("select_not_found")
                }
                Some(input) => {
                    let fallback = PickFallback {
                        contains: false,
                        first: true,
                    };
                    match pick_searchable(ctx, step, input, &name, fallback).await? {
                        Ok(how) => Value::from(how.as_str()),
                        Err(reason) => {
                            let code = reason.as_str();
                            failure = Some(reason);
                            Value::from(code)
                        }
                    }
                }
            },
        };

        let mut fields = Map::new();
        for field in &step.options.record_fields {
            let outcome = fill_field(ctx, step, Some(section), field, record.get(&field.key)).await?;
            fields.insert(field.key.clone(), Value::from(outcome.as_str()));
        }

        let files_key = step.options.files_key.as_deref().unwrap_or(DEFAULT_FILES_KEY);
        let files: Vec<FileRef> = match record.get(files_key) {
            Some(Value::Array(items)) => items.iter().filter_map(FileRef::from_value).collect(),
            Some(single) => FileRef::from_value(single).into_iter().collect(),
            None => Vec::new(),
        };
        let mut attachments = Vec::new();
        for (index, file) in files.iter().enumerate() {
            let attachment = attach_remote(ctx, Some(section), index, file).await?;
            attachments.push(json!({ "name": file.name, "outcome": attachment.as_str() }));
        }

        Ok((
            json!({ "category": category, "fields": fields, "files": attachments }),
            failure,
        ))
    }
}

#[async_trait]
impl StepExecutor for RecordGroupExecutor {
    fn kind(&self) -> StepKind {
        StepKind::DiseaseList
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let records: Vec<Map<String, Value>> = step
            .data_key
            .as_deref()
            .map(|key| payload.list(key))
            .unwrap_or_default()
            .into_iter()
            .map(|record| match record {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert(DEFAULT_CATEGORY_KEY.to_string(), other);
                    map
                }
            })
            .collect();
        if records.is_empty() {
            return Ok(missing_value(step));
        }

        let scope = section_scope(ctx, step).await?;
        let Some(adds) = self.ensure_sections(step, ctx, scope, records.len()).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::AddSectionFailed));
        };
        let sections = self.sections(ctx, scope).await?;

        let mut outcomes = Vec::new();
        let mut failure = None;
        for (record, section) in records.iter().zip(sections) {
            let (outcome, record_failure) = self.fill_record(step, ctx, section, record).await?;
            outcomes.push(outcome);
            if failure.is_none() {
                failure = record_failure;
            }
        }
        info!(step_id = %step.id, records = records.len(), adds, "Record group filled");

        let result = match failure {
            None => StepResult::ok(&step.id),
            Some(reason) => StepResult::failed(&step.id, reason),
        };
        Ok(result
            .with_diagnostic("added_sections", adds)
            .with_diagnostic("records", Value::Array(outcomes)))
    }
}
