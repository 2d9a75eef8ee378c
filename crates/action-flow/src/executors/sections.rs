//! Composite section fillers. Each reads several top-level payload keys
//! directly instead of going through `dataKey`.

use action_primitives::{wait_for, ActionError};
use async_trait::async_trait;
use formflow_core_types::{
    Payload, ReasonCode, RecordField, RecordFieldKind, Step, StepKind, StepResult,
};
use formflow_page_port::NodeId;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::fields::{fill_field, FieldOutcome};
use super::{find_add_control, section_scope};
use super::upload::{attach_remote, await_human_upload, upload_scope, Attachment, FileRef};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    AccidentConsent,
    HealthFundSignature,
    FinalDeclarations,
    OtherDocuments,
    SecondSignature,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::AccidentConsent,
        SectionKind::HealthFundSignature,
        SectionKind::FinalDeclarations,
        SectionKind::OtherDocuments,
        SectionKind::SecondSignature,
    ];

    pub fn step_kind(self) -> StepKind {
        match self {
            SectionKind::AccidentConsent => StepKind::AccidentConsent,
            SectionKind::HealthFundSignature => StepKind::HealthFundSignature,
            SectionKind::FinalDeclarations => StepKind::FinalDeclarations,
            SectionKind::OtherDocuments => StepKind::OtherDocuments,
            SectionKind::SecondSignature => StepKind::SecondSignature,
        }
    }

    /// Payload keys read when the flow does not list its own fields.
    fn default_fields(self) -> Vec<RecordField> {
        let field = |key: &str, kind| RecordField {
            key: key.to_string(),
            kind,
            selector: None,
            label: None,
        };
        use RecordFieldKind::*;
        match self {
            SectionKind::AccidentConsent => vec![
                field("isAccident", Radio),
                field("accidentDate", Date),
                field("accidentDescription", Text),
                field("medicalInfoConsent", Checkbox),
            ],
            SectionKind::HealthFundSignature => vec![
                field("healthFund", Radio),
                field("signatureConsent", Checkbox),
            ],
            SectionKind::FinalDeclarations => vec![
                field("declarationTruth", Checkbox),
                field("declarationChanges", Checkbox),
                field("declarationPrivacy", Checkbox),
            ],
            SectionKind::OtherDocuments => Vec::new(),
            SectionKind::SecondSignature => vec![
                field("secondSignerName", Text),
                field("secondSignerId", Text),
            ],
        }
    }

    /// Payload key holding this section's file reference(s).
    fn default_files_key(self) -> Option<&'static str> {
        match self {
            SectionKind::HealthFundSignature => Some("signatureUrl"),
            SectionKind::SecondSignature => Some("secondSignatureUrl"),
            SectionKind::OtherDocuments => Some("otherDocuments"),
            _ => None,
        }
    }

    fn is_signature(self) -> bool {
        matches!(
            self,
            SectionKind::HealthFundSignature | SectionKind::SecondSignature
        )
    }
}

pub struct SectionExecutor {
    section: SectionKind,
}

impl SectionExecutor {
    pub fn new(section: SectionKind) -> Self {
        Self { section }
    }

    async fn scope(&self, step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
        if let Some(selector) = step.locator.selector.as_deref() {
            if let Some(node) = ctx.locator.find_by_selector(None, selector).await? {
                return Ok(Some(node));
            }
        }
        section_scope(ctx, step).await
    }

    fn files_key<'a>(&self, step: &'a Step) -> Option<&'a str> {
        step.options
            .files_key
            .as_deref()
            .or(self.section.default_files_key())
    }

    /// Attach the signature, then block until a human confirms the upload.
    async fn signature(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
        scope: Option<NodeId>,
    ) -> Result<(Attachment, bool), ActionError> {
        let file = self
            .files_key(step)
            .and_then(|key| payload.get(key))
            .and_then(FileRef::from_value);
        let Some(file) = file else {
            return Ok((Attachment::NotRequired, true));
        };

        let widget = upload_scope(ctx, scope, step.options.upload_attr.as_deref()).await?;
        let attachment = attach_remote(ctx, widget, 0, &file).await?;
        let message = match attachment {
            Attachment::Attached => format!(
                "The signature file {} was attached. Confirm the upload finished, then press OK.",
                file.name
            ),
            _ => format!(
                "The signature file {} could not be attached automatically. Upload it manually, then press OK.",
                file.name
            ),
        };
        let done = await_human_upload(ctx, widget, &message).await?;
        Ok((attachment, done))
    }

    /// Attach every listed document, adding upload rows as needed. Fetch
    /// failures only skip the document.
    async fn documents(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
        scope: Option<NodeId>,
    ) -> Result<Vec<Value>, ActionError> {
        let documents: Vec<FileRef> = self
            .files_key(step)
            .map(|key| payload.list(key))
            .unwrap_or_default()
            .iter()
            .filter_map(FileRef::from_value)
            .collect();
        let widget = upload_scope(ctx, scope, step.options.upload_attr.as_deref()).await?;
        let page = ctx.page.as_ref();
        let input_selector = ctx.profile.upload_input_selector.as_str();

        let mut outcomes = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            let inputs = page.query_selector_all(widget, input_selector).await?.len();
            if inputs <= index {
                if let Some(add) = find_add_control(ctx, widget, &ctx.profile.add_document_text).await? {
                    ctx.primitives.click(add).await?;
                    let grown = wait_for("new upload row", ctx.timings.section_wait(), move || async move {
                        let now = page.query_selector_all(widget, input_selector).await?.len();
                        Ok::<_, ActionError>((now > index).then_some(()))
                    })
                    .await;
                    if let Err(err) = grown {
                        if err.is_fatal() {
                            return Err(err);
                        }
                        warn!(step_id = %step.id, document = %document.name, "No upload row appeared");
                    }
                }
            }
            let attachment = attach_remote(ctx, widget, index, document).await?;
            outcomes.push(json!({ "name": document.name, "outcome": attachment.as_str() }));
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl StepExecutor for SectionExecutor {
    fn kind(&self) -> StepKind {
        self.section.step_kind()
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let scope = self.scope(step, ctx).await?;
        let fields = if step.options.record_fields.is_empty() {
            self.section.default_fields()
        } else {
            step.options.record_fields.clone()
        };

        let mut outcomes = Map::new();
        let mut failure = None;
        for field in &fields {
            let outcome = fill_field(ctx, step, scope, field, payload.get(&field.key)).await?;
            if outcome.is_failure() && failure.is_none() {
                failure = Some(match outcome {
                    FieldOutcome::NotFound => ReasonCode::InputNotFound,
                    _ => ReasonCode::NoMethodSucceeded,
                });
            }
            outcomes.insert(field.key.clone(), Value::from(outcome.as_str()));
        }
        let mut result = StepResult::ok(&step.id);

        if self.section.is_signature() {
            let (attachment, uploaded) = self.signature(step, payload, ctx, scope).await?;
            result = result.with_diagnostic("attachment", attachment.as_str());
            if !uploaded {
                info!(step_id = %step.id, "Signature upload timed out");
                failure = Some(ReasonCode::UploadTimeout);
            }
        }
        if self.section == SectionKind::OtherDocuments {
            let documents = self.documents(step, payload, ctx, scope).await?;
            result = result.with_diagnostic("documents", Value::Array(documents));
        }

        if let Some(reason) = failure {
            result.success = false;
            result = result.with_reason(reason);
        }
        Ok(result.with_diagnostic("fields", Value::Object(outcomes)))
    }
}
