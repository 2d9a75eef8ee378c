//! Remote attachments and the human upload gate.

use action_primitives::{wait_for, ActionError};
use formflow_core_types::value_as_text;
use formflow_page_port::NodeId;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::ExecCtx;

/// A file the payload points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FileRef {
    pub url: String,
    pub name: String,
}

impl FileRef {
    /// Accepts a bare URL or `{url, name|filename}`.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let (url, name) = match value {
            Value::Object(map) => {
                let url = map.get("url").and_then(value_as_text)?;
                let name = map
                    .get("name")
                    .or_else(|| map.get("filename"))
                    .and_then(value_as_text);
                (url, name)
            }
            other => (value_as_text(other)?, None),
        };
        if url.trim().is_empty() {
            return None;
        }
        let name = name.unwrap_or_else(|| file_name_from_url(&url));
        Some(Self { url, name })
    }
}

fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

/// What happened to one attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Attachment {
    /// The payload names no file
    NotRequired,
    Attached,
    /// No privileged host is connected
    NoRelay,
    /// The relay could not produce the bytes
    FetchFailed,
    /// No upload input to put the file on
    NoInput,
}

impl Attachment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Attachment::NotRequired => "not_required",
            Attachment::Attached => "attached",
            Attachment::NoRelay => "no_relay",
            Attachment::FetchFailed => "fetch_failed",
            Attachment::NoInput => "no_input",
        }
    }
}

/// Upload widget scope: the element carrying `upload_attr` inside `scope`,
/// else `scope` itself.
pub(crate) async fn upload_scope(
    ctx: &ExecCtx,
    scope: Option<NodeId>,
    upload_attr: Option<&str>,
) -> Result<Option<NodeId>, ActionError> {
    let Some(attr) = upload_attr else {
        return Ok(scope);
    };
    let selector = if attr.starts_with('[') {
        attr.to_string()
    } else {
        format!("[{}]", attr)
    };
    Ok(ctx.page.query_selector(scope, &selector).await?.or(scope))
}

/// Fetch `file` through the relay and put it on the `index`-th upload input
/// of `scope`. Every failure is reported, none is raised.
pub(crate) async fn attach_remote(
    ctx: &ExecCtx,
    scope: Option<NodeId>,
    index: usize,
    file: &FileRef,
) -> Result<Attachment, ActionError> {
    let inputs = ctx
        .page
        .query_selector_all(scope, &ctx.profile.upload_input_selector)
        .await?;
    let Some(input) = inputs.get(index).or(inputs.last()).copied() else {
        warn!(file = %file.name, "No upload input for attachment");
        return Ok(Attachment::NoInput);
    };
    let Some(relay) = &ctx.relay else {
        warn!(file = %file.name, "No relay connected, attachment skipped");
        return Ok(Attachment::NoRelay);
    };
    let Some(remote) = relay.fetch_file(&file.url, &file.name).await else {
        return Ok(Attachment::FetchFailed);
    };
    match ctx.page.attach_files(input, std::slice::from_ref(&remote)).await {
        Ok(()) => {
            info!(file = %remote.name, size = remote.size, "Attachment placed on the form");
            Ok(Attachment::Attached)
        }
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            warn!(file = %remote.name, error = %err, "Attaching failed");
            Ok(Attachment::NoInput)
        }
    }
}

/// Whether the widget shows a finished upload: file name and size rendered,
/// no busy indicator visible.
async fn upload_finished(ctx: &ExecCtx, scope: Option<NodeId>) -> Result<bool, ActionError> {
    let page = ctx.page.as_ref();
    for busy in page
        .query_selector_all(scope, &ctx.profile.upload_busy_selector)
        .await?
    {
        if page.is_visible(busy).await? {
            return Ok(false);
        }
    }
    for selector in [
        &ctx.profile.upload_file_name_selector,
        &ctx.profile.upload_file_size_selector,
    ] {
        let mut shown = false;
        for node in page.query_selector_all(scope, selector).await? {
            if page.is_visible(node).await? && !page.text_content(node).await?.trim().is_empty() {
                shown = true;
                break;
            }
        }
        if !shown {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ask the human to complete the upload, then poll the widget until it
/// shows a finished upload or the budget runs out.
pub(crate) async fn await_human_upload(
    ctx: &ExecCtx,
    scope: Option<NodeId>,
    message: &str,
) -> Result<bool, ActionError> {
    if upload_finished(ctx, scope).await? {
        return Ok(true);
    }
    ctx.operator.alert(message).await;
    match wait_for("upload completion", ctx.timings.upload_wait(), move || async move {
        Ok::<_, ActionError>(upload_finished(ctx, scope).await?.then_some(()))
    })
    .await
    {
        Ok(()) => Ok(true),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(error = %err, "Upload did not complete in time");
            Ok(false)
        }
    }
}
