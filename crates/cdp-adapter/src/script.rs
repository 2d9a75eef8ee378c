//! Page-side helper evaluated for every port operation.
//!
//! Elements are tagged with a `data-formflow-node` attribute the first time
//! they are handed out; the numeric tag is the [`NodeId`]. The sequence is
//! seeded from the clock so tags from an earlier document never collide with
//! tags in the next one.

use formflow_page_port::{NodeId, PageError};
use serde_json::Value;

pub const NODE_ATTR: &str = "data-formflow-node";

const HELPER: &str = r#"(function (op, args) {
  const ATTR = 'data-formflow-node';
  const SEQ = '__formflowSeq';
  if (!window[SEQ]) { window[SEQ] = Date.now() * 1000; }
  const tag = (node) => {
    let id = node.getAttribute(ATTR);
    if (!id) {
      window[SEQ] += 1;
      id = String(window[SEQ]);
      node.setAttribute(ATTR, id);
    }
    return Number(id);
  };
  const el = (key) => {
    const node = document.querySelector('[' + ATTR + '="' + args[key] + '"]');
    if (!node) { throw { formflow: 'detached', node: args[key] }; }
    return node;
  };
  const visible = (node) => {
    for (let cur = node; cur && cur.nodeType === 1; cur = cur.parentElement) {
      if (cur.hidden) { return false; }
      const style = getComputedStyle(cur);
      if (style.display === 'none' || style.visibility === 'hidden') { return false; }
    }
    return node.getClientRects().length > 0;
  };
  const done = () => null;
  const ops = {
    query: () => {
      const root = args.scope == null ? document : el('scope');
      const found = args.all
        ? Array.from(root.querySelectorAll(args.selector))
        : [root.querySelector(args.selector)].filter(Boolean);
      return found.map(tag);
    },
    tag: () => el('node').tagName.toLowerCase(),
    text: () => {
      const node = el('node');
      return (node.innerText !== undefined ? node.innerText : node.textContent) || '';
    },
    attr: () => el('node').getAttribute(args.name),
    setAttr: () => done(el('node').setAttribute(args.name, args.value)),
    parent: () => {
      const parent = el('node').parentElement;
      return parent ? tag(parent) : null;
    },
    closest: () => {
      const found = el('node').closest(args.selector);
      return found ? tag(found) : null;
    },
    matches: () => el('node').matches(args.selector),
    visible: () => visible(el('node')),
    disabled: () => {
      const node = el('node');
      return !!(node.disabled || node.hasAttribute('disabled')
        || node.getAttribute('aria-disabled') === 'true');
    },
    checked: () => !!el('node').checked,
    setChecked: () => { el('node').checked = !!args.checked; return null; },
    value: () => {
      const node = el('node');
      return node.value == null ? '' : String(node.value);
    },
    setValue: () => { el('node').value = args.value; return null; },
    setNativeValue: () => {
      const node = el('node');
      const proto = node instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
        : node instanceof HTMLSelectElement ? HTMLSelectElement.prototype
        : HTMLInputElement.prototype;
      Object.getOwnPropertyDescriptor(proto, 'value').set.call(node, args.value);
      return null;
    },
    scroll: () => done(el('node').scrollIntoView({ block: 'center', inline: 'center' })),
    focus: () => done(el('node').focus()),
    blur: () => done(el('node').blur()),
    dispatch: () => {
      const init = { bubbles: true, cancelable: true, composed: true, view: window };
      if (args.key != null) {
        init.key = args.key;
        init.code = args.key === ' ' ? 'Space' : args.key;
      }
      const Ctor = window[args.interface] || Event;
      return done(el('node').dispatchEvent(new Ctor(args.type, init)));
    },
    click: () => done(el('node').click()),
    attachFiles: () => {
      const node = el('node');
      if (!(node instanceof HTMLInputElement) || node.type !== 'file') {
        throw { formflow: 'unsupported', message: 'not a file input' };
      }
      const transfer = new DataTransfer();
      for (const file of args.files) {
        const raw = atob(file.data);
        const bytes = new Uint8Array(raw.length);
        for (let i = 0; i < raw.length; i += 1) { bytes[i] = raw.charCodeAt(i); }
        transfer.items.add(new File([bytes], file.name, { type: file.type }));
      }
      node.files = transfer.files;
      node.dispatchEvent(new Event('input', { bubbles: true }));
      node.dispatchEvent(new Event('change', { bubbles: true }));
      return null;
    },
    url: () => location.href,
    bodyText: () => (document.body ? document.body.innerText : '')
      .split('\n').map((line) => line.trim()).filter(Boolean).join('\n'),
    html: () => {
      const copy = document.documentElement.cloneNode(true);
      copy.removeAttribute(ATTR);
      copy.querySelectorAll('[' + ATTR + ']').forEach((node) => node.removeAttribute(ATTR));
      return copy.outerHTML;
    },
    readyState: () => document.readyState,
  };
  try {
    const run = ops[op];
    if (!run) { return { error: 'unsupported', message: 'unknown operation ' + op }; }
    return { ok: run() };
  } catch (err) {
    if (err && err.formflow) {
      return { error: err.formflow, node: err.node, message: err.message || '' };
    }
    if (err && err.name === 'SyntaxError') {
      return { error: 'selector', message: String(err.message) };
    }
    return { error: 'script', message: String(err && err.message ? err.message : err) };
  }
})"#;

/// Expression that runs `op` with `args` and yields `{ok}` or `{error}`.
pub fn invocation(op: &str, args: &Value) -> String {
    format!("{HELPER}({}, {})", Value::from(op), args)
}

/// Turn the helper's reply envelope into the operation's value.
pub fn unwrap_reply(reply: Value) -> Result<Value, PageError> {
    let Value::Object(mut reply) = reply else {
        return Err(PageError::Script(format!("unexpected reply: {reply}")));
    };
    if let Some(value) = reply.remove("ok") {
        return Ok(value);
    }
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match reply.get("error").and_then(Value::as_str) {
        Some("detached") => Err(PageError::Detached(NodeId(
            reply.get("node").and_then(Value::as_u64).unwrap_or_default(),
        ))),
        Some("selector") => Err(PageError::InvalidSelector(message)),
        Some("unsupported") => Err(PageError::Unsupported(message)),
        Some(_) => Err(PageError::Script(message)),
        None => Err(PageError::Script("reply without ok or error".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocation_embeds_op_and_args() {
        let expression = invocation("query", &json!({"selector": "a[href=\"x\"]", "all": true}));
        assert!(expression.starts_with("(function (op, args)"));
        assert!(expression.contains(r#"})("query", {"#));
        assert!(expression.contains(r#""selector":"a[href=\"x\"]""#));
        assert!(expression.contains(NODE_ATTR));
    }

    #[test]
    fn replies_map_to_page_errors() {
        assert_eq!(unwrap_reply(json!({"ok": [3, 4]})).unwrap(), json!([3, 4]));
        assert_eq!(unwrap_reply(json!({"ok": null})).unwrap(), Value::Null);
        assert_eq!(
            unwrap_reply(json!({"error": "detached", "node": 17})),
            Err(PageError::Detached(NodeId(17)))
        );
        assert!(matches!(
            unwrap_reply(json!({"error": "selector", "message": "'[' is not valid"})),
            Err(PageError::InvalidSelector(_))
        ));
        assert!(matches!(
            unwrap_reply(json!("nope")),
            Err(PageError::Script(_))
        ));
    }
}
