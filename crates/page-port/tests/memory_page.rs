use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use formflow_core_types::RemoteFile;
use formflow_page_port::memory::MemoryPage;
use formflow_page_port::{DomEvent, PageError, PagePort};

const FORM: &str = r#"
<form>
  <fieldset id="consent">
    <legend>Consent</legend>
    <label for="agree">I agree</label>
    <input type="checkbox" id="agree" name="agree">
    <label><input type="radio" name="side" value="left"> Left</label>
    <label><input type="radio" name="side" value="right" checked> Right</label>
  </fieldset>
  <input id="managed" data-managed value="old">
  <input type="file" id="upload">
</form>
"#;

#[tokio::test]
async fn label_click_toggles_its_control() {
    let page = MemoryPage::from_html(FORM);
    let label = page.find("label[for=\"agree\"]").unwrap();
    let checkbox = page.find("#agree").unwrap();

    page.dispatch_event(label, DomEvent::Click).await.unwrap();
    assert!(page.is_checked(checkbox).await.unwrap());

    page.dispatch_event(label, DomEvent::Click).await.unwrap();
    assert!(!page.is_checked(checkbox).await.unwrap());
}

#[tokio::test]
async fn radio_group_is_exclusive() {
    let page = MemoryPage::from_html(FORM);
    let left = page.find("input[value=\"left\"]").unwrap();
    let right = page.find("input[value=\"right\"]").unwrap();
    assert!(page.is_checked(right).await.unwrap());

    page.native_click(left).await.unwrap();
    assert!(page.is_checked(left).await.unwrap());
    assert!(!page.is_checked(right).await.unwrap());
    assert_eq!(
        page.query_selector_all(None, "input:checked").await.unwrap(),
        vec![left]
    );
}

#[tokio::test]
async fn managed_inputs_ignore_plain_assignment() {
    let page = MemoryPage::from_html(FORM);
    let input = page.find("#managed").unwrap();

    page.set_value_property(input, "new").await.unwrap();
    assert_eq!(page.value(input).await.unwrap(), "old");

    page.set_native_value(input, "new").await.unwrap();
    assert_eq!(page.value(input).await.unwrap(), "new");
}

#[tokio::test]
async fn ignored_clicks_fall_through_to_native_click() {
    let page = MemoryPage::from_html(r#"<input type="checkbox" id="c" data-ignore-click>"#);
    let checkbox = page.find("#c").unwrap();

    page.dispatch_event(checkbox, DomEvent::Click).await.unwrap();
    assert!(!page.is_checked(checkbox).await.unwrap());

    page.native_click(checkbox).await.unwrap();
    assert!(page.is_checked(checkbox).await.unwrap());
}

#[tokio::test]
async fn hooks_see_bubbled_events() {
    let page = MemoryPage::from_html(r#"<div class="menu"><span id="inner">Open</span></div>"#);
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    page.on_click(".menu", move |tree, menu| {
        seen.fetch_add(1, Ordering::SeqCst);
        tree.append_html(menu, "<ul><li class=\"option\">One</li></ul>");
    });

    let inner = page.find("#inner").unwrap();
    page.dispatch_event(inner, DomEvent::Click).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(page.query_selector(None, "li.option").await.unwrap().is_some());
}

#[tokio::test]
async fn attach_files_requires_file_input() {
    let page = MemoryPage::from_html(FORM);
    let upload = page.find("#upload").unwrap();
    let managed = page.find("#managed").unwrap();
    let file = RemoteFile::new("scan.pdf", "application/pdf", vec![1, 2, 3]);

    page.attach_files(upload, std::slice::from_ref(&file)).await.unwrap();
    assert_eq!(page.read(|tree| tree.files(upload)), vec!["scan.pdf"]);

    let err = page.attach_files(managed, &[file]).await.unwrap_err();
    assert!(matches!(err, PageError::Unsupported(_)));
}

#[tokio::test]
async fn removed_nodes_report_detached() {
    let page = MemoryPage::from_html(FORM);
    let checkbox = page.find("#agree").unwrap();
    page.mutate(|tree| tree.remove(checkbox));

    assert_eq!(
        page.is_checked(checkbox).await.unwrap_err(),
        PageError::Detached(checkbox)
    );
}

#[tokio::test]
async fn closed_page_is_fatal() {
    let page = MemoryPage::from_html(FORM).with_url("https://forms.example/claim");
    assert_eq!(
        page.current_url().await.unwrap(),
        "https://forms.example/claim"
    );
    page.close();
    let err = page.body_text().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn invalid_selectors_are_errors() {
    let page = MemoryPage::from_html(FORM);
    let err = page.query_selector(None, "div ~ p").await.unwrap_err();
    assert!(matches!(err, PageError::InvalidSelector(_)));
}
