mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use action_flow::ExecutorRegistry;
use formflow_core_types::{
    Payload, ReasonCode, RecordField, RecordFieldKind, Step, StepKind, StepOptions, StepResult,
};
use formflow_page_port::memory::MemoryPage;
use serde_json::{json, Value};

const CONDITIONS: &str = r#"
<section class="form-section" id="conditions">
  <h2>Medical conditions</h2>
  <div id="records"></div>
  <button type="button" id="add">הוספת מחלה</button>
</section>
<section class="form-section">
  <h2>Contact details</h2>
  <div class="form-group"><label for="phone">Phone</label><input id="phone"></div>
</section>
"#;

const RECORD: &str = r#"
<div data-record-section class="record">
  <input data-record-category placeholder="Condition">
  <div class="form-group"><label>Diagnosis date</label><input name="diagnosisDate"></div>
  <input type="file" class="record-file">
</div>
"#;

const CATEGORIES: &str = r#"
<ul class="categories">
  <li class="option">Diabetes</li>
  <li class="option">Asthma</li>
  <li class="option">Hypertension</li>
</ul>
"#;

/// Page whose add button renders a new record section, and whose category
/// pickers render their option list on click.
fn conditions_page() -> (MemoryPage, Arc<AtomicUsize>) {
    let page = MemoryPage::from_html(CONDITIONS);
    let adds = Arc::new(AtomicUsize::new(0));
    let counter = adds.clone();
    page.on_click("#add", move |tree, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(records) = tree.find("#records") {
            tree.append_html(records, RECORD);
        }
    });
    page.on_click("[data-record-category]", |tree, input| {
        if let Ok(Some(section)) = tree.closest(input, "[data-record-section]") {
            tree.append_html(section, CATEGORIES);
        }
    });
    page.on_click("li.option", |tree, option| {
        let chosen = tree.text(option);
        if let Ok(Some(section)) = tree.closest(option, "[data-record-section]") {
            if let Ok(inputs) = tree.select(Some(section), "[data-record-category]") {
                if let Some(input) = inputs.first() {
                    tree.set_value(*input, &chosen);
                }
            }
        }
        if let Ok(Some(list)) = tree.closest(option, "ul") {
            tree.remove(list);
        }
    });
    (page, adds)
}

fn diseases_step() -> Step {
    Step::new("diseases", StepKind::DiseaseList)
        .with_section("Medical conditions")
        .with_data_key("diseases")
        .with_options(StepOptions {
            category_key: Some("name".into()),
            files_key: Some("documents".into()),
            record_fields: vec![RecordField {
                key: "diagnosisDate".into(),
                kind: RecordFieldKind::Date,
                selector: None,
                label: Some("Diagnosis date".into()),
            }],
            ..StepOptions::default()
        })
}

async fn run(page: &MemoryPage, payload: Value, with_relay: bool) -> StepResult {
    let payload = Payload::from_value(payload).unwrap();
    let mut ctx = common::ctx(page);
    if with_relay {
        ctx = ctx.with_relay(common::relay(Arc::new(common::FakeHost::default())));
    }
    ExecutorRegistry::with_defaults()
        .dispatch(&diseases_step(), &payload, &ctx)
        .await
        .unwrap()
}

fn section_values(page: &MemoryPage, selector: &str) -> Vec<String> {
    page.read(|tree| {
        tree.find_all(selector)
            .into_iter()
            .map(|node| tree.value(node))
            .collect()
    })
}

#[tokio::test]
async fn adds_one_section_per_record_and_fills_each() {
    let (page, adds) = conditions_page();
    let payload = json!({
        "diseases": [
            {
                "name": "Diabetes",
                "diagnosisDate": "03/2019",
                "documents": [{"url": "https://files.example/d1.pdf", "name": "d1.pdf"}]
            },
            {"name": "Asthma"}
        ]
    });

    let result = run(&page, payload, true).await;
    assert!(result.success, "{:?}", result);
    assert_eq!(adds.load(Ordering::SeqCst), 2);
    assert_eq!(result.diagnostics["added_sections"], 2);

    let records = result.diagnostics["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["category"], "exact");
    assert_eq!(records[0]["fields"]["diagnosisDate"], "filled");
    assert_eq!(records[0]["files"][0]["outcome"], "attached");
    assert_eq!(records[1]["fields"]["diagnosisDate"], "empty");

    assert_eq!(
        section_values(&page, "[data-record-category]"),
        vec!["Diabetes", "Asthma"]
    );
    assert_eq!(section_values(&page, "input[name=\"diagnosisDate\"]")[0], "03/2019");
    let file_input = page.find(".record-file").unwrap();
    assert_eq!(page.read(|tree| tree.files(file_input)), vec!["d1.pdf"]);
}

#[tokio::test]
async fn existing_sections_are_reused() {
    let (page, adds) = conditions_page();
    page.mutate(|tree| {
        let records = tree.find("#records").unwrap();
        tree.append_html(records, RECORD);
    });

    let result = run(&page, json!({"diseases": [{"name": "Hypertension"}]}), false).await;
    assert!(result.success);
    assert_eq!(adds.load(Ordering::SeqCst), 0);
    assert_eq!(result.diagnostics["added_sections"], 0);
}

#[tokio::test]
async fn unknown_category_takes_the_first_option() {
    let (page, _) = conditions_page();

    let result = run(&page, json!({"diseases": [{"name": "Migraine"}]}), false).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["records"][0]["category"], "first");
    assert_eq!(section_values(&page, "[data-record-category]"), vec!["Diabetes"]);
}

#[tokio::test]
async fn attachments_without_relay_are_reported_not_raised() {
    let (page, _) = conditions_page();
    let payload = json!({
        "diseases": [{"name": "Asthma", "documents": ["https://files.example/a.pdf"]}]
    });

    let result = run(&page, payload, false).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["records"][0]["files"][0]["outcome"], "no_relay");
}

#[tokio::test(start_paused = true)]
async fn add_button_that_renders_nothing_fails_the_step() {
    let page = MemoryPage::from_html(CONDITIONS);

    let result = run(&page, json!({"diseases": [{"name": "Asthma"}]}), false).await;
    assert_eq!(result.reason, Some(ReasonCode::AddSectionFailed));
}

#[tokio::test]
async fn empty_record_list_is_optional() {
    let (page, adds) = conditions_page();

    let result = run(&page, json!({"diseases": []}), false).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["empty"], true);
    assert_eq!(adds.load(Ordering::SeqCst), 0);
}
