mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use action_flow::ExecutorRegistry;
use formflow_core_types::{
    DependentDropdown, InputKind, Payload, ReasonCode, RetrySpec, Step, StepKind, StepOptions,
    StepResult,
};
use formflow_page_port::memory::MemoryPage;
use serde_json::{json, Value};

async fn run(page: &MemoryPage, step: &Step, payload: Value) -> StepResult {
    let payload = Payload::from_value(payload).unwrap();
    ExecutorRegistry::with_defaults()
        .dispatch(step, &payload, &common::ctx(page))
        .await
        .unwrap()
}

fn checked(page: &MemoryPage, selector: &str) -> bool {
    let node = page.find(selector).unwrap();
    page.read(|tree| tree.is_checked(node))
}

fn value_of(page: &MemoryPage, selector: &str) -> String {
    let node = page.find(selector).unwrap();
    page.read(|tree| tree.value(node))
}

const TERMS: &str = r#"
<div class="form-group">
  <label for="terms">I accept the terms</label>
  <input type="checkbox" id="terms">
</div>
"#;

#[tokio::test]
async fn checkbox_is_ticked_through_its_label() {
    let page = MemoryPage::from_html(TERMS);
    let step = Step::new("terms", StepKind::Checkbox).with_label("I accept the terms");

    let result = run(&page, &step, json!({})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["method"], "label");
    assert!(checked(&page, "#terms"));
}

#[tokio::test]
async fn checkbox_falls_back_when_the_label_swallows_clicks() {
    let page = MemoryPage::from_html(
        r#"<div class="form-group"><label for="terms" data-ignore-click>I accept the terms</label><input type="checkbox" id="terms"></div>"#,
    );
    let step = Step::new("terms", StepKind::Checkbox).with_label("I accept the terms");

    let result = run(&page, &step, json!({})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["method"], "input");
    assert!(checked(&page, "#terms"));
}

#[tokio::test]
async fn falsy_checkbox_value_leaves_it_unchecked() {
    let page = MemoryPage::from_html(TERMS);
    let step = Step::new("terms", StepKind::Checkbox)
        .with_label("I accept the terms")
        .with_data_key("acceptTerms");

    let result = run(&page, &step, json!({"acceptTerms": false})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["already"], true);
    assert!(!checked(&page, "#terms"));
}

#[tokio::test]
async fn missing_checkbox_label_is_reported() {
    let page = MemoryPage::from_html(TERMS);
    let step = Step::new("terms", StepKind::Checkbox).with_label("Subscribe to newsletter");

    let result = run(&page, &step, json!({})).await;
    assert_eq!(result.reason, Some(ReasonCode::LabelNotFound));
}

const CLAIMANT: &str = r#"
<div class="form-group">
  <span>Who is submitting the claim?</span>
  <input type="radio" id="c1" name="c" value="insured"><label for="c1">Insured person</label>
  <input type="radio" id="c2" name="c" value="guardian"><label for="c2">Guardian</label>
  <input type="radio" id="c3" name="c" value="agent"><label for="c3">Agent</label>
</div>
"#;

fn claimant_step() -> Step {
    Step::new("claimant", StepKind::Radio)
        .with_label("Who is submitting the claim?")
        .with_data_key("claimantType")
        .with_options(StepOptions {
            allowed_values: Some(vec!["insured".into(), "guardian".into()]),
            ..StepOptions::default()
        })
}

#[tokio::test]
async fn radio_outside_allowed_values_is_rejected() {
    let page = MemoryPage::from_html(CLAIMANT);

    let result = run(&page, &claimant_step(), json!({"claimantType": "agent"})).await;
    assert_eq!(result.reason, Some(ReasonCode::ValueNotAllowed));
    assert!(!checked(&page, "#c3"));
}

#[tokio::test]
async fn radio_selection_disables_disallowed_options() {
    let page = MemoryPage::from_html(CLAIMANT);

    let result = run(&page, &claimant_step(), json!({"claimantType": "guardian"})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["restricted"], 1);
    assert!(checked(&page, "#c2"));

    let agent = page.find("#c3").unwrap();
    let label = page.find("label[for=\"c3\"]").unwrap();
    page.read(|tree| {
        assert!(tree.is_disabled(agent));
        assert!(!tree.is_visible(label));
        // Restricted, not removed.
        assert!(tree.contains(agent));
    });
}

#[tokio::test]
async fn required_radio_without_value_is_left_alone() {
    let page = MemoryPage::from_html(CLAIMANT);
    let mut step = claimant_step();
    step.required = true;

    let result = run(&page, &step, json!({})).await;
    assert!(result.success);
    assert_eq!(result.reason, None);
    assert_eq!(result.diagnostics["empty"], true);
    assert!(page.read(|tree| tree.events().is_empty()));
}

#[tokio::test]
async fn radio_already_selected_is_left_alone() {
    let page = MemoryPage::from_html(&CLAIMANT.replace(r#"id="c2""#, r#"id="c2" checked"#));
    let step = Step::new("claimant", StepKind::Radio)
        .with_label("Who is submitting the claim?")
        .with_data_key("claimantType");

    let result = run(&page, &step, json!({"claimantType": "guardian"})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["already"], true);
    assert!(checked(&page, "#c2"));
    assert!(page.read(|tree| tree.events().is_empty()));
}

#[tokio::test]
async fn typed_text_reaches_managed_inputs() {
    let page = MemoryPage::from_html(
        r#"<div class="form-group"><label for="name">שם מלא</label><input id="name" data-managed></div>"#,
    );
    let step = Step::new("name", StepKind::TextInput)
        .with_label("שם מלא")
        .with_data_key("fullName")
        .with_options(StepOptions {
            simulate_typing: true,
            ..StepOptions::default()
        });

    let result = run(&page, &step, json!({"fullName": "דנה כהן"})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["method"], "typed");
    assert_eq!(value_of(&page, "#name"), "דנה כהן");
}

#[tokio::test]
async fn date_inputs_are_clicked_before_typing() {
    let page = MemoryPage::from_html(
        r#"<div class="form-group"><label for="dob">Date of birth</label><input id="dob"></div>"#,
    );
    let step = Step::new("dob", StepKind::TextInput)
        .with_label("Date of birth")
        .with_data_key("birthDate")
        .with_options(StepOptions {
            input_kind: InputKind::Date,
            ..StepOptions::default()
        });

    let result = run(&page, &step, json!({"birthDate": "01/02/1980"})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["method"], "click_then_typed");
    assert_eq!(value_of(&page, "#dob"), "01/02/1980");
}

const FUND: &str = r#"
<div class="form-group">
  <label for="fund">Health fund</label>
  <select id="fund">
    <option value="">Choose</option>
    <option value="01">Clalit</option>
    <option value="02">Maccabi</option>
  </select>
</div>
"#;

#[tokio::test]
async fn native_select_matches_option_text() {
    let page = MemoryPage::from_html(FUND);
    let step = Step::new("fund", StepKind::Select)
        .with_label("Health fund")
        .with_data_key("healthFund");

    let result = run(&page, &step, json!({"healthFund": "Maccabi"})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["option"], "02");
    assert_eq!(value_of(&page, "#fund"), "02");
}

#[tokio::test]
async fn native_select_without_match_fails_unless_fallback_allowed() {
    let page = MemoryPage::from_html(FUND);
    let mut step = Step::new("fund", StepKind::Select)
        .with_label("Health fund")
        .with_data_key("healthFund");

    let result = run(&page, &step, json!({"healthFund": "Leumit"})).await;
    assert_eq!(result.reason, Some(ReasonCode::OptionNotFound));

    step.options.fallback_first_option = true;
    let result = run(&page, &step, json!({"healthFund": "Leumit"})).await;
    assert!(result.success);
    assert_eq!(value_of(&page, "#fund"), "01");
}

const ADDRESS: &str = r#"
<div class="form-group"><label for="city">City</label><input id="city" role="combobox"></div>
<div class="form-group"><label for="street">Street</label><input id="street" data-options-count="0"></div>
<ul id="city-options" hidden>
  <li class="option" role="option">Tel Aviv</li>
  <li class="option" role="option">Haifa</li>
</ul>
"#;

fn address_page(populates_street: bool) -> MemoryPage {
    let page = MemoryPage::from_html(ADDRESS);
    page.on_click("#city", |tree, _| {
        if let Some(list) = tree.find("#city-options") {
            tree.remove_attr(list, "hidden");
        }
    });
    page.on_click("li.option", move |tree, _| {
        if let Some(list) = tree.find("#city-options") {
            tree.set_attr(list, "hidden", "");
        }
        if populates_street {
            if let Some(street) = tree.find("#street") {
                tree.set_attr(street, "data-options-count", "12");
            }
        }
    });
    page
}

fn city_step() -> Step {
    Step::new("city", StepKind::Select)
        .with_label("City")
        .with_data_key("city")
        .with_options(StepOptions {
            searchable: true,
            dependent: Some(DependentDropdown {
                name: "street".into(),
                selector: "#street".into(),
                state_attr: "data-options-count".into(),
            }),
            ..StepOptions::default()
        })
}

#[tokio::test(start_paused = true)]
async fn searchable_select_waits_for_dependent_dropdown() {
    let page = address_page(true);

    let result = run(&page, &city_step(), json!({"city": "Haifa"})).await;
    assert!(result.success, "{:?}", result);
    assert_eq!(result.diagnostics["match"], "exact");
    assert_eq!(result.diagnostics["dependent"], "street");
    assert_eq!(value_of(&page, "#city"), "Haifa");
}

#[tokio::test(start_paused = true)]
async fn unpopulated_dependent_dropdown_is_a_timing_failure() {
    let page = address_page(false);

    let result = run(&page, &city_step(), json!({"city": "Haifa"})).await;
    assert_eq!(
        result.reason,
        Some(ReasonCode::DropdownNotPopulated("street".into()))
    );
    assert_eq!(
        result.reason.unwrap().as_str(),
        "street_dropdown_not_populated"
    );
}

#[tokio::test(start_paused = true)]
async fn searchable_select_reports_unopened_dropdown() {
    let page = MemoryPage::from_html(ADDRESS);
    let mut step = city_step();
    step.options.dependent = None;

    let result = run(&page, &step, json!({"city": "Haifa"})).await;
    assert_eq!(result.reason, Some(ReasonCode::DropdownNotOpened));
}

#[tokio::test]
async fn checkbox_group_ticks_each_listed_value() {
    let page = MemoryPage::from_html(
        r#"
<div class="form-group">
  <span>Reason for the claim</span>
  <div class="checkbox"><input type="checkbox" id="r1" value="pain"><label for="r1">Pain</label><span class="checkmark"></span></div>
  <div class="checkbox"><input type="checkbox" id="r2" value="fever"><label for="r2">Fever</label><span class="checkmark"></span></div>
  <div class="checkbox"><input type="checkbox" id="r3" value="other"><label for="r3">Other</label><span class="checkmark"></span></div>
</div>
"#,
    );
    // The styled indicator is what the hosted form actually listens to.
    page.on_click(".checkmark", |tree, indicator| {
        if let Some(wrapper) = tree.parent_element(indicator) {
            if let Some(input) = tree.select(Some(wrapper), "input").unwrap_or_default().first() {
                let now = tree.is_checked(*input);
                tree.set_checked(*input, !now);
            }
        }
    });
    let step = Step::new("reasons", StepKind::CheckboxMulti)
        .with_label("Reason for the claim")
        .with_data_key("reasons");

    let result = run(&page, &step, json!({"reasons": ["Pain", "fever", "Dizziness"]})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["succeeded"], 2);
    assert_eq!(result.diagnostics["total"], 3);
    assert_eq!(result.diagnostics["items"]["Pain"], "indicator");
    assert_eq!(result.diagnostics["items"]["Dizziness"], "not_found");
    assert!(checked(&page, "#r1"));
    assert!(checked(&page, "#r2"));
    assert!(!checked(&page, "#r3"));
}

#[tokio::test]
async fn checkbox_group_already_ticked_is_left_alone() {
    let page = MemoryPage::from_html(
        r#"
<div class="form-group">
  <span>Reason for the claim</span>
  <div class="checkbox"><input type="checkbox" id="r1" value="pain" checked><label for="r1">Pain</label></div>
  <div class="checkbox"><input type="checkbox" id="r2" value="fever" checked><label for="r2">Fever</label></div>
  <div class="checkbox"><input type="checkbox" id="r3" value="other"><label for="r3">Other</label></div>
</div>
"#,
    );
    let step = Step::new("reasons", StepKind::CheckboxMulti)
        .with_label("Reason for the claim")
        .with_data_key("reasons");

    let result = run(&page, &step, json!({"reasons": ["Pain", "Fever"]})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["already"], true);
    assert_eq!(result.diagnostics["items"]["Pain"], "already");
    assert_eq!(result.diagnostics["items"]["Fever"], "already");
    assert!(!checked(&page, "#r3"));
    assert!(page.read(|tree| tree.events().is_empty()));
}

#[tokio::test(start_paused = true)]
async fn multi_select_picks_every_value() {
    let page = MemoryPage::from_html(
        r#"
<div class="form-group"><label for="spec">Treating specialties</label><input id="spec"></div>
<ul id="spec-options" hidden>
  <li role="option">Cardiology</li>
  <li role="option">Neurology</li>
  <li role="option">Orthopedics</li>
</ul>
"#,
    );
    page.on_click("#spec", |tree, _| {
        if let Some(list) = tree.find("#spec-options") {
            tree.remove_attr(list, "hidden");
        }
    });
    let step = Step::new("spec", StepKind::MultiSelect)
        .with_label("Treating specialties")
        .with_data_key("specialties");

    let result = run(&page, &step, json!({"specialties": ["Neurology", "cardio"]})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["succeeded"], 2);
    assert_eq!(result.diagnostics["items"]["Neurology"], "exact");
    assert_eq!(result.diagnostics["items"]["cardio"], "contains");
}

fn next_page(changes_on: usize) -> (MemoryPage, Arc<AtomicUsize>) {
    let page = MemoryPage::from_html(r#"<button id="next">Next</button><div id="stage">Step 1</div>"#);
    let clicks = Arc::new(AtomicUsize::new(0));
    let counter = clicks.clone();
    page.on_click("#next", move |tree, _| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count == changes_on {
            if let Some(stage) = tree.find("#stage") {
                tree.set_text(stage, "Step 2");
            }
        }
    });
    (page, clicks)
}

fn next_step() -> Step {
    Step::new("next", StepKind::Button)
        .with_label("Next")
        .with_options(StepOptions {
            retry: Some(RetrySpec {
                max_attempts: 3,
                interval_ms: 500,
            }),
            ..StepOptions::default()
        })
}

#[tokio::test(start_paused = true)]
async fn button_retries_until_the_page_advances() {
    let (page, clicks) = next_page(2);

    let result = run(&page, &next_step(), json!({})).await;
    assert!(result.success);
    assert_eq!(result.diagnostics["attempts"], 2);
    assert_eq!(clicks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn button_that_never_advances_fails_after_all_attempts() {
    let (page, clicks) = next_page(usize::MAX);

    let result = run(&page, &next_step(), json!({})).await;
    assert_eq!(result.reason, Some(ReasonCode::ButtonClickFailed));
    assert_eq!(clicks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_button_is_reported() {
    let (page, _) = next_page(1);
    let step = Step::new("finish", StepKind::Button).with_label("Finish");

    let result = run(&page, &step, json!({})).await;
    assert_eq!(result.reason, Some(ReasonCode::ButtonNotFound));
}
