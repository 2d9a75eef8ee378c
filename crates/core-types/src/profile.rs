//! Markup conventions of the hosted form
//!
//! These are the form-wide idiosyncrasies that are not worth repeating in
//! every step: how the hosted UI renders option lists, custom checkbox
//! indicators, repeated record sections, upload widgets and the
//! confirmation page. Step options override them where both exist.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormProfile {
    /// Containers that carry a visible section title.
    pub section_selector: String,
    /// Nearest wrapper around a single question (label + control).
    pub field_container_selector: String,
    /// Rendered options of a searchable dropdown.
    pub option_selector: String,
    pub checkbox_indicator_selector: String,
    pub checkbox_wrapper_selector: String,
    /// One repeated record section (e.g. one disease entry).
    pub record_section_selector: String,
    /// Visible text of the control that appends a record section.
    pub add_record_text: String,
    pub add_document_text: String,
    pub upload_input_selector: String,
    pub upload_file_name_selector: String,
    pub upload_file_size_selector: String,
    pub upload_busy_selector: String,
    /// Address fragments that only appear once the form was submitted.
    pub success_url_markers: Vec<String>,
    /// Pattern whose first capture group is the confirmation number.
    pub confirmation_pattern: String,
    /// Tag categories searched when locating by visible text.
    pub text_candidate_tags: Vec<String>,
    /// Stable attribute selectors for text inputs, keyed by payload key.
    pub input_selectors: HashMap<String, String>,
}

impl Default for FormProfile {
    fn default() -> Self {
        Self {
            section_selector: "fieldset, section, .form-section, [role=\"group\"]".to_string(),
            field_container_selector: ".form-group, .field, .question, fieldset".to_string(),
            option_selector: "[role=\"option\"], .dropdown-item, li.option".to_string(),
            checkbox_indicator_selector: ".checkmark, .custom-control-indicator".to_string(),
            checkbox_wrapper_selector: ".checkbox, .form-check, .custom-checkbox".to_string(),
            record_section_selector: "[data-record-section]".to_string(),
            add_record_text: "הוספת מחלה".to_string(),
            add_document_text: "הוספת מסמך".to_string(),
            upload_input_selector: "input[type=\"file\"]".to_string(),
            upload_file_name_selector: ".file-name".to_string(),
            upload_file_size_selector: ".file-size".to_string(),
            upload_busy_selector: ".uploading, .spinner, [aria-busy=\"true\"]".to_string(),
            success_url_markers: vec!["gbxid=success".to_string()],
            confirmation_pattern: r"(?:מספר\s*(?:בקשה|פנייה)|Request\s*number)\s*[:：]?\s*(\d{4,})"
                .to_string(),
            text_candidate_tags: [
                "label", "span", "div", "p", "legend", "h1", "h2", "h3", "h4", "h5", "h6",
                "button", "a", "li", "td", "strong",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            input_selectors: HashMap::new(),
        }
    }
}
