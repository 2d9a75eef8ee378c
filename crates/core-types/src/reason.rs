//! Failure reason taxonomy reported in step results.

use std::fmt;

use serde::{Deserialize, Serialize};

const DROPDOWN_NOT_POPULATED_SUFFIX: &str = "_dropdown_not_populated";

/// Why a step failed (or, for a few codes, why it only partly succeeded).
///
/// Serialized as the snake_case code string so results stay readable for the
/// supervising context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonCode {
    // Locator failures
    ContainerNotFound,
    SectionNotFound,
    LabelNotFound,
    SelectNotFound,
    InputNotFound,
    ButtonNotFound,
    CheckboxNotFound,
    RadioNotFound,

    // Interaction failures
    ClickFailed,
    LabelClickFailed,
    ButtonClickFailed,
    OptionClickFailed,
    AddSectionFailed,
    NoMethodSucceeded,

    // Value resolution failures
    MissingValue,
    NoMatchingValue,
    ValueNotAllowed,
    OptionNotFound,
    OptionNotFoundAfterTyping,

    // Timing failures
    DropdownNotOpened,
    /// A dependent dropdown named by the flow never populated.
    DropdownNotPopulated(String),
    UploadTimeout,

    // Terminal failures
    UnknownType,
    Exception,

    /// Codes produced by newer flow definitions that this build does not know.
    Other(String),
}

impl ReasonCode {
    pub fn as_str(&self) -> String {
        let code = match self {
            ReasonCode::ContainerNotFound => "container_not_found",
            ReasonCode::SectionNotFound => "section_not_found",
            ReasonCode::LabelNotFound => "label_not_found",
            ReasonCode::SelectNotFound => "select_not_found",
            ReasonCode::InputNotFound => "input_not_found",
            ReasonCode::ButtonNotFound => "button_not_found",
            ReasonCode::CheckboxNotFound => "checkbox_not_found",
            ReasonCode::RadioNotFound => "radio_not_found",
            ReasonCode::ClickFailed => "click_failed",
            ReasonCode::LabelClickFailed => "label_click_failed",
            ReasonCode::ButtonClickFailed => "button_click_failed",
            ReasonCode::OptionClickFailed => "option_click_failed",
            ReasonCode::AddSectionFailed => "add_section_failed",
            ReasonCode::NoMethodSucceeded => "no_method_succeeded",
            ReasonCode::MissingValue => "missing_value",
            ReasonCode::NoMatchingValue => "no_matching_value",
            ReasonCode::ValueNotAllowed => "value_not_allowed",
            ReasonCode::OptionNotFound => "option_not_found",
            ReasonCode::OptionNotFoundAfterTyping => "option_not_found_after_typing",
            ReasonCode::DropdownNotOpened => "dropdown_not_opened",
            ReasonCode::DropdownNotPopulated(name) => {
                return format!("{name}{DROPDOWN_NOT_POPULATED_SUFFIX}")
            }
            ReasonCode::UploadTimeout => "upload_timeout",
            ReasonCode::UnknownType => "unknown_type",
            ReasonCode::Exception => "exception",
            ReasonCode::Other(code) => return code.clone(),
        };
        code.to_string()
    }

    /// Locator failures mean the form did not render what the flow expects.
    pub fn is_locator_failure(&self) -> bool {
        matches!(
            self,
            ReasonCode::ContainerNotFound
                | ReasonCode::SectionNotFound
                | ReasonCode::LabelNotFound
                | ReasonCode::SelectNotFound
                | ReasonCode::InputNotFound
                | ReasonCode::ButtonNotFound
                | ReasonCode::CheckboxNotFound
                | ReasonCode::RadioNotFound
        )
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<ReasonCode> for String {
    fn from(code: ReasonCode) -> Self {
        code.as_str()
    }
}

impl From<String> for ReasonCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "container_not_found" => ReasonCode::ContainerNotFound,
            "section_not_found" => ReasonCode::SectionNotFound,
            "label_not_found" => ReasonCode::LabelNotFound,
            "select_not_found" => ReasonCode::SelectNotFound,
            "input_not_found" => ReasonCode::InputNotFound,
            "button_not_found" => ReasonCode::ButtonNotFound,
            "checkbox_not_found" => ReasonCode::CheckboxNotFound,
            "radio_not_found" => ReasonCode::RadioNotFound,
            "click_failed" => ReasonCode::ClickFailed,
            "label_click_failed" => ReasonCode::LabelClickFailed,
            "button_click_failed" => ReasonCode::ButtonClickFailed,
            "option_click_failed" => ReasonCode::OptionClickFailed,
            "add_section_failed" => ReasonCode::AddSectionFailed,
            "no_method_succeeded" => ReasonCode::NoMethodSucceeded,
            "missing_value" => ReasonCode::MissingValue,
            "no_matching_value" => ReasonCode::NoMatchingValue,
            "value_not_allowed" => ReasonCode::ValueNotAllowed,
            "option_not_found" => ReasonCode::OptionNotFound,
            "option_not_found_after_typing" => ReasonCode::OptionNotFoundAfterTyping,
            "dropdown_not_opened" => ReasonCode::DropdownNotOpened,
            "upload_timeout" => ReasonCode::UploadTimeout,
            "unknown_type" => ReasonCode::UnknownType,
            "exception" => ReasonCode::Exception,
            other => match other.strip_suffix(DROPDOWN_NOT_POPULATED_SUFFIX) {
                Some(name) if !name.is_empty() => ReasonCode::DropdownNotPopulated(name.to_string()),
                _ => ReasonCode::Other(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependent_dropdown_code_carries_name() {
        let code = ReasonCode::DropdownNotPopulated("branch".into());
        assert_eq!(code.to_string(), "branch_dropdown_not_populated");
        assert_eq!(ReasonCode::from(code.to_string()), code);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&ReasonCode::OptionNotFoundAfterTyping).unwrap();
        assert_eq!(json, "\"option_not_found_after_typing\"");
        let back: ReasonCode = serde_json::from_str("\"unknown_type\"").unwrap();
        assert_eq!(back, ReasonCode::UnknownType);
    }

    #[test]
    fn unknown_codes_round_trip_as_other() {
        let code = ReasonCode::from("something_new".to_string());
        assert_eq!(code, ReasonCode::Other("something_new".into()));
        assert_eq!(code.to_string(), "something_new");
    }
}
