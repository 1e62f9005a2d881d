//! Client-side App helpers: input ordering, editor hints, form state and
//! validation, search and model preselection.

use std::collections::BTreeMap;

use crate::error::HatzError;
use crate::types::{App, Model, UserInput};

/// Model used when nothing better is known.
pub const FALLBACK_MODEL: &str = "gpt-4o";

const MULTI_LINE_HINTS: [&str; 4] = ["long", "paragraph", "text_area", "multiline"];

/// Editor suited to a [`UserInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    SingleLine,
    MultiLine,
}

impl InputKind {
    /// Derives the editor from the free-form `variable_type`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::apps::InputKind;
    ///
    /// assert_eq!(InputKind::for_variable_type("LONG_TEXT"), InputKind::MultiLine);
    /// assert_eq!(InputKind::for_variable_type("string"), InputKind::SingleLine);
    /// ```
    pub fn for_variable_type(variable_type: &str) -> Self {
        let lower = variable_type.to_lowercase();
        if MULTI_LINE_HINTS.iter().any(|hint| lower.contains(hint)) {
            Self::MultiLine
        } else {
            Self::SingleLine
        }
    }
}

impl UserInput {
    pub fn kind(&self) -> InputKind {
        InputKind::for_variable_type(&self.variable_type)
    }
}

/// User inputs in presentation order (ascending `position`, ties keep declared order).
pub fn ordered_inputs(app: &App) -> Vec<&UserInput> {
    let mut inputs: Vec<&UserInput> = app.user_inputs.iter().collect();
    inputs.sort_by_key(|input| input.position);
    inputs
}

/// Case-insensitive search over App names and descriptions.
pub fn filter_apps<'a>(apps: &'a [App], query: &str) -> Vec<&'a App> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return apps.iter().collect();
    }
    apps.iter()
        .filter(|app| {
            app.name.to_lowercase().contains(&query)
                || app
                    .description
                    .as_deref()
                    .is_some_and(|description| description.to_lowercase().contains(&query))
        })
        .collect()
}

/// Chooses the model to preselect when an App is opened.
///
/// Order: the App default if it is available, the last used model if it is
/// available, the first available model, then the App default or [`FALLBACK_MODEL`].
pub fn preselect_model(
    app_default: Option<&str>,
    last_used: Option<&str>,
    available: &[Model],
) -> String {
    let is_available = |name: &str| available.iter().any(|model| model.name == name);
    app_default
        .filter(|name| is_available(*name))
        .or_else(|| last_used.filter(|name| is_available(*name)))
        .or_else(|| available.first().map(|model| model.name.as_str()))
        .or(app_default)
        .unwrap_or(FALLBACK_MODEL)
        .to_string()
}

/// Values typed into an App's inputs, keyed by `variable_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppForm {
    values: BTreeMap<String, String>,
}

impl AppForm {
    /// Creates a form for `app`, carrying over values from `previous` for keys the
    /// App still declares. Every declared key is present, empty when new.
    pub fn for_app(app: &App, previous: Option<&AppForm>) -> Self {
        let values = app
            .user_inputs
            .iter()
            .map(|input| {
                let carried = previous
                    .and_then(|form| form.get(&input.variable_name))
                    .unwrap_or_default();
                (input.variable_name.clone(), carried.to_string())
            })
            .collect();
        Self { values }
    }

    pub fn set(&mut self, variable_name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(variable_name.into(), value.into());
    }

    pub fn get(&self, variable_name: &str) -> Option<&str> {
        self.values.get(variable_name).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, String> {
        self.values
    }

    /// Checks that every required input has a non-blank value.
    ///
    /// # Errors
    ///
    /// Returns [`HatzError::Validation`] naming the first missing input in declared
    /// order.
    pub fn validate(&self, app: &App) -> Result<(), HatzError> {
        let missing = app.user_inputs.iter().find(|input| {
            input.required
                && self
                    .get(&input.variable_name)
                    .is_none_or(|value| value.trim().is_empty())
        });
        match missing {
            Some(input) => Err(HatzError::validation(format!(
                "Missing required input: {}",
                input.display_name
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(position: i64, required: bool, name: &str, kind: &str) -> UserInput {
        UserInput {
            position,
            required,
            object_id: format!("obj-{name}"),
            description: String::new(),
            display_name: name.to_uppercase(),
            variable_name: name.to_string(),
            variable_type: kind.to_string(),
        }
    }

    fn app(name: &str, description: Option<&str>, inputs: Vec<UserInput>) -> App {
        App {
            id: "9b2f3c44-1d2e-4f5a-8b6c-7d8e9f0a1b2c".to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            default_model: None,
            files: Vec::new(),
            constants: None,
            user_inputs: inputs,
            prompt_sections: Vec::new(),
        }
    }

    fn model(name: &str) -> Model {
        Model {
            name: name.to_string(),
            developer: "dev".to_string(),
            display_name: name.to_string(),
            max_tokens: 8192,
            vision: false,
        }
    }

    #[test]
    fn inputs_are_ordered_by_position() {
        let app = app(
            "A",
            None,
            vec![
                input(3, false, "c", "string"),
                input(1, false, "a", "string"),
                input(2, false, "b", "string"),
            ],
        );
        let names: Vec<_> = ordered_inputs(&app)
            .into_iter()
            .map(|input| input.variable_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn multi_line_hints_are_detected() {
        for hint in ["paragraph", "Text_Area", "multiline_string", "longtext"] {
            assert_eq!(InputKind::for_variable_type(hint), InputKind::MultiLine, "{hint}");
        }
        assert_eq!(input(0, false, "x", "number").kind(), InputKind::SingleLine);
    }

    #[test]
    fn validate_reports_first_missing_required_input() {
        let app = app(
            "A",
            None,
            vec![
                input(1, false, "optional", "string"),
                input(2, true, "topic", "string"),
                input(3, true, "tone", "string"),
            ],
        );
        let mut form = AppForm::for_app(&app, None);
        form.set("tone", "formal");
        form.set("topic", "   ");
        let err = form.validate(&app).expect_err("topic is blank");
        assert_eq!(err.to_string(), "Missing required input: TOPIC");

        form.set("topic", "rust");
        form.validate(&app).expect("all required inputs present");
    }

    #[test]
    fn form_carries_over_only_declared_keys() {
        let first = app("A", None, vec![input(1, true, "topic", "string")]);
        let mut previous = AppForm::for_app(&first, None);
        previous.set("topic", "rust");
        previous.set("stale", "drop me");

        let second = app(
            "B",
            None,
            vec![input(1, true, "topic", "string"), input(2, false, "tone", "string")],
        );
        let form = AppForm::for_app(&second, Some(&previous));
        assert_eq!(form.get("topic"), Some("rust"));
        assert_eq!(form.get("tone"), Some(""));
        assert_eq!(form.get("stale"), None);
    }

    #[test]
    fn filter_matches_name_or_description() {
        let apps = vec![
            app("Email Writer", Some("Drafts replies"), Vec::new()),
            app("Summarizer", Some("Condenses EMAIL threads"), Vec::new()),
            app("Translator", None, Vec::new()),
        ];
        assert_eq!(filter_apps(&apps, "  email ").len(), 2);
        assert_eq!(filter_apps(&apps, "").len(), 3);
        assert!(filter_apps(&apps, "nothing").is_empty());
    }

    #[test]
    fn preselect_model_follows_priority() {
        let available = vec![model("claude"), model("gpt-4o-mini")];
        assert_eq!(
            preselect_model(Some("gpt-4o-mini"), Some("claude"), &available),
            "gpt-4o-mini"
        );
        assert_eq!(
            preselect_model(Some("unknown"), Some("claude"), &available),
            "claude"
        );
        assert_eq!(preselect_model(Some("unknown"), None, &available), "claude");
        assert_eq!(preselect_model(Some("unknown"), None, &[]), "unknown");
        assert_eq!(preselect_model(None, None, &[]), FALLBACK_MODEL);
    }
}
