use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};

use crate::error::DispatchError;

/// Render a brain's prompt template.
///
/// The template sees `input` plus every key in `vars`; `input` wins on a
/// clash. Undefined variables are errors rather than empty strings.
pub fn render(
    template: &str,
    input: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, DispatchError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let mut context: BTreeMap<&str, &str> = vars
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    context.insert("input", input);

    env.render_str(template, context)
        .map_err(|e| DispatchError::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_input_and_vars() {
        let rendered = render(
            "Horizon {{ horizon }}. Data: {{ input }}",
            "{\"a\":1}",
            &vars(&[("horizon", "1-3 months")]),
        )
        .unwrap();
        assert_eq!(rendered, "Horizon 1-3 months. Data: {\"a\":1}");
    }

    #[test]
    fn missing_variable_is_template_error() {
        let err = render("{{ input }} for {{ ticker }}", "x", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Template(_)));
    }

    #[test]
    fn syntax_error_is_template_error() {
        let err = render("{{ input ", "x", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Template(_)));
    }

    #[test]
    fn input_is_not_html_escaped() {
        let rendered = render("{{ input }}", "<b>&</b>", &BTreeMap::new()).unwrap();
        assert_eq!(rendered, "<b>&</b>");
    }
}
