//! Client-side validation rules.

use super::FormState;

/// One validation rule. Rules are checked in declaration order and the
/// first failure wins.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Every listed text field must be non-blank.
    Required {
        fields: &'static [&'static str],
        message: &'static str,
    },
    /// Every listed file field must hold a blob.
    RequiredFiles {
        fields: &'static [&'static str],
        message: &'static str,
    },
    /// A non-blank field must pass `check`. Blank values are left to
    /// [`Rule::Required`].
    Format {
        field: &'static str,
        check: fn(&str) -> bool,
        message: &'static str,
    },
}

impl Rule {
    fn check(&self, state: &FormState) -> Option<&'static str> {
        match *self {
            Rule::Required { fields, message } => fields
                .iter()
                .any(|field| state.text(field).trim().is_empty())
                .then_some(message),
            Rule::RequiredFiles { fields, message } => fields
                .iter()
                .any(|field| state.file(field).is_none())
                .then_some(message),
            Rule::Format {
                field,
                check,
                message,
            } => {
                let value = state.text(field).trim();
                (!value.is_empty() && !check(value)).then_some(message)
            }
        }
    }
}

/// Returns the first failing rule's message, or `None` when the state is
/// valid. Pure: never touches the network or the session.
pub fn validate(rules: &[Rule], state: &FormState) -> Option<String> {
    rules
        .iter()
        .find_map(|rule| rule.check(state))
        .map(str::to_string)
}
