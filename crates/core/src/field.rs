//! Field Specifications
//!
//! Static description of one question: its name, whether it is required,
//! the rule its literal value must satisfy and an optional gating field.
//! Field specs are defined at wizard-design time and never persisted.

use serde::{Deserialize, Serialize};

use crate::classifier::{classify, Classification};
use crate::error::{CoreError, CoreResult};

/// Whether a question may be left blank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
}

/// One allowed option of a choice field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Canonical value stored in the data record
    pub value: String,
    /// Display label
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    fn matches(&self, input: &str) -> bool {
        let needle = fold(input);
        !needle.is_empty() && (fold(&self.value) == needle || fold(&self.label) == needle)
    }
}

/// Validation rule applied to literal answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Any non-empty text
    Text,
    /// Text with at least `min` characters
    MinLength { min: usize },
    /// A number greater than or equal to zero
    NonNegativeNumber,
    /// A number within an inclusive range
    NumberRange { min: f64, max: f64 },
    /// One of a fixed set of options, matched case/format-insensitively
    Choice { options: Vec<Choice> },
    /// An explicit yes or no
    YesNo,
    /// An http(s) link
    Url,
}

impl Rule {
    /// Check a literal answer and return its canonical stored value.
    pub fn check(&self, label: &str, literal: &str) -> CoreResult<String> {
        let literal = literal.trim();
        match self {
            Self::Text => {
                if literal.is_empty() {
                    return Err(CoreError::validation(format!("{} cannot be empty", label)));
                }
                Ok(literal.to_string())
            }
            Self::MinLength { min } => {
                let len = literal.chars().count();
                if len < *min {
                    return Err(CoreError::validation(format!(
                        "{} needs at least {} characters (got {})",
                        label, min, len
                    )));
                }
                Ok(literal.to_string())
            }
            Self::NonNegativeNumber => {
                let (cleaned, number) = parse_number(label, literal)?;
                if number < 0.0 {
                    return Err(CoreError::validation(format!(
                        "{} cannot be negative",
                        label
                    )));
                }
                Ok(cleaned)
            }
            Self::NumberRange { min, max } => {
                let (cleaned, number) = parse_number(label, literal)?;
                if number < *min || number > *max {
                    return Err(CoreError::validation(format!(
                        "{} must be between {} and {}",
                        label, min, max
                    )));
                }
                Ok(cleaned)
            }
            Self::Choice { options } => options
                .iter()
                .find(|option| option.matches(literal))
                .map(|option| option.value.clone())
                .ok_or_else(|| {
                    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                    CoreError::validation(format!(
                        "{} must be one of: {}",
                        label,
                        labels.join(", ")
                    ))
                }),
            Self::YesNo => match classify(literal) {
                Classification::Affirmative => Ok("yes".to_string()),
                Classification::Skip if !literal.is_empty() => Ok("no".to_string()),
                _ => Err(CoreError::validation(format!(
                    "Please answer yes or no for {}",
                    label
                ))),
            },
            Self::Url => {
                let candidate = if literal.contains("://") {
                    literal.to_string()
                } else {
                    format!("https://{}", literal)
                };
                match url::Url::parse(&candidate) {
                    Ok(parsed)
                        if matches!(parsed.scheme(), "http" | "https")
                            && parsed.host_str().map_or(false, |h| h.contains('.')) =>
                    {
                        Ok(literal.to_string())
                    }
                    _ => Err(CoreError::validation(format!(
                        "{} must be a valid link",
                        label
                    ))),
                }
            }
        }
    }
}

/// Result of resolving a raw answer against a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Value written to the data record
    pub value: String,
    /// Whether the field was satisfied by a skip
    pub skipped: bool,
}

/// Static description of one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, embedded in the question key
    pub name: String,
    /// Short display label used in validation messages
    pub label: String,
    pub requirement: Requirement,
    pub rule: Rule,
    /// Only ask this field when the named earlier field has a value
    #[serde(default)]
    pub shown_if: Option<String>,
}

impl FieldSpec {
    /// A required field
    pub fn required(name: impl Into<String>, label: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            requirement: Requirement::Required,
            rule,
            shown_if: None,
        }
    }

    /// An optional (skippable) field
    pub fn optional(name: impl Into<String>, label: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            requirement: Requirement::Optional,
            rule,
            shown_if: None,
        }
    }

    /// Gate this field on an earlier field having a value
    pub fn shown_if(mut self, source: impl Into<String>) -> Self {
        self.shown_if = Some(source.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }

    /// Resolve a raw answer into the value to store.
    ///
    /// Required fields only accept literal values that pass the rule, except
    /// yes/no fields where the commands are the answer. Optional fields treat
    /// a skip (or blank input) as satisfied with an empty value.
    pub fn resolve(&self, raw: &str) -> CoreResult<Resolved> {
        let classification = classify(raw);

        if self.rule == Rule::YesNo {
            return self.resolve_yes_no(&classification, raw);
        }

        match (classification, self.requirement) {
            (Classification::Literal(text), _) => Ok(Resolved {
                value: self.rule.check(&self.label, &text)?,
                skipped: false,
            }),
            (Classification::Skip, Requirement::Optional) => Ok(Resolved {
                value: String::new(),
                skipped: true,
            }),
            (Classification::Affirmative, Requirement::Optional) => Ok(Resolved {
                value: self.rule.check(&self.label, raw)?,
                skipped: false,
            }),
            (Classification::Skip, Requirement::Required) => Err(CoreError::validation(format!(
                "{} is required and cannot be skipped",
                self.label
            ))),
            (Classification::Affirmative, Requirement::Required) => {
                Err(CoreError::validation(format!(
                    "{} needs an actual answer, not '{}'",
                    self.label,
                    raw.trim()
                )))
            }
        }
    }

    fn resolve_yes_no(&self, classification: &Classification, raw: &str) -> CoreResult<Resolved> {
        match classification {
            Classification::Affirmative => Ok(Resolved {
                value: "yes".to_string(),
                skipped: false,
            }),
            Classification::Skip if raw.trim().is_empty() && self.is_required() => {
                Err(CoreError::validation(format!(
                    "Please answer yes or no for {}",
                    self.label
                )))
            }
            Classification::Skip => Ok(Resolved {
                value: if raw.trim().is_empty() {
                    String::new()
                } else {
                    "no".to_string()
                },
                skipped: !self.is_required(),
            }),
            Classification::Literal(_) => Err(CoreError::validation(format!(
                "Please answer yes or no for {}",
                self.label
            ))),
        }
    }

    /// Check an already-stored value, as the Finalizer does for items.
    pub fn accepts_stored(&self, value: &str) -> bool {
        if value.trim().is_empty() {
            return !self.is_required();
        }
        self.rule.check(&self.label, value).is_ok()
    }
}

/// Fold text for case/format-insensitive matching: lowercase alphanumerics only.
fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_number(label: &str, literal: &str) -> CoreResult<(String, f64)> {
    let cleaned: String = literal
        .trim_start_matches(['$', '\u{20ac}', '\u{a3}'].as_slice())
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok((cleaned, number)),
        _ => Err(CoreError::validation(format!(
            "{} must be a number (got '{}')",
            label, literal
        ))),
    }
}
