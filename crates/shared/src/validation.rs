//! Typed field constraints for article input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{domain::ArticleStatus, error::FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Text,
    Url,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub max_chars: Option<usize>,
    pub format: FieldFormat,
}

impl FieldRule {
    /// Checks one already-normalized value, returning the first violation.
    pub fn check(&self, value: Option<&str>) -> Option<String> {
        let label = label(self.field);
        let Some(value) = value else {
            return self
                .required
                .then(|| format!("The {label} field is required."));
        };

        if let Some(max) = self.max_chars {
            if value.chars().count() > max {
                return Some(format!(
                    "The {label} field must not be greater than {max} characters."
                ));
            }
        }

        match self.format {
            FieldFormat::Text => None,
            FieldFormat::Url => {
                (!is_absolute_url(value)).then(|| format!("The {label} field must be a valid URL."))
            }
            FieldFormat::OneOf(allowed) => {
                (!allowed.contains(&value)).then(|| format!("The selected {label} is invalid."))
            }
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).map(|url| url.has_host()).unwrap_or(false)
}

const STATUS_VALUES: &[&str] = &["draft", "published", "archived"];

/// Constraints for every field of the article creation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleRules {
    pub title: FieldRule,
    pub excerpt: FieldRule,
    pub content: FieldRule,
    pub featured_image: FieldRule,
    pub status: FieldRule,
}

impl Default for ArticleRules {
    fn default() -> Self {
        Self {
            title: FieldRule {
                field: "title",
                required: true,
                max_chars: Some(255),
                format: FieldFormat::Text,
            },
            excerpt: FieldRule {
                field: "excerpt",
                required: false,
                max_chars: Some(500),
                format: FieldFormat::Text,
            },
            content: FieldRule {
                field: "content",
                required: true,
                max_chars: None,
                format: FieldFormat::Text,
            },
            featured_image: FieldRule {
                field: "featured_image",
                required: false,
                max_chars: None,
                format: FieldFormat::Url,
            },
            status: FieldRule {
                field: "status",
                required: true,
                max_chars: None,
                format: FieldFormat::OneOf(STATUS_VALUES),
            },
        }
    }
}

/// Raw creation form as submitted by the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleForm {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub featured_image: Option<String>,
    pub status: Option<String>,
}

impl ArticleForm {
    /// Reads the form out of an arbitrary JSON body.
    ///
    /// Fields that are present but not strings are left unset and reported;
    /// unknown keys are ignored and a non-object body reads as an empty form.
    pub fn from_json(body: &Value) -> (Self, FieldErrors) {
        let mut errors = FieldErrors::new();
        let mut read = |field: &'static str| match body.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                errors.add(field, format!("The {} field must be a string.", label(field)));
                None
            }
        };
        let form = Self {
            title: read("title"),
            excerpt: read("excerpt"),
            content: read("content"),
            featured_image: read("featured_image"),
            status: read("status"),
        };
        (form, errors)
    }
}

/// Article fields that passed [`ArticleRules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub status: ArticleStatus,
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ArticleRules {
    /// Validates every field of `form` and reports all violations at once.
    pub fn validate(&self, form: &ArticleForm) -> Result<ArticleInput, FieldErrors> {
        let title = normalize(form.title.as_deref());
        let excerpt = normalize(form.excerpt.as_deref());
        let content = normalize(form.content.as_deref());
        let featured_image = normalize(form.featured_image.as_deref());
        let status = normalize(form.status.as_deref());

        let mut errors = FieldErrors::new();
        for (rule, value) in [
            (&self.title, title),
            (&self.excerpt, excerpt),
            (&self.content, content),
            (&self.featured_image, featured_image),
            (&self.status, status),
        ] {
            if let Some(message) = rule.check(value) {
                errors.add(rule.field, message);
            }
        }

        let parsed_status = status.and_then(|s| s.parse::<ArticleStatus>().ok());
        match (title, content, parsed_status) {
            (Some(title), Some(content), Some(status)) if errors.is_empty() => Ok(ArticleInput {
                title: title.to_string(),
                slug: None,
                excerpt: excerpt.map(str::to_string),
                content: content.to_string(),
                featured_image: featured_image.map(str::to_string),
                status,
            }),
            _ => {
                if errors.is_empty() {
                    errors.add(self.status.field, "The selected status is invalid.");
                }
                Err(errors)
            }
        }
    }

    /// [`Self::validate`] for a raw JSON body. A wrongly typed field is
    /// reported instead of whatever rule its missing value would break.
    pub fn validate_json(&self, body: &Value) -> Result<ArticleInput, FieldErrors> {
        let (form, mut errors) = ArticleForm::from_json(body);
        match self.validate(&form) {
            Ok(input) => errors.into_result(input),
            Err(rule_errors) => {
                for (field, message) in rule_errors.iter() {
                    errors.add(field, message);
                }
                Err(errors)
            }
        }
    }

    /// Re-checks an input that may not have come through [`Self::validate`].
    pub fn check(&self, input: &ArticleInput) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (rule, value) in [
            (&self.title, normalize(Some(input.title.as_str()))),
            (&self.excerpt, normalize(input.excerpt.as_deref())),
            (&self.content, normalize(Some(input.content.as_str()))),
            (&self.featured_image, normalize(input.featured_image.as_deref())),
            (&self.status, Some(input.status.as_str())),
        ] {
            if let Some(message) = rule.check(value) {
                errors.add(rule.field, message);
            }
        }
        errors.into_result(())
    }
}
