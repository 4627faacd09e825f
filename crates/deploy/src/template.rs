//! Minimal text templates with `{{ .Field }}` placeholders.
//!
//! Only field substitution is supported. Templates are checked against
//! the set of fields they may use when parsed, so a bad project template
//! fails before anything is uploaded.

use crate::error::DeployError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, accepting only placeholders named in `fields`.
    pub fn parse(source: &str, fields: &[&str]) -> Result<Self, DeployError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| {
                DeployError::Template(format!(
                    "unterminated placeholder at byte {}",
                    source.len() - rest.len() + open
                ))
            })?;
            let field = parse_field(after[..close].trim())?;
            if !fields.contains(&field) {
                return Err(DeployError::Template(format!("unknown field .{field}")));
            }
            segments.push(Segment::Field(field.to_string()));
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Substitutes every placeholder with its value from `values`.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, DeployError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| DeployError::Template(format!("no value for .{name}")))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_field(action: &str) -> Result<&str, DeployError> {
    let name = action
        .strip_prefix('.')
        .ok_or_else(|| DeployError::Template(format!("unsupported action {{{{{action}}}}}")))?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DeployError::Template(format!("invalid field name {action:?}")));
    }
    Ok(name)
}
