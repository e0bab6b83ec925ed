use std::collections::HashMap;

use anyhow::{Context, Result};

/// Free-form list of usernames, separated by whitespace, commas or newlines.
pub const MULTI_USERNAME_FIELD: &str = "Custom Field 8";
pub const SINGLE_USERNAME_FIELD: &str = "Custom Field 1";
pub const USERNAME_FIELD: &str = "githubUsername";

/// First data row of an agreement's form data export, keyed by column header.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FormRecord {
    fields: HashMap<String, String>,
}

impl FormRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// Candidate GitHub usernames, in field order. Blank or absent fields are skipped.
    pub fn usernames(&self) -> Vec<String> {
        let mut usernames = Vec::new();
        if let Some(value) = self.get(MULTI_USERNAME_FIELD) {
            usernames.extend(
                value
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        for field in [SINGLE_USERNAME_FIELD, USERNAME_FIELD] {
            if let Some(value) = self.get(field) {
                usernames.push(value.trim().to_string());
            }
        }
        usernames
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Parses a CSV form data export with a header row, returning the first data row.
pub fn parse_form_data(data: &str) -> Result<FormRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.trim().as_bytes());
    let headers = reader.headers().context("Failed to read form data header")?.clone();
    let record = reader
        .records()
        .next()
        .context("Form data contains no rows")?
        .context("Failed to read form data row")?;
    Ok(headers.iter().zip(record.iter()).collect())
}
