//! Parsed log records, the input of the archive writer.
//!
//! Parsing raw lines is done upstream. A parsed record arrives with its
//! logtype already separated from its variables: each variable's position in
//! the logtype is marked with [`VARIABLE_PLACEHOLDER`].

use crate::error::{CoreError, CoreResult};

/// Byte marking where a variable was excised from a logtype.
pub const VARIABLE_PLACEHOLDER: char = '\u{11}';

/// One parsed log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Message timestamp (epoch milliseconds by convention).
    pub timestamp: i64,
    /// Template with a placeholder per variable.
    pub logtype: String,
    /// Variable values in placeholder order.
    pub variables: Vec<String>,
    /// Pattern the timestamp was parsed with, if known.
    pub timestamp_pattern: Option<String>,
}

impl ParsedRecord {
    /// Creates a record from an already-excised logtype.
    pub fn new(timestamp: i64, logtype: impl Into<String>, variables: Vec<String>) -> Self {
        Self {
            timestamp,
            logtype: logtype.into(),
            variables,
            timestamp_pattern: None,
        }
    }

    /// Creates a record from a template using `{}` for each variable.
    ///
    /// ```
    /// use logvault_core::ParsedRecord;
    ///
    /// let record = ParsedRecord::from_template(10, "connected to {} on port {}", ["10.0.0.1", "22"]);
    /// assert_eq!(record.render(), "connected to 10.0.0.1 on port 22");
    /// ```
    pub fn from_template<I, S>(timestamp: i64, template: &str, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let logtype = template.replace("{}", &VARIABLE_PLACEHOLDER.to_string());
        Self::new(
            timestamp,
            logtype,
            variables.into_iter().map(Into::into).collect(),
        )
    }

    /// Attaches a timestamp pattern.
    #[must_use]
    pub fn with_timestamp_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.timestamp_pattern = Some(pattern.into());
        self
    }

    /// Number of placeholders in the logtype.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        placeholder_count(&self.logtype)
    }

    /// Checks that the record can be dictionary-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EncodingFailure`] if the placeholder count differs
    /// from the number of variables, a variable is empty or contains a
    /// placeholder, or the timestamp pattern contains a line break.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(pattern) = &self.timestamp_pattern {
            // Patterns are stored newline-separated in the catalog.
            if pattern.contains(['\n', '\r']) {
                return Err(CoreError::encoding_failure(
                    "timestamp pattern contains a line break",
                ));
            }
        }
        let expected = self.placeholder_count();
        if expected != self.variables.len() {
            return Err(CoreError::encoding_failure(format!(
                "logtype has {expected} placeholders but {} variables were given",
                self.variables.len()
            )));
        }
        for (i, value) in self.variables.iter().enumerate() {
            if value.is_empty() {
                return Err(CoreError::encoding_failure(format!("variable {i} is empty")));
            }
            if value.contains(VARIABLE_PLACEHOLDER) {
                return Err(CoreError::encoding_failure(format!(
                    "variable {i} contains the placeholder byte"
                )));
            }
        }
        Ok(())
    }

    /// Reconstructs the message text.
    #[must_use]
    pub fn render(&self) -> String {
        render(&self.logtype, self.variables.iter().map(String::as_str))
    }

    /// Byte length of the rendered message.
    #[must_use]
    pub fn rendered_len(&self) -> u64 {
        let template = self.logtype.len() - self.placeholder_count();
        let values: usize = self.variables.iter().map(String::len).sum();
        (template + values) as u64
    }
}

pub(crate) fn placeholder_count(logtype: &str) -> usize {
    logtype.matches(VARIABLE_PLACEHOLDER).count()
}

/// Substitutes `values` into the placeholders of `logtype`, in order.
pub(crate) fn render<'a>(logtype: &str, values: impl IntoIterator<Item = &'a str>) -> String {
    let mut values = values.into_iter();
    let mut out = String::with_capacity(logtype.len());
    for (i, part) in logtype.split(VARIABLE_PLACEHOLDER).enumerate() {
        if i > 0 {
            out.push_str(values.next().unwrap_or_default());
        }
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_builder_and_render() {
        let record = ParsedRecord::from_template(5, "{} took {} ms", ["query", "12"]);
        assert_eq!(record.logtype, "\u{11} took \u{11} ms");
        assert_eq!(record.placeholder_count(), 2);
        assert_eq!(record.render(), "query took 12 ms");
        assert_eq!(record.rendered_len(), record.render().len() as u64);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn placeholder_count_mismatch() {
        let record = ParsedRecord::from_template(0, "a {} b", Vec::<String>::new());
        let err = record.validate().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn bad_variables_rejected() {
        assert!(ParsedRecord::from_template(0, "x {}", [""]).validate().is_err());
        assert!(ParsedRecord::from_template(0, "x {}", ["a\u{11}b"]).validate().is_err());
    }

    #[test]
    fn multiline_timestamp_pattern_rejected() {
        let record = ParsedRecord::new(1, "hello", vec![]).with_timestamp_pattern("%Y\n%m");
        let err = record.validate().unwrap_err();
        assert!(err.is_recoverable());
        let ok = ParsedRecord::new(1, "hello", vec![]).with_timestamp_pattern("%Y-%m");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn no_variables() {
        let record = ParsedRecord::new(1, "server started", vec![]);
        assert!(record.validate().is_ok());
        assert_eq!(record.render(), "server started");
    }
}
