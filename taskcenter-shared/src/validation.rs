/// Input rules for names, passwords and email addresses
///
/// Names and passwords are checked against a configurable `StringRule`: a
/// character-count range (counted in Unicode scalar values, not bytes) plus a
/// list of regexes that must all match. Email addresses use a fixed rule.
///
/// # Example
///
/// ```
/// use taskcenter_shared::validation::{validate_email, StringRule};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let name_rule = StringRule::new("name", 3, 50, &[r"^[a-z0-9_-]+$".to_string()])?;
/// assert!(name_rule.validate("ali").is_ok());
/// assert!(name_rule.validate("Ali!").is_err());
///
/// assert!(validate_email("ali@x.com").is_ok());
/// # Ok(())
/// # }
/// ```

use regex::Regex;
use validator::ValidateEmail;

/// Returned when a configured pattern does not compile
pub use regex::Error as PatternError;

const EMAIL_MIN_CHARS: usize = 6;
const EMAIL_MAX_CHARS: usize = 254;

/// A value failed its rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{param} must be between {min_chars} and {max_chars} characters long and match all regexes {patterns:?}")]
pub struct ValidationError {
    /// Which parameter failed (e.g. "name", "password")
    pub param: String,
    pub min_chars: usize,
    pub max_chars: usize,
    pub patterns: Vec<String>,
}

/// Length and pattern rule for one kind of string parameter
#[derive(Debug, Clone)]
pub struct StringRule {
    param: String,
    min_chars: usize,
    max_chars: usize,
    matchers: Vec<Regex>,
}

impl StringRule {
    /// Compiles a rule
    ///
    /// # Errors
    ///
    /// Returns the regex error if any pattern fails to compile
    pub fn new(
        param: impl Into<String>,
        min_chars: usize,
        max_chars: usize,
        patterns: &[String],
    ) -> Result<Self, PatternError> {
        let matchers = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            param: param.into(),
            min_chars,
            max_chars,
            matchers,
        })
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    /// Checks `value` against the length range and every regex
    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        let chars = value.chars().count();
        if chars < self.min_chars
            || chars > self.max_chars
            || !self.matchers.iter().all(|re| re.is_match(value))
        {
            return Err(self.error());
        }
        Ok(())
    }

    /// Same rule, reported under a different parameter name
    pub fn renamed(&self, param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            ..self.clone()
        }
    }

    fn error(&self) -> ValidationError {
        ValidationError {
            param: self.param.clone(),
            min_chars: self.min_chars,
            max_chars: self.max_chars,
            patterns: self.matchers.iter().map(|re| re.as_str().to_string()).collect(),
        }
    }
}

/// Checks an email address: 6 to 254 characters, a valid address, and a dotted domain
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let chars = email.chars().count();
    let dotted_domain = email
        .rsplit_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);

    if chars < EMAIL_MIN_CHARS || chars > EMAIL_MAX_CHARS || !dotted_domain || !email.validate_email() {
        return Err(ValidationError {
            param: "email".to_string(),
            min_chars: EMAIL_MIN_CHARS,
            max_chars: EMAIL_MAX_CHARS,
            patterns: vec![r".+@.+\..+".to_string()],
        });
    }
    Ok(())
}
