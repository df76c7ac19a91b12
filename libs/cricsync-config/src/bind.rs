//! Typed binding of configuration sections.
//!
//! Every section declares its fields explicitly in a [`Section::bind`]
//! implementation, reading each key through a [`SectionReader`] getter that
//! knows the field's parser. Absent keys keep the record's default; present
//! keys must parse or the whole section fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::ConfigError;
use crate::secret::SecretString;
use crate::snapshot::{ConfigSnapshot, KEY_DELIMITER};

/// A named group of settings bound into a typed record.
pub trait Section: Sized + Default {
    /// Section name; all of the record's keys live under `NAME:`.
    const NAME: &'static str;

    /// Builds the record from a section reader.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for a value that does not parse.
    fn bind(section: &SectionReader<'_>) -> Result<Self, ConfigError>;
}

/// Read access to the keys of one section.
#[derive(Debug, Clone, Copy)]
pub struct SectionReader<'a> {
    snapshot: &'a ConfigSnapshot,
    section: &'static str,
}

impl<'a> SectionReader<'a> {
    #[must_use]
    pub fn new(snapshot: &'a ConfigSnapshot, section: &'static str) -> Self {
        Self { snapshot, section }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.section
    }

    /// Full key path of `field` within this section.
    #[must_use]
    pub fn key(&self, field: &str) -> String {
        format!("{}{KEY_DELIMITER}{field}", self.section)
    }

    /// True when any key of this section is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.snapshot.has_section(self.section)
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.snapshot.get(key)
    }

    fn invalid(&self, key: String, value: &str, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section,
            key,
            value: value.to_owned(),
            expected,
        }
    }

    #[must_use]
    pub fn string(&self, field: &str, default: String) -> String {
        self.raw(&self.key(field))
            .map_or(default, ToOwned::to_owned)
    }

    #[must_use]
    pub fn secret(&self, field: &str, default: SecretString) -> SecretString {
        self.raw(&self.key(field))
            .map_or(default, SecretString::new)
    }

    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the value is not a 32-bit integer.
    pub fn i32(&self, field: &str, default: i32) -> Result<i32, ConfigError> {
        let key = self.key(field);
        match self.raw(&key) {
            None => Ok(default),
            Some(text) => parse_i32(text).ok_or_else(|| self.invalid(key, text, "a 32-bit integer")),
        }
    }

    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the value is not `true`/`false`.
    pub fn bool(&self, field: &str, default: bool) -> Result<bool, ConfigError> {
        let key = self.key(field);
        match self.raw(&key) {
            None => Ok(default),
            Some(text) => parse_bool(text).ok_or_else(|| self.invalid(key, text, "true or false")),
        }
    }

    /// Binds a nullable calendar date. Absent or blank values leave it unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the value is not a date.
    pub fn optional_date(
        &self,
        field: &str,
        default: Option<NaiveDate>,
    ) -> Result<Option<NaiveDate>, ConfigError> {
        let key = self.key(field);
        match self.raw(&key) {
            None => Ok(default),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => parse_date(text)
                .map(Some)
                .ok_or_else(|| self.invalid(key, text, "a date in YYYY-MM-DD form")),
        }
    }

    /// Binds `Field:0`, `Field:1`, ... up to the first missing index.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the element key that failed.
    pub fn i32_list(&self, field: &str, default: Vec<i32>) -> Result<Vec<i32>, ConfigError> {
        let elements = self.indexed(field);
        if elements.is_empty() {
            return Ok(default);
        }
        elements
            .into_iter()
            .map(|(key, text)| parse_i32(text).ok_or_else(|| self.invalid(key, text, "a 32-bit integer")))
            .collect()
    }

    /// Binds `Field:0`, `Field:1`, ... up to the first missing index.
    #[must_use]
    pub fn string_list(&self, field: &str, default: Vec<String>) -> Vec<String> {
        let elements = self.indexed(field);
        if elements.is_empty() {
            return default;
        }
        elements
            .into_iter()
            .map(|(_, text)| text.to_owned())
            .collect()
    }

    fn indexed(&self, field: &str) -> Vec<(String, &'a str)> {
        let base = self.key(field);
        (0_usize..)
            .map(|index| format!("{base}{KEY_DELIMITER}{index}"))
            .map_while(|key| self.raw(&key).map(|text| (key, text)))
            .collect()
    }
}

/// Parses a signed 32-bit integer, ignoring surrounding whitespace.
#[must_use]
pub fn parse_i32(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// Parses `true`/`false` case-insensitively, ignoring surrounding whitespace.
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses `YYYY-MM-DD`, or an ISO-8601 date-time whose date part is kept.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> ConfigSnapshot {
        ConfigSnapshot::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn parse_i32_accepts_sign_and_whitespace() {
        assert_eq!(parse_i32("42"), Some(42));
        assert_eq!(parse_i32(" -5 "), Some(-5));
        assert_eq!(parse_i32("+7"), Some(7));
        assert_eq!(parse_i32(""), None);
        assert_eq!(parse_i32("1.5"), None);
        assert_eq!(parse_i32("abc"), None);
        assert_eq!(parse_i32("2147483648"), None);
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool(" True "), Some(true));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("1"), None);
    }

    #[test]
    fn parse_date_forms() {
        let jan_first = NaiveDate::from_ymd_opt(2023, 1, 1);
        assert_eq!(parse_date("2023-01-01"), jan_first);
        assert_eq!(parse_date("2023-01-01T00:00:00"), jan_first);
        assert_eq!(parse_date("2023-01-01T10:30:00Z"), jan_first);
        assert_eq!(parse_date("2023-01-01T10:30:00.250+02:00"), jan_first);
        assert_eq!(parse_date("2023-13-01"), None);
        assert_eq!(parse_date("01/01/2023"), None);
    }

    #[test]
    fn list_stops_at_first_gap() {
        let snap = snapshot(&[
            ("S:Ids:0", "1"),
            ("S:Ids:1", "2"),
            ("S:Ids:3", "4"),
        ]);
        let reader = SectionReader::new(&snap, "S");
        assert_eq!(reader.i32_list("Ids", Vec::new()).unwrap(), vec![1, 2]);
    }

    #[test]
    fn list_order_follows_index_not_insertion() {
        let snap = snapshot(&[("S:Names:1", "second"), ("S:Names:0", "first")]);
        let reader = SectionReader::new(&snap, "S");
        assert_eq!(
            reader.string_list("Names", Vec::new()),
            vec!["first".to_owned(), "second".to_owned()]
        );
    }

    #[test]
    fn list_without_zero_index_keeps_default() {
        let snap = snapshot(&[("S:Ids:1", "2")]);
        let reader = SectionReader::new(&snap, "S");
        assert!(reader.i32_list("Ids", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn list_keeps_duplicates() {
        let snap = snapshot(&[("S:Ids:0", "5"), ("S:Ids:1", "5")]);
        let reader = SectionReader::new(&snap, "S");
        assert_eq!(reader.i32_list("Ids", Vec::new()).unwrap(), vec![5, 5]);
    }

    #[test]
    fn bad_list_element_names_its_key() {
        let snap = snapshot(&[("S:Ids:0", "1"), ("S:Ids:1", "two")]);
        let reader = SectionReader::new(&snap, "S");
        let err = reader.i32_list("Ids", Vec::new()).unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "S");
                assert_eq!(key, "S:Ids:1");
                assert_eq!(value, "two");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_date_is_unset() {
        let snap = snapshot(&[("S:From", "  ")]);
        let reader = SectionReader::new(&snap, "S");
        assert_eq!(reader.optional_date("From", None).unwrap(), None);
    }

    #[test]
    fn absent_scalars_keep_defaults() {
        let snap = ConfigSnapshot::default();
        let reader = SectionReader::new(&snap, "S");
        assert_eq!(reader.i32("Timeout", 30).unwrap(), 30);
        assert!(reader.bool("Flag", true).unwrap());
        assert_eq!(reader.string("Url", "x".to_owned()), "x");
        assert!(!reader.exists());
    }

    #[test]
    fn empty_string_is_not_an_integer() {
        let snap = snapshot(&[("S:Timeout", "")]);
        let reader = SectionReader::new(&snap, "S");
        assert!(reader.i32("Timeout", 30).is_err());
    }
}
