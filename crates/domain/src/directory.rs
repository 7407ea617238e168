use std::collections::HashMap;

/// One entry returned by a directory search.
///
/// Attribute names are stored lowercased because directory servers treat them
/// case-insensitively and may echo back a different spelling than requested
/// (`givenName` for `givenname`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Creates an entry from a raw attribute map.
    ///
    /// Attributes whose names differ only by case are merged in byte order of
    /// their spelling (`Mail` before `mail`), so the first value does not
    /// depend on the iteration order of the source map.
    #[must_use]
    pub fn from_attributes(
        dn: impl Into<String>,
        attributes: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        let mut attributes: Vec<_> = attributes.into_iter().collect();
        attributes.sort_by(|(left, _), (right, _)| left.cmp(right));

        let mut entry = Self::new(dn);
        for (name, values) in attributes {
            entry.push_values(name.as_str(), values);
        }
        entry
    }

    /// Adds one attribute, keeping any values already present for it.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.push_values(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        self.dn.as_str()
    }

    /// Returns all values of an attribute, matching the name case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .get(name.to_lowercase().as_str())
            .map(Vec::as_slice)
    }

    /// Returns the first value of an attribute when it is present and non-empty.
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the number of distinct attributes on the entry.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    fn push_values(&mut self, name: &str, values: Vec<String>) {
        self.attributes
            .entry(name.to_lowercase())
            .or_default()
            .extend(values);
    }
}
