//! Log message templates
//!
//! Placeholders are `{name}` substrings. Substitution is a single left to
//! right pass: at each `{` the longest known placeholder wins, inserted
//! values are never rescanned, and unknown placeholders stay in the output.

/// Placeholder values for one rendered message
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    entries: Vec<(String, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `{name}`, replacing an earlier value.
    pub fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        let key = format!("{{{}}}", name);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Value of `{name}`
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = format!("{{{}}}", name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn longest_match(&self, rest: &str) -> Option<&(String, String)> {
        self.entries
            .iter()
            .filter(|(key, _)| rest.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
    }
}

/// A message template such as `#{requestId} {method} {uri}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    template: String,
}

impl MessageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, values: &Placeholders) -> String {
        let template = self.template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut pos = 0;

        while let Some(offset) = template[pos..].find('{') {
            let start = pos + offset;
            out.push_str(&template[pos..start]);

            match values.longest_match(&template[start..]) {
                Some((key, value)) => {
                    out.push_str(value);
                    pos = start + key.len();
                }
                None => {
                    out.push('{');
                    pos = start + 1;
                }
            }
        }

        out.push_str(&template[pos..]);
        out
    }
}

impl From<&str> for MessageTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for MessageTemplate {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}
