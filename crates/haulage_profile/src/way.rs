use std::collections::HashMap;

/// Tags of one OSM way, the unit the truck profile scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Way {
    pub tags: HashMap<String, String>,
}

impl Way {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get_tag(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(|tag| tag.trim()).filter(|tag| !tag.is_empty())
    }

    pub fn has_tag(&self, tag: &str, value: &str) -> bool {
        self.get_tag(tag)
            .is_some_and(|tag_value| tag_value == value)
    }

    /// First of `keys` carrying a value.
    pub fn first_tag<'a>(&'a self, keys: &[&'a str]) -> Option<(&'a str, &'a str)> {
        keys.iter()
            .find_map(|key| self.get_tag(key).map(|value| (*key, value)))
    }

    /// Parses `key=value` pairs, as typed on a command line.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut way = Way::new();

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Expected key=value, got \"{pair}\""))?;
            way.tags.insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(way)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Way {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Way {
            tags: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
