use std::fmt::{Display, Formatter};

/// Names previously written by the populator, in first-written order.
///
/// Encoded as a single comma-separated variable so it survives in whichever
/// host store holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorizedNames {
    names: Vec<String>,
}

impl MemorizedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(raw: &str) -> Self {
        let mut decoded = Self::new();
        for name in raw.split(',').map(str::trim) {
            if !name.is_empty() {
                decoded.insert(name);
            }
        }
        decoded
    }

    pub fn encode(&self) -> String {
        self.names.join(",")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// Returns `true` when `name` was not memorized yet.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_owned());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Display for MemorizedNames {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_skips_empty_segments_and_duplicates() {
        let names = MemorizedNames::decode(",APP_ENV,,DATABASE_URL,APP_ENV,");
        assert_eq!(names.len(), 2);
        assert_eq!(names.encode(), "APP_ENV,DATABASE_URL");
    }

    #[test]
    fn insert_preserves_first_written_order() {
        let mut names = MemorizedNames::decode("B");
        assert!(names.insert("A"));
        assert!(!names.insert("B"));
        assert!(names.insert("C"));
        assert_eq!(names.iter().collect::<Vec<_>>(), ["B", "A", "C"]);
        assert_eq!(names.to_string(), "B,A,C");
    }

    #[test]
    fn empty_registry_encodes_to_empty_string() {
        let names = MemorizedNames::decode("");
        assert!(names.is_empty());
        assert_eq!(names.encode(), "");
    }
}
