use std::collections::HashMap;
use std::ops::AddAssign;

/// A parsed `NAME=VALUE` statement with its value already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub exported: bool,
    pub line: usize,
}

/// Declarations of one parse pass, in first-seen order.
///
/// Redeclaring a name replaces the earlier value in place.
#[derive(Debug, Clone, Default)]
pub(crate) struct Declarations {
    entries: Vec<Declaration>,
    by_name: HashMap<String, usize>,
}

impl Declarations {
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .and_then(|idx| self.entries.get(*idx))
            .map(|declaration| declaration.value.as_str())
    }

    pub(crate) fn insert(&mut self, declaration: Declaration) {
        if let Some(existing_idx) = self.by_name.get(&declaration.name).copied() {
            self.entries[existing_idx] = declaration;
        } else {
            self.by_name
                .insert(declaration.name.clone(), self.entries.len());
            self.entries.push(declaration);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.entries.iter()
    }

    pub(crate) fn into_vec(self) -> Vec<Declaration> {
        self.entries
    }
}

/// Summary of a populate or load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped_existing: usize,
    pub files_read: usize,
}

impl AddAssign for LoadReport {
    fn add_assign(&mut self, rhs: Self) {
        self.loaded += rhs.loaded;
        self.skipped_existing += rhs.skipped_existing;
        self.files_read += rhs.files_read;
    }
}
