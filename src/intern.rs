//! String interning for text extracted from class files.
//!
//! Every name, descriptor and literal string read from a constant pool is
//! stored exactly once; the rest of the runtime refers to it by `StringId`.
use std::collections::HashMap;
use std::fmt;

/// Handle to an interned string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only table of unique strings.
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    strings: Vec<String>,
    handles: HashMap<String, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `text`, adding it to the pool if it is not
    /// already there. Equal text always yields the same handle.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(id) = self.handles.get(text) {
            return *id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(text.to_owned());
        self.handles.insert(text.to_owned(), id);
        id
    }

    /// Returns the handle for `text` without interning it.
    pub fn lookup(&self, text: &str) -> Option<StringId> {
        self.handles.get(text).copied()
    }

    /// Returns the text behind `id`.
    ///
    /// # Panics
    /// Panics if `id` was issued by another pool.
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
