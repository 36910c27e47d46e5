//! Prefix auto-completion backed by tries over catalog names.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use lumi_engine::functions::format_function;
use lumi_engine::Database;

/// A char-keyed trie whose nodes index into an owned value arena, so every
/// subtree can list its values without walking it.
pub struct Trie<T> {
    values: Vec<T>,
    root: TrieNode,
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    subtree: Vec<usize>,
}

impl<T> Trie<T> {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            root: TrieNode::default(),
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.values.clear();
        self.root = TrieNode::default();
    }

    /// Inserts `value` under `key`. Duplicate keys keep both values.
    pub fn insert(&mut self, key: &str, value: T) {
        let idx = self.values.len();
        self.values.push(value);

        let mut node = &mut self.root;
        node.subtree.push(idx);
        for c in key.chars() {
            node = node.children.entry(c).or_default();
            node.subtree.push(idx);
        }
    }

    /// Returns every value whose key starts with `prefix`, in insertion
    /// order.
    pub fn find_prefix(&self, prefix: &str) -> Vec<&T> {
        let mut node = &self.root;
        for c in prefix.chars() {
            match node.children.get(&c) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        node.subtree.iter().map(|&i| &self.values[i]).collect()
    }
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One completion candidate.
#[derive(Debug, Clone)]
pub struct CompletionItem {
    /// Text inserted into the line.
    pub completion: String,
    /// Text shown in the candidate list.
    pub display: String,
    /// Help line shown next to the candidate.
    pub help: String,
}

/// What a prefix should complete to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteKind {
    /// Function names (the default).
    Function,
    /// Table and field names (inside string literals).
    Table,
}

struct CompleterState {
    seen_version: i64,
    functions: Trie<CompletionItem>,
    tables_and_fields: Trie<CompletionItem>,
}

/// Completion source that mirrors the catalog.
///
/// Two tries are kept, one over function names and one over table plus field
/// names; both are rebuilt whenever the catalog version moves.
pub struct AutoCompleter {
    db: Arc<Database>,
    state: RefCell<CompleterState>,
}

impl AutoCompleter {
    /// Creates a completer and loads the current catalog contents.
    pub fn new(db: Arc<Database>) -> Self {
        let completer = Self {
            db,
            state: RefCell::new(CompleterState {
                seen_version: -1,
                functions: Trie::new(),
                tables_and_fields: Trie::new(),
            }),
        };
        completer.check_reload();
        completer
    }

    /// Rebuilds the tries if the catalog changed since the last call.
    pub fn check_reload(&self) {
        let version = self.db.version();
        let mut state = self.state.borrow_mut();
        if state.seen_version == version {
            return;
        }
        state.seen_version = version;

        state.functions.clear();
        for func in self.db.list_functions() {
            state.functions.insert(
                func.name(),
                CompletionItem {
                    completion: func.name().to_string(),
                    display: format_function(func.as_ref()),
                    help: func.description().to_string(),
                },
            );
        }

        state.tables_and_fields.clear();
        for table in self.db.list_tables() {
            let table = table.read();
            state.tables_and_fields.insert(
                table.name(),
                CompletionItem {
                    completion: table.name().to_string(),
                    display: table.name().to_string(),
                    help: String::new(),
                },
            );
            for field in table.schema().fields() {
                state.tables_and_fields.insert(
                    &field.name,
                    CompletionItem {
                        completion: field.name.clone(),
                        display: field.name.clone(),
                        help: String::new(),
                    },
                );
            }
        }
    }

    /// Returns candidates for `prefix` from the chosen trie.
    pub fn complete(&self, kind: CompleteKind, prefix: &str) -> Vec<CompletionItem> {
        self.check_reload();
        let state = self.state.borrow();
        let trie = match kind {
            CompleteKind::Function => &state.functions,
            CompleteKind::Table => &state.tables_and_fields,
        };
        trie.find_prefix(prefix).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trie_find_prefix() {
        let mut trie = Trie::new();
        trie.insert("select", 1);
        trie.insert("set_value", 2);
        trie.insert("show_tables", 3);

        let hits: Vec<i32> = trie.find_prefix("se").into_iter().copied().collect();
        assert_eq!(hits, vec![1, 2]);

        let hits: Vec<i32> = trie.find_prefix("").into_iter().copied().collect();
        assert_eq!(hits, vec![1, 2, 3]);

        assert!(trie.find_prefix("zzz").is_empty());
    }

    #[test]
    fn test_trie_duplicate_keys_keep_both() {
        let mut trie = Trie::new();
        trie.insert("name", "stu.name");
        trie.insert("name", "course.name");
        assert_eq!(trie.find_prefix("name").len(), 2);
    }

    #[test]
    fn test_completer_reloads_on_version_change() {
        let db = Database::open().unwrap();
        let completer = AutoCompleter::new(db.clone());

        assert!(!completer.complete(CompleteKind::Function, "sel").is_empty());
        assert!(completer.complete(CompleteKind::Table, "stu").is_empty());

        let query = lumi_engine::query::parse_query(
            "create_table('stu') | add_field('name','string')",
        )
        .unwrap();
        db.execute(query).join().unwrap();

        let items = completer.complete(CompleteKind::Table, "stu");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].completion, "stu");

        // Field names complete from the same trie.
        assert!(!completer.complete(CompleteKind::Table, "na").is_empty());
    }
}
