//! Delta event parsers
//!
//! Index-based content (text and sequences) reports a change as an ordered
//! list of retain/insert/delete operations. [`parse_index_delta`] walks that
//! list once and coalesces it into position-addressed [`Edit`] records which
//! can be replayed in emission order (delete, then insert) against the
//! pre-change content. Offsets are in the content's native unit, supplied by
//! the caller as a length function: UTF-8 bytes for text, element count for
//! sequences.
//!
//! Map content reports per-key actions instead, which
//! [`parse_map_changes`] partitions into a [`MapDiff`].

use serde::Serialize;
use std::collections::HashMap;

/// One operation descriptor of a change delta
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaOp<T> {
    pub retain: Option<u32>,
    pub insert: Option<T>,
    pub delete: Option<u32>,
}

impl<T> DeltaOp<T> {
    pub fn retain(len: u32) -> Self {
        Self {
            retain: Some(len),
            insert: None,
            delete: None,
        }
    }

    pub fn insert(value: T) -> Self {
        Self {
            retain: None,
            insert: Some(value),
            delete: None,
        }
    }

    pub fn delete(len: u32) -> Self {
        Self {
            retain: None,
            insert: None,
            delete: Some(len),
        }
    }

    /// Attach a deletion to this operation, at the same position
    pub fn with_delete(mut self, len: u32) -> Self {
        self.delete = Some(len);
        self
    }
}

/// Inserted content that can be accumulated into one edit
pub trait Payload: Default {
    fn is_empty(&self) -> bool;

    fn append(&mut self, other: Self);
}

impl Payload for String {
    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }

    fn append(&mut self, other: Self) {
        self.push_str(&other);
    }
}

impl<T> Payload for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }

    fn append(&mut self, mut other: Self) {
        Vec::append(self, &mut other);
    }
}

/// A coalesced edit: at `retain`, remove `delete` units, then insert `insert`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit<T> {
    pub retain: u32,
    pub delete: u32,
    pub insert: T,
}

impl<T: Payload> Edit<T> {
    fn at(retain: u32) -> Self {
        Self {
            retain,
            delete: 0,
            insert: T::default(),
        }
    }

    /// Whether this edit carries no change at all
    pub fn is_noop(&self) -> bool {
        self.delete == 0 && self.insert.is_empty()
    }
}

impl Edit<String> {
    /// Replay this edit on `text`, treating offsets as UTF-8 byte indices.
    ///
    /// Positions past the end are clamped, and positions inside a code
    /// point are moved back to its start.
    pub fn apply(&self, text: &mut String) {
        let start = floor_char_boundary(text, self.retain as usize);
        let end = floor_char_boundary(text, start + self.delete as usize);
        text.replace_range(start..end, &self.insert);
    }
}

impl<T: Clone> Edit<Vec<T>> {
    /// Replay this edit on `items`, clamping positions past the end
    pub fn apply(&self, items: &mut Vec<T>) {
        let start = (self.retain as usize).min(items.len());
        let end = (start + self.delete as usize).min(items.len());
        items.splice(start..end, self.insert.iter().cloned());
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Insertion length of text in UTF-8 bytes
pub fn text_len(text: &str) -> u32 {
    text.len() as u32
}

/// Insertion length of a sequence chunk in elements
pub fn sequence_len<T>(items: &[T]) -> u32 {
    items.len() as u32
}

/// Translate one index-based delta into coalesced edits.
///
/// `insertion_len` measures inserted payloads in the unit the engine uses
/// for retains and deletes. Each completed edit is handed to `on_edit`;
/// edits with neither a deletion nor an insertion are never emitted.
pub fn parse_index_delta<T, I, L, F>(delta: I, insertion_len: L, mut on_edit: F)
where
    T: Payload,
    I: IntoIterator<Item = DeltaOp<T>>,
    L: Fn(&T) -> u32,
    F: FnMut(Edit<T>),
{
    let mut cursor: u32 = 0;
    let mut pending = Edit::at(0);

    for op in delta {
        if let Some(retain) = op.retain {
            // moving on to a new position, so the current edit is complete
            if !pending.is_noop() {
                on_edit(std::mem::replace(&mut pending, Edit::at(0)));
            }
            cursor = cursor.saturating_add(retain);
            pending = Edit::at(cursor);
        }

        let deleted = op.delete.unwrap_or(0);
        pending.delete += deleted;

        // deletions are addressed on pre-edit content, only inserts move the cursor
        if let Some(insert) = op.insert {
            cursor = cursor.saturating_add(insertion_len(&insert)).saturating_sub(deleted);
            pending.insert.append(insert);
        }
    }

    if !pending.is_noop() {
        on_edit(pending);
    }
}

/// Parse a text delta, measuring inserts in UTF-8 bytes
pub fn parse_text_delta<I, F>(delta: I, on_edit: F)
where
    I: IntoIterator<Item = DeltaOp<String>>,
    F: FnMut(Edit<String>),
{
    parse_index_delta(delta, |text: &String| text_len(text), on_edit)
}

/// Parse a sequence delta, measuring inserts in elements
pub fn parse_sequence_delta<T, I, F>(delta: I, on_edit: F)
where
    I: IntoIterator<Item = DeltaOp<Vec<T>>>,
    F: FnMut(Edit<Vec<T>>),
{
    parse_index_delta(delta, |items: &Vec<T>| sequence_len(items), on_edit)
}

/// Action reported by a map change event for one key
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction<V> {
    Added { new: V },
    Updated { old: V, new: V },
    Removed { old: V },
}

/// Key-based diff of one map change event
///
/// The three mappings never share a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapDiff<V> {
    pub insert: HashMap<String, V>,
    pub update: HashMap<String, (V, V)>,
    pub delete: HashMap<String, V>,
}

impl<V> Default for MapDiff<V> {
    fn default() -> Self {
        Self {
            insert: HashMap::new(),
            update: HashMap::new(),
            delete: HashMap::new(),
        }
    }
}

impl<V> MapDiff<V> {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    fn forget(&mut self, key: &str) {
        self.insert.remove(key);
        self.update.remove(key);
        self.delete.remove(key);
    }
}

impl<V: Clone> MapDiff<V> {
    /// Replay this diff on `map`: deletions, then updates, then inserts
    pub fn apply(&self, map: &mut HashMap<String, V>) {
        for key in self.delete.keys() {
            map.remove(key);
        }
        for (key, (_, new)) in &self.update {
            map.insert(key.clone(), new.clone());
        }
        for (key, new) in &self.insert {
            map.insert(key.clone(), new.clone());
        }
    }
}

/// Partition the per-key actions of one map change event
pub fn parse_map_changes<V, I>(changes: I) -> MapDiff<V>
where
    I: IntoIterator<Item = (String, EntryAction<V>)>,
{
    let mut diff = MapDiff::default();

    for (key, action) in changes {
        // last report for a key wins
        diff.forget(&key);
        match action {
            EntryAction::Added { new } => {
                diff.insert.insert(key, new);
            }
            EntryAction::Updated { old, new } => {
                diff.update.insert(key, (old, new));
            }
            EntryAction::Removed { old } => {
                diff.delete.insert(key, old);
            }
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn text_edits(delta: Vec<DeltaOp<String>>) -> Vec<Edit<String>> {
        let mut edits = Vec::new();
        parse_text_delta(delta, |edit| edits.push(edit));
        edits
    }

    fn ins(s: &str) -> DeltaOp<String> {
        DeltaOp::insert(s.to_string())
    }

    fn edit(retain: u32, delete: u32, insert: &str) -> Edit<String> {
        Edit {
            retain,
            delete,
            insert: insert.to_string(),
        }
    }

    /// Apply a delta the way the engine defines it, walking the base text.
    fn apply_delta(base: &str, delta: &[DeltaOp<String>]) -> String {
        let mut out = String::new();
        let mut pos = 0usize;
        for op in delta {
            if let Some(n) = op.retain {
                out.push_str(&base[pos..pos + n as usize]);
                pos += n as usize;
            }
            if let Some(n) = op.delete {
                pos += n as usize;
            }
            if let Some(s) = &op.insert {
                out.push_str(s);
            }
        }
        out.push_str(&base[pos..]);
        out
    }

    fn replay(base: &str, edits: &[Edit<String>]) -> String {
        let mut text = base.to_string();
        for edit in edits {
            edit.apply(&mut text);
        }
        text
    }

    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) % n
        }
    }

    fn random_delta(rng: &mut Lcg, base: &str) -> Vec<DeltaOp<String>> {
        const CHUNKS: [&str; 5] = ["a", "é", "😀", "漢字", "xy"];
        let chars: Vec<char> = base.chars().collect();
        let mut delta = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let k = (1 + rng.below(3) as usize).min(chars.len() - i);
            let bytes: u32 = chars[i..i + k].iter().map(|c| c.len_utf8() as u32).sum();
            match rng.below(3) {
                0 => {
                    delta.push(DeltaOp::retain(bytes));
                    i += k;
                }
                1 => {
                    delta.push(DeltaOp::delete(bytes));
                    i += k;
                }
                _ => delta.push(ins(CHUNKS[rng.below(5) as usize])),
            }
        }
        if rng.below(2) == 0 {
            delta.push(ins(CHUNKS[rng.below(5) as usize]));
        }
        delta
    }

    #[test]
    fn test_retains_only_never_flush() {
        assert!(text_edits(vec![DeltaOp::retain(3)]).is_empty());
        assert!(text_edits(vec![DeltaOp::retain(3), DeltaOp::retain(4)]).is_empty());
    }

    #[test]
    fn test_single_insert_at_offset() {
        let edits = text_edits(vec![DeltaOp::retain(5), ins("abc")]);
        assert_eq!(edits, vec![edit(5, 0, "abc")]);
    }

    #[test]
    fn test_insert_at_start() {
        assert_eq!(text_edits(vec![ins("hello")]), vec![edit(0, 0, "hello")]);
    }

    #[test]
    fn test_four_byte_code_point_advances_four() {
        let edits = text_edits(vec![
            DeltaOp::retain(2),
            ins("😀"),
            DeltaOp::retain(3),
            ins("x"),
        ]);
        assert_eq!(edits, vec![edit(2, 0, "😀"), edit(9, 0, "x")]);
    }

    #[test]
    fn test_delete_then_insert_is_one_edit() {
        let edits = text_edits(vec![DeltaOp::retain(1), DeltaOp::delete(2), ins("Z")]);
        assert_eq!(edits, vec![edit(1, 2, "Z")]);
        assert_eq!(replay("abcd", &edits), "aZd");
    }

    #[test]
    fn test_insert_then_delete_is_one_edit() {
        let delta = vec![ins("a"), DeltaOp::delete(2)];
        let edits = text_edits(delta.clone());
        assert_eq!(edits, vec![edit(0, 2, "a")]);
        assert_eq!(replay("xyz", &edits), apply_delta("xyz", &delta));
    }

    #[test]
    fn test_combined_descriptor_advances_by_net_length() {
        let edits = text_edits(vec![
            DeltaOp::retain(1),
            ins("ab").with_delete(1),
            DeltaOp::retain(2),
            ins("z"),
        ]);
        assert_eq!(edits, vec![edit(1, 1, "ab"), edit(4, 0, "z")]);
    }

    #[test]
    fn test_deletes_do_not_move_cursor() {
        let delta = vec![
            DeltaOp::retain(1),
            DeltaOp::delete(1),
            DeltaOp::retain(1),
            DeltaOp::delete(1),
        ];
        let edits = text_edits(delta.clone());
        assert_eq!(edits, vec![edit(1, 1, ""), edit(2, 1, "")]);
        assert_eq!(replay("xyzw", &edits), apply_delta("xyzw", &delta));
    }

    #[test]
    fn test_out_of_range_retain_is_forwarded() {
        let edits = text_edits(vec![DeltaOp::retain(100), ins("x")]);
        assert_eq!(edits, vec![edit(100, 0, "x")]);
    }

    #[test]
    fn test_replay_reproduces_engine_result() {
        let mut rng = Lcg(7);
        let bases = ["", "hello world", "héllo 😀 wörld", "漢字かな交じり文", "a"];

        for round in 0..500 {
            let base = bases[round % bases.len()];
            let delta = random_delta(&mut rng, base);
            let edits = text_edits(delta.clone());

            assert!(edits.iter().all(|e| !e.is_noop()));
            assert_eq!(
                replay(base, &edits),
                apply_delta(base, &delta),
                "delta {:?} on {:?}",
                delta,
                base
            );
        }
    }

    #[test]
    fn test_sequence_counts_elements() {
        let mut edits = Vec::new();
        parse_sequence_delta(
            vec![
                DeltaOp::retain(1),
                DeltaOp::delete(1),
                DeltaOp::insert(vec![10, 20, 30]),
                DeltaOp::retain(1),
                DeltaOp::insert(vec![40]),
            ],
            |e| edits.push(e),
        );

        assert_eq!(
            edits,
            vec![
                Edit { retain: 1, delete: 1, insert: vec![10, 20, 30] },
                Edit { retain: 5, delete: 0, insert: vec![40] },
            ]
        );

        let mut items = vec![1, 2, 3, 4];
        for edit in &edits {
            edit.apply(&mut items);
        }
        assert_eq!(items, vec![1, 10, 20, 30, 3, 40, 4]);
    }

    #[test]
    fn test_map_diff_partitions_keys() {
        let diff = parse_map_changes(vec![
            ("a".to_string(), EntryAction::Added { new: 1 }),
            ("b".to_string(), EntryAction::Updated { old: 2, new: 20 }),
            ("c".to_string(), EntryAction::Removed { old: 3 }),
        ]);

        let inserted: HashSet<_> = diff.insert.keys().collect();
        let updated: HashSet<_> = diff.update.keys().collect();
        let deleted: HashSet<_> = diff.delete.keys().collect();
        assert!(inserted.is_disjoint(&updated));
        assert!(inserted.is_disjoint(&deleted));
        assert!(updated.is_disjoint(&deleted));

        let mut map: HashMap<String, i32> =
            [("b".to_string(), 2), ("c".to_string(), 3), ("d".to_string(), 4)].into();
        diff.apply(&mut map);

        let expected: HashMap<String, i32> =
            [("a".to_string(), 1), ("b".to_string(), 20), ("d".to_string(), 4)].into();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_map_diff_repeated_key_stays_disjoint() {
        let diff = parse_map_changes(vec![
            ("k".to_string(), EntryAction::Added { new: 1 }),
            ("k".to_string(), EntryAction::Removed { old: 1 }),
        ]);
        assert!(diff.insert.is_empty());
        assert_eq!(diff.delete.get("k"), Some(&1));
    }
}
