//! Groups an evaluated item stream into runnable blocks and standalone
//! items.
//!
//! Mode items (`run`, `ast`) accumulate into a working block holding at most
//! one item per key; a repeated key flushes the block first. Any other item
//! flushes the working block and passes through standalone. A case that ends
//! with a non-empty working block drops it by default; see
//! [`BlockAssembler::new`].
use crate::model::Item;
use std::collections::BTreeMap;

/// Item names grouped into blocks for one runtime invocation.
const MODE_KEYS: [&str; 2] = ["run", "ast"];

/// Transient grouping of mutually exclusive mode items destined for one
/// runtime invocation.
#[derive(Debug, Default)]
pub struct Block {
    entries: BTreeMap<String, Item>,
}

impl Block {
    pub fn get(&self, key: &str) -> Option<&Item> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source line of the block, for failure reports.
    pub fn lineno(&self) -> usize {
        self.entries.values().map(|item| item.lineno).min().unwrap_or(0)
    }

    fn insert(&mut self, item: Item) {
        self.entries.insert(item.name.clone(), item);
    }
}

#[derive(Debug)]
pub enum Element {
    Block(Block),
    Single(Item),
}

/// Stateful assembler fed one item at a time, preserving the lazy,
/// fail-in-order semantics of driving the stream element by element.
#[derive(Debug)]
pub struct BlockAssembler {
    working: Block,
    flush_trailing: bool,
}

impl BlockAssembler {
    /// With `flush_trailing` disabled (the default), a trailing working
    /// block is silently dropped when the case ends: trailing mode items
    /// with no following item never execute. Enabling it emits that final
    /// block from [`BlockAssembler::finish`] instead.
    pub fn new(flush_trailing: bool) -> Self {
        Self {
            working: Block::default(),
            flush_trailing,
        }
    }

    /// Feeds one evaluated item, returning the elements it releases
    /// (zero, one, or two).
    pub fn feed(&mut self, item: Item) -> Vec<Element> {
        let mut out = Vec::new();
        if MODE_KEYS.contains(&item.name.as_str()) {
            if self.working.contains(&item.name) {
                out.push(Element::Block(std::mem::take(&mut self.working)));
            }
            self.working.insert(item);
        } else {
            if !self.working.is_empty() {
                out.push(Element::Block(std::mem::take(&mut self.working)));
            }
            out.push(Element::Single(item));
        }
        out
    }

    /// Ends the stream. Returns the trailing block only when flushing is
    /// enabled.
    pub fn finish(&mut self) -> Option<Element> {
        if self.flush_trailing && !self.working.is_empty() {
            return Some(Element::Block(std::mem::take(&mut self.working)));
        }
        self.working = Block::default();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn item(name: &str, value: &str, lineno: usize) -> Item {
        Item {
            name: name.to_string(),
            value: Value::String(value.to_string()),
            option: Vec::new(),
            lineno,
        }
    }

    fn drive(assembler: &mut BlockAssembler, items: Vec<Item>) -> Vec<Element> {
        let mut elements = Vec::new();
        for it in items {
            elements.extend(assembler.feed(it));
        }
        elements.extend(assembler.finish());
        elements
    }

    fn block_text(element: &Element, key: &str) -> String {
        match element {
            Element::Block(block) => block.get(key).expect("mode entry").text(),
            Element::Single(item) => panic!("expected block, got item {}", item.name),
        }
    }

    #[test]
    fn repeated_mode_key_flushes_the_prior_block() {
        let mut assembler = BlockAssembler::new(false);
        let elements = drive(
            &mut assembler,
            vec![item("run", "A", 1), item("run", "B", 2), item("out", "X", 3)],
        );

        assert_eq!(elements.len(), 3);
        assert_eq!(block_text(&elements[0], "run"), "A");
        assert_eq!(block_text(&elements[1], "run"), "B");
        match &elements[2] {
            Element::Single(it) => assert_eq!(it.text(), "X"),
            Element::Block(_) => panic!("expected standalone item"),
        }
    }

    #[test]
    fn run_and_ast_share_one_block() {
        let mut assembler = BlockAssembler::new(false);
        let elements = drive(
            &mut assembler,
            vec![item("ast", "A", 1), item("run", "B", 2), item("out", "X", 3)],
        );

        assert_eq!(elements.len(), 2);
        match &elements[0] {
            Element::Block(block) => {
                assert_eq!(block.get("ast").expect("ast").text(), "A");
                assert_eq!(block.get("run").expect("run").text(), "B");
                assert_eq!(block.lineno(), 1);
            }
            Element::Single(_) => panic!("expected block"),
        }
    }

    #[test]
    fn trailing_block_is_dropped_by_default() {
        // Regression pin: a case ending in a mode item executes nothing for
        // it, because no following item ever flushes the working block.
        let mut assembler = BlockAssembler::new(false);
        let elements = drive(
            &mut assembler,
            vec![item("exec", "code", 1), item("run", "A", 2)],
        );

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Single(it) => assert_eq!(it.name, "exec"),
            Element::Block(_) => panic!("expected standalone item"),
        }
    }

    #[test]
    fn flush_trailing_emits_the_final_block() {
        let mut assembler = BlockAssembler::new(true);
        let elements = drive(
            &mut assembler,
            vec![item("exec", "code", 1), item("run", "A", 2)],
        );

        assert_eq!(elements.len(), 2);
        assert_eq!(block_text(&elements[1], "run"), "A");
    }

    #[test]
    fn standalone_items_pass_through_when_no_block_is_open() {
        let mut assembler = BlockAssembler::new(false);
        let elements = drive(&mut assembler, vec![item("out", "X", 1)]);
        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Single(it) => assert_eq!(it.name, "out"),
            Element::Block(_) => panic!("expected standalone item"),
        }
    }
}
