//! Ternary search trie over byte-string keys, backed by an index arena.
//!
//! Keys are stored one byte per node with an implicit terminator node (split
//! byte `0`) at the end of every key; the terminator holds the value. The
//! first byte of a key selects one of 127 root slots, so first bytes are
//! limited to `1..=126`.
//!
//! Nodes live in a single vector that grows a fixed-width "line" at a time.
//! Removed nodes go back on a free stack and are handed out again before the
//! arena grows; the arena never shrinks.

use crate::error::ClassifierError;

/// Nodes added to the arena each time it runs out.
pub const DEFAULT_LINE_WIDTH: usize = 30;

/// Number of root slots; a key's first byte indexes into them.
const ROOT_SLOTS: usize = 127;

/// Terminator nodes send probe bytes below this value left, others right.
const TERMINATOR_PIVOT: u8 = 64;

type NodeId = u32;

#[derive(Debug)]
struct Node<T> {
    split: u8,
    lo: Option<NodeId>,
    eq: Option<NodeId>,
    hi: Option<NodeId>,
    /// Set on terminator nodes only.
    value: Option<T>,
}

impl<T> Node<T> {
    fn vacant() -> Self {
        Self {
            split: 0,
            lo: None,
            eq: None,
            hi: None,
            value: None,
        }
    }

    fn is_terminator(&self) -> bool {
        self.split == 0
    }

    fn has_siblings(&self) -> bool {
        self.lo.is_some() || self.hi.is_some()
    }

    /// Whether a probe byte that differs from this node's split goes left.
    fn goes_lo(&self, probe: u8) -> bool {
        if self.is_terminator() {
            probe < TERMINATOR_PIVOT
        } else {
            probe < self.split
        }
    }
}

/// Where a node hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root(u8),
    Lo(NodeId),
    Eq(NodeId),
    Hi(NodeId),
}

/// Arena occupancy, as reported by [`Tst::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Lines allocated so far.
    pub lines: usize,
    /// Nodes allocated so far (`lines * line_width`).
    pub nodes: usize,
    /// Nodes currently on the free stack.
    pub free: usize,
}

/// A ternary search trie mapping byte strings to values of type `T`.
#[derive(Debug)]
pub struct Tst<T> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
    roots: [Option<NodeId>; ROOT_SLOTS],
    line_width: usize,
    max_lines: Option<usize>,
    lines: usize,
    len: usize,
}

impl<T> Default for Tst<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tst<T> {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_LINE_WIDTH, None)
    }

    /// Grow `line_width` nodes at a time (at least one).
    pub fn with_line_width(line_width: usize) -> Self {
        Self::with_limits(line_width, None)
    }

    /// Grow `line_width` nodes at a time and never hold more than
    /// `max_lines` lines. Running into the cap is an allocation failure.
    pub fn with_limits(line_width: usize, max_lines: Option<usize>) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            roots: [None; ROOT_SLOTS],
            line_width: line_width.max(1),
            max_lines,
            lines: 0,
            len: 0,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            lines: self.lines,
            nodes: self.nodes.len(),
            free: self.free.len(),
        }
    }

    /// Insert `key -> value`.
    ///
    /// When the key already exists and `replace` is false the trie is left
    /// unchanged and `value` is dropped; with `replace` the old value is
    /// swapped out and returned.
    ///
    /// # Errors
    ///
    /// [`ClassifierError::NullKey`] for an empty key,
    /// [`ClassifierError::InvalidKey`] for a NUL byte or a first byte outside
    /// `1..=126`, [`ClassifierError::DuplicateKey`], and
    /// [`ClassifierError::AllocationFailed`] when the arena cannot grow. A
    /// failed insert never leaves a partial chain linked into the trie.
    pub fn insert(
        &mut self,
        key: &[u8],
        value: T,
        replace: bool,
    ) -> Result<Option<T>, ClassifierError> {
        validate_key(key)?;

        // Walk down to the slot where the new chain attaches, and the key
        // index its first node represents.
        let first = key[0];
        let (slot, start) = match self.roots[usize::from(first)] {
            None => (Slot::Root(first), 1),
            Some(mut cur) => {
                let mut i = 1;
                loop {
                    let b = byte_at(key, i);
                    let node = &self.nodes[cur as usize];
                    if b == node.split {
                        if b == 0 {
                            if !replace {
                                return Err(ClassifierError::DuplicateKey);
                            }
                            let node = &mut self.nodes[cur as usize];
                            return Ok(node.value.replace(value));
                        }
                        match node.eq {
                            Some(next) => {
                                cur = next;
                                i += 1;
                            }
                            None => break (Slot::Eq(cur), i + 1),
                        }
                    } else if node.goes_lo(b) {
                        match node.lo {
                            Some(next) => cur = next,
                            None => break (Slot::Lo(cur), i),
                        }
                    } else {
                        match node.hi {
                            Some(next) => cur = next,
                            None => break (Slot::Hi(cur), i),
                        }
                    }
                }
            }
        };

        // One node per remaining key byte plus the terminator. Reserve them
        // all before touching the visible tree.
        let needed = key.len() + 1 - start;
        self.reserve(needed)?;

        let mut head = None;
        let mut prev: Option<NodeId> = None;
        for i in start..=key.len() {
            let id = self.alloc();
            let node = &mut self.nodes[id as usize];
            node.split = byte_at(key, i);
            match prev {
                Some(p) => self.nodes[p as usize].eq = Some(id),
                None => head = Some(id),
            }
            prev = Some(id);
        }
        if let Some(last) = prev {
            self.nodes[last as usize].value = Some(value);
        }
        self.set_slot(slot, head);
        self.len += 1;
        Ok(None)
    }

    /// Remove `key` and return its value.
    ///
    /// Only nodes used by no other key are recycled; a branching node on the
    /// removed path is replaced by one of its children.
    pub fn remove(&mut self, key: &[u8]) -> Option<T> {
        if validate_key(key).is_err() {
            return None;
        }
        let first = key[0];
        let mut cur = self.roots[usize::from(first)]?;
        let mut slot = Slot::Root(first);
        // Deepest node from which the key's nodes stop being shared.
        let mut branch: Option<(Slot, NodeId)> = None;
        let mut i = 1;

        loop {
            let b = byte_at(key, i);
            let node = &self.nodes[cur as usize];
            if b == node.split {
                if node.has_siblings() {
                    branch = Some((slot, cur));
                }
                if b == 0 {
                    break;
                }
                slot = Slot::Eq(cur);
                cur = node.eq?;
                i += 1;
            } else {
                let (next_slot, next) = if node.goes_lo(b) {
                    (Slot::Lo(cur), node.lo)
                } else {
                    (Slot::Hi(cur), node.hi)
                };
                slot = next_slot;
                cur = next?;
                branch = Some((slot, cur));
            }
        }

        let chain = match branch {
            None => {
                let head = self.roots[usize::from(first)];
                self.roots[usize::from(first)] = None;
                head?
            }
            Some((parent, id)) => {
                let node = &self.nodes[id as usize];
                let replacement = match (node.lo, node.hi) {
                    (None, None) => None,
                    (Some(lo), None) => Some(lo),
                    (None, Some(hi)) => Some(hi),
                    (Some(lo), Some(hi)) => {
                        let mut leftmost = hi;
                        while let Some(next) = self.nodes[leftmost as usize].lo {
                            leftmost = next;
                        }
                        self.nodes[leftmost as usize].lo = Some(lo);
                        Some(hi)
                    }
                };
                self.set_slot(parent, replacement);
                id
            }
        };

        let value = self.recycle_chain(chain);
        if value.is_some() {
            self.len -= 1;
        }
        value
    }

    /// Value stored under exactly `key`.
    pub fn get(&self, key: &[u8]) -> Option<&T> {
        self.longest_prefix(key)
            .filter(|(len, _)| *len == key.len())
            .map(|(_, value)| value)
    }

    /// Longest stored key that is a prefix of `key` (including `key`
    /// itself), as its length and value.
    ///
    /// Every depth is checked for a terminator, so the answer does not
    /// depend on the order keys were inserted in.
    pub fn longest_prefix(&self, key: &[u8]) -> Option<(usize, &T)> {
        let &first = key.first()?;
        if first == 0 || usize::from(first) >= ROOT_SLOTS {
            return None;
        }
        let mut level = self.roots[usize::from(first)];
        let mut best = None;
        let mut i = 1;

        while let Some(root) = level {
            if let Some(value) = self.terminator_value(root) {
                best = Some((i, value));
            }
            let Some(&b) = key.get(i) else { break };
            if b == 0 {
                break;
            }
            level = self.find_in_level(root, b).and_then(|id| self.nodes[id as usize].eq);
            i += 1;
        }

        best
    }

    /// Every stored key. Order follows the tree layout, not byte order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<(NodeId, Vec<u8>)> = Vec::new();
        for (first, root) in self.roots.iter().enumerate() {
            if let Some(id) = *root {
                stack.push((id, vec![first as u8]));
            }
        }

        while let Some((id, prefix)) = stack.pop() {
            let node = &self.nodes[id as usize];
            if let Some(hi) = node.hi {
                stack.push((hi, prefix.clone()));
            }
            if let Some(lo) = node.lo {
                stack.push((lo, prefix.clone()));
            }
            if node.is_terminator() {
                if node.value.is_some() {
                    out.push(prefix);
                }
            } else if let Some(eq) = node.eq {
                let mut next = prefix;
                next.push(node.split);
                stack.push((eq, next));
            }
        }

        out
    }

    // ----- arena ----------------------------------------------------------

    /// Make sure at least `needed` nodes are on the free stack.
    fn reserve(&mut self, needed: usize) -> Result<(), ClassifierError> {
        while self.free.len() < needed {
            self.grow()?;
        }
        Ok(())
    }

    fn grow(&mut self) -> Result<(), ClassifierError> {
        if self.max_lines.is_some_and(|max| self.lines >= max) {
            tracing::debug!(lines = self.lines, "trie arena line cap reached");
            return Err(ClassifierError::AllocationFailed);
        }
        let base = self.nodes.len();
        let end = base + self.line_width;
        if end > NodeId::MAX as usize {
            return Err(ClassifierError::AllocationFailed);
        }
        self.nodes
            .try_reserve_exact(self.line_width)
            .map_err(|_| ClassifierError::AllocationFailed)?;
        self.free
            .try_reserve(self.line_width)
            .map_err(|_| ClassifierError::AllocationFailed)?;

        self.nodes.extend((base..end).map(|_| Node::vacant()));
        // Pushed in reverse so the lowest index is handed out first.
        self.free.extend((base..end).rev().map(|id| id as NodeId));
        self.lines += 1;
        tracing::trace!(lines = self.lines, nodes = self.nodes.len(), "trie arena grew");
        Ok(())
    }

    /// Pop a node off the free stack. Callers reserve first.
    fn alloc(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => id,
            None => unreachable!("alloc without reserve"),
        }
    }

    /// Return the chain starting at `id` (following `eq` down to the
    /// terminator) to the free stack, clearing every node.
    fn recycle_chain(&mut self, mut id: NodeId) -> Option<T> {
        loop {
            let node = std::mem::replace(&mut self.nodes[id as usize], Node::vacant());
            self.free.push(id);
            if node.is_terminator() {
                return node.value;
            }
            id = node.eq?;
        }
    }

    // ----- navigation -----------------------------------------------------

    fn set_slot(&mut self, slot: Slot, target: Option<NodeId>) {
        match slot {
            Slot::Root(b) => self.roots[usize::from(b)] = target,
            Slot::Lo(id) => self.nodes[id as usize].lo = target,
            Slot::Eq(id) => self.nodes[id as usize].eq = target,
            Slot::Hi(id) => self.nodes[id as usize].hi = target,
        }
    }

    /// The value of the terminator in the level rooted at `root`, if any.
    ///
    /// A terminator compares below every other split byte, so it sits on the
    /// level's leftmost spine.
    fn terminator_value(&self, root: NodeId) -> Option<&T> {
        let mut cur = Some(root);
        while let Some(id) = cur {
            let node = &self.nodes[id as usize];
            if node.is_terminator() {
                return node.value.as_ref();
            }
            cur = node.lo;
        }
        None
    }

    /// The node splitting on `b` (non-zero) in the level rooted at `root`.
    fn find_in_level(&self, root: NodeId, b: u8) -> Option<NodeId> {
        let mut cur = Some(root);
        while let Some(id) = cur {
            let node = &self.nodes[id as usize];
            if node.split == b {
                return Some(id);
            }
            cur = if node.goes_lo(b) { node.lo } else { node.hi };
        }
        None
    }
}

/// Key byte at `i`, with the implicit terminator past the end.
#[inline]
fn byte_at(key: &[u8], i: usize) -> u8 {
    key.get(i).copied().unwrap_or(0)
}

fn validate_key(key: &[u8]) -> Result<(), ClassifierError> {
    let &first = key.first().ok_or(ClassifierError::NullKey)?;
    if first == 0 || usize::from(first) >= ROOT_SLOTS {
        return Err(ClassifierError::InvalidKey {
            byte: first,
            index: 0,
        });
    }
    if let Some(index) = key.iter().position(|&b| b == 0) {
        return Err(ClassifierError::InvalidKey { byte: 0, index });
    }
    Ok(())
}
