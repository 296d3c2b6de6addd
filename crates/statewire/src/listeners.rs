#![forbid(unsafe_code)]

//! Insertion-ordered listener storage with O(1) removal.
//!
//! Nodes live in a slot arena and are threaded into a doubly linked list.
//! A [`ListenerKey`] pairs a slot index with the subscription id that
//! occupied it, so a stale key never removes a newer node that reused the
//! slot.
//!
//! ```text
//!  head                                   tail
//!   │                                      │
//!   ▼                                      ▼
//! [slot 2] ⇄ [slot 0] ⇄ [slot 3] ⇄ ... ⇄ [slot 1]     free: [4, 5]
//! ```
//!
//! # Invariants
//!
//! 1. Iteration yields entries in insertion order.
//! 2. Removing an entry never reorders the remaining ones.
//! 3. `len` equals the number of occupied slots reachable from `head`.

use crate::error::SubscriptionId;

/// Handle identifying one entry in a [`ListenerList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListenerKey {
    slot: usize,
    id: SubscriptionId,
}

impl ListenerKey {
    pub(crate) fn id(self) -> SubscriptionId {
        self.id
    }
}

struct Node<C> {
    id: SubscriptionId,
    callback: C,
    prev: Option<usize>,
    next: Option<usize>,
}

pub(crate) struct ListenerList<C> {
    slots: Vec<Option<Node<C>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    next_id: u64,
}

impl<C> Default for ListenerList<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            next_id: 0,
        }
    }
}

impl<C> ListenerList<C> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a callback at the end of the order.
    pub(crate) fn push_back(&mut self, callback: C) -> ListenerKey {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let node = Node {
            id,
            callback,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(tail_node) = self.slots[tail].as_mut() {
                    tail_node.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;

        ListenerKey { slot, id }
    }

    /// Whether `key` still refers to a live entry.
    pub(crate) fn contains(&self, key: ListenerKey) -> bool {
        matches!(self.slots.get(key.slot), Some(Some(node)) if node.id == key.id)
    }

    /// Unlink and return the entry for `key`. Stale keys return `None`.
    pub(crate) fn remove(&mut self, key: ListenerKey) -> Option<C> {
        if !self.contains(key) {
            return None;
        }
        let node = self.slots[key.slot].take()?;

        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = self.slots[prev].as_mut() {
                    prev_node.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = self.slots[next].as_mut() {
                    next_node.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        self.free.push(key.slot);
        self.len -= 1;
        Some(node.callback)
    }

    /// Iterate `(key, callback)` in insertion order.
    pub(crate) fn iter(&self) -> Iter<'_, C> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }
}

pub(crate) struct Iter<'a, C> {
    list: &'a ListenerList<C>,
    cursor: Option<usize>,
}

impl<'a, C> Iterator for Iter<'a, C> {
    type Item = (ListenerKey, &'a C);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.list.slots[slot].as_ref()?;
        self.cursor = node.next;
        Some((ListenerKey { slot, id: node.id }, &node.callback))
    }
}
