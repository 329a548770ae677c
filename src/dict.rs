//! The dictionary shared in structure, but never in state, by encoder and decoder.
//!
//! It is a trie over byte strings where every node is identified by its code, together with a
//! table that maps each code back to its string. The root of the trie has no code of its own and
//! is stored in the slot of the clear code, which never names a string.
use tracing::debug;

use crate::{Code, CLEAR_CODE, CODE_LIMIT, MIN_CODESIZE};

/// The node representing the empty string.
pub(crate) const ROOT: Code = CLEAR_CODE;

/// Marks an unused slot of a `Full` successor map.
const NO_CODE: Code = Code::MAX;

/// Nodes with at most this many successors keep them in a linear list.
const SHORT: usize = 4;

/// The outcome of extending a node by one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extend {
    /// The extended string was already known.
    Matched(Code),
    /// The extended string was assigned a new code.
    Inserted(Code),
    /// The extended string is unknown and there is no room for it.
    Full,
}

/// An adaptive LZW dictionary.
///
/// A fresh dictionary knows the 256 single byte strings as codes `0..=255` and has reserved
/// the clear code, so the next code is 257 and codes are 9 bits wide.
pub struct Dictionary {
    /// The successor map of each node, indexed by code.
    keys: Vec<Key>,
    /// Successor lists of nodes with few successors.
    simples: Vec<Simple>,
    /// Slots of `simples` left behind by promoted nodes.
    free_simples: Vec<u32>,
    /// Successor maps of nodes with many successors. The first one belongs to the root.
    complex: Vec<Full>,
    /// How to rebuild the string of each code.
    links: Vec<Link>,
    /// The width in bits of the codes currently transmitted.
    code_width: u8,
    /// The code the next new string gets.
    next_code: Code,
    /// The configured bound on `next_code`, 0 for none.
    max_code: Code,
}

#[derive(Clone, Copy, Debug)]
enum Key {
    NoSuccessor,
    Simple(u32),
    Full(u32),
}

#[derive(Clone, Copy)]
struct Simple {
    codes: [Code; SHORT],
    chars: [u8; SHORT],
    count: u8,
}

#[derive(Clone)]
struct Full {
    char_continuation: Box<[Code; 256]>,
}

/// A code's string is the string of `prefix` followed by `byte`.
#[derive(Clone, Copy, Debug)]
struct Link {
    prefix: Code,
    byte: u8,
    /// The first byte of the whole string.
    first: u8,
    /// The length of the whole string, 0 for the reserved clear code.
    depth: u32,
}

impl Dictionary {
    /// Create a fresh dictionary.
    ///
    /// `max_code` bounds the codes that may be assigned, codes are only assigned while
    /// `next_code < max_code`. Pass 0 for a dictionary that only stops growing at the widest
    /// code size. The bound must have been validated by the caller.
    pub(crate) fn new(max_code: Code) -> Self {
        let mut dict = Dictionary {
            keys: Vec::new(),
            simples: Vec::new(),
            free_simples: Vec::new(),
            complex: Vec::new(),
            links: Vec::new(),
            code_width: 1,
            next_code: 0,
            max_code,
        };
        dict.reset();
        dict
    }

    /// Drop all learned strings and return to the fresh state.
    pub(crate) fn reset(&mut self) {
        self.keys.clear();
        self.simples.clear();
        self.free_simples.clear();
        self.complex.clear();
        self.links.clear();
        self.code_width = 1;
        self.next_code = 0;

        self.complex.push(Full::empty());
        for byte in 0..=255u8 {
            let code = self.next_code;
            self.complex[0].char_continuation[usize::from(byte)] = code;
            self.keys.push(Key::NoSuccessor);
            self.links.push(Link { prefix: ROOT, byte, first: byte, depth: 1 });
            self.next_code += 1;
            self.grow_width(self.next_code);
        }

        // The clear code is reserved, its slot carries the root.
        self.keys.push(Key::Full(0));
        self.links.push(Link { prefix: ROOT, byte: 0, first: 0, depth: 0 });
        self.next_code += 1;
        self.grow_width(self.next_code);
        debug_assert_eq!(self.code_width, MIN_CODESIZE);
        debug_assert_eq!(self.next_code, CLEAR_CODE + 1);
    }

    /// Walk from `node` along `byte`, creating the successor if it is unknown and allowed.
    ///
    /// Does not touch the code width, the caller decides when the new code becomes visible on
    /// the wire.
    pub(crate) fn extend(&mut self, node: Code, byte: u8) -> Extend {
        if let Some(next) = self.at_key(node, byte) {
            return Extend::Matched(next);
        }

        if !self.can_grow() {
            return Extend::Full;
        }

        let code = self.append(node, byte);
        let parent = self.links[node as usize];
        let link = if node == ROOT {
            Link { prefix: ROOT, byte, first: byte, depth: 1 }
        } else {
            Link { prefix: node, byte, first: parent.first, depth: parent.depth + 1 }
        };
        self.links.push(link);
        self.next_code += 1;
        Extend::Inserted(code)
    }

    /// Widen codes by one bit if `pending` no longer fits the current width.
    ///
    /// `pending` is the value `next_code` has, or will have, on the encoding side when the next
    /// code is written. It only ever advances by one per code, so a single step suffices.
    pub(crate) fn grow_width(&mut self, pending: Code) {
        if u64::from(pending) >= 1u64 << self.code_width {
            self.code_width += 1;
            if self.code_width > MIN_CODESIZE {
                debug!(width = self.code_width, next_code = pending, "code width grows");
            }
        }
    }

    /// If another code can be assigned.
    pub(crate) fn can_grow(&self) -> bool {
        let limit = match self.max_code {
            0 => CODE_LIMIT,
            max => max.min(CODE_LIMIT),
        };
        self.next_code < limit
    }

    /// If `code` names a string, rather than the clear code or an unassigned code.
    pub(crate) fn is_assigned(&self, code: Code) -> bool {
        code < self.next_code && code != CLEAR_CODE
    }

    /// The first byte of the string of an assigned code.
    pub(crate) fn first_byte(&self, code: Code) -> u8 {
        self.links[code as usize].first
    }

    /// Write the string of an assigned code into `buffer`, replacing its contents.
    pub(crate) fn reconstruct(&self, code: Code, buffer: &mut Vec<u8>) {
        let depth = self.links[code as usize].depth as usize;
        buffer.clear();
        buffer.resize(depth, 0);
        let mut code_iter = code;
        for ch in buffer.iter_mut().rev() {
            let link = self.links[code_iter as usize];
            *ch = link.byte;
            code_iter = link.prefix;
        }
    }

    /// The current code width in bits.
    pub fn code_width(&self) -> u8 {
        self.code_width
    }

    /// The code that the next new string will be assigned.
    pub fn next_code(&self) -> Code {
        self.next_code
    }

    /// The configured bound on assigned codes, 0 if unbounded.
    pub fn max_code(&self) -> Code {
        self.max_code
    }

    /// The string a code stands for, `None` for the clear code and unassigned codes.
    pub fn sequence(&self, code: Code) -> Option<Vec<u8>> {
        if !self.is_assigned(code) {
            return None;
        }
        let mut buffer = Vec::new();
        self.reconstruct(code, &mut buffer);
        Some(buffer)
    }

    fn at_key(&self, code: Code, ch: u8) -> Option<Code> {
        match self.keys[code as usize] {
            Key::NoSuccessor => None,
            Key::Simple(idx) => {
                let nexts = &self.simples[idx as usize];
                nexts
                    .chars
                    .iter()
                    .zip(nexts.codes.iter())
                    .take(usize::from(nexts.count))
                    .find(|&(&sch, _)| sch == ch)
                    .map(|(_, &scode)| scode)
            }
            Key::Full(idx) => {
                let precode = self.complex[idx as usize].char_continuation[usize::from(ch)];
                if precode != NO_CODE {
                    Some(precode)
                } else {
                    None
                }
            }
        }
    }

    /// Record `code --ch--> next_code` in the trie and create the node for the new code.
    fn append(&mut self, code: Code, ch: u8) -> Code {
        let next = self.next_code;
        debug_assert_eq!(self.keys.len(), next as usize);
        match self.keys[code as usize] {
            Key::NoSuccessor => {
                let mut simple = Simple::default();
                simple.codes[0] = next;
                simple.chars[0] = ch;
                simple.count = 1;
                let idx = match self.free_simples.pop() {
                    Some(idx) => {
                        self.simples[idx as usize] = simple;
                        idx
                    }
                    None => {
                        self.simples.push(simple);
                        self.simples.len() as u32 - 1
                    }
                };
                self.keys[code as usize] = Key::Simple(idx);
            }
            Key::Simple(idx) if usize::from(self.simples[idx as usize].count) < SHORT => {
                let nexts = &mut self.simples[idx as usize];
                let nidx = usize::from(nexts.count);
                nexts.chars[nidx] = ch;
                nexts.codes[nidx] = next;
                nexts.count += 1;
            }
            Key::Simple(idx) => {
                let new_key = Key::Full(self.complex.len() as u32);
                let simple = &self.simples[idx as usize];
                let mut full = Full::empty();
                for (&pch, &pcont) in simple.chars.iter().zip(simple.codes.iter()) {
                    full.char_continuation[usize::from(pch)] = pcont;
                }
                full.char_continuation[usize::from(ch)] = next;
                self.complex.push(full);
                self.free_simples.push(idx);
                self.keys[code as usize] = new_key;
            }
            Key::Full(idx) => {
                self.complex[idx as usize].char_continuation[usize::from(ch)] = next;
            }
        }
        self.keys.push(Key::NoSuccessor);
        next
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Dictionary::new(0)
    }
}

impl core::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dictionary")
            .field("code_width", &self.code_width)
            .field("next_code", &self.next_code)
            .field("max_code", &self.max_code)
            .finish()
    }
}

impl Default for Simple {
    fn default() -> Self {
        Simple {
            codes: [0; SHORT],
            chars: [0; SHORT],
            count: 0,
        }
    }
}

impl Full {
    fn empty() -> Self {
        Full {
            char_continuation: Box::new([NO_CODE; 256]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dictionary, Extend, ROOT};
    use crate::{CLEAR_CODE, MIN_CODESIZE};

    #[test]
    fn fresh_dictionary() {
        let dict = Dictionary::new(0);
        assert_eq!(dict.code_width(), MIN_CODESIZE);
        assert_eq!(dict.next_code(), 257);
        for byte in 0..=255u8 {
            assert_eq!(dict.sequence(u32::from(byte)), Some(vec![byte]));
        }
        assert_eq!(dict.sequence(CLEAR_CODE), None);
        assert_eq!(dict.sequence(257), None);
    }

    #[test]
    fn extend_matches_then_inserts() {
        let mut dict = Dictionary::new(0);
        assert_eq!(dict.extend(ROOT, b'a'), Extend::Matched(u32::from(b'a')));
        assert_eq!(dict.extend(u32::from(b'a'), b'b'), Extend::Inserted(257));
        assert_eq!(dict.extend(u32::from(b'a'), b'b'), Extend::Matched(257));
        assert_eq!(dict.extend(257, b'c'), Extend::Inserted(258));
        assert_eq!(dict.sequence(258), Some(b"abc".to_vec()));
        assert_eq!(dict.first_byte(258), b'a');
        assert_eq!(dict.next_code(), 259);
    }

    #[test]
    fn successors_promote_past_short_list() {
        let mut dict = Dictionary::new(0);
        let node = u32::from(b'x');
        let mut codes = vec![];
        for ch in 0..20u8 {
            match dict.extend(node, ch) {
                Extend::Inserted(code) => codes.push(code),
                other => panic!("{:?}", other),
            }
        }
        for (ch, &code) in (0..20u8).zip(&codes) {
            assert_eq!(dict.extend(node, ch), Extend::Matched(code));
            assert_eq!(dict.sequence(code), Some(vec![b'x', ch]));
        }
    }

    #[test]
    fn bounded_dictionary_is_full() {
        let mut dict = Dictionary::new(258);
        assert_eq!(dict.extend(1, 2), Extend::Inserted(257));
        assert_eq!(dict.extend(1, 3), Extend::Full);
        assert_eq!(dict.extend(1, 2), Extend::Matched(257));
        assert_eq!(dict.next_code(), 258);

        let mut dict = Dictionary::new(257);
        assert_eq!(dict.extend(0, 0), Extend::Full);
        assert!(!dict.can_grow());
    }

    #[test]
    fn width_steps_once_next_code_reaches_power_of_two() {
        let mut dict = Dictionary::new(0);
        let mut node = 0;
        while dict.next_code() < 511 {
            match dict.extend(node, 0) {
                Extend::Inserted(code) => node = code,
                other => panic!("{:?}", other),
            }
            dict.grow_width(dict.next_code());
            assert_eq!(dict.code_width(), 9);
        }
        dict.extend(node, 0);
        dict.grow_width(dict.next_code());
        assert_eq!(dict.next_code(), 512);
        assert_eq!(dict.code_width(), 10);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut dict = Dictionary::new(0);
        let mut node = u32::from(b'q');
        for _ in 0..1000 {
            if let Extend::Inserted(code) = dict.extend(node, b'q') {
                node = code;
            }
            dict.grow_width(dict.next_code());
        }
        assert!(dict.code_width() > MIN_CODESIZE);
        dict.reset();
        assert_eq!(dict.code_width(), MIN_CODESIZE);
        assert_eq!(dict.next_code(), 257);
        assert_eq!(dict.sequence(257), None);
        assert_eq!(dict.extend(u32::from(b'q'), b'q'), Extend::Inserted(257));
    }

    #[test]
    fn promoted_lists_are_reused() {
        let mut dict = Dictionary::new(0);
        for ch in 0..5u8 {
            dict.extend(u32::from(b'x'), ch);
        }
        // The short list of 'x' was promoted to a full table and its slot freed.
        assert_eq!(dict.simples.len(), 1);
        assert_eq!(dict.free_simples, [0]);

        assert!(matches!(dict.extend(u32::from(b'y'), 0), Extend::Inserted(_)));
        assert_eq!(dict.simples.len(), 1);
        assert!(dict.free_simples.is_empty());
        for ch in 0..5u8 {
            assert!(matches!(dict.extend(u32::from(b'x'), ch), Extend::Matched(_)));
        }
        assert_eq!(dict.sequence(262), Some(vec![b'y', 0]));
    }
}
