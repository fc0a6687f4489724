// src/symbols.rs
//! Interns 8-byte space-padded stock symbols to small dense ids.

use hashbrown::HashMap;

/// Dense symbol id. 0 is reserved for "unknown/absent".
pub type SymbolId = u16;

/// Insertion-only symbol table. Ids are assigned monotonically from 1 and
/// stay stable for the lifetime of the process.
pub struct SymbolTable {
    names: Vec<[u8; 8]>,
    ids: HashMap<[u8; 8], SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            // Slot 0 backs the reserved id.
            names: vec![[b' '; 8]],
            ids: HashMap::new(),
        }
    }

    /// Interns a raw 8-byte token. Comparison ignores trailing padding, so
    /// `b"AAPL    "` and `b"AAPL\0\0\0\0"` resolve to the same id.
    ///
    /// # Panics
    ///
    /// Panics when the 16-bit id space is exhausted. ITCH symbol cardinality
    /// is a few thousand, so this is a configuration error, not a runtime
    /// condition.
    pub fn intern(&mut self, raw: &[u8; 8]) -> SymbolId {
        let key = normalize(raw);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.names.len();
        assert!(id <= SymbolId::MAX as usize, "symbol id space exhausted");
        self.names.push(key);
        self.ids.insert(key, id as SymbolId);
        id as SymbolId
    }

    /// Printable name for `id`; empty for the reserved id 0 and for ids
    /// never handed out.
    pub fn name(&self, id: SymbolId) -> String {
        match self.names.get(id as usize) {
            Some(raw) => {
                let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
                String::from_utf8_lossy(&raw[..end]).into_owned()
            }
            None => String::new(),
        }
    }

    /// Number of distinct symbols interned (excluding the reserved id).
    pub fn len(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Trims trailing spaces and NULs, then re-pads with spaces so every
/// spelling of a symbol shares one canonical key.
fn normalize(raw: &[u8; 8]) -> [u8; 8] {
    let mut key = [b' '; 8];
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |p| p + 1);
    key[..end].copy_from_slice(&raw[..end]);
    key
}
