//! Target-side vocabulary: id → display token.
//!
//! The corpus dictionary maps words to ids; sampling output needs the
//! inverse. Built once at startup and handed to the probe.

use std::collections::HashMap;

use crate::tokens;

/// Index-to-token lookup.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    itos: Vec<String>,
}

impl Vocab {
    /// Invert a word → id dictionary. Ids absent from the map display as
    /// the UNK token.
    pub fn from_word2idx(word2idx: &HashMap<String, u32>) -> Self {
        let size = word2idx
            .values()
            .map(|&id| id as usize + 1)
            .max()
            .unwrap_or(0);
        let mut itos = vec![String::new(); size];
        for (word, &id) in word2idx {
            itos[id as usize] = word.clone();
        }
        Self { itos }
    }

    /// Build directly from an id-ordered token list.
    pub fn from_tokens(itos: Vec<String>) -> Self {
        Self { itos }
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// Display string for one id.
    pub fn token(&self, id: u32) -> &str {
        match self.itos.get(id as usize) {
            Some(tok) if !tok.is_empty() => tok,
            _ => tokens::UNK_TOKEN,
        }
    }

    /// Join a decoded id sequence into a display string.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter().map(|&id| self.token(id)).collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
