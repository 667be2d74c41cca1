//! Query classification and fusion weight selection.
//!
//! A canonicalized query is labeled with a [`QueryClass`] by shape, and the
//! class picks the lexical/semantic bias used when fusing the two ranked
//! lists. Identifier-shaped queries lean lexical, natural language leans
//! semantic, short keyword queries sit in the middle.

use regex::Regex;
use std::sync::LazyLock;

const SHORT_QUERY_MAX_TOKENS: usize = 3;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_./-]*$").expect("identifier pattern"));
static TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}$").expect("ticker pattern"));

/// Shape-based label for a canonicalized query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// No non-space characters.
    Empty,
    /// Symbol, path, or ticker shaped single token.
    Identifier,
    /// Up to three tokens of plain keywords.
    Short,
    /// Everything else.
    NaturalLanguage,
}

/// Per-source weights applied inside the RRF sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Weight of the lexical (BM25) ranked list.
    pub lexical: f32,
    /// Weight of the semantic (vector) ranked list.
    pub semantic: f32,
}

impl QueryClass {
    /// Fusion weights selected by this class.
    ///
    /// Empty queries never reach fusion; their weights are zero.
    pub fn weights(self) -> FusionWeights {
        match self {
            Self::Empty => FusionWeights {
                lexical: 0.0,
                semantic: 0.0,
            },
            Self::Identifier => FusionWeights {
                lexical: 0.7,
                semantic: 0.3,
            },
            Self::Short => FusionWeights {
                lexical: 0.5,
                semantic: 0.5,
            },
            Self::NaturalLanguage => FusionWeights {
                lexical: 0.3,
                semantic: 0.7,
            },
        }
    }
}

/// Classifies a canonicalized query; total, first matching rule wins.
pub fn classify(query: &str) -> QueryClass {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return QueryClass::Empty;
    }

    if TICKER.is_match(trimmed) || IDENTIFIER.is_match(trimmed) {
        return QueryClass::Identifier;
    }

    if trimmed.split_whitespace().count() <= SHORT_QUERY_MAX_TOKENS {
        return QueryClass::Short;
    }

    QueryClass::NaturalLanguage
}
