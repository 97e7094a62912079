//! Rule-based message classification.
//!
//! Every signal is a keyword-set membership test against the normalized text.
//! Signals are independent: one message can raise several of them. Adding a
//! signal means adding a row to a table, not a new code path.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::product::ProductKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Support,
    Faq,
    Promo,
    PackListing,
    AllPacks,
    Recommendation,
    PurchaseIntent,
}

impl Signal {
    pub const ALL: [Signal; 7] = [
        Self::Support,
        Self::Faq,
        Self::Promo,
        Self::PackListing,
        Self::AllPacks,
        Self::Recommendation,
        Self::PurchaseIntent,
    ];
}

/// How a keyword is compared against the normalized text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeywordMatch {
    /// The keyword must appear as whole words.
    Word,
    /// The keyword must start a word, so `rembours` covers `remboursement`.
    Stem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keyword {
    pub text: &'static str,
    pub matching: KeywordMatch,
}

impl Keyword {
    /// `haystack` must be the normalized text padded with one space on each side.
    fn found_in(&self, haystack: &str) -> bool {
        match self.matching {
            KeywordMatch::Word => haystack.contains(&format!(" {} ", self.text)),
            KeywordMatch::Stem => haystack.contains(&format!(" {}", self.text)),
        }
    }
}

const fn word(text: &'static str) -> Keyword {
    Keyword { text, matching: KeywordMatch::Word }
}

const fn stem(text: &'static str) -> Keyword {
    Keyword { text, matching: KeywordMatch::Stem }
}

/// Keywords are written already normalized. Short words and acronyms are
/// whole-word matches; only long stems match inflections.
pub const SIGNAL_KEYWORDS: &[(Signal, &[Keyword])] = &[
    (
        Signal::Support,
        &[
            word("support"),
            stem("contact"),
            word("joindre"),
            word("pas recu"),
            word("pas recue"),
            word("non recu"),
            word("jamais recu"),
            stem("probleme"),
            stem("rembours"),
            word("sav"),
            word("service client"),
            word("help"),
            word("refund"),
        ],
    ),
    (
        Signal::Faq,
        &[
            word("faq"),
            stem("question frequente"),
            stem("questions frequentes"),
            word("foire aux questions"),
        ],
    ),
    (
        Signal::Promo,
        &[
            word("promo"),
            word("promos"),
            word("code"),
            word("codes"),
            stem("coupon"),
            stem("reduction"),
            stem("remise"),
            word("soldes"),
            stem("discount"),
            word("bon plan"),
        ],
    ),
    (
        Signal::PackListing,
        &[
            word("packs"),
            word("catalogue"),
            word("quels packs"),
            word("liste des packs"),
            word("packs disponibles"),
            word("vos produits"),
            word("products"),
        ],
    ),
    (
        Signal::AllPacks,
        &[
            word("tous"),
            word("toutes"),
            word("all"),
            word("liste complete"),
            word("catalogue complet"),
            word("everything"),
        ],
    ),
    (
        Signal::Recommendation,
        &[
            word("quel pack"),
            word("tu me conseilles"),
            word("tu recommandes"),
            word("vous recommandez"),
            word("je commence"),
            stem("debutant"),
            word("debuter"),
            word("par ou commencer"),
            stem("recommend"),
            stem("beginner"),
            word("which pack"),
            word("where to start"),
        ],
    ),
    (
        Signal::PurchaseIntent,
        &[
            word("acheter"),
            word("achete"),
            word("commander"),
            word("je veux"),
            word("je prends"),
            word("prix"),
            word("combien"),
            word("payer"),
            word("panier"),
            word("buy"),
            word("purchase"),
            word("price"),
            word("how much"),
        ],
    ),
];

pub const PRODUCT_KEYWORDS: &[(ProductKey, &[Keyword])] = &[
    (ProductKey::Accessoires, &[stem("accessoire"), stem("accessor")]),
    (ProductKey::Vetements, &[stem("vetement"), word("clothes"), word("clothing")]),
    (ProductKey::Chaussures, &[stem("chaussure"), stem("sneaker"), word("shoes"), word("baskets")]),
    (ProductKey::Parfums, &[stem("parfum"), stem("perfume"), stem("fragrance")]),
    (ProductKey::Tech, &[word("pack tech"), word("high tech"), word("electronique"), stem("gadget")]),
    (ProductKey::Bundle, &[word("bundle"), word("giga")]),
    (ProductKey::Blueprint, &[word("blueprint"), stem("ebook"), word("guide")]),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Intent {
    normalized: String,
    signals: BTreeSet<Signal>,
    mentions: BTreeMap<ProductKey, bool>,
}

impl Intent {
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn has(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    pub fn has_any(&self, signals: &[Signal]) -> bool {
        signals.iter().any(|signal| self.has(*signal))
    }

    pub fn signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.signals.iter().copied()
    }

    pub fn mentions(&self, product: ProductKey) -> bool {
        self.mentions.get(&product).copied().unwrap_or(false)
    }

    pub fn mentioned_products(&self) -> Vec<ProductKey> {
        self.mentions.iter().filter(|(_, mentioned)| **mentioned).map(|(key, _)| *key).collect()
    }

    /// Builds an intent from explicit parts. Used by the policy tests to walk
    /// the full signal space without going through keyword tables.
    pub fn from_parts(
        signals: impl IntoIterator<Item = Signal>,
        mentioned: impl IntoIterator<Item = ProductKey>,
    ) -> Self {
        let mut mentions: BTreeMap<ProductKey, bool> =
            ProductKey::ALL.iter().map(|key| (*key, false)).collect();
        for key in mentioned {
            mentions.insert(key, true);
        }
        Self { normalized: String::new(), signals: signals.into_iter().collect(), mentions }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, raw_text: &str) -> Intent {
        let normalized = normalize_text(raw_text);
        let haystack = format!(" {normalized} ");

        let signals = SIGNAL_KEYWORDS
            .iter()
            .filter(|(_, keywords)| matches_any(&haystack, keywords))
            .map(|(signal, _)| *signal)
            .collect();

        let mentions = PRODUCT_KEYWORDS
            .iter()
            .map(|(product, keywords)| (*product, matches_any(&haystack, keywords)))
            .collect();

        Intent { normalized, signals, mentions }
    }
}

/// Lowercases, strips diacritics and collapses every non-alphanumeric run to a
/// single space.
pub fn normalize_text(text: &str) -> String {
    let stripped: String =
        text.nfd().filter(|character| !is_combining_mark(*character)).collect::<String>();

    let mut normalized = String::with_capacity(stripped.len());
    for character in stripped.to_lowercase().chars() {
        if character.is_alphanumeric() {
            normalized.push(character);
        } else if !normalized.ends_with(' ') {
            normalized.push(' ');
        }
    }
    normalized.trim().to_string()
}

fn matches_any(haystack: &str, keywords: &[Keyword]) -> bool {
    keywords.iter().any(|keyword| keyword.found_in(haystack))
}

/// Word-start containment check usable on any normalized text.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    format!(" {normalized} ").contains(&format!(" {phrase}"))
}

/// Whole-word containment check usable on any normalized text.
pub fn contains_word(normalized: &str, word: &str) -> bool {
    format!(" {normalized} ").contains(&format!(" {word} "))
}
