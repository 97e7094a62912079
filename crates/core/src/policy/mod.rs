//! Deterministic response policy.
//!
//! Reply routing and card selection are two ordered rule lists evaluated
//! top-down; the first rule that applies wins. The order of each list is the
//! precedence contract, so each rule is a named row that can be tested alone.
//! Actions are not exclusive: every action rule that applies contributes.

pub mod replies;

use serde::Serialize;

use crate::domain::catalog::{Catalog, FAQ_URL, SUPPORT_EMAIL};
use crate::domain::product::ProductKey;
use crate::domain::promo;
use crate::domain::reply::Action;
use crate::intent::{Intent, Signal};
use crate::knowledge::KnowledgeStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    Support,
    PromoOrCatalog,
    KbGuard,
    Generative,
}

impl ReplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::PromoOrCatalog => "promo_or_catalog",
            Self::KbGuard => "kb_guard",
            Self::Generative => "generative",
        }
    }

    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Self::Generative)
    }
}

pub struct ReplyRule {
    pub name: &'static str,
    pub applies: fn(&Intent, KnowledgeStatus) -> bool,
    pub mode: ReplyMode,
}

pub struct CardRule {
    pub name: &'static str,
    pub select: fn(&Intent) -> Option<Vec<ProductKey>>,
}

const COMMERCIAL_SIGNALS: [Signal; 4] =
    [Signal::PackListing, Signal::Promo, Signal::Recommendation, Signal::PurchaseIntent];

pub const REPLY_RULES: &[ReplyRule] = &[
    ReplyRule { name: "support_only", applies: support_only, mode: ReplyMode::Support },
    ReplyRule {
        name: "promo_or_catalog",
        applies: promo_or_catalog,
        mode: ReplyMode::PromoOrCatalog,
    },
    ReplyRule { name: "knowledge_guard", applies: knowledge_unavailable, mode: ReplyMode::KbGuard },
    ReplyRule { name: "generative", applies: always, mode: ReplyMode::Generative },
];

pub const CARD_RULES: &[CardRule] = &[
    CardRule { name: "recommendation", select: recommendation_card },
    CardRule { name: "single_product_purchase", select: single_product_purchase_card },
    CardRule { name: "pack_listing", select: pack_listing_cards },
    CardRule { name: "bundle_promo", select: bundle_promo_card },
];

fn support_only(intent: &Intent, _kb: KnowledgeStatus) -> bool {
    intent.has_any(&[Signal::Support, Signal::Faq]) && !intent.has_any(&COMMERCIAL_SIGNALS)
}

fn promo_or_catalog(intent: &Intent, _kb: KnowledgeStatus) -> bool {
    intent.has_any(&[Signal::Promo, Signal::PackListing])
}

fn knowledge_unavailable(_intent: &Intent, kb: KnowledgeStatus) -> bool {
    kb != KnowledgeStatus::Ok
}

fn always(_intent: &Intent, _kb: KnowledgeStatus) -> bool {
    true
}

fn recommendation_card(intent: &Intent) -> Option<Vec<ProductKey>> {
    intent.has(Signal::Recommendation).then(|| vec![ProductKey::BEGINNER])
}

fn single_product_purchase_card(intent: &Intent) -> Option<Vec<ProductKey>> {
    if !intent.has(Signal::PurchaseIntent) {
        return None;
    }
    match intent.mentioned_products().as_slice() {
        [only] => Some(vec![*only]),
        _ => None,
    }
}

fn pack_listing_cards(intent: &Intent) -> Option<Vec<ProductKey>> {
    if !intent.has(Signal::PackListing) {
        return None;
    }
    if intent.has(Signal::AllPacks) {
        Some(ProductKey::ALL.to_vec())
    } else {
        Some(ProductKey::CURATED.to_vec())
    }
}

fn bundle_promo_card(intent: &Intent) -> Option<Vec<ProductKey>> {
    (intent.has(Signal::Promo) && intent.mentions(ProductKey::Bundle))
        .then(|| vec![ProductKey::Bundle])
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub mode: ReplyMode,
    pub reply_rule: &'static str,
    /// Fixed reply text. `None` only for the generative mode.
    pub reply: Option<String>,
    pub card_rule: Option<&'static str>,
    pub cards: Vec<ProductKey>,
    pub actions: Vec<Action>,
}

pub trait ResponsePolicy: Send + Sync {
    fn plan(&self, intent: &Intent, kb: KnowledgeStatus) -> Plan;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicResponsePolicy {
    catalog: Catalog,
}

impl DeterministicResponsePolicy {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn select_mode(&self, intent: &Intent, kb: KnowledgeStatus) -> &'static ReplyRule {
        // The last rule always applies, so the fallback is never reached.
        REPLY_RULES
            .iter()
            .find(|rule| (rule.applies)(intent, kb))
            .unwrap_or(&REPLY_RULES[REPLY_RULES.len() - 1])
    }

    pub fn select_cards(&self, intent: &Intent) -> (Option<&'static str>, Vec<ProductKey>) {
        CARD_RULES
            .iter()
            .find_map(|rule| (rule.select)(intent).map(|cards| (Some(rule.name), cards)))
            .unwrap_or((None, Vec::new()))
    }

    pub fn select_actions(&self, intent: &Intent) -> Vec<Action> {
        let mut actions = Vec::new();
        if intent.has(Signal::Support) {
            actions.push(Action::link("Contacter le support", format!("mailto:{SUPPORT_EMAIL}")));
        }
        if intent.has(Signal::Faq) {
            actions.push(Action::link("Voir la FAQ", FAQ_URL));
        }
        if intent.has(Signal::Promo) {
            let bundle = intent.mentions(ProductKey::Bundle);
            let code = promo::select_code(bundle);
            actions.push(Action::copy(format!("Copier le code {}", code.code), code.code));
            if bundle {
                actions.push(Action::link(
                    format!("Voir le {}", self.catalog.title(ProductKey::Bundle)),
                    self.catalog.url(ProductKey::Bundle),
                ));
            }
        }
        actions
    }

    fn deterministic_reply(&self, mode: ReplyMode, intent: &Intent) -> Option<String> {
        match mode {
            ReplyMode::Support if intent.has(Signal::Support) => {
                Some(replies::support_contact_reply())
            }
            ReplyMode::Support => Some(replies::faq_reply()),
            ReplyMode::PromoOrCatalog => {
                let mut sections = Vec::new();
                if intent.has(Signal::Promo) {
                    sections.push(replies::promo_reply(intent.mentions(ProductKey::Bundle)));
                }
                if intent.has(Signal::PackListing) {
                    sections.push(replies::catalog_reply(&self.catalog));
                }
                Some(sections.join("\n\n"))
            }
            ReplyMode::KbGuard => Some(replies::knowledge_guard_reply()),
            ReplyMode::Generative => None,
        }
    }
}

impl ResponsePolicy for DeterministicResponsePolicy {
    fn plan(&self, intent: &Intent, kb: KnowledgeStatus) -> Plan {
        let rule = self.select_mode(intent, kb);
        let (card_rule, cards) = self.select_cards(intent);

        Plan {
            mode: rule.mode,
            reply_rule: rule.name,
            reply: self.deterministic_reply(rule.mode, intent),
            card_rule,
            cards,
            actions: self.select_actions(intent),
        }
    }
}
