#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromoCode {
    pub code: &'static str,
    pub description: &'static str,
}

pub const BUNDLE_PROMO: PromoCode = PromoCode {
    code: "GIGA20",
    description: "-20% sur le Giga Bundle",
};

pub const GENERAL_PROMO: PromoCode = PromoCode {
    code: "RESELL10",
    description: "-10% sur tous les packs",
};

pub const PROMO_TABLE: [PromoCode; 2] = [BUNDLE_PROMO, GENERAL_PROMO];

/// Picks the code to offer for copy. The bundle code wins whenever the
/// bundle is part of the conversation.
pub fn select_code(bundle_mentioned: bool) -> PromoCode {
    if bundle_mentioned {
        BUNDLE_PROMO
    } else {
        GENERAL_PROMO
    }
}

pub fn is_known_code(code: &str) -> bool {
    PROMO_TABLE.iter().any(|promo| promo.code == code)
}
