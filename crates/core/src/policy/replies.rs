//! Fixed reply texts. Deterministic replies are assembled only from these
//! strings, the catalog and the promo table.

use crate::domain::catalog::{Catalog, FAQ_URL, SUPPORT_EMAIL};
use crate::domain::promo::{BUNDLE_PROMO, GENERAL_PROMO};

pub fn support_contact_reply() -> String {
    format!(
        "Pour toute question sur ta commande ou ton accès, écris-nous à {SUPPORT_EMAIL} : \
         l'équipe te répond rapidement. Pense aussi à vérifier tes spams/promotions et à \
         rechercher \"PayHip\" dans ta boîte mail."
    )
}

pub fn faq_reply() -> String {
    format!(
        "Les réponses aux questions fréquentes (accès, téléchargement, délais, remboursements) \
         sont dans notre FAQ : {FAQ_URL}"
    )
}

pub fn knowledge_guard_reply() -> String {
    format!(
        "Je ne peux pas vérifier cette information pour le moment. Consulte notre FAQ \
         ({FAQ_URL}) ou écris à {SUPPORT_EMAIL} pour une réponse fiable."
    )
}

pub fn promo_reply(bundle_mentioned: bool) -> String {
    if bundle_mentioned {
        format!(
            "Code {} : {}. Pour le reste de la boutique, utilise {} ({}).",
            BUNDLE_PROMO.code, BUNDLE_PROMO.description, GENERAL_PROMO.code,
            GENERAL_PROMO.description
        )
    } else {
        format!("Utilise le code {} : {}.", GENERAL_PROMO.code, GENERAL_PROMO.description)
    }
}

pub fn product_list(catalog: &Catalog) -> String {
    catalog.titles().iter().map(|title| format!("- {title}")).collect::<Vec<_>>().join("\n")
}

pub fn catalog_reply(catalog: &Catalog) -> String {
    format!("Voici nos packs disponibles :\n{}", product_list(catalog))
}

/// Replacement text used when a generated reply talks about products that are
/// not in the catalog.
pub fn unverified_product_reply(catalog: &Catalog) -> String {
    format!(
        "Je préfère ne pas te donner d'information inexacte sur nos produits. \
         Voici la liste officielle de nos packs :\n{}\nPour toute autre question : {SUPPORT_EMAIL}",
        product_list(catalog)
    )
}

pub fn fallback_reply() -> String {
    "Désolé, je n'ai pas compris. Peux-tu reformuler ?".to_string()
}
