use vitrine_core::domain::catalog::{Catalog, SUPPORT_EMAIL};
use vitrine_core::domain::product::ProductKey;
use vitrine_core::knowledge::KnowledgeResource;
use vitrine_core::policy::replies::product_list;

const EMPTY_KNOWLEDGE_PLACEHOLDER: &str = "(KB vide)";

#[derive(Clone, Copy, Debug, Default)]
pub struct PromptBuilder {
    catalog: Catalog,
}

impl PromptBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn system_prompt(&self, knowledge: &KnowledgeResource) -> String {
        let knowledge_text = if knowledge.text.trim().is_empty() {
            EMPTY_KNOWLEDGE_PLACEHOLDER
        } else {
            knowledge.text.trim()
        };

        format!(
            "Tu es le chatbot officiel de Resell Academy.\n\
             \n\
             Règles de style:\n\
             - Réponds en français par défaut.\n\
             - Ton: pro mais familial, proche, rassurant.\n\
             - Réponses courtes et actionnables (sauf question complexe).\n\
             - Si tu n'es pas sûr à 100%: ne devine pas, propose {SUPPORT_EMAIL}.\n\
             \n\
             Infos clés:\n\
             - Produits 100% digitaux. Accès immédiat après paiement + lien de téléchargement \
             sur le site + email PayHip (reçu / accès).\n\
             - Si email non reçu: vérifier spams/promotions + rechercher \"PayHip\" + vérifier \
             l'email de paiement. Sinon {SUPPORT_EMAIL}.\n\
             - Ne cite jamais un produit, un prix ou un code promo absent de la liste ci-dessous.\n\
             - Pour débuter, recommande toujours le {beginner}.\n\
             \n\
             Produits disponibles:\n\
             {products}\n\
             \n\
             KNOWLEDGE BASE (source de vérité):\n\
             {knowledge_text}",
            beginner = self.catalog.title(ProductKey::BEGINNER),
            products = product_list(&self.catalog),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use vitrine_core::domain::catalog::Catalog;
    use vitrine_core::knowledge::KnowledgeResource;

    use super::PromptBuilder;

    #[test]
    fn empty_knowledge_uses_placeholder() {
        let prompt = PromptBuilder::new(Catalog).system_prompt(&KnowledgeResource::missing());
        assert!(prompt.ends_with("(KB vide)"));
        assert!(prompt.contains("Pack Accessoires Luxe"));
    }

    #[test]
    fn knowledge_text_is_embedded_verbatim() {
        let resource = KnowledgeResource::from_source(
            Path::new("knowledge/knowledge.txt"),
            "Délais: 7 à 13 jours.\n".to_string(),
        );
        let prompt = PromptBuilder::new(Catalog).system_prompt(&resource);
        assert!(prompt.ends_with("Délais: 7 à 13 jours."));
        assert!(!prompt.contains("(KB vide)"));
    }
}
