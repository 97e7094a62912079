use vitrine_core::domain::catalog::Catalog;
use vitrine_core::intent::{contains_phrase, contains_word, normalize_text, Intent, Signal};
use vitrine_core::policy::replies::unverified_product_reply;

/// Words that mean a generated reply is talking about products.
const CATEGORY_TOKENS: [&str; 3] = ["pack", "packs", "bundle"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub rewritten: bool,
    pub reason_code: Option<&'static str>,
}

impl Sanitized {
    fn unchanged(text: String) -> Self {
        Self { text, rewritten: false, reason_code: None }
    }
}

/// Post-generation check on product talk. A reply that mentions a product
/// category without naming any real catalog entry is replaced by the fixed
/// product list.
#[derive(Clone, Debug)]
pub struct ProductGuardrail {
    catalog: Catalog,
    allowed_names: Vec<String>,
}

impl Default for ProductGuardrail {
    fn default() -> Self {
        Self::from_catalog(Catalog)
    }
}

impl ProductGuardrail {
    pub fn from_catalog(catalog: Catalog) -> Self {
        let allowed_names = catalog.titles().into_iter().map(normalize_text).collect();
        Self { catalog, allowed_names }
    }

    pub fn allowed_names(&self) -> &[String] {
        &self.allowed_names
    }

    pub fn sanitize(&self, generated: String, intent: &Intent) -> Sanitized {
        // A catalog request is answered deterministically, so product talk is expected there.
        if intent.has(Signal::PackListing) {
            return Sanitized::unchanged(generated);
        }

        let normalized = normalize_text(&generated);
        let talks_about_products =
            CATEGORY_TOKENS.iter().any(|token| contains_word(&normalized, token));
        if !talks_about_products {
            return Sanitized::unchanged(generated);
        }

        let names_real_product =
            self.allowed_names.iter().any(|name| contains_phrase(&normalized, name));
        if names_real_product {
            return Sanitized::unchanged(generated);
        }

        tracing::warn!(
            event_name = "guardrail.product_rewrite",
            reason_code = "unverified_product_reference",
            "generated reply referenced products outside the catalog"
        );
        Sanitized {
            text: unverified_product_reply(&self.catalog),
            rewritten: true,
            reason_code: Some("unverified_product_reference"),
        }
    }
}
