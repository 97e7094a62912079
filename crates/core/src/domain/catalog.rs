use crate::domain::product::{ProductCard, ProductKey};

pub const STORE_BASE_URL: &str = "https://resell-academy.com";
pub const SUPPORT_EMAIL: &str = "support@resell-academy.com";
pub const FAQ_URL: &str = "https://resell-academy.com/faq";

const CDN_BASE: &str = "https://cdn.shopify.com/s/files/1/0973/2368/0110/files";

struct CatalogEntry {
    key: ProductKey,
    title: &'static str,
    price_label: &'static str,
    path: &'static str,
    cover: &'static str,
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        key: ProductKey::Accessoires,
        title: "Pack Accessoires Luxe",
        price_label: "Voir prix",
        path: "/b/accessoires",
        cover: "COVER_PACK_ACCESSOIRES.jpg?v=1769183567",
    },
    CatalogEntry {
        key: ProductKey::Vetements,
        title: "Pack Vêtements",
        price_label: "Voir prix",
        path: "/b/vetements",
        cover: "COVER_PACK_VETEMENTS.jpg?v=1769183578",
    },
    CatalogEntry {
        key: ProductKey::Chaussures,
        title: "Pack Chaussures",
        price_label: "Voir prix",
        path: "/b/chaussures",
        cover: "COVER_PACK_CHAUSSURES.jpg?v=1769183578",
    },
    CatalogEntry {
        key: ProductKey::Parfums,
        title: "Pack Parfums",
        price_label: "Voir prix",
        path: "/b/parfums",
        cover: "pack_parfums.jpg?v=1769183588",
    },
    CatalogEntry {
        key: ProductKey::Tech,
        title: "Pack Tech",
        price_label: "Voir prix",
        path: "/b/tech",
        cover: "Copy_of_Copy_of_COVER_PACK_CHAUSSURES.jpg?v=1769183564",
    },
    CatalogEntry {
        key: ProductKey::Bundle,
        title: "Giga Bundle",
        price_label: "Voir prix",
        path: "/b/giga-bundle",
        cover: "COVER_GIGA_BUNDLE_V2_GIF.png?v=1769183604",
    },
    CatalogEntry {
        key: ProductKey::Blueprint,
        title: "Resell Blueprint",
        price_label: "15€",
        path: "/b/OmtC5",
        cover: "COVER_SECONDAIRE_RESELL_BLUEPRINT.jpg?v=1769183606",
    },
];

/// Hardcoded product catalog. This is the only place product identity comes
/// from; neither visitor text nor model output can add an entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Catalog;

impl Catalog {
    pub fn card(&self, key: ProductKey) -> ProductCard {
        let entry = entry(key);
        ProductCard {
            key,
            title: entry.title.to_string(),
            price_label: entry.price_label.to_string(),
            image_ref: format!("{CDN_BASE}/{}", entry.cover),
            url: self.url(key),
        }
    }

    pub fn cards(&self, keys: &[ProductKey]) -> Vec<ProductCard> {
        keys.iter().map(|key| self.card(*key)).collect()
    }

    pub fn title(&self, key: ProductKey) -> &'static str {
        entry(key).title
    }

    pub fn url(&self, key: ProductKey) -> String {
        format!("{STORE_BASE_URL}{}", entry(key).path)
    }

    /// Display names in catalog order.
    pub fn titles(&self) -> Vec<&'static str> {
        ProductKey::ALL.iter().map(|key| self.title(*key)).collect()
    }
}

fn entry(key: ProductKey) -> &'static CatalogEntry {
    // ENTRIES covers every ProductKey variant; the test below pins that.
    ENTRIES.iter().find(|entry| entry.key == key).unwrap_or(&ENTRIES[0])
}

#[cfg(test)]
mod tests {
    use super::{Catalog, ENTRIES};
    use crate::domain::product::ProductKey;

    #[test]
    fn every_key_has_exactly_one_entry() {
        for key in ProductKey::ALL {
            let count = ENTRIES.iter().filter(|entry| entry.key == key).count();
            assert_eq!(count, 1, "catalog entry count for {key}");
        }
        assert_eq!(ENTRIES.len(), ProductKey::ALL.len());
    }

    #[test]
    fn cards_resolve_urls_and_titles_from_fixed_table() {
        let card = Catalog.card(ProductKey::Bundle);
        assert_eq!(card.title, "Giga Bundle");
        assert_eq!(card.url, "https://resell-academy.com/b/giga-bundle");
        assert!(card.image_ref.starts_with("https://cdn.shopify.com/"));

        let blueprint = Catalog.card(ProductKey::Blueprint);
        assert_eq!(blueprint.price_label, "15€");

        let tech = Catalog.card(ProductKey::Tech);
        assert_eq!(
            tech.image_ref,
            "https://cdn.shopify.com/s/files/1/0973/2368/0110/files/Copy_of_Copy_of_COVER_PACK_CHAUSSURES.jpg?v=1769183564"
        );
    }
}
