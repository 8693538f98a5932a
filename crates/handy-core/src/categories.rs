//! Service category catalog.

/// One browsable service category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub slug: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "Home Repair",
        slug: "home-repair",
    },
    Category {
        name: "Cleaning",
        slug: "cleaning",
    },
    Category {
        name: "Electrical",
        slug: "electrical",
    },
    Category {
        name: "Painting",
        slug: "painting",
    },
    Category {
        name: "Gardening",
        slug: "gardening",
    },
    Category {
        name: "Plumbing",
        slug: "plumbing",
    },
];

/// Slug for a provider's free-form `service_type`: lowercase, whitespace
/// runs collapsed to `-`.
pub fn slugify(service_type: &str) -> String {
    let mut slug = String::with_capacity(service_type.len());
    let mut in_space = false;
    for ch in service_type.chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.extend(ch.to_lowercase());
            in_space = false;
        }
    }
    slug
}

/// Categories whose name or slug contains `term` (case-insensitive).
/// A blank term, or one that matches nothing, yields the whole catalog.
pub fn search_categories(term: &str) -> Vec<Category> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return CATEGORIES.to_vec();
    }
    let matches: Vec<Category> = CATEGORIES
        .iter()
        .filter(|cat| cat.name.to_lowercase().contains(&term) || cat.slug.contains(&term))
        .copied()
        .collect();
    if matches.is_empty() {
        CATEGORIES.to_vec()
    } else {
        matches
    }
}

/// Display title for a slug: catalog name if known, else the slug with
/// dashes turned into spaces and each word capitalized.
pub fn category_title(slug: &str) -> String {
    if let Some(cat) = CATEGORIES.iter().find(|cat| cat.slug == slug) {
        return cat.name.to_string();
    }
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
