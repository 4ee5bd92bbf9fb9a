// Gallery filter: category plus case-insensitive title search.

use super::surface::RenderUnit;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryFilter {
    /// Exact group label. `None` shows every group.
    pub category: Option<String>,
    /// Substring matched against the title, ignoring case.
    pub search: Option<String>,
}

impl GalleryFilter {
    pub fn new(category: Option<String>, search: Option<String>) -> Self {
        Self {
            category: category.filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all")),
            search: search
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }

    /// `true` when the filter lets everything through.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.search.is_none()
    }

    pub fn matches(&self, unit: &RenderUnit) -> bool {
        if let Some(ref category) = self.category {
            if unit.group != *category {
                return false;
            }
        }
        match self.search {
            Some(ref term) => unit.title.to_lowercase().contains(term.as_str()),
            None => true,
        }
    }
}
