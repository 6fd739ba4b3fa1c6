//! Section registry
//!
//! Holds the sections of one axis (Directory or Location) sorted broadest
//! first: literal sections by component count, then special ones, ties kept
//! in registration order.

use std::sync::Arc;

use super::section::ScopeSection;

#[derive(Debug, Clone)]
struct Entry {
    original_index: usize,
    section: Arc<ScopeSection>,
}

#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    entries: Vec<Entry>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from sections in registration order
    pub fn from_sections<I>(sections: I) -> Self
    where
        I: IntoIterator<Item = Arc<ScopeSection>>,
    {
        let mut registry = Self::new();
        for section in sections {
            registry.register(section);
        }
        registry
    }

    pub fn register(&mut self, section: Arc<ScopeSection>) {
        let original_index = self.entries.len();
        let entry = Entry {
            original_index,
            section,
        };
        // Stable insertion keeps equal keys in registration order
        let pos = self
            .entries
            .partition_point(|e| sort_key(e) <= sort_key(&entry));
        self.entries.insert(pos, entry);
    }

    /// Sections in registration order, for inheritance by virtual hosts
    pub fn in_registration_order(&self) -> Vec<Arc<ScopeSection>> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.original_index);
        entries.into_iter().map(|e| Arc::clone(&e.section)).collect()
    }

    /// All sections, ordered
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ScopeSection>> {
        self.entries.iter().map(|e| &e.section)
    }

    /// Ordered sections whose pattern matches `path`
    pub fn applicable(&self, path: &str) -> Vec<&Arc<ScopeSection>> {
        self.iter().filter(|s| s.matches_path(path)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sort_key(entry: &Entry) -> (bool, usize, usize) {
    (
        entry.section.special,
        entry.section.specificity,
        entry.original_index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::dir_config::DirConfig;
    use crate::scope::section::{Pattern, SectionKind};

    fn literal(path: &str) -> Arc<ScopeSection> {
        Arc::new(ScopeSection::new(
            SectionKind::Directory,
            Pattern::literal(SectionKind::Directory, path).unwrap(),
            DirConfig::default(),
        ))
    }

    fn regex(re: &str) -> Arc<ScopeSection> {
        Arc::new(ScopeSection::new(
            SectionKind::DirectoryMatch,
            Pattern::regex(SectionKind::DirectoryMatch, re).unwrap(),
            DirConfig::default(),
        ))
    }

    fn patterns(sections: &[&Arc<ScopeSection>]) -> Vec<String> {
        sections.iter().map(|s| s.pattern.as_str().to_string()).collect()
    }

    #[test]
    fn test_broadest_first_specials_last() {
        let registry = SectionRegistry::from_sections([
            regex("^/var/"),
            literal("/var/www/html"),
            literal("/"),
            literal("/var/www"),
        ]);
        let applicable = registry.applicable("/var/www/html/");
        assert_eq!(
            patterns(&applicable),
            vec!["/", "/var/www/", "/var/www/html/", "^/var/"]
        );
    }

    #[test]
    fn test_equal_specificity_keeps_order() {
        let registry = SectionRegistry::from_sections([
            literal("/srv/b"),
            literal("/srv/*"),
            literal("/srv/b/"),
        ]);
        let applicable = registry.applicable("/srv/b/");
        assert_eq!(patterns(&applicable), vec!["/srv/b/", "/srv/*/", "/srv/b/"]);
    }

    #[test]
    fn test_non_matching_filtered() {
        let registry = SectionRegistry::from_sections([literal("/a"), literal("/b")]);
        assert_eq!(patterns(&registry.applicable("/b/c/")), vec!["/b/"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registration_order_recoverable() {
        let registry =
            SectionRegistry::from_sections([literal("/x/y"), regex("z"), literal("/x")]);
        let order: Vec<String> = registry
            .in_registration_order()
            .iter()
            .map(|s| s.pattern.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["/x/y/", "z", "/x/"]);
    }
}
