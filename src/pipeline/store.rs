use indexmap::IndexMap;

use crate::source::Author;
use crate::types::model::ContributorImpact;

/// Contributors keyed by login, in first-seen order. Authors, reviewers and
/// issue participants share one namespace.
#[derive(Debug, Clone, Default)]
pub struct ContributorStore {
    entries: IndexMap<String, ContributorImpact>,
}

impl ContributorStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `author`, creating it on first sight.
    pub fn register(&mut self, author: &Author) -> &mut ContributorImpact {
        self.entries
            .entry(author.login.clone())
            .or_insert_with(|| {
                ContributorImpact::new(&author.login, &author.avatar_url, &author.html_url)
            })
    }

    #[cfg(test)]
    pub fn get(&self, login: &str) -> Option<&ContributorImpact> {
        self.entries.get(login)
    }

    pub fn get_mut(&mut self, login: &str) -> Option<&mut ContributorImpact> {
        self.entries.get_mut(login)
    }

    pub fn values(&self) -> impl Iterator<Item = &ContributorImpact> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut ContributorImpact> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_values(self) -> impl Iterator<Item = ContributorImpact> {
        self.entries.into_values()
    }
}
