//! Synonym expansion
//!
//! A lookup on a canonical term or on any of its synonyms yields the whole
//! equivalence class. Expansion only ever adds terms.

use licensr_common::db::SynonymEntry;
use licensr_common::Result;
use tracing::debug;

use crate::store::CatalogStore;

/// Trim, lower-case, drop empties and duplicates (first occurrence wins)
pub fn normalize_terms<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut terms: Vec<String> = Vec::new();
    for term in raw {
        let term = term.as_ref().trim().to_lowercase();
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Expand normalized `terms` through the synonym table.
///
/// Output starts with the input terms in order, followed by any class
/// members they pulled in. Empty input skips the store entirely.
pub async fn expand_terms(store: &dyn CatalogStore, terms: &[String]) -> Result<Vec<String>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let entries = store.lookup_synonyms(terms).await?;
    let expanded = merge_entries(terms, &entries);

    if expanded.len() > terms.len() {
        debug!(raw = ?terms, expanded = ?expanded, "Expanded search terms");
    }

    Ok(expanded)
}

/// Union of `terms` and every entry whose class contains one of them
fn merge_entries(terms: &[String], entries: &[SynonymEntry]) -> Vec<String> {
    let mut expanded = terms.to_vec();

    for entry in entries {
        let class = std::iter::once(&entry.term).chain(entry.synonyms.iter());
        let hit = class
            .clone()
            .any(|member| terms.contains(&member.trim().to_lowercase()));
        if !hit {
            continue;
        }

        for member in normalize_terms(class) {
            if !expanded.contains(&member) {
                expanded.push(member);
            }
        }
    }

    expanded
}
