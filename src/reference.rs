use crate::record::{CompanyName, CompanyRow};
use crate::store::NewsStoreLike;
use crate::TaggerError;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

/// Search terms (company names and aliases, lowercased) and the company each resolves to.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    terms: Vec<String>,
    owners: FxHashMap<String, CompanyName>,
    company_count: usize,
}

impl ReferenceSet {
    /// Canonical names are registered before any alias, so an alias can never
    /// take over another company's own name.
    pub fn from_rows(rows: &[CompanyRow]) -> Self {
        let mut set = ReferenceSet::default();
        let mut contributed = vec![false; rows.len()];

        for (row, added) in rows.iter().zip(contributed.iter_mut()) {
            let name = row.name.trim();
            if !name.is_empty() {
                *added = set.register(name.to_lowercase(), name);
            }
        }
        for (row, added) in rows.iter().zip(contributed.iter_mut()) {
            let name = row.name.trim();
            if name.is_empty() {
                continue;
            }
            for alias in &row.aliases {
                let alias = alias.trim();
                if !alias.is_empty() {
                    *added |= set.register(alias.to_lowercase(), name);
                }
            }
        }

        set.company_count = contributed.into_iter().filter(|added| *added).count();
        set
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let rows: Vec<CompanyRow> = names.iter().map(|n| CompanyRow::new(n.as_ref())).collect();
        Self::from_rows(&rows)
    }

    // first owner of a term wins
    fn register(&mut self, term: String, company: &str) -> bool {
        if self.owners.contains_key(&term) {
            return false;
        }
        self.owners.insert(term.clone(), company.to_string());
        self.terms.push(term);
        true
    }

    /// Lowercased terms paired with their canonical company name.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &CompanyName)> {
        self.terms
            .iter()
            .filter_map(|t| self.owners.get(t).map(|owner| (t.as_str(), owner)))
    }

    pub fn company_count(&self) -> usize {
        self.company_count
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Load the reference set once for the run. Any failure here is fatal.
pub fn load_reference_set<S: NewsStoreLike + ?Sized>(store: &S) -> Result<ReferenceSet, TaggerError> {
    info!("Loading company names and aliases");
    let rows = store
        .load_companies()
        .map_err(|e| TaggerError::ReferenceLoad(e.to_string()))?;

    let set = ReferenceSet::from_rows(&rows);
    if set.is_empty() {
        warn!(rows = rows.len(), "No usable company names returned");
        return Err(TaggerError::ReferenceLoad("no company names available".to_string()));
    }

    info!(
        companies = set.company_count(),
        aliases = set.term_count() - set.company_count(),
        terms = set.term_count(),
        "Reference set loaded"
    );
    Ok(set)
}
