use crate::record::{CompanyName, MatchResult};
use crate::store::NewsStoreLike;
use crate::TaggerError;
use std::sync::Arc;

/// Persists match results, one update call per record.
pub struct ResultWriter<S: NewsStoreLike + ?Sized> {
    store: Arc<S>,
}

impl<S: NewsStoreLike + ?Sized> Clone for ResultWriter<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: NewsStoreLike + ?Sized> ResultWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Overwrite the record's companies with the matched set, sorted, empty when nothing matched.
    pub fn write(&self, result: &MatchResult) -> Result<(), TaggerError> {
        let companies: Vec<CompanyName> = result.matched.iter().cloned().collect();
        self.store
            .update_companies(&result.record_id, &companies)
            .map_err(|e| match e {
                TaggerError::Write { .. } => e,
                other => TaggerError::Write {
                    id: result.record_id.to_string(),
                    message: other.to_string(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CompanyRow, NewsRecord, RecordId};
    use crate::store::InMemoryNewsStore;
    use std::collections::BTreeSet;

    fn result(id: i64, names: &[&str]) -> MatchResult {
        MatchResult {
            record_id: RecordId::Int(id),
            matched: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_written_set_reads_back() {
        let store = Arc::new(InMemoryNewsStore::new(
            vec![CompanyRow::new("Acme")],
            vec![NewsRecord::new(1, "x")],
        ));
        let writer = ResultWriter::new(Arc::clone(&store));
        let written = result(1, &["Globex", "Acme"]);
        writer.write(&written).unwrap();

        let stored = store.record(&RecordId::Int(1)).unwrap();
        let read_back: BTreeSet<String> = stored.companies.into_iter().collect();
        assert_eq!(read_back, written.matched);
    }

    #[test]
    fn test_write_is_idempotent_and_overwrites() {
        let store = Arc::new(InMemoryNewsStore::new(vec![], vec![NewsRecord::new(1, "x")]));
        let writer = ResultWriter::new(Arc::clone(&store));
        writer.write(&result(1, &["Acme"])).unwrap();
        writer.write(&result(1, &["Acme"])).unwrap();
        assert_eq!(store.record(&RecordId::Int(1)).unwrap().companies, vec!["Acme".to_string()]);

        writer.write(&result(1, &[])).unwrap();
        assert!(store.record(&RecordId::Int(1)).unwrap().companies.is_empty());
    }

    #[test]
    fn test_failure_leaves_record_untouched() {
        let store = Arc::new(InMemoryNewsStore::new(vec![], vec![NewsRecord::new(1, "x")]));
        store.fail_write_for(1);
        let writer = ResultWriter::new(Arc::clone(&store));
        let err = writer.write(&result(1, &["Acme"])).unwrap_err();
        assert!(matches!(err, TaggerError::Write { .. }));
        assert!(store.record(&RecordId::Int(1)).unwrap().companies.is_empty());
    }
}
