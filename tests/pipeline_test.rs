use company_tagger::{
    run, CompanyRow, InMemoryNewsStore, NewsRecord, RecordId, RunOptions, TaggerConfig, TaggerError,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

fn options(batch_size: usize, workers: usize) -> RunOptions {
    let mut config = TaggerConfig::for_store("https://db.example.co", "test-key");
    config.batch_size = batch_size;
    config.workers = workers;
    RunOptions::from_config(&config)
}

fn companies() -> Vec<CompanyRow> {
    vec![
        CompanyRow::new("Acme"),
        CompanyRow::new("Globex"),
        CompanyRow::with_aliases("Initech", &["INTC Labs"]),
    ]
}

fn corpus(count: i64) -> Vec<NewsRecord> {
    (1..=count)
        .map(|i| {
            let content = match i % 4 {
                0 => "Acme beat estimates. Analysts like Acme.",
                1 => "Globex and Acme met once. Globex hired.",
                2 => "intc labs opened; INTC LABS grew.",
                _ => "Markets were quiet today.",
            };
            NewsRecord::new(i, content)
        })
        .collect()
}

fn companies_by_id(store: &InMemoryNewsStore) -> HashMap<RecordId, Vec<String>> {
    store.records().into_iter().map(|r| (r.id, r.companies)).collect()
}

#[test]
fn test_acme_globex_end_to_end() {
    let store = Arc::new(InMemoryNewsStore::new(
        vec![CompanyRow::new("Acme"), CompanyRow::new("Globex")],
        vec![NewsRecord::new(
            1,
            "Acme Corp said Acme will expand. Globex was mentioned once.",
        )],
    ));

    let stats = run(Arc::clone(&store), &options(1000, 3)).unwrap();

    let record = store.record(&RecordId::Int(1)).unwrap();
    assert_eq!(record.companies, vec!["Acme".to_string()]);
    assert_eq!(stats.total_processed, 1);
    assert_eq!(stats.matched_count, 1);
    assert_eq!(stats.updated_count, 1);
    assert_eq!(stats.match_rate(), 1.0);
}

#[test]
fn test_every_record_written_exactly_once() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(23)));
    let stats = run(Arc::clone(&store), &options(5, 3)).unwrap();

    let attempts = store.write_attempts();
    let unique: BTreeSet<RecordId> = attempts.iter().cloned().collect();
    assert_eq!(attempts.len(), 23);
    assert_eq!(unique.len(), 23);
    assert_eq!(stats.total_processed, 23);
    assert_eq!(stats.batches_processed, 5);
    assert_eq!(stats.matched_count + stats.unmatched_count, stats.total_processed);
}

#[test]
fn test_aliases_tag_canonical_company() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(4)));
    run(Arc::clone(&store), &options(10, 2)).unwrap();

    let tags = companies_by_id(&store);
    assert_eq!(tags[&RecordId::Int(2)], vec!["Initech".to_string()]);
    assert_eq!(tags[&RecordId::Int(4)], vec!["Acme".to_string()]);
    assert_eq!(tags[&RecordId::Int(1)], vec!["Globex".to_string()]);
    assert!(tags[&RecordId::Int(3)].is_empty());
}

#[test]
fn test_previous_tags_are_overwritten_not_merged() {
    let mut stale = NewsRecord::new(1, "Markets were quiet today.");
    stale.companies = vec!["Globex".to_string()];
    let mut outdated = NewsRecord::new(2, "Acme and Acme again");
    outdated.companies = vec!["Globex".to_string()];
    let store = Arc::new(InMemoryNewsStore::new(companies(), vec![stale, outdated]));

    run(Arc::clone(&store), &options(10, 3)).unwrap();

    let tags = companies_by_id(&store);
    assert!(tags[&RecordId::Int(1)].is_empty());
    assert_eq!(tags[&RecordId::Int(2)], vec!["Acme".to_string()]);
}

#[test]
fn test_second_run_is_identical() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(17)));

    let first = run(Arc::clone(&store), &options(4, 3)).unwrap();
    let after_first = companies_by_id(&store);
    let second = run(Arc::clone(&store), &options(4, 3)).unwrap();
    let after_second = companies_by_id(&store);

    assert_eq!(after_first, after_second);
    assert_eq!(first.total_processed, second.total_processed);
    assert_eq!(first.matched_count, second.matched_count);
    assert_eq!(first.updated_count, second.updated_count);
    assert_eq!(first.match_rate(), second.match_rate());
}

#[test]
fn test_failed_third_batch_is_skipped() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(50)));
    // batch 3 of 5 starts at offset 20
    store.fail_fetch_at(20);

    let stats = run(Arc::clone(&store), &options(10, 3)).unwrap();

    assert_eq!(stats.batches_processed, 4);
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.skipped_records, 10);
    assert_eq!(stats.total_processed, 40);

    let attempts: BTreeSet<RecordId> = store.write_attempts().into_iter().collect();
    for id in 21..=30 {
        assert!(!attempts.contains(&RecordId::Int(id)), "record {} should be skipped", id);
    }
    assert!(attempts.contains(&RecordId::Int(20)));
    assert!(attempts.contains(&RecordId::Int(50)));
}

#[test]
fn test_server_row_cap_does_not_lose_records() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(10)));
    store.cap_page_size(3);

    let stats = run(Arc::clone(&store), &options(5, 3)).unwrap();

    assert_eq!(stats.total_processed, 10);
    assert_eq!(stats.skipped_records, 0);
    let attempts = store.write_attempts();
    let unique: BTreeSet<RecordId> = attempts.iter().cloned().collect();
    assert_eq!(attempts.len(), 10);
    assert_eq!(unique.len(), 10);
}

#[test]
fn test_alias_cannot_take_over_canonical_name() {
    let store = Arc::new(InMemoryNewsStore::new(
        vec![CompanyRow::with_aliases("Meta", &["Facebook"]), CompanyRow::new("Facebook")],
        vec![NewsRecord::new(1, "Facebook said Facebook grew.")],
    ));
    run(Arc::clone(&store), &options(10, 1)).unwrap();

    let record = store.record(&RecordId::Int(1)).unwrap();
    assert_eq!(record.companies, vec!["Facebook".to_string()]);
}

#[test]
fn test_empty_news_table() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), vec![]));
    let stats = run(Arc::clone(&store), &options(1000, 3)).unwrap();

    assert_eq!(stats.total_processed, 0);
    assert_eq!(stats.match_rate(), 0.0);
    assert!(store.write_attempts().is_empty());
}

#[test]
fn test_write_failures_do_not_fail_the_run() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(8)));
    store.fail_write_for(4);
    store.fail_write_for(7);

    let stats = run(Arc::clone(&store), &options(3, 3)).unwrap();

    assert_eq!(stats.total_processed, 8);
    assert_eq!(stats.updated_count, 6);
    assert_eq!(stats.write_failures, 2);
    assert!(store.record(&RecordId::Int(4)).unwrap().companies.is_empty());
}

#[test]
fn test_reference_load_failure_aborts_before_processing() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(5)));
    store.fail_company_load();

    let err = run(Arc::clone(&store), &options(2, 3)).unwrap_err();

    assert!(matches!(err, TaggerError::ReferenceLoad(_)));
    assert!(err.is_fatal());
    assert!(store.write_attempts().is_empty());
}

#[test]
fn test_count_failure_aborts_run() {
    let store = Arc::new(InMemoryNewsStore::new(companies(), corpus(5)));
    store.fail_count();

    let err = run(Arc::clone(&store), &options(2, 3)).unwrap_err();
    assert!(matches!(err, TaggerError::Count(_)));
}
