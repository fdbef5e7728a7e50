//! End-to-end `run` pipeline: CSV → concurrent PubChem lookups → results CSV.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use casenrich_pubchem::PubChemClient;
use casenrich_shared::{LookupConfig, LookupResult, OutputRow, Result};

use crate::{input, output};

/// Anything that can resolve a CAS number to a [`LookupResult`].
///
/// Implementations absorb their own errors; a lookup always produces a result.
pub trait CompoundSource: Send + Sync + 'static {
    fn lookup(&self, cas: &str) -> impl Future<Output = LookupResult> + Send;
}

impl CompoundSource for PubChemClient {
    fn lookup(&self, cas: &str) -> impl Future<Output = LookupResult> + Send {
        PubChemClient::lookup(self, cas)
    }
}

/// Configuration for the `run` pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// CSV file with a CAS column.
    pub input: PathBuf,
    /// Results file; derived from `input` when `None`.
    pub output: Option<PathBuf>,
    /// Lookup settings (concurrency, upstream, retry budget).
    pub lookup: LookupConfig,
}

/// Result of the `run` pipeline.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Where the results were written.
    pub output: PathBuf,
    /// Number of identifiers processed.
    pub total: usize,
    /// Rows with status `success`.
    pub succeeded: usize,
    /// Rows with status `failed`.
    pub failed: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once identifiers are read, before any lookup starts.
    fn started(&self, total: usize);
    /// Called as each lookup completes (in completion order).
    fn item_done(&self, cas: &str, result: &LookupResult, completed: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn item_done(&self, _cas: &str, _result: &LookupResult, _completed: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full pipeline against PubChem.
///
/// 1. Read identifiers from the input CSV
/// 2. Look them up with bounded concurrency
/// 3. Write one output row per identifier, in input order
#[instrument(skip_all, fields(input = %config.input.display()))]
pub async fn run(config: &RunConfig, progress: Arc<dyn ProgressReporter>) -> Result<RunSummary> {
    config.lookup.validate()?;
    let client = Arc::new(PubChemClient::new(&config.lookup)?);
    run_with_source(config, client, progress).await
}

/// [`run`] with an arbitrary lookup backend.
pub async fn run_with_source<S: CompoundSource>(
    config: &RunConfig,
    source: Arc<S>,
    progress: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let start = Instant::now();

    let output_path = config
        .output
        .clone()
        .unwrap_or_else(|| output::default_output_path(&config.input));

    let identifiers = input::read_identifiers(&config.input)?;
    progress.started(identifiers.len());

    let results = lookup_all(
        source,
        &identifiers,
        config.lookup.concurrency,
        progress.clone(),
    )
    .await;

    let rows: Vec<OutputRow> = identifiers
        .iter()
        .zip(results.iter())
        .map(|(cas, result)| OutputRow::new(cas.as_str(), result))
        .collect();

    output::write_results(&output_path, &rows)?;

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let summary = RunSummary {
        output: output_path,
        total: rows.len(),
        succeeded,
        failed: rows.len() - succeeded,
        elapsed: start.elapsed(),
    };

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        output = %summary.output.display(),
        "run completed"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Look up every identifier with at most `concurrency` lookups in flight.
///
/// Workers claim indexes from a shared atomic cursor until it passes the
/// end of the list. `results[i]` always belongs to `identifiers[i]`.
#[instrument(skip_all, fields(total = identifiers.len(), concurrency = concurrency))]
pub async fn lookup_all<S: CompoundSource>(
    source: Arc<S>,
    identifiers: &[String],
    concurrency: usize,
    progress: Arc<dyn ProgressReporter>,
) -> Vec<LookupResult> {
    let total = identifiers.len();
    if total == 0 {
        return Vec::new();
    }

    let items: Arc<[String]> = identifiers.into();
    let cursor = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let workers = concurrency.clamp(1, total);

    info!(workers, "starting lookups");

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let source = source.clone();
        let items = items.clone();
        let cursor = cursor.clone();
        let completed = completed.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }

                let cas = &items[index];
                let result = source.lookup(cas).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.item_done(cas, &result, done, total);
                claimed.push((index, result));
            }
            claimed
        }));
    }

    let mut slots: Vec<Option<LookupResult>> = vec![None; total];
    for handle in handles {
        match handle.await {
            Ok(claimed) => {
                for (index, result) in claimed {
                    slots[index] = Some(result);
                }
            }
            Err(e) => warn!(error = %e, "lookup worker failed"),
        }
    }

    // A worker that panicked leaves its claimed slots empty.
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| LookupResult::failed("lookup task aborted")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use casenrich_shared::{CompoundRecord, LookupStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fake backend with per-identifier latency and an in-flight high-water mark.
    struct FakeSource {
        delays: HashMap<String, u64>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(delays: &[(&str, u64)]) -> Self {
            Self {
                delays: delays.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CompoundSource for FakeSource {
        async fn lookup(&self, cas: &str) -> LookupResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = self.delays.get(cas).copied().unwrap_or(1);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if cas.starts_with("bad") {
                LookupResult::failed("No compound found for this CAS number")
            } else {
                LookupResult::Success(CompoundRecord {
                    name: format!("name-{cas}"),
                    smiles: "C".into(),
                    formula: "CH4".into(),
                    image: String::new(),
                })
            }
        }
    }

    /// Records the order in which lookups complete.
    #[derive(Default)]
    struct RecordingProgress {
        completed: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn started(&self, _total: usize) {}
        fn item_done(&self, cas: &str, _result: &LookupResult, _completed: usize, _total: usize) {
            self.completed.lock().unwrap().push(cas.to_string());
        }
        fn done(&self, _summary: &RunSummary) {}
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn name_of(result: &LookupResult) -> &str {
        match result {
            LookupResult::Success(record) => record.name.as_str(),
            LookupResult::Failed(msg) => msg.as_str(),
        }
    }

    #[tokio::test]
    async fn results_follow_input_order_not_completion_order() {
        // Earlier items are slower, so completion order is reversed.
        let source = Arc::new(FakeSource::new(&[("a", 60), ("b", 40), ("c", 20), ("d", 1)]));
        let progress = Arc::new(RecordingProgress::default());
        let identifiers = ids(&["a", "b", "c", "d"]);

        let results = lookup_all(source, &identifiers, 4, progress.clone()).await;

        assert_eq!(results.len(), 4);
        for (cas, result) in identifiers.iter().zip(&results) {
            assert_eq!(name_of(result), format!("name-{cas}"));
        }

        let completed = progress.completed.lock().unwrap().clone();
        assert_eq!(completed.len(), 4);
        assert_eq!(completed.first().map(String::as_str), Some("d"));
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let delays: Vec<(String, u64)> = (0..20).map(|i| (format!("id-{i}"), 15)).collect();
        let delay_refs: Vec<(&str, u64)> = delays.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let source = Arc::new(FakeSource::new(&delay_refs));
        let identifiers: Vec<String> = delays.iter().map(|(k, _)| k.clone()).collect();

        let results =
            lookup_all(source.clone(), &identifiers, 3, Arc::new(SilentProgress)).await;

        assert_eq!(results.len(), 20);
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn each_identifier_is_looked_up_once() {
        let source = Arc::new(FakeSource::new(&[]));
        let identifiers: Vec<String> = (0..50).map(|i| format!("id-{i}")).collect();

        let results = lookup_all(source.clone(), &identifiers, 8, Arc::new(SilentProgress)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 50);
        for (cas, result) in identifiers.iter().zip(&results) {
            assert_eq!(name_of(result), format!("name-{cas}"));
        }
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let source = Arc::new(FakeSource::new(&[]));
        let results = lookup_all(source, &ids(&["x", "y"]), 0, Arc::new(SilentProgress)).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn empty_input_yields_no_results() {
        let source = Arc::new(FakeSource::new(&[]));
        let results = lookup_all(source, &[], 5, Arc::new(SilentProgress)).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn run_with_fake_source_writes_tally() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("batch.csv");
        std::fs::write(&input, "CAS\nok-1\nbad-1\n  \nok-2\n").unwrap();

        let config = RunConfig {
            input: input.clone(),
            output: None,
            lookup: LookupConfig {
                concurrency: 2,
                base_url: "http://unused.invalid".into(),
                timeout_secs: 1,
                max_attempts: 3,
                backoff_ms: 1,
            },
        };

        let summary = run_with_source(&config, Arc::new(FakeSource::new(&[])), Arc::new(SilentProgress))
            .await
            .unwrap();

        assert_eq!(summary.output, dir.path().join("batch_results.csv"));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let mut reader = csv::Reader::from_path(&summary.output).unwrap();
        let rows: Vec<OutputRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        let order: Vec<&str> = rows.iter().map(|r| r.cas_number.as_str()).collect();
        assert_eq!(order, vec!["ok-1", "bad-1", "ok-2"]);
        assert_eq!(rows[1].status, LookupStatus::Failed);
    }

    #[tokio::test]
    async fn run_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            input: dir.path().join("absent.csv"),
            output: None,
            lookup: LookupConfig::from(&casenrich_shared::AppConfig::default()),
        };

        let result = run(&config, Arc::new(SilentProgress)).await;
        assert!(result.is_err());
        assert!(!dir.path().join("absent_results.csv").exists());
    }

    #[tokio::test]
    async fn run_against_mock_pubchem() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compound/name/50-00-0/cids/JSON"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "IdentifierList": { "CID": [712] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/compound/cid/712/property/IUPACName,Title,MolecularFormula,SMILES,CanonicalSMILES/JSON",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "PropertyTable": { "Properties": [{
                    "CID": 712,
                    "MolecularFormula": "CH2O",
                    "SMILES": "C=O",
                    "IUPACName": "formaldehyde"
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compound/name/0000-00-0/cids/JSON"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "IdentifierList": { "CID": [] } })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cas.csv");
        std::fs::copy("../../../fixtures/csv/formaldehyde_and_unknown.csv", &input)
            .expect("copy fixture");
        let out = dir.path().join("annotated.csv");

        let mut lookup = LookupConfig::from(&casenrich_shared::AppConfig::default());
        lookup.base_url = server.uri();
        lookup.backoff_ms = 1;

        let config = RunConfig {
            input,
            output: Some(out.clone()),
            lookup,
        };

        let summary = run(&config, Arc::new(SilentProgress)).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let rows: Vec<OutputRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].cas_number, "50-00-0");
        assert_eq!(rows[0].status, LookupStatus::Success);
        assert_eq!(rows[0].name, "formaldehyde");
        assert_eq!(rows[0].formula, "CH2O");
        assert_eq!(rows[0].smiles, "C=O");
        assert!(rows[0].image.starts_with("=IMAGE(\""));
        assert!(rows[0].error.is_empty());

        assert_eq!(rows[1].cas_number, "0000-00-0");
        assert_eq!(rows[1].status, LookupStatus::Failed);
        assert_eq!(rows[1].error, "No compound found for this CAS number");

        // Same upstream answers, same rows.
        run(&config, Arc::new(SilentProgress)).await.unwrap();
        let mut again = csv::Reader::from_path(&out).unwrap();
        let rerun: Vec<OutputRow> = again.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rerun, rows);
    }
}
