//! End-to-end pipeline runs through the public API with scripted collaborators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docmatch::checkpoint::CheckpointManager;
use docmatch::index::{FactsExtractor, FactsStore};
use docmatch::verify::Usage;
use docmatch::{
    Config, Cost, DocumentIndex, ExtractionMethod, JsonlFactsStore, LopdfExtractor,
    MockExtractor, MockRenderer, MockVerificationBackend, Pipeline, Pricing, RenderConfig,
    RenderService, RetryConfig, RunOutcome, Verdict, VerificationClient,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tempfile::TempDir;

const MEMO: &str = "Memorandum regarding the quarterly procurement review for the northern \
    district office including vendor assessments budget allocations and staffing \
    recommendations prepared by the oversight committee";

const INVOICE: &str = "Invoice number seven hundred for catering services delivered to the \
    annual conference venue including beverages desserts cutlery rental and transport \
    surcharges payable within thirty days";

fn touch(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), name.as_bytes()).unwrap();
}

fn write_pdf(path: &Path, pages: usize, text: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn backend() -> Arc<MockVerificationBackend> {
    Arc::new(MockVerificationBackend::replying(
        "VERDICT: MATCH\nCONFIDENCE: 91\nREASONING: same memo, different scan",
        Usage {
            input_units: 2_000,
            output_units: 150,
        },
    ))
}

fn pricing() -> Pricing {
    Pricing {
        input_per_million: 3.0,
        output_per_million: 15.0,
        exchange_rate: 1.0,
    }
}

#[test]
fn test_lopdf_extractor_reads_generated_pdf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memo.pdf");
    write_pdf(&path, 3, "Quarterly procurement review");

    let facts = LopdfExtractor::new().extract(&path, 1);

    assert_eq!(facts.page_count, 3);
    assert_ne!(facts.extraction_method, ExtractionMethod::Error);
    assert!(facts.error.is_none());
}

#[test]
fn test_lopdf_extractor_rejects_non_pdf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fake.pdf");
    std::fs::write(&path, b"plain text pretending to be a pdf").unwrap();

    let facts = LopdfExtractor::new().extract(&path, 1);

    assert_eq!(facts.page_count, 0);
    assert_eq!(facts.extraction_method, ExtractionMethod::Error);
}

#[tokio::test]
async fn test_config_driven_run_with_prefixes_and_persistent_cache() {
    let dir = TempDir::new().unwrap();
    let restricted = dir.path().join("foia");
    let reference = dir.path().join("archive");
    touch(&restricted, "FOIA-0001.pdf");
    touch(&restricted, "FOIA-0002.pdf");
    touch(&restricted, "cover-letter.pdf");
    touch(&reference, "ARC-memo.pdf");
    touch(&reference, "ARC-invoice.pdf");

    let config = Config {
        restricted_dir: restricted,
        restricted_prefix: Some("FOIA-".to_string()),
        reference_dir: reference,
        reference_prefix: Some("arc-".to_string()),
        work_dir: dir.path().join("work"),
        min_call_delay_ms: 0,
        budget_cap: Cost::from_amount(1.0),
        api_key: Some("sk-test".to_string()),
        ..Config::default()
    };
    config.validate().unwrap();
    std::fs::create_dir_all(&config.work_dir).unwrap();

    let extractor = Arc::new(
        MockExtractor::new()
            .with_document("FOIA-0001.pdf", 4, MEMO)
            .with_document("FOIA-0002.pdf", 2, INVOICE)
            .with_document("ARC-memo.pdf", 4, MEMO)
            .with_document("ARC-invoice.pdf", 3, INVOICE),
    );

    let run = |extractor: Arc<MockExtractor>, backend: Arc<MockVerificationBackend>| {
        let store = Arc::new(JsonlFactsStore::open(config.facts_cache_path()).unwrap());
        let checkpoint = Arc::new(CheckpointManager::open(config.checkpoint_path()).unwrap());
        Pipeline::new(
            config.pipeline_config(),
            config.restricted_spec(),
            config.reference_spec(),
            DocumentIndex::new(extractor, store, config.text_pages),
            RenderService::new(Arc::new(MockRenderer::new()), config.render_config()),
            VerificationClient::new(backend, pricing(), RetryConfig::none()),
            checkpoint,
        )
    };

    let first_backend = backend();
    let report = run(Arc::clone(&extractor), Arc::clone(&first_backend))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome(), RunOutcome::Completed);
    assert_eq!(report.summary.index.restricted_documents, 2);
    assert_eq!(report.summary.index.reference_documents, 2);
    assert_eq!(report.summary.index.skipped_files, 1);
    // Prefixes are stripped from reference ids.
    let keys: Vec<String> = report.pairs.iter().map(|p| p.key().to_string()).collect();
    assert_eq!(keys, vec!["0001 vs memo", "0002 vs invoice"]);
    assert!(report.pairs.iter().all(|p| p.verdict == Verdict::Match));
    assert_eq!(first_backend.calls(), 2);
    assert_eq!(extractor.calls(), 4);

    std::fs::write(config.report_path(), report.to_json().unwrap()).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.report_path()).unwrap()).unwrap();
    assert_eq!(written["summary"]["matches"], 2);

    let cache = JsonlFactsStore::open(config.facts_cache_path()).unwrap();
    assert_eq!(cache.len(), 4);

    // Second run: facts come from the cache, verdicts from the checkpoint.
    let second_backend = backend();
    let again = run(Arc::clone(&extractor), Arc::clone(&second_backend))
        .run()
        .await
        .unwrap();

    assert_eq!(extractor.calls(), 4);
    assert_eq!(second_backend.calls(), 0);
    assert_eq!(again.rows(), report.rows());
    assert_eq!(again.summary.index.cache_hits, 4);
}

#[tokio::test]
async fn test_failing_service_yields_error_verdicts_at_zero_cost() {
    let dir = TempDir::new().unwrap();
    let restricted = dir.path().join("restricted");
    let reference = dir.path().join("reference");
    touch(&restricted, "A.pdf");
    touch(&reference, "X.pdf");

    let config = Config {
        restricted_dir: restricted,
        reference_dir: reference,
        work_dir: dir.path().join("work"),
        min_call_delay_ms: 0,
        ..Config::default()
    };

    let extractor = MockExtractor::new()
        .with_document("A.pdf", 1, MEMO)
        .with_document("X.pdf", 1, MEMO);
    let backend = Arc::new(MockVerificationBackend::failing());
    let retry = RetryConfig::default()
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(1))
        .with_jitter(false);

    let pipeline = Pipeline::new(
        config.pipeline_config(),
        config.restricted_spec(),
        config.reference_spec(),
        DocumentIndex::new(
            Arc::new(extractor),
            Arc::new(docmatch::MemoryFactsStore::new()),
            1,
        ),
        RenderService::new(Arc::new(MockRenderer::new()), RenderConfig::default()),
        VerificationClient::new(Arc::clone(&backend), pricing(), retry),
        Arc::new(CheckpointManager::open(config.checkpoint_path()).unwrap()),
    );

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.outcome(), RunOutcome::Completed);
    assert_eq!(report.pairs.len(), 1);
    assert_eq!(report.pairs[0].verdict, Verdict::Error);
    assert_eq!(report.pairs[0].cost, Cost::ZERO);
    assert_eq!(backend.calls(), 3);
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.summary.total_cost, Cost::ZERO);
    assert_eq!(report.summary.calls_made, 3);
}
