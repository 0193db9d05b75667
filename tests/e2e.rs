//! End-to-end integration tests for science-helper.
//!
//! Figure tests and the catalog retrieval/filter tests run everywhere: the
//! network side talks to a scripted responder on 127.0.0.1. Tests that need
//! a real pdfium library and a catalog PDF are gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Including the pdfium tests:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use image::{Rgba, RgbaImage};
use science_helper::figure::drawio;
use science_helper::vak::parser::{self, CompiledPatterns};
use science_helper::{
    catalog, compose, export, AxisSpec, CatalogConfig, CodeMatch, CompositionConfig,
    ExportFormat, FilterOptions, ImageElement, LabelScheme, LabelStyle, LayoutMode, Resource,
    RetrievalProgressCallback, ScienceHelperError, Whitelist, WhitelistMode,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run pdfium e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn panel(w: u32, h: u32, shade: u8) -> ImageElement {
    let px = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([shade, (x % 256) as u8, (y % 256) as u8, 255])
    });
    ImageElement::new(px).unwrap()
}

fn panels() -> Vec<ImageElement> {
    vec![
        panel(120, 80, 10),
        panel(90, 110, 60),
        panel(150, 60, 120),
        panel(80, 80, 200),
        panel(100, 100, 250),
    ]
}

/// Scripted HTTP responder: routes on the request path, each route plays its
/// own list of `(status, body)` responses and repeats the last one.
async fn serve(routes: Vec<(&'static str, Vec<(u16, Vec<u8>)>)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let seen: Arc<Vec<AtomicUsize>> = Arc::new(routes.iter().map(|_| AtomicUsize::new(0)).collect());
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let routes = routes.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = match routes.iter().position(|(p, _)| path.starts_with(p)) {
                    Some(i) => {
                        let k = seen[i].fetch_add(1, Ordering::SeqCst);
                        let script = &routes[i].1;
                        script[k.min(script.len() - 1)].clone()
                    }
                    None => (404, Vec::new()),
                };
                let head = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{addr}"), hits)
}

#[derive(Default)]
struct RetryCounter {
    retries: AtomicUsize,
}

impl RetrievalProgressCallback for RetryCounter {
    fn on_retry(&self, _: Resource, _: u32, _: u32, _: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }
}

fn catalog_block(n: u32, codes: &str) -> String {
    format!("{n}. Вестник номер {n} 1810-72{n:02}\n{codes} с 01.02.2022\n")
}

/// Ten well-formed blocks with two malformed ones mixed in.
fn catalog_text() -> String {
    let mut text = String::from("ПЕРЕЧЕНЬ рецензируемых научных изданий\n");
    for n in 1..=10 {
        let codes = if n % 2 == 0 {
            "2.3.1. Системный анализ, управление и обработка информации (технические науки)"
        } else {
            "2.3.3. Автоматизация и управление технологическими процессами (технические науки)"
        };
        text.push_str(&catalog_block(n, codes));
        if n == 3 {
            text.push_str("11. Журнал без специальностей 1234-5678\n");
        }
        if n == 6 {
            text.push('\u{c}');
            text.push_str("12. 2345-6789 2.3.1. Системный анализ\n");
        }
    }
    text
}

// ── Figure composition ───────────────────────────────────────────────────────

#[test]
fn test_png_export_is_deterministic() {
    let config = CompositionConfig::builder()
        .mode(LayoutMode::Grid)
        .padding(12)
        .border(2)
        .labels(LabelStyle::default())
        .axes(AxisSpec::default())
        .build()
        .unwrap();

    let first = export(&compose(panels(), &config).unwrap(), ExportFormat::Png).unwrap();
    let second = export(&compose(panels(), &config).unwrap(), ExportFormat::Png).unwrap();
    assert_eq!(first, second, "same input must give byte-identical PNG");
    assert_eq!(&first[..4], b"\x89PNG");
}

#[test]
fn test_grid_placements_disjoint_and_inside_canvas() {
    let config = CompositionConfig::builder()
        .mode(LayoutMode::Grid)
        .columns(2)
        .padding(7)
        .border(3)
        .build()
        .unwrap();
    let doc = compose(panels(), &config).unwrap();
    let canvas = science_helper::figure::layout::Rect::new(0, 0, doc.width(), doc.height());

    let rects: Vec<_> = doc.images().iter().map(|p| p.placement().outer).collect();
    assert_eq!(rects.len(), 5);
    for (i, a) in rects.iter().enumerate() {
        assert!(canvas.contains_rect(a), "placement {i} leaves the canvas");
        for b in &rects[i + 1..] {
            assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
        }
    }
}

#[test]
fn test_drawio_has_one_node_per_image_matching_layout() {
    let style = LabelStyle {
        scheme: LabelScheme::CyrillicLower,
        ..Default::default()
    };
    let config = CompositionConfig::builder()
        .mode(LayoutMode::Row)
        .padding(5)
        .border(1)
        .labels(style)
        .axes(AxisSpec::default())
        .build()
        .unwrap();
    let doc = compose(panels(), &config).unwrap();

    let xml = String::from_utf8(export(&doc, ExportFormat::Drawio).unwrap()).unwrap();
    let cells = drawio::image_cells(&xml).unwrap();
    assert_eq!(cells.len(), doc.images().len());
    for (cell, placed) in cells.iter().zip(doc.images()) {
        let outer = placed.placement().outer;
        assert_eq!(cell.geometry.x, outer.x as i64);
        assert_eq!(cell.geometry.y, outer.y as i64);
        assert_eq!(cell.geometry.width, outer.width);
        assert_eq!(cell.geometry.height, outer.height);
    }
    assert_eq!(
        doc.labels(),
        vec![Some("а"), Some("б"), Some("в"), Some("г"), Some("д")]
    );
}

#[test]
fn test_compose_to_file_picks_format_from_extension() {
    let dir = tempfile::tempdir().unwrap();
    let config = CompositionConfig::builder()
        .mode(LayoutMode::Column)
        .build()
        .unwrap();

    let png = dir.path().join("figure.png");
    let drawio_path = dir.path().join("nested/figure.drawio");
    science_helper::compose_to_file(panels(), &config, &png, None).unwrap();
    science_helper::compose_to_file(panels(), &config, &drawio_path, None).unwrap();

    let decoded = image::open(&png).unwrap();
    let doc = compose(panels(), &config).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (doc.width(), doc.height()));
    let xml = std::fs::read_to_string(&drawio_path).unwrap();
    assert_eq!(drawio::image_cells(&xml).unwrap().len(), 5);
}

#[test]
fn test_compose_empty_input_is_invalid() {
    let config = CompositionConfig::builder().build().unwrap();
    let err = compose(Vec::new(), &config).unwrap_err();
    assert!(matches!(err, ScienceHelperError::InvalidConfig(_)));
}

// ── Catalog retrieval ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_all_retries_and_caches() {
    let pdf = b"%PDF-1.7\n%fake catalog\n".to_vec();
    let json = br#"[{"title": "Alpha", "issn": "1810-7202"}]"#.to_vec();
    let (base, _) = serve(vec![
        ("/files", vec![(503, b"busy".to_vec()), (200, pdf.clone())]),
        ("/whitelist.json", vec![(200, json.clone())]),
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let counter = Arc::new(RetryCounter::default());
    let config = CatalogConfig::builder()
        .catalog_url(format!("{base}/files?name=vak_2024"))
        .whitelist_url(format!("{base}/whitelist.json"))
        .data_dir(dir.path())
        .retry_backoff_ms(1)
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let report = catalog::refresh_all(&config).await.unwrap();
    assert_eq!(report.catalog.path, dir.path().join("vak_2024.pdf"));
    assert_eq!(std::fs::read(&report.catalog.path).unwrap(), pdf);
    assert_eq!(std::fs::read(&report.whitelist.path).unwrap(), json);
    assert!(report.nomenclature.is_none());
    assert_eq!(counter.retries.load(Ordering::SeqCst), 1);

    let whitelist = catalog::load_whitelist(&config).unwrap();
    assert!(whitelist.contains("1810-7202"));
    assert!(whitelist.contains("alpha"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_cache() {
    let (base, hits) = serve(vec![("/files", vec![(500, Vec::new())])]).await;
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::builder()
        .catalog_url(format!("{base}/files?name=vak_2024"))
        .data_dir(dir.path())
        .max_attempts(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let cached = dir.path().join("vak_2024.pdf");
    std::fs::write(&cached, b"%PDF-1.4 previous").unwrap();

    let err = catalog::fetch(&config, Resource::Catalog).await.unwrap_err();
    assert!(matches!(err, ScienceHelperError::RetrievalError { .. }), "{err}");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read(&cached).unwrap(), b"%PDF-1.4 previous");
}

/// Slow responder that records the peak number of requests in flight.
async fn serve_slow(body: Vec<u8>, delay_ms: u64) -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let (hits_c, peak_c) = (hits.clone(), peak.clone());
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            hits_c.fetch_add(1, Ordering::SeqCst);
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak_c.fetch_max(now, Ordering::SeqCst);
            let (in_flight, body) = (in_flight.clone(), body.clone());
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                // Leave the in-flight count before the client can see a reply.
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{addr}"), hits, peak)
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_flight_per_resource() {
    let (base, hits, peak) = serve_slow(b"%PDF-1.7 slow".to_vec(), 300).await;
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::builder()
        .catalog_url(format!("{base}/files?name=vak_concurrent"))
        .data_dir(dir.path())
        .build()
        .unwrap();

    let (a, b) = tokio::join!(
        catalog::fetch(&config, Resource::Catalog),
        catalog::fetch(&config, Resource::Catalog)
    );
    assert_eq!(a.unwrap().path, b.unwrap().path);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(peak.load(Ordering::SeqCst), 1, "catalog downloads overlapped");
}

// ── Catalog parsing and filtering ────────────────────────────────────────────

#[test]
fn test_parse_skips_malformed_blocks() {
    let report = parser::parse_text(&catalog_text(), &CompiledPatterns::default()).unwrap();
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.skipped_count(), 2);
    let later = report.records.iter().find(|r| r.number == 7).unwrap();
    assert_eq!(later.source.page, 2);
}

#[tokio::test]
async fn test_filter_and_export_csv() {
    let report = parser::parse_text(&catalog_text(), &CompiledPatterns::default()).unwrap();
    let whitelist = Whitelist::from_json(
        r#"[
            {"titles": ["Вестник номер 2"], "issns": ["1810-7202"], "level": "K1"},
            {"issn": "1810-7204", "level": "K2", "wos_cc": {"value": true}},
            "1810-7205"
        ]"#,
    )
    .unwrap();

    let result = catalog::filter(&report, &["2.3.1"], &whitelist, &FilterOptions::default());
    // Every result record carries a requested code and is whitelisted.
    assert!(!result.records.is_empty());
    for r in &result.records {
        assert!(r.codes().any(|c| c == "2.3.1"));
        assert!(whitelist.lookup(r).is_some());
    }
    let numbers: Vec<u32> = result.records.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![2, 4]);
    assert_eq!(result.skipped_blocks, 2);
    assert_eq!(
        result.records.len() + result.excluded(),
        report.records.len()
    );

    // Dropping an entry can only shrink the result.
    let smaller = Whitelist::from_json(r#"["1810-7202"]"#).unwrap();
    let narrowed = catalog::filter(&report, &["2.3.1"], &smaller, &FilterOptions::default());
    assert!(narrowed.records.len() <= result.records.len());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("filtered.csv");
    let rows = catalog::write_csv(&result, &whitelist, &out).unwrap();
    assert_eq!(rows, 2);
    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "N,Name,ISSN,Specialties,Level,WoS,Scopus,RSCI");
    assert!(lines[1].starts_with("2,Вестник номер 2,1810-7202,"));
    assert!(lines[2].contains(",K2,yes,"));
}

#[test]
fn test_online_issn_in_whitelist_keeps_record() {
    let text = "1. Вестник науки 1234-5678 2345-6789 2.3.1. Системный анализ\n";
    let report = parser::parse_text(text, &CompiledPatterns::default()).unwrap();
    assert_eq!(report.records[0].issns, ["1234-5678", "2345-6789"]);

    let whitelist = Whitelist::from_json(r#"[{"issns": ["2345-6789"]}]"#).unwrap();
    let result = catalog::filter(&report, &["2.3.1"], &whitelist, &FilterOptions::default());
    assert_eq!(result.records.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("issn.csv");
    catalog::write_csv(&result, &whitelist, &out).unwrap();
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.contains("\"1234-5678, 2345-6789\""), "{csv}");
}

#[test]
fn test_ignore_mode_with_prefix_matching() {
    let report = parser::parse_text(&catalog_text(), &CompiledPatterns::default()).unwrap();
    let options = FilterOptions {
        whitelist_mode: WhitelistMode::Ignore,
        code_match: CodeMatch::Prefix,
    };
    let result = catalog::filter(&report, &["2.3"], &Whitelist::default(), &options);
    assert_eq!(result.records.len(), 10);
    assert_eq!(result.not_in_whitelist, 0);
}

// ── pdfium (gated) ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parse_real_catalog_pdf() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("vak_catalog.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::builder().data_dir(dir.path()).build().unwrap();

    let report = catalog::parse_catalog_file(&pdf, &config).await.unwrap();
    println!(
        "parsed {} records, skipped {}",
        report.records.len(),
        report.skipped_count()
    );
    assert!(!report.records.is_empty());
    for r in &report.records {
        assert!(!r.name.trim().is_empty());
        assert!(!r.specialties.is_empty());
    }
}

#[tokio::test]
async fn test_non_pdf_catalog_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("catalog.pdf");
    std::fs::write(&fake, b"<html>maintenance</html>").unwrap();
    let config = CatalogConfig::builder().data_dir(dir.path()).build().unwrap();

    let err = catalog::parse_catalog_file(&fake, &config).await.unwrap_err();
    assert!(matches!(err, ScienceHelperError::NotAPdf { .. }), "{err}");
}
