use crossbeam_channel::bounded;
use kobako::artifact::{read_records, render, verify};
use kobako::engine::{ContentTypes, FilterChain, encode_bytes};
use kobako::pipeline::{
    Cancel, PipelineChannels, PipelineError, PipelineTuning, WalkOutcome, WorkerContext,
    create_pipeline_channels, encode_work_item, run_aggregator, run_walk_loop,
};
use kobako::utils::ExcludePattern;
use kobako::{EmbedOpts, Entry, Generated, Opts, Outcome, StorageMode, WorkResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use tempfile::TempDir;

type Mapping = BTreeMap<String, (String, Vec<u8>)>;

fn write(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

fn mapping(g: &Generated) -> Mapping {
    read_records(&g.source)
        .unwrap()
        .into_iter()
        .map(|r| {
            let raw = r.decode(g.report.storage).unwrap();
            (r.key, (r.content_type, raw))
        })
        .collect()
}

fn keys(m: &Mapping) -> BTreeSet<&str> {
    m.keys().map(String::as_str).collect()
}

fn opts_with_workers(n: usize) -> EmbedOpts {
    EmbedOpts {
        num_threads: Some(n),
        ..EmbedOpts::default()
    }
}

/// a.txt, .hidden, config.kobako excluding `\.hidden$`, img/pic.png (1000 bytes).
fn sample_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"hello");
    write(dir.path(), ".hidden", b"secret");
    write(dir.path(), "config.kobako", b"\\.hidden$\n");
    let pic: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
    write(dir.path(), "img/pic.png", &pic);
    dir
}

#[test]
fn test_generate_sample_tree() {
    let dir = sample_tree();
    let g = kobako::generate(dir.path(), &opts_with_workers(4)).unwrap();
    let m = mapping(&g);

    assert_eq!(keys(&m), BTreeSet::from(["a.txt", "img/pic.png"]));
    assert_eq!(m["a.txt"], ("text/plain".to_string(), b"hello".to_vec()));
    assert_eq!(m["img/pic.png"].0, "image/png");
    assert_eq!(m["img/pic.png"].1.len(), 1000);
    assert_eq!(g.report.files_found, 2);
    assert_eq!(g.report.files_embedded, 2);
    assert_eq!(g.report.raw_bytes, 1005);
    assert_eq!(g.report.namespace, "assets");
    assert_eq!(g.report.outcome, Outcome::Complete);
    assert!(g.source.contains("pub mod assets"));
}

#[test]
fn test_generate_empty_root() {
    let dir = TempDir::new().unwrap();
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(g.report.files_found, 0);
    assert!(mapping(&g).is_empty());
    assert!(g.source.contains("pub static RESOURCES"));
}

#[test]
fn test_generate_only_excluded_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".env", b"KEY=1");
    write(dir.path(), "sub/.keep", b"");
    write(dir.path(), "config.kobako", b"# nothing to exclude\n");
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(g.report.files_found, 0);
    assert!(mapping(&g).is_empty());
}

#[test]
fn test_generate_root_must_be_directory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "file.txt", b"x");
    assert!(kobako::generate(&dir.path().join("file.txt"), &EmbedOpts::default()).is_err());
    assert!(kobako::generate(&dir.path().join("missing"), &EmbedOpts::default()).is_err());
}

#[test]
fn test_generate_is_stable_across_runs() {
    let dir = sample_tree();
    write(dir.path(), "css/site.css", b"body { color: red }");
    write(dir.path(), "fonts/inter.woff2", &[0u8; 64]);
    let first = kobako::generate(dir.path(), &opts_with_workers(3)).unwrap();
    let second = kobako::generate(dir.path(), &opts_with_workers(3)).unwrap();
    assert_eq!(mapping(&first), mapping(&second));
    assert_eq!(
        mapping(&first)["fonts/inter.woff2"].0,
        "application/font-woff2"
    );
}

#[test]
fn test_generate_same_keys_for_any_pool_size() {
    let dir = TempDir::new().unwrap();
    let mut expected = BTreeSet::new();
    for i in 0..150 {
        let rel = format!("d{}/file{:03}.txt", i % 7, i);
        write(dir.path(), &rel, format!("content {}", i).as_bytes());
        expected.insert(rel);
        write(dir.path(), &format!("d{}/file{:03}.log", i % 7, i), b"noise");
    }
    write(dir.path(), "config.kobako", b"\\.log$\n");

    for workers in [1, 2, 16] {
        let g = kobako::generate(dir.path(), &opts_with_workers(workers)).unwrap();
        let m = mapping(&g);
        let got: BTreeSet<String> = m.keys().cloned().collect();
        assert_eq!(got, expected, "workers = {}", workers);
        assert_eq!(g.report.files_found, 150);
        assert_eq!(m["d3/file010.txt"].1, b"content 10");
    }
}

#[test]
fn test_generate_raw_storage() {
    let dir = sample_tree();
    let opts = EmbedOpts {
        storage: StorageMode::Raw,
        ..EmbedOpts::default()
    };
    let g = kobako::generate(dir.path(), &opts).unwrap();
    assert_eq!(g.report.storage, StorageMode::Raw);
    assert!(!g.source.contains("GzDecoder"));
    assert_eq!(mapping(&g)["a.txt"].1, b"hello");
    assert!(g.source.contains("\"aGVsbG8=\""));
}

#[test]
fn test_generate_namespace_from_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config.kobako", b"#package web_assets\n");
    write(dir.path(), "index.html", b"<h1>hi</h1>");
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(g.report.namespace, "web_assets");
    assert!(g.source.contains("pub mod web_assets"));
    assert_eq!(mapping(&g)["index.html"].0, "text/html");
}

#[test]
fn test_generate_bad_pattern_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config.kobako", b"([\n\\.skip$\n");
    write(dir.path(), "x.skip", b"1");
    write(dir.path(), "y.txt", b"2");
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(keys(&mapping(&g)), BTreeSet::from(["y.txt"]));
}

#[test]
fn test_generate_option_patterns_and_content_types() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "drafts/a.md", b"draft");
    write(dir.path(), "notes.md", b"# notes");
    let mut opts = EmbedOpts {
        exclude: vec!["/drafts/".to_string()],
        ..EmbedOpts::default()
    };
    opts.content_types
        .insert("md".to_string(), "text/x-markdown".to_string());
    let g = kobako::generate(dir.path(), &opts).unwrap();
    let m = mapping(&g);
    assert_eq!(keys(&m), BTreeSet::from(["notes.md"]));
    assert_eq!(m["notes.md"].0, "text/x-markdown");
}

#[test]
fn test_generate_awkward_file_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "we\"ird name.txt", b"q");
    write(dir.path(), "ünï/cødé.txt", b"u");
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(
        keys(&mapping(&g)),
        BTreeSet::from(["we\"ird name.txt", "ünï/cødé.txt"])
    );
}

#[test]
fn test_generate_cancelled_run_fails() {
    let dir = sample_tree();
    let opts = EmbedOpts {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        ..EmbedOpts::default()
    };
    let err = kobako::generate(dir.path(), &opts).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Cancelled { .. })
    ));
}

#[test]
fn test_embed_dir_writes_and_excludes_own_output() {
    let dir = sample_tree();
    let out = dir.path().join("assets.rs");

    let first = kobako::embed_dir(dir.path(), &out, &EmbedOpts::default()).unwrap();
    assert_eq!(first.output.as_deref(), Some(out.as_path()));
    assert_eq!(first.files_found, 2);
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(verify(&text, StorageMode::Gzip).unwrap(), 2);
    assert!(!dir.path().join(".assets.rs.tmp").exists());

    let second = kobako::embed_dir(dir.path(), &out, &EmbedOpts::default()).unwrap();
    assert_eq!(second.files_found, 2);
    let keys: Vec<String> = read_records(&fs::read_to_string(&out).unwrap())
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert!(!keys.contains(&"assets.rs".to_string()));
}

#[test]
fn test_embed_dir_with_verify() {
    let dir = sample_tree();
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("gen/assets.rs");
    fs::create_dir_all(out.parent().unwrap()).unwrap();
    let opts = Opts {
        verify: true,
        num_threads: Some(2),
        ..Opts::default()
    };
    let report = kobako::embed::embed_dir_with_opts(dir.path(), &out, &opts).unwrap();
    assert_eq!(report.files_embedded, 2);
    assert!(out.exists());
}

#[test]
fn test_embed_dir_failure_leaves_previous_artifact() {
    let dir = sample_tree();
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("assets.rs");
    fs::write(&out, "previous").unwrap();
    let opts = EmbedOpts {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        ..EmbedOpts::default()
    };
    assert!(kobako::embed_dir(dir.path(), &out, &opts).is_err());
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
}

// --- walk ---

fn channels(strict: bool, patterns: &[&str]) -> PipelineChannels {
    let filters = FilterChain::new(
        None,
        patterns.iter().map(|p| ExcludePattern::compile(p).unwrap()),
    );
    create_pipeline_channels(
        PathBuf::from("/r"),
        filters,
        strict,
        false,
        Cancel::new(None),
    )
}

fn file(path: &str) -> WalkOutcome {
    WalkOutcome::Ok {
        path: PathBuf::from(path),
        is_file: true,
    }
}

fn dir_entry(path: &str) -> WalkOutcome {
    WalkOutcome::Ok {
        path: PathBuf::from(path),
        is_file: false,
    }
}

fn walk_error(path: &str) -> WalkOutcome {
    WalkOutcome::Err {
        msg: format!("permission denied: {}", path),
        path: Some(PathBuf::from(path)),
    }
}

#[test]
fn test_walk_sends_eligible_files_then_count() {
    let PipelineChannels {
        work_tx,
        work_rx,
        total_tx,
        total_rx,
        walk_errors,
        ctx,
        ..
    } = channels(false, &[r"\.log$"]);
    let items = vec![
        dir_entry("/r"),
        file("/r/a.txt"),
        file("/r/.hidden"),
        dir_entry("/r/.git"),
        file("/r/config.kobako"),
        walk_error("/r/locked"),
        file("/r/server.log"),
        file("/r/b/c.txt"),
    ];
    let count = run_walk_loop(work_tx, total_tx, ctx, items.into_iter());
    assert_eq!(count, 2);
    assert_eq!(total_rx.try_recv().unwrap(), 2);
    let sent: Vec<PathBuf> = work_rx.try_iter().collect();
    assert_eq!(sent, [PathBuf::from("/r/a.txt"), PathBuf::from("/r/b/c.txt")]);
    assert_eq!(walk_errors.lock().unwrap().len(), 1);
}

#[test]
fn test_walk_strict_stops_on_first_error() {
    let PipelineChannels {
        work_tx,
        work_rx,
        total_tx,
        total_rx,
        first_error,
        walk_errors,
        ctx,
        ..
    } = channels(true, &[]);
    let items = vec![file("/r/a.txt"), walk_error("/r/locked"), file("/r/z.txt")];
    let count = run_walk_loop(work_tx, total_tx, ctx, items.into_iter());
    assert_eq!(count, 1);
    assert_eq!(total_rx.try_recv().unwrap(), 1);
    assert_eq!(work_rx.try_iter().count(), 1);
    assert!(first_error.lock().unwrap().is_some());
    assert!(walk_errors.lock().unwrap().is_empty());
}

// --- aggregator over channels ---

fn entry(key: &str) -> WorkResult {
    let enc = encode_bytes(key.as_bytes(), StorageMode::Gzip).unwrap();
    WorkResult::Encoded(Entry {
        key: key.to_string(),
        content_type: "text/plain".to_string(),
        digest: enc.digest,
        data: enc.data,
        size: enc.size,
    })
}

#[test]
fn test_run_aggregator_count_arrives_last() {
    let (result_tx, result_rx) = bounded(4);
    let (total_tx, total_rx) = bounded(1);
    let producer = thread::spawn(move || {
        for i in 0..10 {
            result_tx.send(entry(&format!("f{}", i))).unwrap();
        }
        total_tx.send(10).unwrap();
        // Keep the result sender open: completion must come from the count alone.
        thread::sleep(std::time::Duration::from_millis(50));
        drop(result_tx);
    });
    let agg = run_aggregator(result_rx, total_rx, Cancel::new(None), None).unwrap();
    producer.join().unwrap();
    assert_eq!(agg.files_embedded, 10);
    let text = render("assets", StorageMode::Gzip, &agg.body).unwrap();
    assert_eq!(read_records(&text).unwrap().len(), 10);
}

#[test]
fn test_run_aggregator_stream_closed_early() {
    let (result_tx, result_rx) = bounded(4);
    let (total_tx, total_rx) = bounded(1);
    total_tx.send(3).unwrap();
    result_tx.send(entry("a")).unwrap();
    drop(result_tx);
    let err = run_aggregator(result_rx, total_rx, Cancel::new(None), None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StreamClosed {
            resolved: 1,
            expected: 3
        }
    ));
}

#[test]
fn test_run_aggregator_missing_count() {
    let (result_tx, result_rx) = bounded::<WorkResult>(4);
    let (total_tx, total_rx) = bounded::<usize>(1);
    drop(total_tx);
    let err = run_aggregator(result_rx, total_rx, Cancel::new(None), None).unwrap_err();
    drop(result_tx);
    assert!(matches!(err, PipelineError::MissingCount { resolved: 0 }));
}

#[test]
fn test_run_aggregator_cancel_wins() {
    let (_result_tx, result_rx) = bounded::<WorkResult>(4);
    let (_total_tx, total_rx) = bounded::<usize>(1);
    let cancel = Cancel::new(Some(Arc::new(AtomicBool::new(true))));
    let err = run_aggregator(result_rx, total_rx, cancel, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Cancelled {
            resolved: 0,
            expected: None
        }
    ));
}

// --- encoder ---

fn worker_ctx(root: &Path) -> WorkerContext {
    WorkerContext {
        root: root.to_path_buf(),
        tuning: PipelineTuning {
            num_threads: 1,
            storage: StorageMode::Gzip,
            namespace: "assets".to_string(),
            announce: false,
        },
        content_types: ContentTypes::default(),
        cancel: Cancel::new(None),
    }
}

#[test]
fn test_encode_work_item_reads_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sub/page.html", b"<p>x</p>");
    let ctx = worker_ctx(dir.path());
    match encode_work_item(&dir.path().join("sub/page.html"), &ctx) {
        WorkResult::Encoded(e) => {
            assert_eq!(e.key, "sub/page.html");
            assert_eq!(e.content_type, "text/html");
            assert_eq!(e.size, 8);
        }
        WorkResult::Skipped(s) => panic!("unexpected skip: {}", s.reason),
    }
}

#[test]
fn test_encode_work_item_missing_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let ctx = worker_ctx(dir.path());
    let gone = dir.path().join("gone.txt");
    match encode_work_item(&gone, &ctx) {
        WorkResult::Skipped(s) => assert_eq!(s.path, gone),
        WorkResult::Encoded(_) => panic!("missing file was encoded"),
    }
}

// --- names that are not UTF-8 ---

#[cfg(unix)]
fn write_raw_name(root: &Path, name: &[u8], bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    let path = root.join(OsStr::from_bytes(name));
    fs::write(&path, bytes).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn test_generate_hidden_name_with_invalid_utf8_is_excluded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"a");
    write_raw_name(dir.path(), b".secret\xff", b"token");
    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(keys(&mapping(&g)), BTreeSet::from(["a.txt"]));
    assert_eq!(g.report.files_found, 1);
    assert_eq!(g.report.outcome, Outcome::Complete);
}

#[cfg(unix)]
#[test]
fn test_generate_invalid_utf8_names_are_skipped_not_merged() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok.txt", b"ok");
    let fe = write_raw_name(dir.path(), b"f\xfe", b"1");
    let ff = write_raw_name(dir.path(), b"f\xff", b"2");

    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(keys(&mapping(&g)), BTreeSet::from(["ok.txt"]));
    assert_eq!(verify(&g.source, StorageMode::Gzip).unwrap(), 1);
    assert_eq!(g.report.files_found, 3);
    assert_eq!(g.report.files_embedded, 1);
    assert_eq!(g.report.outcome, Outcome::Partial);
    let mut skipped: Vec<PathBuf> = g.report.skipped.iter().map(|s| s.path.clone()).collect();
    skipped.sort();
    let root = dir.path().canonicalize().unwrap();
    let mut expected = vec![
        root.join(fe.file_name().unwrap()),
        root.join(ff.file_name().unwrap()),
    ];
    expected.sort();
    assert_eq!(skipped, expected);
    assert!(
        g.report
            .skipped
            .iter()
            .all(|s| s.reason == "path is not valid UTF-8")
    );
}

#[cfg(unix)]
#[test]
fn test_embed_dir_strict_with_skipped_file_writes_nothing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok.txt", b"ok");
    write_raw_name(dir.path(), b"bad\xff.txt", b"x");
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("assets.rs");
    fs::write(&out, "previous").unwrap();

    let opts = EmbedOpts {
        strict: true,
        ..EmbedOpts::default()
    };
    let err = kobako::embed_dir(dir.path(), &out, &opts).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Strict { count: 1, .. })
    ));
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
}

#[cfg(unix)]
#[test]
fn test_generate_unreadable_file_is_partial() {
    use std::os::unix::fs::PermissionsExt;
    // Permission bits do not stop root from reading.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok.txt", b"ok");
    write(dir.path(), "locked.bin", b"secret");
    let locked = dir.path().join("locked.bin");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let g = kobako::generate(dir.path(), &EmbedOpts::default()).unwrap();
    assert_eq!(keys(&mapping(&g)), BTreeSet::from(["ok.txt"]));
    assert_eq!(g.report.outcome, Outcome::Partial);
    assert_eq!(g.report.skipped.len(), 1);
    assert!(g.report.skipped[0].path.ends_with("locked.bin"));

    let strict = EmbedOpts {
        strict: true,
        ..EmbedOpts::default()
    };
    assert!(kobako::generate(dir.path(), &strict).is_err());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}

// --- cancel after completion ---

#[test]
fn test_run_aggregator_cancel_after_completion_keeps_batch() {
    let (result_tx, result_rx) = bounded(0);
    let (total_tx, total_rx) = bounded(0);
    let flag = Arc::new(AtomicBool::new(false));
    let producer_flag = Arc::clone(&flag);
    let producer = thread::spawn(move || {
        // Zero-capacity channels: each send returns only once the aggregator has taken it.
        total_tx.send(1_usize).unwrap();
        result_tx.send(entry("only")).unwrap();
        producer_flag.store(true, std::sync::atomic::Ordering::Relaxed);
        thread::sleep(std::time::Duration::from_millis(50));
        drop(result_tx);
    });
    let agg = run_aggregator(result_rx, total_rx, Cancel::new(Some(flag)), None).unwrap();
    producer.join().unwrap();
    assert_eq!(agg.files_embedded, 1);
}

#[test]
fn test_walk_cancelled_sends_no_count() {
    let mut chans = channels(false, &[]);
    let flag = Arc::new(AtomicBool::new(true));
    chans.ctx.cancel = Cancel::new(Some(flag));
    let PipelineChannels {
        work_tx,
        work_rx,
        total_tx,
        total_rx,
        ctx,
        ..
    } = chans;
    let count = run_walk_loop(work_tx, total_tx, ctx, vec![file("/r/a.txt")].into_iter());
    assert_eq!(count, 0);
    assert!(total_rx.try_recv().is_err());
    assert_eq!(work_rx.try_iter().count(), 0);
}
