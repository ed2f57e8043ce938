//! Integration tests for terrasync
//!
//! These run the real pipeline (walker, dispatcher, diff engine) over
//! trees built in temporary directories, with the SQLite catalog on disk
//! the way a real job lays it out.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use terrasync::catalog::open_catalog;
use terrasync::config::{CancelToken, JobContext};
use terrasync::filter::ConditionFilter;
use terrasync::scan::{dispatch_full_scan, run_incremental_diff, Stats};
use terrasync::sink::SinkConfig;
use terrasync::storage::create_storage;
use terrasync::walker::{WalkOptions, Walker};

/// Reference tree: /a/f1(100B), /a/f2(2KB), /b/g1(5MB), /b/c/h(10B)
fn build_reference_tree(root: &Path) {
    fs::create_dir_all(root.join("a")).unwrap();
    fs::create_dir_all(root.join("b/c")).unwrap();
    fs::write(root.join("a/f1"), vec![0u8; 100]).unwrap();
    fs::write(root.join("a/f2"), vec![0u8; 2048]).unwrap();
    fs::write(root.join("b/g1"), vec![0u8; 5 * 1024 * 1024]).unwrap();
    fs::write(root.join("b/c/h"), vec![0u8; 10]).unwrap();
}

fn set_mtime(path: &Path, when: SystemTime) {
    File::open(path).unwrap().set_modified(when).unwrap();
}

fn context(root: &Path, job_dir: &Path, incremental: bool) -> JobContext {
    JobContext {
        job_id: "Job_it_scan".into(),
        job_dir: job_dir.to_path_buf(),
        incremental,
        uri: root.display().to_string(),
        concurrency: 4,
        depth: 0,
        batch_size: 3,
        db_type: "sqlite".into(),
        match_filter: ConditionFilter::default(),
        exclude_filter: ConditionFilter::default(),
        sink: SinkConfig::default(),
        quiet: true,
        csv: false,
        html: false,
        cmdline: "terrasync scan (test)".into(),
        cancel: CancelToken::default(),
    }
}

fn walk(ctx: &JobContext) -> (Walker, crossbeam_channel::Receiver<terrasync::Entry>) {
    let storage: Arc<dyn terrasync::Storage> = Arc::from(create_storage(&ctx.uri).unwrap());
    Walker::start(
        storage,
        WalkOptions {
            concurrency: ctx.concurrency,
            depth: ctx.depth,
            match_filter: Arc::new(ctx.match_filter.clone()),
            exclude_filter: Arc::new(ctx.exclude_filter.clone()),
        },
        ctx.cancel.clone(),
    )
    .unwrap()
}

/// Full scan into the job catalog; returns the stats and saved count
fn full_scan(ctx: &JobContext) -> (Arc<Stats>, u64) {
    let (walker, entries) = walk(ctx);
    let catalog = open_catalog(&ctx.db_type, &ctx.catalog_path()).unwrap();
    let stats = Arc::new(Stats::new());
    let (catalog, outcome) =
        dispatch_full_scan(entries, catalog, None, Arc::clone(&stats), ctx).unwrap();
    walker.join();
    catalog.close().unwrap();
    (stats, outcome.saved)
}

fn incremental_scan(ctx: &JobContext) -> terrasync::scan::DiffOutcome {
    let (walker, entries) = walk(ctx);
    let catalog = open_catalog(&ctx.db_type, &ctx.catalog_path()).unwrap();
    let (catalog, outcome) =
        run_incremental_diff(entries, catalog, Arc::new(Stats::new()), ctx).unwrap();
    walker.join();
    catalog.close().unwrap();
    outcome
}

#[test]
fn test_full_scan_reference_tree() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let ctx = context(root.path(), job.path(), false);
    let (stats, saved) = full_scan(&ctx);

    assert_eq!(stats.file_count(), 4);
    assert_eq!(stats.dir_count(), 3);
    assert_eq!(stats.total_size(), 5 * 1024 * 1024 + 2048 + 100 + 10);
    assert_eq!(stats.max_dir_depth(), 2);
    assert_eq!(stats.avg_name_len(), 2);
    assert_eq!(saved, 7);

    // Every entry landed in file_entries
    let catalog = open_catalog("sqlite", &ctx.catalog_path()).unwrap();
    let mut paths = Vec::new();
    catalog
        .for_each_path(&mut |p| paths.push(p.to_string()))
        .unwrap();
    paths.sort();
    assert_eq!(
        paths,
        vec!["/a", "/a/f1", "/a/f2", "/b", "/b/c", "/b/c/h", "/b/g1"]
    );
    assert_eq!(catalog.unique_ext_count().unwrap(), 1); // all extension-less
}

#[test]
fn test_match_size_filter() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let mut ctx = context(root.path(), job.path(), false);
    ctx.match_filter = ConditionFilter::compile("size > 1K").unwrap();
    let (stats, _) = full_scan(&ctx);

    let catalog = open_catalog("sqlite", &ctx.catalog_path()).unwrap();
    let mut paths = Vec::new();
    catalog
        .for_each_path(&mut |p| paths.push(p.to_string()))
        .unwrap();
    paths.sort();
    assert_eq!(paths, vec!["/a/f2", "/b/g1"]);
    assert_eq!(stats.file_count(), 2);
    assert_eq!(stats.dir_count(), 0);
}

#[test]
fn test_match_name_like_filter() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let mut ctx = context(root.path(), job.path(), false);
    ctx.match_filter = ConditionFilter::compile("name like 'f%'").unwrap();
    let (_, saved) = full_scan(&ctx);

    let catalog = open_catalog("sqlite", &ctx.catalog_path()).unwrap();
    let mut paths = Vec::new();
    catalog
        .for_each_path(&mut |p| paths.push(p.to_string()))
        .unwrap();
    paths.sort();
    assert_eq!(paths, vec!["/a/f1", "/a/f2"]);
    assert_eq!(saved, 2);
}

#[test]
fn test_match_type_dir_filter() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let mut ctx = context(root.path(), job.path(), false);
    ctx.match_filter = ConditionFilter::compile("type == 'dir'").unwrap();
    full_scan(&ctx);

    let catalog = open_catalog("sqlite", &ctx.catalog_path()).unwrap();
    let mut paths = Vec::new();
    catalog
        .for_each_path(&mut |p| paths.push(p.to_string()))
        .unwrap();
    paths.sort();
    assert_eq!(paths, vec!["/a", "/b", "/b/c"]);
}

#[test]
fn test_match_modified_and_type() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    // Age everything, then touch f1 back to now
    let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 3600);
    for rel in ["a/f1", "a/f2", "b/g1", "b/c/h"] {
        set_mtime(&root.path().join(rel), two_hours_ago);
    }
    set_mtime(&root.path().join("a/f1"), SystemTime::now());

    // "modified > 1" selects mtimes after (now - 1h): only the touched file
    let mut ctx = context(root.path(), job.path(), false);
    ctx.match_filter = ConditionFilter::compile("modified > 1 and type == 'file'").unwrap();
    full_scan(&ctx);

    let catalog = open_catalog("sqlite", &ctx.catalog_path()).unwrap();
    let mut paths = Vec::new();
    catalog
        .for_each_path(&mut |p| paths.push(p.to_string()))
        .unwrap();
    assert_eq!(paths, vec!["/a/f1"]);
}

#[test]
fn test_incremental_rename_and_add() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let ctx = context(root.path(), job.path(), false);
    full_scan(&ctx);

    // Preserve the parent directory's mtime across the mutations so the
    // only differences are the renamed and added files themselves.
    let a_dir = root.path().join("a");
    let a_mtime = fs::metadata(&a_dir).unwrap().modified().unwrap();
    fs::rename(root.path().join("a/f2"), root.path().join("a/f2.new")).unwrap();
    fs::write(root.path().join("a/f3"), b"fresh").unwrap();
    set_mtime(&a_dir, a_mtime);

    let ctx = context(root.path(), job.path(), true);
    let outcome = incremental_scan(&ctx);

    let mut new_paths: Vec<&str> = outcome.new_files.iter().map(|r| r.path.as_str()).collect();
    new_paths.sort();
    assert_eq!(new_paths, vec!["/a/f2.new", "/a/f3"]);
    // The deleted f2 is silently absent; nothing else changed
    assert!(outcome.changed_files.is_empty());
}

#[test]
fn test_incremental_no_changes_is_empty() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let ctx = context(root.path(), job.path(), false);
    full_scan(&ctx);

    let ctx = context(root.path(), job.path(), true);
    let outcome = incremental_scan(&ctx);

    assert!(outcome.new_files.is_empty());
    assert!(outcome.changed_files.is_empty());
    // Everything routed through the exact stage
    assert_eq!(outcome.candidates, 7);
}

#[test]
fn test_incremental_touch_reports_changed() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let ctx = context(root.path(), job.path(), false);
    full_scan(&ctx);

    set_mtime(
        &root.path().join("b/g1"),
        SystemTime::now() + Duration::from_secs(5),
    );

    let ctx = context(root.path(), job.path(), true);
    let outcome = incremental_scan(&ctx);

    assert!(outcome.new_files.is_empty());
    let changed: Vec<&str> = outcome
        .changed_files
        .iter()
        .map(|r| r.path.as_str())
        .collect();
    assert_eq!(changed, vec!["/b/g1"]);
}

#[test]
fn test_two_full_scans_identical_content() {
    let root = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let job1 = tempfile::tempdir().unwrap();
    let job2 = tempfile::tempdir().unwrap();
    let (stats1, saved1) = full_scan(&context(root.path(), job1.path(), false));
    let (stats2, saved2) = full_scan(&context(root.path(), job2.path(), false));

    assert_eq!(saved1, saved2);
    assert_eq!(stats1.file_count(), stats2.file_count());
    assert_eq!(stats1.total_size(), stats2.total_size());

    let collect = |job: &Path| {
        let catalog = open_catalog("sqlite", &job.join("index.db")).unwrap();
        let mut paths = Vec::new();
        catalog
            .for_each_path(&mut |p| paths.push(p.to_string()))
            .unwrap();
        paths.sort();
        paths
    };
    assert_eq!(collect(job1.path()), collect(job2.path()));
}

#[test]
fn test_depth_capped_scan() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let mut ctx = context(root.path(), job.path(), false);
    ctx.depth = 1;
    let (stats, saved) = full_scan(&ctx);

    assert_eq!(saved, 2); // /a and /b only
    assert_eq!(stats.dir_count(), 2);
    assert_eq!(stats.file_count(), 0);
}

#[test]
fn test_scan_start_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let job = tempfile::tempdir().unwrap();
    build_reference_tree(root.path());

    let mut ctx = context(root.path(), job.path(), false);
    ctx.cmdline = "terrasync scan -q <root>".into();
    terrasync::scan::start(&ctx).unwrap();

    assert!(ctx.catalog_path().exists());

    // Re-running the same job incrementally also succeeds end to end
    let mut ctx = context(root.path(), job.path(), true);
    ctx.cmdline = "terrasync scan -q <root>".into();
    terrasync::scan::start(&ctx).unwrap();
}
