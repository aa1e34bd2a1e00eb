use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn faq_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_faq"))
}

fn write_archive(path: &Path, files: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let archive = root.join("faq-main.zip");
    write_archive(
        &archive,
        &[
            (
                "faq-main/data-engineering/join-late.md",
                "---\nquestion: Can I still join the course after the start date?\n---\nYes, you can still join and submit homework.",
            ),
            (
                "faq-main/data-engineering/docker-postgres.md",
                "---\nquestion: How do I run Postgres with Docker?\n---\nUse docker compose with the pgdatabase service.",
            ),
            (
                "faq-main/mlops/mlflow.md",
                "+++\nquestion = \"Where is the MLflow UI?\"\n+++\nRun mlflow ui and open port 5000.",
            ),
            ("faq-main/broken.md", "---\nquestion: [unclosed\n---\nbody"),
            ("faq-main/scripts/build.py", "print('not documentation')"),
        ],
    );

    let config_content = format!(
        r#"[repo]
owner = "DataTalksClub"
name = "faq"
archive_path = "{}"

[logs]
dir = "{}/logs"

{}
"#,
        archive.display(),
        root.display(),
        extra_config
    );

    let config_path = config_dir.join("faq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_faq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = faq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run faq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn fingerprint(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("fingerprint: "))
        .unwrap()
        .to_string()
}

#[test]
fn test_index_reports_stats() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_faq(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("fetched: 3 documents"), "{}", stdout);
    assert!(stdout.contains("skipped: 1"), "{}", stdout);
    assert!(stdout.contains("filtered out: 0"), "{}", stdout);
    assert!(stdout.contains("indexed documents: 3"), "{}", stdout);
    assert!(stdout.contains("ok"));
    assert!(stderr.contains("broken.md"), "parse warning expected: {}", stderr);
}

#[test]
fn test_index_is_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (first, _, ok1) = run_faq(&config_path, &["index"]);
    let (second, _, ok2) = run_faq(&config_path, &["index"]);
    assert!(ok1 && ok2);
    assert_eq!(fingerprint(&first), fingerprint(&second));
}

#[test]
fn test_index_with_filter_and_chunking() {
    let (_tmp, config_path) = setup_test_env(
        "[filter]\nfilename_contains = \"data-engineering\"\n\n[chunking]\nenabled = true\nsize = 20\nstep = 10\n",
    );

    let (stdout, stderr, success) = run_faq(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("filtered out: 1"), "{}", stdout);
    assert!(stdout.contains("indexed chunks:"), "{}", stdout);
}

#[test]
fn test_index_dry_run() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_faq(&config_path, &["index", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("documents found: 3"));
    assert!(stdout.contains("faq-main/broken.md"));
}

#[test]
fn test_search_finds_document() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_faq(&config_path, &["search", "docker postgres"]);
    assert!(success, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with("1. "), "{}", stdout);
    assert!(first.contains("data-engineering/docker-postgres.md"), "{}", stdout);
    assert!(stdout.contains(
        "url: https://github.com/DataTalksClub/faq/blob/main/data-engineering/docker-postgres.md"
    ));
    assert!(stdout.contains("question: How do I run Postgres with Docker?"));
}

#[test]
fn test_search_limit_and_no_results() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_faq(&config_path, &["search", "course docker mlflow", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("1. "));
    assert!(!stdout.contains("2. "));

    let (stdout, _, success) = run_faq(&config_path, &["search", "kubernetes"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_faq(&tmp.path().join("nope.toml"), &["index"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}

#[test]
fn test_invalid_chunking_rejected() {
    let (_tmp, config_path) = setup_test_env("[chunking]\nenabled = true\nstep = 0\n");
    let (_, stderr, success) = run_faq(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("chunking.size and chunking.step"), "{}", stderr);
}

#[test]
fn test_search_filter_on_keyword_field() {
    let (_tmp, config_path) = setup_test_env("[index]\nkeyword_fields = [\"question\"]\n");

    let (stdout, stderr, success) = run_faq(
        &config_path,
        &[
            "search",
            "docker course",
            "--filter",
            "question=How do I run Postgres with Docker?",
        ],
    );
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("data-engineering/docker-postgres.md"), "{}", stdout);
    assert!(!stdout.contains("join-late.md"), "{}", stdout);
}

#[test]
fn test_search_filter_requires_keyword_field() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_faq(&config_path, &["search", "docker", "--filter", "section=x"]);
    assert!(!success);
    assert!(stderr.contains("not a keyword field"), "{}", stderr);
}
