use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cvrag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cvrag"))
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("jd.txt"),
        "Senior Backend Engineer\n\nRequirements: five years of Rust or Go experience, \
         strong skills in distributed systems.\n\nResponsibilities include owning payment services.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("experience.md"),
        "# Experience\n\nLed a team of six engineers building payment services in Rust.\n\n\
         Achievements: cut latency by 40 percent; leadership of the on-call rotation.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("skills.txt"),
        "Technical skills: Rust, Go, Python, Kubernetes, Terraform, PostgreSQL.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/cvrag.sqlite"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
result_limit = 10
relevance_threshold_ratio = 0.7
max_context_length = 8000

[embedding]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("cvrag.toml");
    fs::write(&config_path, config_content).unwrap();

    TestEnv {
        _tmp: tmp,
        root,
        config_path,
    }
}

fn run_cvrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cvrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cvrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest_all(env: &TestEnv) {
    let jd = format!("job_description={}", env.root.join("docs/jd.txt").display());
    let exp = format!(
        "experience_superset={}",
        env.root.join("docs/experience.md").display()
    );
    let skills = format!(
        "skills_superset={}",
        env.root.join("docs/skills.txt").display()
    );

    let (_, _, ok) = run_cvrag(&env.config_path, &["init"]);
    assert!(ok, "init failed");
    let (stdout, stderr, ok) = run_cvrag(
        &env.config_path,
        &["ingest", "--doc", &jd, "--doc", &exp, "--doc", &skills],
    );
    assert!(ok, "ingest failed: stdout={}, stderr={}", stdout, stderr);
}

fn source_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| l.starts_with("(Source:")).collect()
}

#[test]
fn test_init_creates_database() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(env.root.join("data/cvrag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();
    let (_, _, first) = run_cvrag(&env.config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_cvrag(&env.config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_reports_documents() {
    let env = setup_test_env();
    run_cvrag(&env.config_path, &["init"]);
    let jd = format!("job_description={}", env.root.join("docs/jd.txt").display());
    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["ingest", "--doc", &jd]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest ok"));
    assert!(stdout.contains("job_description"));
    assert!(stdout.contains("documents: 1"));
}

#[test]
fn test_ingest_rejects_unsupported_file() {
    let env = setup_test_env();
    run_cvrag(&env.config_path, &["init"]);
    let path = env.root.join("docs/cv.odt");
    fs::write(&path, "binary").unwrap();
    let arg = format!("sample_cv={}", path.display());
    let (_, stderr, success) = run_cvrag(&env.config_path, &["ingest", "--doc", &arg]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"), "stderr={}", stderr);
}

#[test]
fn test_ingest_rejects_malformed_doc_arg() {
    let env = setup_test_env();
    let (_, _, success) = run_cvrag(&env.config_path, &["ingest", "--doc", "no-equals-sign"]);
    assert!(!success);
}

#[test]
fn test_retrieve_keyword() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["retrieve", "Kubernetes Terraform"]);
    assert!(success, "retrieve failed: stderr={}", stderr);
    assert!(stdout.contains("(Source: skills_superset)"));
    assert!(stdout.contains("Terraform"));
    assert!(stderr.contains("retrieved:"));
}

#[test]
fn test_retrieve_source_filter() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, _, success) = run_cvrag(
        &env.config_path,
        &["retrieve", "Rust payment services", "--source", "job_description"],
    );
    assert!(success);
    let sources = source_lines(&stdout);
    assert!(!sources.is_empty());
    assert!(sources.iter().all(|l| *l == "(Source: job_description)"));
}

#[test]
fn test_retrieve_json() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, _, success) = run_cvrag(&env.config_path, &["retrieve", "Rust", "--json"]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(json["total_retrieved"].as_u64().unwrap() >= 1);
    assert!(json["context_text"].as_str().unwrap().contains("(Source:"));
    assert!(json["selected_chunks"].as_array().unwrap().len() >= 1);
    assert_eq!(json["queries_used"][0], "Rust");
}

#[test]
fn test_retrieve_before_ingest_warns() {
    let env = setup_test_env();
    run_cvrag(&env.config_path, &["init"]);
    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["retrieve", "Rust"]);
    assert!(success);
    assert!(source_lines(&stdout).is_empty());
    assert!(stderr.contains("warning: no relevant context"));
}

#[test]
fn test_context_cv_with_summary() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["context", "cv", "--summary"]);
    assert!(success, "context cv failed: stderr={}", stderr);
    assert!(stdout.starts_with("JOB DESCRIPTION ANALYSIS:"));
    assert!(stdout.contains("(Source: job_description)"));
    assert!(stdout.contains("CANDIDATE EXPERIENCE & SKILLS SUPERSET:"));
    assert!(stdout.contains("(Source: experience_superset)"));
    assert!(stdout.contains("--- summary ---"));

    let jd_part = stdout
        .split("CANDIDATE EXPERIENCE & SKILLS SUPERSET:")
        .next()
        .unwrap();
    assert!(source_lines(jd_part)
        .iter()
        .all(|l| *l == "(Source: job_description)"));
}

#[test]
fn test_context_cover_letter() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, _, success) = run_cvrag(
        &env.config_path,
        &["context", "cover-letter", "--company", "payment services"],
    );
    assert!(success);
    assert!(stdout.starts_with("TARGET JOB & COMPANY:"));
    assert!(stdout.contains("RELEVANT CANDIDATE BACKGROUND:"));
    assert!(stdout.contains("(Source: job_description)"));
}

#[test]
fn test_context_section() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, stderr, success) =
        run_cvrag(&env.config_path, &["context", "section", "skills"]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("(Source:"));

    let (_, _, success) = run_cvrag(&env.config_path, &["context", "section", "hobbies"]);
    assert!(!success);
}

#[test]
fn test_context_background_excludes_job_description() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, _, success) = run_cvrag(
        &env.config_path,
        &["context", "background", "--skill-focus", "Rust Kubernetes"],
    );
    assert!(success);
    let sources = source_lines(&stdout);
    assert!(!sources.is_empty());
    assert!(sources.iter().all(|l| !l.contains("job_description")));
}

#[test]
fn test_context_without_init_warns() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_cvrag(&env.config_path, &["context", "cv"]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("JOB DESCRIPTION ANALYSIS:"));
    assert!(stderr.contains("warning: no relevant context"));
}

#[test]
fn test_summarize_file() {
    let env = setup_test_env();
    let path = env.root.join("context.txt");
    fs::write(
        &path,
        "(Source: job_description)\nNeeds Rust\n\n---\n(Source: skills_superset)\nRust, Go\n",
    )
    .unwrap();

    let (stdout, _, success) = run_cvrag(
        &env.config_path,
        &["summarize", path.to_str().unwrap(), "--json"],
    );
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["source_count"], 2);
    assert_eq!(json["paragraph_count"], 2);
    assert_eq!(json["total_words"], 9);
}

#[test]
fn test_stats_lists_sources() {
    let env = setup_test_env();
    ingest_all(&env);

    let (stdout, _, success) = run_cvrag(&env.config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   3"));
    assert!(stdout.contains("experience_superset"));
    assert!(stdout.contains("skills_superset"));
}

#[test]
fn test_invalid_config_fails() {
    let env = setup_test_env();
    fs::write(
        &env.config_path,
        "[db]\npath = \"x.sqlite\"\n[retrieval]\nresult_limit = 0\n",
    )
    .unwrap();
    let (_, stderr, success) = run_cvrag(&env.config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("result_limit"), "stderr={}", stderr);
}
