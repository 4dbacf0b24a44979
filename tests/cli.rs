use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn arcbot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("arcbot");
    path
}

fn run_arcbot(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_arcbot_with_env(config_path, args, &[])
}

fn run_arcbot_with_env(
    config_path: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = arcbot_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        // Credentials must never leak in from the host environment
        .env_remove("OPENAI_API_KEY")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_SERVICE_KEY")
        .envs(envs.iter().copied())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run arcbot binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = r#"[normalizer]
merge_sources = true

[upload]
document_name = "Test Development Code"
document_type = "city_code"
source_url = "https://example.test/code"
hierarchy = ["Test Ch. 1", "Article I"]
delay_ms = 10

[server]
bind = "127.0.0.1:8788"
"#;

    let config_path = root.join("arcbot.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

#[test]
fn test_normalize_plain_text() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("reply.txt");
    fs::write(&input, "I could not find a relevant code section.").unwrap();

    let (stdout, stderr, success) = run_arcbot(
        &config_path,
        &[
            "normalize",
            input.to_str().unwrap(),
            "--session-id",
            "s-1",
            "--history-count",
            "2",
        ],
    );
    assert!(success, "normalize failed: {}{}", stdout, stderr);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["status"], "success");
    assert_eq!(payload["session_id"], "s-1");
    assert_eq!(
        payload["answer"],
        "I could not find a relevant code section."
    );
    assert_eq!(payload["sources"].as_array().unwrap().len(), 0);
    assert_eq!(payload["confidence"]["level"], "Medium");
    assert_eq!(payload["history_length"], 3);
}

#[test]
fn test_normalize_fenced_payload_merges_sources() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("reply.txt");
    fs::write(
        &input,
        r#"```json
{
  "answer": "Side setbacks are 20 feet.",
  "sources": [
    {"document_name": "BDC", "section_title": "2.7.3750", "section_hierarchy": ["Art. XIX"], "content": "part one"},
    {"document_name": "BDC", "section_title": "2.7.3750", "section_hierarchy": ["Art. XIX"], "content": "part two"}
  ],
  "confidence": {"level": "High", "explanation": "Direct citation."}
}
```"#,
    )
    .unwrap();

    let (stdout, _, success) = run_arcbot(
        &config_path,
        &["normalize", input.to_str().unwrap(), "--session-id", "s-2"],
    );
    assert!(success);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["answer"], "Side setbacks are 20 feet.");
    assert_eq!(payload["confidence"]["level"], "High");

    let sources = payload["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1, "fragments should merge: {}", stdout);
    assert_eq!(sources[0]["content"], "part one\n\n---\n\npart two");
}

#[test]
fn test_normalize_no_merge_flag() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("reply.txt");
    fs::write(
        &input,
        r#"{"answer":"A","sources":[
            {"document_name":"BDC","section_title":"S","content":"one"},
            {"document_name":"BDC","section_title":"S","content":"two"}]}"#,
    )
    .unwrap();

    let (stdout, _, success) = run_arcbot(
        &config_path,
        &["normalize", input.to_str().unwrap(), "--no-merge"],
    );
    assert!(success);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["sources"].as_array().unwrap().len(), 2);
}

#[test]
fn test_normalize_generates_session_id_when_omitted() {
    let (tmp, config_path) = setup_test_env();
    let input = tmp.path().join("reply.txt");
    fs::write(&input, "plain").unwrap();

    let (stdout, _, success) = run_arcbot(&config_path, &["normalize", input.to_str().unwrap()]);
    assert!(success);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(!payload["session_id"].as_str().unwrap().is_empty());
    assert_eq!(payload["history_length"], 1);
}

#[test]
fn test_normalize_works_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing_config = tmp.path().join("nope.toml");
    let input = tmp.path().join("reply.txt");
    fs::write(&input, "defaults apply").unwrap();

    let (stdout, stderr, success) =
        run_arcbot(&missing_config, &["normalize", input.to_str().unwrap()]);
    assert!(success, "should fall back to defaults: {}", stderr);
    assert!(stdout.contains("defaults apply"));
}

#[test]
fn test_upload_dry_run_reports_chunks_offline() {
    let (tmp, config_path) = setup_test_env();
    let doc = tmp.path().join("code.txt");
    fs::write(
        &doc,
        "1.2.100 Purpose.\n\nBody of the purpose section.\n\n1.2.200 Applicability.\n\nBody of the applicability section.\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_arcbot(
        &config_path,
        &["upload", doc.to_str().unwrap(), "--dry-run"],
    );
    assert!(success, "dry-run must not need credentials: {}", stderr);
    assert!(stdout.contains("chunks: 2"));
    assert!(stdout.contains("1.2.100 Purpose"));
    assert!(stdout.contains("1.2.200 Applicability"));
}

#[test]
fn test_upload_without_embedding_provider_fails_before_network() {
    let (tmp, config_path) = setup_test_env();
    let doc = tmp.path().join("code.txt");
    fs::write(&doc, "1.2.100 Purpose.\n\nBody text.\n").unwrap();

    // Config has no [embedding] section, so the provider is disabled.
    let (stdout, stderr, success) = run_arcbot(&config_path, &["upload", doc.to_str().unwrap()]);
    assert!(!success, "upload should fail: {}", stdout);
    assert!(
        stderr.contains("disabled"),
        "expected provider error, got: {}",
        stderr
    );
}

/// Minimal HTTP stub standing in for both the embeddings API and the
/// Supabase REST surface. Serves one successful embedding, then rejects
/// every later embedding request. Returns the base URL and the paths of
/// the requests received so far.
fn spawn_stub_api() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let paths: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&paths);

    std::thread::spawn(move || {
        let mut embed_calls = 0;
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(s) => s,
                Err(_) => break,
            };
            let path = match read_request(&mut stream) {
                Some(p) => p,
                None => continue,
            };
            seen.lock().unwrap().push(path.clone());

            let (status, body) = if path.starts_with("/v1/embeddings") {
                embed_calls += 1;
                if embed_calls == 1 {
                    ("200 OK", r#"{"data":[{"index":0,"embedding":[0.25,0.5]}]}"#)
                } else {
                    ("400 Bad Request", r#"{"error":{"message":"invalid input"}}"#)
                }
            } else if path.starts_with("/rest/v1/documents") {
                ("201 Created", r#"[{"id": 7}]"#)
            } else {
                ("201 Created", "[]")
            };

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (base_url, paths)
}

/// Read one HTTP request off the stream (headers plus body) and return the
/// request path.
fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).ok()? == 0 {
            return None;
        }
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head).to_string();
    let path = head.split_whitespace().nth(1)?.to_string();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    stream.read_exact(&mut body).ok()?;

    Some(path)
}

#[test]
fn test_upload_aborts_after_first_failed_chunk() {
    let (stub_url, requests) = spawn_stub_api();
    let tmp = TempDir::new().unwrap();

    let config_content = format!(
        r#"[embedding]
provider = "openai"
url = "{stub_url}"
model = "stub-model"
dims = 2
max_retries = 0

[supabase]
url = "{stub_url}"

[upload]
document_name = "Test Development Code"
document_type = "city_code"
source_url = "https://example.test/code"
hierarchy = ["Test Ch. 1"]
delay_ms = 1
"#
    );
    let config_path = tmp.path().join("arcbot.toml");
    fs::write(&config_path, &config_content).unwrap();

    let doc = tmp.path().join("code.txt");
    fs::write(
        &doc,
        "1.2.100 Purpose.\n\nBody of the purpose section.\n\n1.2.200 Applicability.\n\nBody of the applicability section.\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_arcbot_with_env(
        &config_path,
        &["upload", doc.to_str().unwrap()],
        &[
            ("OPENAI_API_KEY", "test-key"),
            ("SUPABASE_SERVICE_KEY", "test-service-key"),
        ],
    );

    assert!(!success, "upload should abort on the failed chunk: {}", stdout);
    assert!(stderr.contains("OpenAI API error 400"), "got: {}", stderr);
    assert!(
        stdout.contains("embedding with stub-model (2 dimensions)"),
        "got: {}",
        stdout
    );

    let requests = requests.lock().unwrap();
    assert_eq!(
        requests.first().map(String::as_str),
        Some("/rest/v1/documents")
    );
    let embed_calls = requests
        .iter()
        .filter(|p| p.starts_with("/v1/embeddings"))
        .count();
    let chunk_inserts = requests
        .iter()
        .filter(|p| p.starts_with("/rest/v1/knowledge_chunks"))
        .count();
    assert_eq!(embed_calls, 2, "run should stop at the failed embedding: {:?}", requests);
    assert_eq!(chunk_inserts, 1, "only the first chunk should be inserted: {:?}", requests);
}

#[test]
fn test_migrate_without_credentials_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_arcbot(&config_path, &["migrate"]);
    assert!(!success);
    assert!(
        stderr.contains("SUPABASE_URL"),
        "expected credential error, got: {}",
        stderr
    );
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("arcbot.toml");
    fs::write(
        &config_path,
        "[embedding]\nprovider = \"openai\"\n", // missing model and dims
    )
    .unwrap();
    let input = tmp.path().join("reply.txt");
    fs::write(&input, "text").unwrap();

    let (_, stderr, success) = run_arcbot(&config_path, &["normalize", input.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("embedding.dims"), "got: {}", stderr);
}
