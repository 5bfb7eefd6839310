use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

const FIXTURE: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

struct TestServer {
    process: Child,
    config_path: PathBuf,
}

impl TestServer {
    fn new(config_body: &str, extension: &str) -> Self {
        let config_path = write_config(config_body, extension);

        // Start server using the compiled binary (avoids cargo lock issues)
        let process = Command::new(env!("CARGO_BIN_EXE_mountserve"))
            .arg("run")
            .arg(config_path.to_str().unwrap())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .expect("Failed to start server");

        Self {
            process,
            config_path,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = std::fs::remove_file(&self.config_path);
    }
}

fn write_config(body: &str, extension: &str) -> PathBuf {
    let mut config_path = std::env::temp_dir();
    config_path.push(format!("mountserve-test-{}.{}", uuid::Uuid::new_v4(), extension));
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    config_path
}

fn dump_output(server: &mut TestServer) {
    use std::io::Read;
    if let Some(mut stderr) = server.process.stderr.take() {
        let mut s = String::new();
        let _ = stderr.read_to_string(&mut s);
        eprintln!("STDERR:\n{}", s);
    }
    if let Some(mut stdout) = server.process.stdout.take() {
        let mut s = String::new();
        let _ = stdout.read_to_string(&mut s);
        eprintln!("STDOUT:\n{}", s);
    }
}

async fn wait_for_server(url: &str, server: &mut TestServer) -> bool {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(Some(status)) = server.process.try_wait() {
            eprintln!("Server exited unexpectedly with status: {}", status);
            dump_output(server);
            return false;
        }

        if client.get(url).send().await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    eprintln!("Timeout waiting for server!");
    let _ = server.process.kill();
    dump_output(server);
    false
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().replace('\\', "/")
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_range_requests() {
    let tmp_dir = tempfile::tempdir().unwrap();
    std::fs::write(tmp_dir.path().join("fixture.txt"), FIXTURE).unwrap();

    let config = format!(
        r#"{{
        "server": {{ "listen": "127.0.0.1:9191" }},
        "mounts": [ {{ "path": "/", "dir": "{}", "readonly": true }} ]
    }}"#,
        path_str(tmp_dir.path())
    );

    let mut server = TestServer::new(&config, "json");
    assert!(
        wait_for_server("http://127.0.0.1:9191/fixture.txt", &mut server).await,
        "Server failed to start"
    );

    let client = reqwest::Client::new();
    let url = "http://127.0.0.1:9191/fixture.txt";

    let full = client.get(url).send().await.unwrap();
    assert_eq!(full.status(), 200);
    assert_eq!(full.headers()["accept-ranges"], "bytes");
    assert_eq!(full.headers()["content-length"], "62");
    assert_eq!(full.headers()["server"], "mountserve");
    assert_eq!(full.text().await.unwrap(), FIXTURE);

    let head = client.get(url).header("Range", "bytes=0-9").send().await.unwrap();
    assert_eq!(head.status(), 206);
    assert_eq!(head.headers()["content-range"], "bytes 0-9/62");
    let tail = client.get(url).header("Range", "bytes=10-").send().await.unwrap();
    assert_eq!(tail.headers()["content-range"], "bytes 10-61/62");
    let joined = head.text().await.unwrap() + &tail.text().await.unwrap();
    assert_eq!(joined, FIXTURE);

    let suffix = client.get(url).header("Range", "bytes=-10").send().await.unwrap();
    assert_eq!(suffix.text().await.unwrap(), &FIXTURE[52..]);

    let unsatisfiable = client.get(url).header("Range", "bytes=100-200").send().await.unwrap();
    assert_eq!(unsatisfiable.status(), 416);
    assert_eq!(unsatisfiable.headers()["content-range"], "bytes */62");
    assert!(unsatisfiable.bytes().await.unwrap().is_empty());

    let multi = client.get(url).header("Range", "bytes=0-4,7-11").send().await.unwrap();
    assert_eq!(multi.status(), 200);
    assert_eq!(multi.text().await.unwrap(), FIXTURE);
}

#[tokio::test]
async fn test_multiple_mounts() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let media = tmp_dir.path().join("media");
    let api = tmp_dir.path().join("api");
    let v2 = tmp_dir.path().join("v2");
    for (dir, content) in [(&media, "media"), (&api, "api"), (&v2, "v2")] {
        std::fs::create_dir(dir).unwrap();
        std::fs::write(dir.join("x.txt"), content).unwrap();
    }

    let config = format!(
        r#"
[server]
listen = "127.0.0.1:9192"

[[mounts]]
path = "/media"
dir = "{}"
readonly = true

[[mounts]]
path = "/api"
dir = "{}"

[[mounts]]
path = "/api/v2"
dir = "{}"
"#,
        path_str(&media),
        path_str(&api),
        path_str(&v2)
    );

    let mut server = TestServer::new(&config, "toml");
    assert!(
        wait_for_server("http://127.0.0.1:9192/media/x.txt", &mut server).await,
        "Server failed to start"
    );

    let client = no_redirect_client();

    let root = client.get("http://127.0.0.1:9192/").send().await.unwrap();
    assert_eq!(root.status(), 302);
    assert_eq!(root.headers()["location"], "/media/");

    let resp = client.get("http://127.0.0.1:9192/api/v2/x.txt").send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "v2");
    let resp = client.get("http://127.0.0.1:9192/api/x.txt").send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "api");

    let missing = client.get("http://127.0.0.1:9192/nowhere").send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["code"], "not_found");

    let dir = client.get("http://127.0.0.1:9192/api").send().await.unwrap();
    assert_eq!(dir.status(), 301);
    assert_eq!(dir.headers()["location"], "/api/");

    let listing = client.get("http://127.0.0.1:9192/media/").send().await.unwrap();
    assert_eq!(listing.status(), 200);
    assert!(listing.text().await.unwrap().contains("x.txt"));
}

#[tokio::test]
async fn test_uploads_and_readonly() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let public = tmp_dir.path().join("public");
    let inbox = tmp_dir.path().join("inbox");
    std::fs::create_dir(&public).unwrap();
    std::fs::create_dir(&inbox).unwrap();
    std::fs::write(public.join("keep.txt"), "keep").unwrap();

    let config = format!(
        r#"{{
        "server": {{ "listen": "127.0.0.1:9193" }},
        "mounts": [
            {{ "path": "/public", "dir": "{}", "readonly": true }},
            {{ "path": "/inbox", "dir": "{}" }}
        ]
    }}"#,
        path_str(&public),
        path_str(&inbox)
    );

    let mut server = TestServer::new(&config, "json");
    assert!(
        wait_for_server("http://127.0.0.1:9193/public/keep.txt", &mut server).await,
        "Server failed to start"
    );

    let client = reqwest::Client::new();

    let put = client
        .put("http://127.0.0.1:9193/inbox/note.txt")
        .body("uploaded")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), 201);
    assert_eq!(std::fs::read_to_string(inbox.join("note.txt")).unwrap(), "uploaded");

    let mkcol = client
        .request(reqwest::Method::from_bytes(b"MKCOL").unwrap(), "http://127.0.0.1:9193/inbox/sub")
        .send()
        .await
        .unwrap();
    assert_eq!(mkcol.status(), 201);
    assert!(inbox.join("sub").is_dir());

    let delete = client.delete("http://127.0.0.1:9193/inbox/note.txt").send().await.unwrap();
    assert_eq!(delete.status(), 204);
    assert!(!inbox.join("note.txt").exists());

    let refused = client
        .delete("http://127.0.0.1:9193/public/keep.txt")
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), 403);
    let body: serde_json::Value = refused.json().await.unwrap();
    assert_eq!(body["code"], "read_only");
    assert!(public.join("keep.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_traversal_and_symlink_escape() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("root");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(tmp_dir.path().join("secret.txt"), "secret").unwrap();
    std::fs::write(root.join("inside.txt"), "inside").unwrap();
    std::os::unix::fs::symlink(tmp_dir.path().join("secret.txt"), root.join("escape.txt")).unwrap();
    std::os::unix::fs::symlink(root.join("inside.txt"), root.join("alias.txt")).unwrap();

    let config = format!(
        r#"{{
        "server": {{ "listen": "127.0.0.1:9194" }},
        "mounts": [ {{ "path": "/", "dir": "{}", "readonly": true }} ]
    }}"#,
        path_str(&root)
    );

    let mut server = TestServer::new(&config, "json");
    assert!(
        wait_for_server("http://127.0.0.1:9194/inside.txt", &mut server).await,
        "Server failed to start"
    );

    let client = reqwest::Client::new();

    let escape = client.get("http://127.0.0.1:9194/escape.txt").send().await.unwrap();
    assert_eq!(escape.status(), 403);
    let body: serde_json::Value = escape.json().await.unwrap();
    assert_eq!(body["code"], "symlink_attack");

    let alias = client.get("http://127.0.0.1:9194/alias.txt").send().await.unwrap();
    assert_eq!(alias.text().await.unwrap(), "inside");

    let traversal = client
        .get("http://127.0.0.1:9194/%2e%2e/secret.txt")
        .send()
        .await
        .unwrap();
    assert_eq!(traversal.status(), 404);
    assert!(!traversal.text().await.unwrap().contains("secret"));
}

#[test]
fn test_validate_command() {
    let tmp_dir = tempfile::tempdir().unwrap();

    let good = write_config(
        &format!(
            r#"{{ "mounts": [ {{ "path": "/docs/", "dir": "{}" }} ] }}"#,
            path_str(tmp_dir.path())
        ),
        "json",
    );
    let output = Command::new(env!("CARGO_BIN_EXE_mountserve"))
        .arg("validate")
        .arg(&good)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("/docs ->"));

    let bad = write_config(r#"{ "mounts": [ { "path": "docs", "dir": "/nonexistent-mountserve" } ] }"#, "json");
    let output = Command::new(env!("CARGO_BIN_EXE_mountserve"))
        .arg("validate")
        .arg(&bad)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let _ = std::fs::remove_file(good);
    let _ = std::fs::remove_file(bad);
}
