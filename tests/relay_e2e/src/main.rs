fn main() {
    println!("Run `cargo test -p relay-e2e` to execute the end-to-end relay tests.");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use mission_agent::{Supervisor, UploadReceiver, WsDialer};
    use mission_gateway::{AppState, FILE_NAME_HEADER, FILE_SHA256_HEADER, GatewaySettings};
    use mission_protocol::constants::AGENT_WS_PATH;
    use mission_transfer::checksum_bytes;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    const SECRET: &str = "e2e-secret";
    const WAIT: Duration = Duration::from_secs(10);

    struct Gateway {
        addr: SocketAddr,
        state: AppState,
        client: reqwest::Client,
    }

    impl Gateway {
        async fn start(secret: &str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let state = AppState::new(GatewaySettings {
                agent_secret: secret.into(),
                ..GatewaySettings::default()
            });
            tokio::spawn(mission_gateway::serve(listener, state.clone()));
            Self {
                addr,
                state,
                client: reqwest::Client::new(),
            }
        }

        fn ws_url(&self) -> String {
            format!("ws://{}{AGENT_WS_PATH}", self.addr)
        }

        async fn upload(&self, filename: &str, sha256: Option<&str>, body: Vec<u8>) -> reqwest::Response {
            let mut request = self
                .client
                .post(format!("http://{}/api/v1/upload", self.addr))
                .header(FILE_NAME_HEADER, filename)
                .body(body);
            if let Some(sha256) = sha256 {
                request = request.header(FILE_SHA256_HEADER, sha256);
            }
            request.send().await.unwrap()
        }

        async fn wait_online(&self) {
            tokio::time::timeout(WAIT, async {
                while !self.state.registry.is_online().await {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await
            .expect("agent never came online");
        }

        async fn active_id(&self) -> Option<u64> {
            self.state.registry.active().await.map(|c| c.id())
        }
    }

    struct Agent {
        dir: TempDir,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    impl Agent {
        fn start(url: String, secret: &str, backoff: Duration) -> Self {
            let dir = TempDir::new().unwrap();
            let scratch = dir.path().join(".partial");
            std::fs::create_dir_all(&scratch).unwrap();

            let supervisor = Supervisor::new(
                WsDialer::new(url, secret),
                UploadReceiver::new(dir.path(), scratch),
            )
            .with_backoff(backoff);
            let cancel = CancellationToken::new();
            let task = tokio::spawn(supervisor.run(cancel.clone()));
            Self { dir, cancel, task }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        async fn stop(self) {
            self.cancel.cancel();
            tokio::time::timeout(WAIT, self.task)
                .await
                .expect("supervisor should stop")
                .unwrap();
        }
    }

    async fn wait_for_file(path: &Path) -> Vec<u8> {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Ok(data) = tokio::fs::read(path).await {
                    return data;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} never appeared", path.display()))
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn upload_reaches_mission_dir() {
        let gw = Gateway::start(SECRET).await;
        let agent = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        gw.wait_online().await;

        let resp = gw
            .upload("mission.miz", Some(&checksum_bytes(b"abc")), b"abc".to_vec())
            .await;
        assert_eq!(resp.status(), 200);

        assert_eq!(wait_for_file(&agent.path("mission.miz")).await, b"abc");
        agent.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn multi_chunk_upload_is_reassembled() {
        let gw = Gateway::start(SECRET).await;
        let agent = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        gw.wait_online().await;

        let data: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let digest = checksum_bytes(&data).to_ascii_uppercase();
        let resp = gw.upload("big.miz", Some(&digest), data.clone()).await;
        assert_eq!(resp.status(), 200);

        assert_eq!(wait_for_file(&agent.path("big.miz")).await, data);
        agent.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn digest_mismatch_is_not_committed() {
        let gw = Gateway::start(SECRET).await;
        let agent = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        gw.wait_online().await;

        // The caller still sees 200: only frame delivery is reported.
        let resp = gw.upload("x.bin", Some("deadbeef"), b"hello".to_vec()).await;
        assert_eq!(resp.status(), 200);

        // Frames arrive in order, so once the next upload is on disk the
        // first one has been fully handled.
        gw.upload("marker.bin", None, b"done".to_vec()).await;
        wait_for_file(&agent.path("marker.bin")).await;

        assert!(!agent.path("x.bin").exists());
        assert!(entries(&agent.path(".partial")).is_empty());
        agent.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn traversal_name_stays_inside_mission_dir() {
        let gw = Gateway::start("").await;
        let agent = Agent::start(gw.ws_url(), "", Duration::from_millis(100));
        gw.wait_online().await;

        let resp = gw.upload("../../escape.miz", None, b"x".to_vec()).await;
        assert_eq!(resp.status(), 200);

        assert_eq!(wait_for_file(&agent.path("escape.miz")).await, b"x");
        assert!(!agent.dir.path().parent().unwrap().join("escape.miz").exists());
        agent.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wrong_secret_never_comes_online() {
        let gw = Gateway::start(SECRET).await;
        let agent = Agent::start(gw.ws_url(), "wrong", Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!gw.state.registry.is_online().await);

        let resp = gw.upload("mission.miz", None, b"abc".to_vec()).await;
        assert_eq!(resp.status(), 503);
        agent.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn upload_without_agent_is_unavailable() {
        let gw = Gateway::start(SECRET).await;
        let resp = gw.upload("mission.miz", None, b"abc".to_vec()).await;
        assert_eq!(resp.status(), 503);
        assert_eq!(resp.text().await.unwrap(), "agent offline");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn newer_agent_replaces_older() {
        let gw = Gateway::start(SECRET).await;

        // The first agent backs off for longer than the test runs, so it
        // stays away once replaced.
        let first = Agent::start(gw.ws_url(), SECRET, Duration::from_secs(3600));
        gw.wait_online().await;
        let first_id = gw.active_id().await;

        let second = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        tokio::time::timeout(WAIT, async {
            loop {
                let id = gw.active_id().await;
                if id.is_some() && id != first_id {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("second agent never took over");

        let resp = gw.upload("mission.miz", None, b"abc".to_vec()).await;
        assert_eq!(resp.status(), 200);

        assert_eq!(wait_for_file(&second.path("mission.miz")).await, b"abc");
        assert!(!first.path("mission.miz").exists());

        first.stop().await;
        second.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn agent_shutdown_takes_gateway_offline() {
        let gw = Gateway::start(SECRET).await;
        let agent = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        gw.wait_online().await;

        agent.stop().await;
        tokio::time::timeout(WAIT, async {
            while gw.state.registry.is_online().await {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("gateway should notice the agent leaving");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_uploads_all_arrive_intact() {
        let gw = Arc::new(Gateway::start(SECRET).await);
        let agent = Agent::start(gw.ws_url(), SECRET, Duration::from_millis(100));
        gw.wait_online().await;

        let uploads: Vec<_> = (0..4u8)
            .map(|i| {
                let gw = Arc::clone(&gw);
                tokio::spawn(async move {
                    let data = vec![i; 100_000];
                    let digest = checksum_bytes(&data);
                    gw.upload(&format!("m{i}.miz"), Some(&digest), data).await.status()
                })
            })
            .collect();
        for upload in uploads {
            assert_eq!(upload.await.unwrap(), 200);
        }

        for i in 0..4u8 {
            let data = wait_for_file(&agent.path(&format!("m{i}.miz"))).await;
            assert_eq!(data, vec![i; 100_000]);
        }
        agent.stop().await;
    }
}
