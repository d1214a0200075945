// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use console_core::application::poller::Poller;
use console_core::application::vfs_tree::{DirectoryLister, VfsTree};
use console_core::domain::api::{ArtifactCollectorArgs, FlowState, HuntState};
use console_core::domain::api_error::ApiError;
use console_core::domain::console_config::ApiConfig;
use console_core::domain::vfs_path::VfsPath;
use console_core::infrastructure::api_client::ApiClient;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn client_for(server: &mockito::ServerGuard) -> ApiClient {
    let config = ApiConfig::new(&server.url())
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    ApiClient::new(config).unwrap()
}

#[tokio::test]
async fn test_get_rotates_csrf_token_for_next_post() {
    let mut server = mockito::Server::new_async().await;
    let get = server
        .mock("GET", "/api/v1/GetClient/C.1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("X-CSRF-Token", "t2")
        .with_body(json!({"client_id": "C.1", "os_info": {"hostname": "wks-01"}}).to_string())
        .create_async()
        .await;
    let post = server
        .mock("POST", "/api/v1/CancelFlow")
        .match_header("x-csrf-token", "t2")
        .match_body(Matcher::Json(json!({"client_id": "C.1", "flow_id": "F.1"})))
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();

    let info = client.get_client("C.1", &cancel).await.unwrap();
    assert_eq!(info.os_info.hostname, "wks-01");
    assert_eq!(client.csrf_token().as_deref(), Some("t2"));

    client.cancel_flow("C.1", "F.1", &cancel).await.unwrap();

    get.assert_async().await;
    post.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_reports_subject_and_reason() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/GetClient/C.2")
        .with_status(403)
        .with_header("X-GRR-Unauthorized-Access-Subject", "C.2")
        .with_header("X-GRR-Unauthorized-Access-Reason", "No approval")
        .with_body("forbidden")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .get_client("C.2", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Unauthorized {
            subject: "C.2".to_string(),
            reason: "No approval".to_string(),
        }
    );
}

#[tokio::test]
async fn test_server_error_uses_json_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/GetFlowDetails")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("client_id".into(), "C.1".into()),
            Matcher::UrlEncoded("flow_id".into(), "F.404".into()),
        ]))
        .with_status(500)
        .with_body(json!({"code": 2, "message": "flow not found"}).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .get_flow_details("C.1", "F.404", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Server {
            status: 500,
            message: "flow not found".to_string(),
        }
    );
    assert_eq!(err.to_string(), "Server error: 500 flow not found");
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let config = ApiConfig::new("http://127.0.0.1:1")
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    let client = ApiClient::new(config).unwrap();

    let err = client
        .get_client("C.1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn test_cancelled_request_never_reaches_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/CollectArtifact")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let args = ArtifactCollectorArgs::for_client("C.1", vec!["Generic.Client.Info".to_string()]);
    let err = client.collect_artifact(&args, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_refresh_and_stat_directory() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/v1/VFSRefreshDirectory")
        .match_body(Matcher::Json(json!({
            "client_id": "C.1",
            "vfs_components": ["file", "C:"],
            "depth": 2
        })))
        .with_status(200)
        .with_body(json!({"flow_id": "F.REFRESH"}).to_string())
        .create_async()
        .await;
    let stat = server
        .mock("GET", "/api/v1/VFSStatDirectory")
        // Repeated keys must arrive in component order.
        .match_query(Matcher::Regex(
            r"^client_id=C\.1&vfs_components=file&vfs_components=C%3A&flow_id=F\.REFRESH$".into(),
        ))
        .with_status(200)
        .with_body(
            json!({
                "Response": "[{\"Name\":\"Windows\",\"Mode\":\"drwxrwxrwx\",\"Size\":\"0\"}]",
                "Columns": ["Name", "Mode", "Size"],
                "flow_id": "F.REFRESH",
                "total_rows": 1
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();
    let path = VfsPath::from_components(["file", "C:"]);

    let flow_id = client.refresh_directory("C.1", &path, 2, &cancel).await.unwrap();
    assert_eq!(flow_id, "F.REFRESH");

    let listing = client
        .stat_directory("C.1", &path, &flow_id, &cancel)
        .await
        .unwrap();
    let entries = listing.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Windows");
    assert!(entries[0].is_directory());

    refresh.assert_async().await;
    stat.assert_async().await;
}

#[tokio::test]
async fn test_vfs_tree_over_api_client() {
    let mut server = mockito::Server::new_async().await;
    let root = server
        .mock("GET", "/api/v1/VFSListDirectory/C.1")
        .match_query(Matcher::UrlEncoded("vfs_path".into(), "".into()))
        .with_status(200)
        .with_body(
            json!({"Response": "[{\"Name\":\"file\",\"Mode\":\"d---------\"}]"}).to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let file = server
        .mock("GET", "/api/v1/VFSListDirectory/C.1")
        .match_query(Matcher::UrlEncoded("vfs_path".into(), "/file".into()))
        .with_status(200)
        .with_body(
            json!({"Response": "[{\"Name\":\"etc\",\"Mode\":\"drwxr-xr-x\"},{\"Name\":\"hosts\",\"Mode\":\"-rw-r--r--\"}]"})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let lister: Arc<dyn DirectoryLister> = Arc::new(client_for(&server));
    let tree = VfsTree::new(lister, "C.1");
    let cancel = CancellationToken::new();

    let levels = tree
        .expand_to(&VfsPath::parse("/file/hosts"), &cancel)
        .await
        .unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(
        levels[1].subdirectories().collect::<Vec<_>>(),
        vec![VfsPath::parse("/file/etc")]
    );

    // Served from the cache the second time.
    tree.expand(&VfsPath::parse("/file"), &cancel).await.unwrap();

    root.assert_async().await;
    file.assert_async().await;
}

#[tokio::test]
async fn test_download_requires_preflight() {
    let mut server = mockito::Server::new_async().await;
    let query = Matcher::AllOf(vec![
        Matcher::UrlEncoded("client_id".into(), "C.1".into()),
        Matcher::UrlEncoded("vfs_path".into(), "/file/etc/hosts".into()),
    ]);
    let head = server
        .mock("HEAD", "/api/v1/DownloadVFSFile")
        .match_query(query.clone())
        .with_status(200)
        .create_async()
        .await;
    let get = server
        .mock("GET", "/api/v1/DownloadVFSFile")
        .match_query(query)
        .with_status(200)
        .with_body("127.0.0.1 localhost\n")
        .create_async()
        .await;

    let client = client_for(&server);
    let bytes = client
        .download_vfs_file("C.1", &VfsPath::parse("/file/etc/hosts"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"127.0.0.1 localhost\n");
    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_download_preflight_failure_skips_transfer() {
    let mut server = mockito::Server::new_async().await;
    let _head = server
        .mock("HEAD", "/api/v1/DownloadVFSFile")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let get = server
        .mock("GET", "/api/v1/DownloadVFSFile")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .download_vfs_file("C.1", &VfsPath::parse("/file/missing"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::PreflightFailed { status: 404 });
    get.assert_async().await;
}

#[tokio::test]
async fn test_download_forbidden_preflight_reports_subject_and_reason() {
    let mut server = mockito::Server::new_async().await;
    let head = server
        .mock("HEAD", "/api/v1/DownloadVFSFile")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("X-GRR-Unauthorized-Access-Subject", "C.1")
        .with_header("X-GRR-Unauthorized-Access-Reason", "Approval required")
        .create_async()
        .await;
    let get = server
        .mock("GET", "/api/v1/DownloadVFSFile")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .download_vfs_file("C.1", &VfsPath::parse("/file/etc/shadow"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Unauthorized {
            subject: "C.1".to_string(),
            reason: "Approval required".to_string(),
        }
    );
    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_list_hunts_decodes_states() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/ListHunts")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("count".into(), "10".into()),
            Matcher::UrlEncoded("offset".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"items": [
                {"hunt_id": "H.1", "state": "RUNNING", "stats": {"total_clients_scheduled": "5"}},
                {"hunt_id": "H.2", "state": "SOMETHING_NEW"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let hunts = client.list_hunts(10, 0, &CancellationToken::new()).await.unwrap();

    assert_eq!(hunts.items.len(), 2);
    assert_eq!(hunts.items[0].state, HuntState::Running);
    assert_eq!(hunts.items[0].stats.total_clients_scheduled, 5);
    assert_eq!(hunts.items[1].state, HuntState::Unknown);
}

#[tokio::test]
async fn test_poller_follows_flow_until_finished() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/GetFlowDetails")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"context": {"session_id": "F.1", "state": "FINISHED", "total_collected_rows": 12}})
                .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();
    let mut seen = 0;

    let details = Poller::default()
        .run(
            &cancel,
            || client.get_flow_details("C.1", "F.1", &cancel),
            |_| seen += 1,
            |details| details.context.state.is_terminal(),
        )
        .await
        .unwrap();

    assert_eq!(details.context.state, FlowState::Finished);
    assert_eq!(details.context.total_collected_rows, 12);
    assert_eq!(seen, 1);
}
