//! End-to-end hierarchy reconstruction over real task directories.
//!
//! Each test writes a storage root under a tempdir, runs a full rebuild
//! through the service, and checks the resolved forest.

use std::path::{Path, PathBuf};

use task_atlas::skeleton::CancellationFlag;
use task_atlas::{AtlasConfig, CoreError, StateService};

const TASK_A: &str = "00000000-0000-4000-8000-00000000000a";
const TASK_B: &str = "00000000-0000-4000-8000-00000000000b";
const TASK_C: &str = "00000000-0000-4000-8000-00000000000c";

const INSTRUCTION: &str =
    "Implement the login endpoint using the existing auth module exactly as described in the spec.";

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    cache_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir_all(root.join("tasks")).unwrap();
        let cache_path = dir.path().join("skeletons.json");
        Self {
            _dir: dir,
            root,
            cache_path,
        }
    }

    fn config(&self) -> AtlasConfig {
        AtlasConfig {
            storage_roots: vec![self.root.clone()],
            cache_path: Some(self.cache_path.clone()),
            ..AtlasConfig::default()
        }
    }

    fn service(&self) -> StateService {
        StateService::new(self.config()).unwrap()
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join("tasks").join(task_id)
    }

    fn write_task(
        &self,
        task_id: &str,
        workspace: &str,
        instruction: &str,
        created_at: &str,
        last_activity: &str,
    ) {
        let dir = self.task_dir(task_id);
        std::fs::create_dir_all(&dir).unwrap();
        let metadata = serde_json::json!({
            "taskId": task_id,
            "workspace": workspace,
            "instruction": instruction,
            "createdAt": created_at,
            "lastActivity": last_activity,
        });
        std::fs::write(dir.join("task_metadata.json"), metadata.to_string()).unwrap();
    }

    fn write_ui_log_with_new_task(&self, task_id: &str, mode: &str, child_instruction: &str) {
        let payload = serde_json::json!({
            "tool": "newTask",
            "mode": mode,
            "content": child_instruction,
        })
        .to_string();
        let log = serde_json::json!([
            {"ts": 1000, "type": "say", "say": "text", "text": "starting on it"},
            {"ts": 2000, "type": "ask", "ask": "tool", "text": payload},
        ]);
        write_ui_log(&self.task_dir(task_id), &log.to_string());
    }
}

fn write_ui_log(dir: &Path, content: &str) {
    std::fs::write(dir.join("ui_messages.json"), content).unwrap();
}

async fn rebuild(service: &StateService) -> task_atlas::RebuildSummary {
    service
        .rebuild_skeleton_cache(false, &CancellationFlag::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn minimal_two_level_chain() {
    // S1
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", INSTRUCTION);
    fx.write_task(TASK_B, "w", INSTRUCTION, "2025-03-01T10:30:00Z", "2025-03-01T11:00:00Z");

    let service = fx.service();
    let summary = rebuild(&service).await;
    assert_eq!(summary.built, 2);
    assert_eq!(summary.resolved, 1);

    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id.as_deref(), Some(TASK_A));
    assert_eq!(
        service.children_of(TASK_A).unwrap(),
        vec![TASK_B.to_string()]
    );
    assert_eq!(
        service.ancestors_of(TASK_B, 10).unwrap(),
        vec![TASK_A.to_string()]
    );
}

#[tokio::test]
async fn case_and_whitespace_tolerance() {
    // S2
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", INSTRUCTION);
    fx.write_task(
        TASK_B,
        "w",
        "  Implement  the Login Endpoint using the existing auth module exactly as described in the spec.\n",
        "2025-03-01T10:30:00Z",
        "2025-03-01T11:00:00Z",
    );

    let service = fx.service();
    rebuild(&service).await;
    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id.as_deref(), Some(TASK_A));
}

#[tokio::test]
async fn workspace_isolation() {
    // S3
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w1", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", INSTRUCTION);
    fx.write_task(TASK_B, "w2", INSTRUCTION, "2025-03-01T10:30:00Z", "2025-03-01T11:00:00Z");

    let service = fx.service();
    rebuild(&service).await;
    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id, None);
    assert!(!b.is_root_task);
}

#[tokio::test]
async fn temporal_guard() {
    // S4: parent created after the child's activity window closed.
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T11:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", INSTRUCTION);
    fx.write_task(TASK_B, "w", INSTRUCTION, "2025-03-01T09:00:00Z", "2025-03-01T09:30:00Z");

    let service = fx.service();
    rebuild(&service).await;
    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id, None);
}

#[tokio::test]
async fn root_detection() {
    // S5
    let fx = Fixture::new();
    fx.write_task(
        TASK_C,
        "w",
        "hello, i would like a fresh take on the settings page design",
        "2025-03-01T10:00:00Z",
        "2025-03-01T11:00:00Z",
    );

    let service = fx.service();
    let summary = rebuild(&service).await;
    assert_eq!(summary.roots_detected, 1);

    let c = service.get_skeleton(TASK_C).unwrap();
    assert!(c.is_root_task);
    assert_eq!(c.reconstructed_parent_id, None);
    assert_eq!(service.list_roots(Some("w")), vec![TASK_C.to_string()]);
}

#[tokio::test]
async fn api_request_form_is_recognized() {
    // R2: the declaration only exists inside an api_req_started request string.
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    let request = format!("[new_task in 💻 Code mode: '{}']", INSTRUCTION);
    let payload = serde_json::json!({"request": request}).to_string();
    let log = serde_json::json!([
        {"ts": 1000, "type": "say", "say": "api_req_started", "text": payload},
    ]);
    write_ui_log(&fx.task_dir(TASK_A), &log.to_string());
    fx.write_task(TASK_B, "w", INSTRUCTION, "2025-03-01T10:30:00Z", "2025-03-01T11:00:00Z");

    let service = fx.service();
    rebuild(&service).await;
    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id.as_deref(), Some(TASK_A));
}

#[tokio::test]
async fn mutual_declarations_stay_acyclic() {
    // S7
    let instr_a = "Refactor the storage layer to use the new detector API everywhere";
    let instr_b = "Migrate the cache format and keep the old reader for one release";

    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", instr_a, "2025-03-01T10:00:00Z", "2025-03-01T10:20:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", instr_b);
    fx.write_task(TASK_B, "w", instr_b, "2025-03-01T11:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_B, "code", instr_a);

    let service = fx.service();
    rebuild(&service).await;

    let a = service.get_skeleton(TASK_A).unwrap();
    let b = service.get_skeleton(TASK_B).unwrap();
    assert_eq!(b.reconstructed_parent_id.as_deref(), Some(TASK_A));
    assert_eq!(a.reconstructed_parent_id, None);
    // Navigator accepts the forest (would panic on a cycle).
    assert_eq!(service.ancestors_of(TASK_B, 10).unwrap(), vec![TASK_A.to_string()]);
}

#[tokio::test]
async fn empty_ui_log_is_clean() {
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    write_ui_log(&fx.task_dir(TASK_A), "[]");

    let service = fx.service();
    let summary = rebuild(&service).await;
    assert_eq!(summary.built, 1);
    assert_eq!(summary.error_count, 0);
    let a = service.get_skeleton(TASK_A).unwrap();
    assert!(a.child_task_instruction_prefixes.is_empty());
}

#[tokio::test]
async fn bom_and_line_delimited_logs_are_accepted() {
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    let payload = serde_json::json!({
        "tool": "newTask",
        "mode": "code",
        "content": INSTRUCTION,
    })
    .to_string();
    let line = serde_json::json!({"ts": 1, "type": "ask", "ask": "tool", "text": payload}).to_string();
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    std::fs::write(fx.task_dir(TASK_A).join("ui_messages.json"), bytes).unwrap();

    let service = fx.service();
    rebuild(&service).await;
    let a = service.get_skeleton(TASK_A).unwrap();
    assert_eq!(a.child_task_instruction_prefixes.len(), 1);
}

#[tokio::test]
async fn unknown_task_is_a_typed_error() {
    let fx = Fixture::new();
    let service = fx.service();
    rebuild(&service).await;
    match service.get_skeleton(TASK_A) {
        Err(CoreError::TaskNotFound(id)) => assert_eq!(id, TASK_A),
        other => panic!("expected TaskNotFound, got {:?}", other.map(|s| s.task_id)),
    }
}

#[tokio::test]
async fn pre_cancelled_rebuild_aborts() {
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");

    let service = fx.service();
    let cancel = CancellationFlag::new();
    cancel.cancel();
    match service.rebuild_skeleton_cache(false, &cancel).await {
        Err(CoreError::Cancelled) => {}
        other => panic!("expected Cancelled, got {:?}", other.map(|s| s.built)),
    }
    // The cache file was never committed.
    assert!(!fx.cache_path.exists());
}

#[tokio::test]
async fn chunks_reflect_log_content() {
    let fx = Fixture::new();
    fx.write_task(TASK_A, "w", "Build the auth epic end to end", "2025-03-01T10:00:00Z", "2025-03-01T12:00:00Z");
    fx.write_ui_log_with_new_task(TASK_A, "code", INSTRUCTION);

    let service = fx.service();
    rebuild(&service).await;
    let chunks = service.chunks_of(TASK_A).unwrap();
    assert!(!chunks.is_empty());
    assert_eq!(chunks[0].task_id, TASK_A);
    assert!(chunks.iter().any(|c| c.content.contains("starting on it")));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.workspace, "w");
    }
}
