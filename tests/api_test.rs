//! Integration tests for the JSON API.
//!
//! Each test drives the full router in-process against its own data
//! directory.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{DEV, QA, TestApp};
use serde_json::{Value, json};

fn ids(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_missing_or_bad_token_is_401() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = app.get("/api/projects", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = TestApp::new();
    let (token, user_id) = app.register("ann", "DEV").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["role"], "DEV");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .put("/api/auth/profile", &token, json!({ "name": "Ann Lee" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ann Lee");

    let (status, body) = app
        .put(
            "/api/auth/password",
            &token,
            json!({ "currentPassword": "nope", "newPassword": "next" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");
}

#[tokio::test]
async fn test_malformed_body_is_400_with_message() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/projects")
        .header(header::AUTHORIZATION, format!("Bearer {}", QA))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let project = app.project(QA, "Shop").await;
    let (status, _) = app
        .post(
            "/api/test-cases",
            QA,
            json!({ "projectId": project, "title": "t", "status": "Exploding" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_caps() {
    let app = TestApp::new();
    let project = app.project(QA, "Caps").await;
    let url = format!("/api/projects/{}/members", project);

    for n in 1..=2 {
        let (status, body) = app
            .post(
                &url,
                QA,
                json!({
                    "name": "qa",
                    "username": format!("qa{}", n),
                    "password": "pw",
                    "role": "QA"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
    let (status, _) = app
        .post(
            &url,
            QA,
            json!({ "name": "qa", "username": "qa3", "password": "pw", "role": "QA" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for n in 1..=5 {
        let (status, _) = app
            .post(
                &url,
                QA,
                json!({
                    "name": "dev",
                    "username": format!("dev{}", n),
                    "password": "pw",
                    "role": "DEV"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = app
        .post(
            &url,
            QA,
            json!({ "name": "dev", "username": "dev6", "password": "pw", "role": "DEV" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("at most 5"));

    let (_, projects) = app.get("/api/projects", QA).await;
    let members = projects[0]["members"].as_array().unwrap();
    assert_eq!(members.len(), 8);
    assert!(members.iter().all(|m| m.get("password").is_none()));
}

#[tokio::test]
async fn test_outsiders_are_forbidden() {
    let app = TestApp::new();
    let project = app.project(QA, "Private").await;

    let (status, _) = app
        .get(&format!("/api/test-cases?projectId={}", project), DEV)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/test-cases", QA).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, projects) = app.get("/api/projects", DEV).await;
    assert!(projects.as_array().unwrap().is_empty());

    let (status, _) = app.delete(&format!("/api/projects/{}", project), DEV).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_test_case_lifecycle_and_runs() {
    let app = TestApp::new();
    let project = app.project(QA, "Runs").await;

    let (status, tc) = app
        .post("/api/test-cases", QA, json!({ "projectId": project, "title": "Login" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tc["friendlyId"], "TC-1");
    assert_eq!(tc["status"], "Draft");
    let tc_url = format!("/api/test-cases/{}", tc["id"].as_str().unwrap());

    let (status, _) = app.put(&tc_url, QA, json!({ "status": "Todo" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &tc_url,
            QA,
            json!({ "status": "Todo", "steps": "open page", "expectedResult": "it loads" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.put(&tc_url, QA, json!({ "status": "Pass" })).await;
    app.put(&tc_url, QA, json!({ "status": "Pass" })).await;

    let history_url = format!("/api/test-runs/test-case/{}", tc["id"].as_str().unwrap());
    let (_, history) = app.get(&history_url, QA).await;
    let runs = history.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["runId"], "RUN-001");
    assert_eq!(runs[0]["status"], "Pass");

    let (status, run) = app
        .post(
            "/api/test-runs",
            QA,
            json!({ "testCaseId": tc["id"], "status": "Fail" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(run["runId"], "RUN-002");

    let (_, latest) = app.get(&format!("{}/latest", history_url), QA).await;
    assert_eq!(latest["status"], "Fail");

    let (_, batch) = app
        .post(
            "/api/test-runs/latest-batch",
            QA,
            json!({ "testCaseIds": [tc["id"], "unknown"] }),
        )
        .await;
    assert_eq!(batch.as_object().unwrap().len(), 1);
    assert_eq!(batch[tc["id"].as_str().unwrap()]["runId"], "RUN-002");

    let (_, cases) = app
        .get(&format!("/api/test-cases?projectId={}", project), QA)
        .await;
    assert_eq!(cases[0]["status"], "Fail");
}

#[tokio::test]
async fn test_draft_rules_hold_on_every_path() {
    let app = TestApp::new();
    let project = app.project(QA, "Drafts").await;
    let (_, tc) = app
        .post("/api/test-cases", QA, json!({ "projectId": project, "title": "Bare" }))
        .await;
    let id = tc["id"].as_str().unwrap();

    let (status, body) = app
        .put(&format!("/api/test-cases/{}", id), QA, json!({ "status": "Todo" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("steps"));

    let (status, _) = app
        .post("/api/test-runs", QA, json!({ "testCaseId": id, "status": "Pass" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cases) = app
        .get(&format!("/api/test-cases?projectId={}", project), QA)
        .await;
    assert_eq!(cases[0]["status"], "Draft");
    let (_, history) = app
        .get(&format!("/api/test-runs/test-case/{}", id), QA)
        .await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bug_deletion_cascades_links() {
    let app = TestApp::new();
    let project = app.project(QA, "Links").await;

    let (_, tc) = app
        .post("/api/test-cases", QA, json!({ "projectId": project, "title": "T" }))
        .await;
    let (_, task) = app
        .post("/api/tasks", QA, json!({ "projectId": project, "title": "K" }))
        .await;
    let (status, bug) = app
        .post(
            "/api/bugs",
            QA,
            json!({
                "projectId": project,
                "title": "B",
                "linkedTestCaseIds": [tc["id"]],
                "linkedTaskIds": [task["id"], task["id"]],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ids(&bug["linkedTaskIds"]).len(), 1);

    let (_, cases) = app
        .get(&format!("/api/test-cases?projectId={}", project), QA)
        .await;
    assert_eq!(ids(&cases[0]["linkedBugIds"]), vec![bug["id"].as_str().unwrap()]);
    let (_, tasks) = app.get(&format!("/api/tasks?projectId={}", project), QA).await;
    assert_eq!(tasks[0]["links"][0]["targetType"], "Bug");

    let (status, _) = app
        .delete(&format!("/api/bugs/{}", bug["id"].as_str().unwrap()), QA)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cases) = app
        .get(&format!("/api/test-cases?projectId={}", project), QA)
        .await;
    assert!(ids(&cases[0]["linkedBugIds"]).is_empty());
    let (_, tasks) = app.get(&format!("/api/tasks?projectId={}", project), QA).await;
    assert!(tasks[0]["links"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_comment_fan_out() {
    let app = TestApp::new();
    let (a, _) = app.register("alice", "QA").await;
    let (b, _) = app.register("bob", "DEV").await;
    let (c, _) = app.register("carol", "DEV").await;
    let project = app.project(&a, "Team").await;
    app.add_member(&a, &project, "bob", "DEV").await;
    app.add_member(&a, &project, "carol", "DEV").await;

    let (_, bug) = app
        .post("/api/bugs", &a, json!({ "projectId": project, "title": "Crash" }))
        .await;
    // bug creation notified bob and carol
    app.delete("/api/notifications", &b).await;
    app.delete("/api/notifications", &c).await;

    let (status, top) = app
        .post(
            "/api/comments",
            &a,
            json!({ "bugId": bug["id"], "content": "repro on prod" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let count = |v: &Value| v.as_array().unwrap().len();
    assert_eq!(count(&app.get("/api/notifications", &a).await.1), 0);
    assert_eq!(count(&app.get("/api/notifications", &b).await.1), 1);
    assert_eq!(count(&app.get("/api/notifications", &c).await.1), 1);

    app.post(
        "/api/comments",
        &b,
        json!({ "bugId": bug["id"], "content": "looking", "parentId": top["id"] }),
    )
    .await;
    let (_, inbox) = app.get("/api/notifications", &a).await;
    assert_eq!(count(&inbox), 1);
    assert_eq!(inbox[0]["type"], "comment_added");
    assert_eq!(count(&app.get("/api/notifications", &c).await.1), 1);

    let (status, read) = app
        .put(
            &format!("/api/notifications/{}/read", inbox[0]["id"].as_str().unwrap()),
            &a,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read"], true);

    let (_, comments) = app
        .get(&format!("/api/comments/{}", bug["id"].as_str().unwrap()), &c)
        .await;
    assert_eq!(count(&comments), 2);
    assert_eq!(comments[0]["content"], "repro on prod");

    let (_, resolved) = app
        .put(
            &format!("/api/comments/{}/resolve", top["id"].as_str().unwrap()),
            &c,
            json!({}),
        )
        .await;
    assert_eq!(resolved["resolved"], true);
}

#[tokio::test]
async fn test_duplicate_move_and_bulk() {
    let app = TestApp::new();
    let first = app.project(QA, "First").await;
    let second = app.project(QA, "Second").await;

    let (status, created) = app
        .post(
            "/api/test-cases/bulk-create",
            QA,
            json!({ "projectId": first, "testCases": [{ "title": "a" }, { "title": "b" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let a_id = created[0]["id"].as_str().unwrap().to_string();
    let b_id = created[1]["id"].as_str().unwrap().to_string();

    let (status, copy) = app
        .post(&format!("/api/test-cases/{}/duplicate", a_id), QA, json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["title"], "a (Copy)");
    assert_eq!(copy["friendlyId"], "TC-3");

    let (status, moved) = app
        .put(
            &format!("/api/test-cases/{}/move", b_id),
            QA,
            json!({ "projectId": second }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["projectId"], second.as_str());

    let (_, deleted) = app
        .post(
            "/api/test-cases/bulk-delete",
            QA,
            json!({ "ids": [a_id, copy["id"]] }),
        )
        .await;
    assert_eq!(deleted["deleted"], 2);

    let (_, remaining) = app
        .get(&format!("/api/test-cases?projectId={}", first), QA)
        .await;
    assert!(remaining.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dev_permissions() {
    let app = TestApp::new();
    let project = app.project(QA, "Perms").await;
    app.add_member(QA, &project, "demo-dev", "DEV").await;

    let (status, _) = app
        .put(
            &format!("/api/projects/{}/permissions", project),
            DEV,
            json!({ "bugs": { "edit": false } }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &format!("/api/projects/{}/permissions", project),
            QA,
            json!({ "tasks": { "create": false }, "devCanOnlyEditBugStatus": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"]["tasks"]["create"], false);
    assert_eq!(body["permissions"]["tasks"]["view"], true);

    let (status, _) = app
        .post("/api/tasks", DEV, json!({ "projectId": project, "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, bug) = app
        .post(
            "/api/bugs",
            QA,
            json!({
                "projectId": project,
                "title": "B",
                "stepsToReproduce": "s",
                "status": "Opened"
            }),
        )
        .await;
    let bug_url = format!("/api/bugs/{}", bug["id"].as_str().unwrap());
    let (status, _) = app.put(&bug_url, DEV, json!({ "title": "renamed" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.put(&bug_url, DEV, json!({ "status": "Fixed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Fixed");
}

#[tokio::test]
async fn test_notes_are_shared() {
    let app = TestApp::new();
    let (status, note) = app
        .post("/api/notes", QA, json!({ "type": "kv", "label": "env", "content": "staging" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, notes) = app.get("/api/notes", DEV).await;
    assert_eq!(notes[0]["label"], "env");

    let note_url = format!("/api/notes/{}", note["id"].as_str().unwrap());
    let (_, pinned) = app.put(&note_url, DEV, json!({ "pinned": true })).await;
    assert_eq!(pinned["pinned"], true);

    let (status, _) = app.delete(&note_url, QA).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&note_url, QA).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn multipart(name: &str, mime: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "qadeck-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{n}\"\r\nContent-Type: {m}\r\n\r\n",
            b = boundary,
            n = name,
            m = mime
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

fn upload_request(content_type: String, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", QA))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_serve_and_delete() {
    let app = TestApp::new();
    let (content_type, body) = multipart("shot.png", "image/png", b"\x89PNG fake");
    let (status, attachment) = app.send(upload_request(content_type, body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", attachment);
    assert_eq!(attachment["name"], "shot.png");
    assert_eq!(attachment["mimeType"], "image/png");
    let url = attachment["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));

    let response = app
        .send(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.0, StatusCode::OK);

    let (status, _) = app
        .call(Method::DELETE, "/api/delete", Some(QA), Some(json!({ "url": url })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::DELETE, "/api/delete", Some(QA), Some(json!({ "url": url })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_type() {
    let app = TestApp::new();
    let (content_type, body) = multipart("run.sh", "application/x-sh", b"echo hi");
    let (status, body) = app.send(upload_request(content_type, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("not allowed"));
}

#[tokio::test]
async fn test_upload_over_limit() {
    let app = TestApp::with_upload_limit(16);
    let (content_type, body) = multipart("big.txt", "text/plain", &[b'x'; 64]);
    let (status, body) = app.send(upload_request(content_type, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("exceeds"));
}
