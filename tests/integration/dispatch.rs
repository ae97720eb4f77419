//! Full dispatch cycles against an in-memory sink.

use std::sync::Arc;

use parking_lot::Mutex;
use pivot_core::core::Environment;
use pivot_core::events::{Event, EventKind};
use pivot_core::{Application, Error};
use serde_json::json;

use crate::helpers::*;

fn app() -> Application {
    let mut app = Application::new();
    app.get("/users/:id", |req, res| {
        res.json(&json!({ "id": req.param("id") }));
        Ok(())
    })
    .unwrap();
    app.get("/boom", |_req, _res| Err(Error::internal("database unavailable")))
        .unwrap();
    app
}

#[test]
fn test_handler_response_reaches_sink() {
    let out = dispatch(&app(), "GET", "/users/42");

    assert_eq!(out.status(), 200);
    assert_eq!(
        out.header("content-type").as_deref(),
        Some("application/json; charset=utf-8")
    );
    assert_eq!(out.json(), json!({ "id": 42 }));
    assert!(out.response.is_sent());
}

#[test]
fn test_not_found_lists_routes_in_debug() {
    let mut app = app();
    app.configure(|c| c.app.debug = true);

    let out = dispatch(&app, "GET", "/missing");
    assert_eq!(out.status(), 404);
    let body = out.json();
    assert_eq!(body["error"], true);
    assert_eq!(body["available_routes"], json!(["GET /users/:id", "GET /boom"]));
}

#[test]
fn test_production_error_hides_details() {
    let mut app = app();
    app.configure(|c| c.app.debug = false);

    let out = dispatch(&app, "GET", "/boom");
    assert_eq!(out.status(), 500);
    let body = out.json();
    assert_eq!(body["message"], "Internal Server Error");
    assert!(body["error_id"].as_str().unwrap().starts_with("err_"));
    assert!(!out.output.body_string().contains("database"));
}

#[test]
fn test_middleware_wraps_handler_in_order() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let mut app = app();

    for name in ["outer", "inner"] {
        let trail = Arc::clone(&trail);
        app.use_fn(name, move |req, res, next| {
            trail.lock().push(format!("{}:before", name));
            res.header(format!("x-{}", name), "1");
            let result = next.run(req, res);
            trail.lock().push(format!("{}:after", name));
            result
        });
    }

    let out = dispatch(&app, "GET", "/users/1");
    assert_eq!(
        *trail.lock(),
        vec!["outer:before", "inner:before", "inner:after", "outer:after"]
    );
    assert_eq!(out.header("x-outer").as_deref(), Some("1"));
    assert_eq!(out.header("x-inner").as_deref(), Some("1"));
}

#[test]
fn test_headers_after_emission_are_skipped() {
    let mut app = app();
    app.use_fn("late", |req, res, next| {
        next.run(req, res)?;
        res.header("x-late", "1");
        Ok(())
    });

    let out = dispatch(&app, "GET", "/users/1");
    assert_eq!(out.status(), 200);
    assert!(out.header("x-late").is_none());
}

#[test]
fn test_short_circuit_skips_handler() {
    let mut app = app();
    app.use_fn("auth", |req, res, next| {
        if req.header("authorization").is_none() {
            res.error(401, "");
            return Ok(());
        }
        next.run(req, res)
    });

    let out = dispatch(&app, "GET", "/users/1");
    assert_eq!(out.status(), 401);
    assert_eq!(out.json(), json!({ "error": "Unauthorized", "code": 401 }));

    let env = Environment::builder()
        .uri("/users/1")
        .header("authorization", "Bearer t")
        .build();
    assert_eq!(dispatch_env(&app, env).json(), json!({ "id": 1 }));
}

#[test]
fn test_lifecycle_events() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = app();
    for kind in [
        EventKind::ApplicationStarted,
        EventKind::RequestReceived,
        EventKind::ResponseSent,
    ] {
        let seen = Arc::clone(&seen);
        app.on(kind, move |event| {
            let entry = match event {
                Event::ResponseSent { response, .. } => {
                    format!("{:?}:{}", event.kind(), response.status_code())
                }
                _ => format!("{:?}", event.kind()),
            };
            seen.lock().push(entry);
        });
    }

    dispatch(&app, "GET", "/boom");
    dispatch(&app, "GET", "/users/2");

    assert_eq!(
        *seen.lock(),
        vec![
            "ApplicationStarted",
            "RequestReceived",
            "ResponseSent:500",
            "RequestReceived",
            "ResponseSent:200",
        ]
    );
}

#[test]
fn test_form_body_becomes_inputs() {
    let mut app = Application::new();
    app.post("/notes", |req, res| {
        res.status(201).json(req.inputs());
        Ok(())
    })
    .unwrap();

    let env = Environment::builder()
        .method("POST")
        .uri("/notes")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("title=hello+world&tag=a")
        .build();
    let out = dispatch_env(&app, env);
    assert_eq!(out.status(), 201);
    assert_eq!(out.json(), json!({ "title": "hello world", "tag": "a" }));
}
