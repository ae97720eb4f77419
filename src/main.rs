use std::sync::Arc;

use serde_json::json;
use tracing::info;

use pivot_core::core::EventFields;
use pivot_core::{logging, Application, Config, Server};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging);

    let mut app = Application::with_config(config);
    register_routes(&mut app)?;

    // Under a CGI host the request comes from the environment and stdin.
    if std::env::var_os("GATEWAY_INTERFACE").is_some() {
        app.run()?;
        return Ok(());
    }

    app.config().log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(Arc::new(app)))
}

fn register_routes(app: &mut Application) -> pivot_core::Result<()> {
    app.get("/", |_req, res| {
        res.json(&json!({
            "name": "pivot",
            "version": pivot_core::VERSION,
        }));
        Ok(())
    })?;

    app.get("/users/:id<\\d+>", |req, res| {
        res.success(&json!({ "id": req.param("id") }), "User found");
        Ok(())
    })?;

    app.post("/echo", |req, res| {
        res.status(201).json(req.inputs());
        Ok(())
    })?;

    app.get("/events", |_req, res| {
        for n in 1..=3u64 {
            let id = n.to_string();
            res.send_event(json!({ "tick": n }), EventFields::new().event("tick").id(&id))?;
        }
        res.end_stream()?;
        Ok(())
    })?;

    Ok(())
}

async fn serve(app: Arc<Application>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Arc::new(Server::new(Arc::clone(&app), app.config().server.clone()));

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            server.trigger_shutdown();
            server.wait_for_drain(server.drain_timeout()).await;
        }
    }

    Ok(())
}
