use bridge_core::BridgeConfig;
use mock_engine::{demo_bridge, MockEngine, Outcome};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const DEMO_URLS: &[&str] = &[
    "http://command.com/ping",
    "http://command.com/info",
    "http://command.com/movies?limit=2",
    "http://command.com/slow",
    "http://command.com/missing",
    "https://example.com/",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_engine=info,bridge_core=info")),
        )
        .init();

    let config = BridgeConfig {
        info_route: true,
        ..BridgeConfig::from_env()?
    };
    let engine = MockEngine::new(demo_bridge(config)?);

    for url in DEMO_URLS {
        match engine.get(url) {
            Ok(load) => match load.outcome {
                Outcome::Completed(response) => tracing::info!(
                    url,
                    mode = ?load.mode,
                    status = response.status,
                    body = %response.body,
                    "completed"
                ),
                Outcome::Cancelled => tracing::info!(url, mode = ?load.mode, "cancelled"),
            },
            Err(e) => tracing::info!(url, error = %e, "not handled by the bridge"),
        }
    }

    let post = engine.post(
        "http://command.com/movies/add",
        r#"{"title":"Solaris","year":1972}"#,
    )?;
    tracing::info!(outcome = ?post.outcome, "posted a movie");

    let name = engine.bridge().binding().name().to_string();
    let reply = engine.call("/movies", Some(json!({"limit": 10})), None)?;
    tracing::info!(binding = %name, %reply, "call-in");
    tracing::info!(terminal_calls = engine.terminal_calls(), "done");
    Ok(())
}
