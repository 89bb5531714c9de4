use std::time::Duration;

use gambit::prelude::*;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Settings {
    bind: String,
    public_url: Option<String>,
    clock_minutes: u64,
}

impl Settings {
    /// Reads settings through `var`, falling back to defaults for anything
    /// unset or unparsable.
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = var("PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);
        let host = var("GAMBIT_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let clock_minutes = var("GAMBIT_CLOCK_MINUTES")
            .and_then(|m| m.parse::<u64>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(10);
        Self {
            bind: format!("{host}:{port}"),
            public_url: var("GAMBIT_PUBLIC_URL").filter(|u| !u.is_empty()),
            clock_minutes,
        }
    }

    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn game_config(&self) -> GameConfig {
        GameConfig {
            clock: ClockConfig::with_initial_time(Duration::from_secs(
                self.clock_minutes * 60,
            )),
            ..GameConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), GambitError> {
    init_tracing();

    let settings = Settings::from_env();
    let mut builder = GambitServer::builder()
        .bind(&settings.bind)
        .game_config(settings.game_config());
    if let Some(url) = &settings.public_url {
        builder = builder.public_url(url.as_str());
    }
    let server = builder.build().await?;

    match server.local_addr() {
        Ok(addr) => tracing::info!(
            %addr,
            minutes = settings.clock_minutes,
            "chess server listening"
        ),
        Err(e) => tracing::warn!(error = %e, "could not read local address"),
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
