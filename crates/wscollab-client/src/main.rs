//! wsCollab demo client.
//!
//! - Config: `wscollab.yaml` (or argv[1]), strict parsing
//! - Password read from the env var named by `session.password_env`
//! - Logs every text/data message and lifecycle event, greets the channel,
//!   then runs until Ctrl-C

use std::env;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use wscollab_client::{config, CollabClient};
use wscollab_core::error::{Result, WsCollabError};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "wscollab failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| "wscollab.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let session = cfg
        .session
        .clone()
        .ok_or_else(|| WsCollabError::Config(format!("{path}: missing `session` section")))?;
    let password = env::var(&session.password_env).map_err(|_| {
        WsCollabError::Config(format!("env var {} is not set", session.password_env))
    })?;

    let client = CollabClient::new(cfg);

    client.on_text_message(|name, content, envelope| {
        tracing::info!(from = %envelope.from, %name, %content, "text");
        Ok(())
    });
    client.on_data_message(|label, data, envelope| {
        tracing::info!(from = %envelope.from, %label, bytes = data.len(), "data");
        Ok(())
    });
    client.on_connection_event(|event| {
        tracing::info!(?event, "connection event");
        Ok(())
    });

    client
        .connect(session.url.as_str(), &session.channel_id, &session.user, &password)
        .await?;
    client
        .send_text(&session.user, "hello from wscollab", ["all"])
        .await?;

    tracing::info!(channel = %client.channel_id(), "running; press Ctrl-C to leave");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| WsCollabError::Internal(format!("signal handler failed: {e}")))?;

    client.disconnect().await;
    Ok(())
}
