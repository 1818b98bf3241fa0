use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::path::PathBuf;

use interview_relay::config::RelayConfig;
use interview_relay::server::config_routes;
use interview_relay::util::{cors_config_from_env, init_tracing, AppState};

#[derive(Parser, Debug)]
#[command(name = "interview-relay", version, about = "Interview chat relay for Gemini")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8088")]
    bind: String,

    /// Optional YAML/JSON relay config
    #[arg(long, env = "INTERVIEW_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = RelayConfig::load(args.config.as_deref())?;
    let state = AppState::from_config(config);
    tracing::info!(
        model = state.model.model_id(),
        api_key_configured = state.model.is_configured(),
        "Starting interview-relay on {}",
        args.bind
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(cors_config_from_env())
            .app_data(data.clone())
            .configure(config_routes)
    })
    .bind(&args.bind)?
    .run()
    .await?;

    Ok(())
}
