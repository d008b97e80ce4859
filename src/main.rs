use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod bot;
mod config;
mod error;
mod http;
mod pipeline;
mod player;
mod resolver;
mod ui;
mod updater;

use crate::bot::CadenciaBot;
use crate::config::Config;
use crate::resolver::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar configuración antes del logging: LOG_DIR decide el writer
    let config = Config::load()?;

    init_logging(&config)?;

    info!("🎵 Iniciando Cadencia v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    // Probe de dependencias para orquestadores (docker HEALTHCHECK, etc.)
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    let config = Arc::new(config);

    // Endpoint de liveness
    {
        let port = config.listen_port;
        tokio::spawn(async move {
            if let Err(e) = http::serve(port).await {
                error!("Error en el endpoint de liveness: {:?}", e);
            }
        });
    }

    // Auto-actualización diaria del resolvedor
    if config.auto_update {
        tokio::spawn(updater::run(config.clone()));
    }

    // Intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;

    let handler = CadenciaBot::new((*config).clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("cadencia=debug".parse()?)
        .add_directive("serenity=info".parse()?)
        .add_directive("songbird=info".parse()?);

    match &config.log_dir {
        Some(dir) => {
            let file = std::fs::File::create(dir.join("cadencia.log"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let resolver = YtDlpResolver::new(config);
    resolver.verify_dependencies().await?;
    println!("OK");
    Ok(())
}
