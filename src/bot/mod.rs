//! Capa de comandos del bot.
//!
//! [`CadenciaBot`] implementa el [`EventHandler`] de Serenity: registra los
//! comandos slash al arrancar, despacha interacciones hacia los handlers y
//! limpia el estado de un guild cuando el bot es expulsado del canal de voz.
//! Toda la lógica de reproducción vive en [`crate::player`]; aquí solo se
//! traducen comandos en llamadas al motor y respuestas al usuario.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    config::Config,
    player::{GuildPlayer, PlayerRegistry},
    resolver::{MediaResolver, YtDlpResolver},
};

pub struct CadenciaBot {
    pub config: Arc<Config>,
    pub resolver: Arc<dyn MediaResolver>,
    pub registry: Arc<PlayerRegistry>,
}

impl CadenciaBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let resolver: Arc<dyn MediaResolver> = Arc::new(YtDlpResolver::new(&config));
        let registry = Arc::new(PlayerRegistry::new(resolver.clone(), config.clone()));

        Self {
            config,
            resolver,
            registry,
        }
    }

    /// Motor del guild, creado perezosamente con el primer comando.
    pub async fn player_for(&self, ctx: &Context, guild_id: GuildId) -> Result<Arc<GuildPlayer>> {
        let songbird = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        Ok(self
            .registry
            .get_or_create(guild_id, ctx.http.clone(), songbird))
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for CadenciaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si el bot fue desconectado del canal de voz (expulsado o movido a
    /// ninguna parte), el estado de reproducción de esa guild se limpia para
    /// que el siguiente /play arranque de cero.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);

                if let Some(player) = self.registry.get(guild_id) {
                    player.handle_disconnect().await;
                }
            }
        }
    }
}
