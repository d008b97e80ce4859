use dashmap::DashMap;
use serenity::http::Http;
use serenity::model::id::GuildId;
use songbird::Songbird;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::player::engine::GuildPlayer;
use crate::resolver::MediaResolver;

/// Registro explícito guild → motor de reproducción.
///
/// Los motores se crean perezosamente con el primer comando del guild y
/// viven hasta que el proceso termina; el aislamiento entre guilds es
/// exactamente el aislamiento entre entradas de este mapa.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    resolver: Arc<dyn MediaResolver>,
    config: Arc<Config>,
}

impl PlayerRegistry {
    pub fn new(resolver: Arc<dyn MediaResolver>, config: Arc<Config>) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            config,
        }
    }

    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        http: Arc<Http>,
        songbird: Arc<Songbird>,
    ) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Motor de reproducción creado para guild {}", guild_id);
                Arc::new(GuildPlayer::new(
                    guild_id,
                    http,
                    songbird,
                    self.resolver.clone(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Motor existente, sin crearlo: para eventos que no deben instanciar
    /// estado (p. ej. limpieza por desconexión).
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }
}
