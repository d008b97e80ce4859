use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::player::queue::LoopMode;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Binarios externos
    pub ffmpeg_path: String,
    pub ytdlp_path: String,
    pub cookies_path: Option<PathBuf>,

    // Audio
    pub default_volume: u16, // 0..=1000
    pub default_loop_mode: LoopMode,
    pub opus_bitrate: u32,

    // Límites
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Red
    pub listen_port: u16,
    pub force_ipv4: bool,

    // Mantenimiento
    pub auto_update: bool,
    pub update_tz_offset: i8, // Horas respecto a UTC

    // Paths
    pub data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,

    // Diagnóstico
    pub ffmpeg_debug: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Binarios externos
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            cookies_path: std::env::var("COOKIES_PATH").ok().map(PathBuf::from),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            default_loop_mode: std::env::var("DEFAULT_LOOP_MODE")
                .unwrap_or_else(|_| "off".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("DEFAULT_LOOP_MODE: {}", e))?,
            opus_bitrate: std::env::var("OPUS_BITRATE")
                .unwrap_or_else(|_| "96000".to_string()) // 96kbps (Discord default)
                .parse()?,

            // Límites
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // Red
            listen_port: std::env::var("LISTEN_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            force_ipv4: std::env::var("FORCE_IPV4")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            // Mantenimiento
            auto_update: std::env::var("AUTO_UPDATE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            update_tz_offset: std::env::var("UPDATE_TZ_OFFSET")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),

            // Diagnóstico
            ffmpeg_debug: std::env::var("FFMPEG_DEBUG")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;
        if let Some(log_dir) = &config.log_dir {
            std::fs::create_dir_all(log_dir)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Verifica que los valores de configuración estén dentro de dominio.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 1000 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0 y 1000, recibido: {}",
                self.default_volume
            );
        }

        if self.opus_bitrate > 510_000 {
            anyhow::bail!(
                "El bitrate Opus no puede superar 510kbps, recibido: {}",
                self.opus_bitrate
            );
        }

        if self.opus_bitrate < 8_000 {
            anyhow::bail!(
                "Bitrate Opus demasiado bajo, mínimo 8kbps, recibido: {}",
                self.opus_bitrate
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 || self.max_playlist_size > 50 {
            anyhow::bail!(
                "El tamaño máximo de playlist debe estar entre 1 y 50, recibido: {}",
                self.max_playlist_size
            );
        }

        if !(-12..=14).contains(&self.update_tz_offset) {
            anyhow::bail!(
                "UPDATE_TZ_OFFSET debe estar entre -12 y +14 horas, recibido: {}",
                self.update_tz_offset
            );
        }

        Ok(())
    }

    /// Resumen de configuración apto para logs (sin token).
    pub fn summary(&self) -> String {
        format!(
            "Config: app={} guild={} vol={} loop={} bitrate={}kbps cola={} playlist={} puerto={} ipv4={} autoupdate={} (UTC{:+})",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.default_volume,
            self.default_loop_mode,
            self.opus_bitrate / 1000,
            self.max_queue_size,
            self.max_playlist_size,
            self.listen_port,
            self.force_ipv4,
            self.auto_update,
            self.update_tz_offset,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            ffmpeg_path: "ffmpeg".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            cookies_path: None,

            default_volume: 100,
            default_loop_mode: LoopMode::Off,
            opus_bitrate: 96_000, // 96kbps (Discord default)

            max_queue_size: 1000,
            max_playlist_size: 50,

            listen_port: 8080,
            force_ipv4: false,

            auto_update: true,
            update_tz_offset: 0,

            data_dir: "./data".into(),
            log_dir: None,

            ffmpeg_debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_volume, 100);
        assert_eq!(config.default_loop_mode, LoopMode::Off);
    }

    #[test]
    fn test_validate_rejects_out_of_domain_values() {
        let mut config = Config::default();
        config.default_volume = 1001;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_playlist_size = 51;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.update_tz_offset = 15;
        assert!(config.validate().is_err());
    }
}
