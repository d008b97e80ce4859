use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::{is_http_url, MediaResolver, ResolvedSource, SearchHit};
use crate::config::Config;
use crate::error::PlayerError;

const SOCKET_TIMEOUT_SECS: &str = "15";
const RETRIES: &str = "2";
const BATCH_LIMIT_MAX: usize = 50;

/// Resolvedor sobre el binario yt-dlp.
pub struct YtDlpResolver {
    ytdlp_path: String,
    ffmpeg_path: String,
    cookies_path: Option<PathBuf>,
    force_ipv4: bool,
}

/// Metadata que interesa del volcado JSON de yt-dlp.
#[derive(Debug, Deserialize)]
struct YtDlpTrack {
    title: Option<String>,
    url: Option<String>,
    http_headers: Option<HashMap<String, String>>,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            cookies_path: config.cookies_path.clone(),
            force_ipv4: config.force_ipv4,
        }
    }

    /// Verifica que yt-dlp y ffmpeg estén disponibles.
    pub async fn verify_dependencies(&self) -> Result<()> {
        let ytdlp_check = Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
            .await;

        match ytdlp_check {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
            }
            _ => {
                error!("❌ yt-dlp no encontrado. Instala con: pip install yt-dlp");
                anyhow::bail!("yt-dlp no disponible");
            }
        }

        let ffmpeg_check = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        match ffmpeg_check {
            Ok(output) if output.status.success() => {
                info!("✅ ffmpeg disponible");
            }
            _ => {
                error!("❌ ffmpeg no encontrado. Instala con: sudo apt install ffmpeg");
                anyhow::bail!("ffmpeg no disponible");
            }
        }

        Ok(())
    }

    /// Comando base con los flags comunes de red y cookies.
    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.ytdlp_path);
        cmd.args([
            "--no-warnings",
            "--socket-timeout",
            SOCKET_TIMEOUT_SECS,
            "--retries",
            RETRIES,
        ]);

        if self.force_ipv4 {
            cmd.arg("--force-ipv4");
        }

        if let Some(cookies) = &self.cookies_path {
            cmd.args(["--cookies", &cookies.to_string_lossy()]);
        }

        cmd
    }

    async fn run_lines(&self, mut cmd: Command) -> Result<Vec<String>, PlayerError> {
        let output = cmd
            .output()
            .await
            .map_err(|e| PlayerError::Resolution(format!("yt-dlp no pudo ejecutarse: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Resolution(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve_title(&self, query: &str) -> String {
        let mut cmd = self.base_command();
        cmd.args([
            "--print",
            "%(title)s",
            "--flat-playlist",
            "--playlist-items",
            "1",
            "--default-search",
            "ytsearch",
            "--skip-download",
        ]);
        cmd.arg(query);

        match self.run_lines(cmd).await {
            Ok(lines) if !lines.is_empty() => lines[0].clone(),
            Ok(_) => query.to_string(),
            Err(e) => {
                warn!("⚠️ No se pudo resolver título para '{}': {}", query, e);
                query.to_string()
            }
        }
    }

    async fn resolve_direct_source(&self, source: &str) -> Result<ResolvedSource, PlayerError> {
        info!("🔍 Resolviendo fuente directa: {}", source);

        let mut cmd = self.base_command();
        cmd.args([
            "-j",
            "--no-playlist",
            "-f",
            "bestaudio[acodec=opus]/bestaudio/best",
            "--default-search",
            "ytsearch",
        ]);
        cmd.arg(source);

        let lines = self.run_lines(cmd).await?;
        let raw = lines
            .first()
            .ok_or_else(|| PlayerError::Resolution(format!("sin metadata para {source}")))?;

        let track: YtDlpTrack = serde_json::from_str(raw)
            .map_err(|e| PlayerError::Resolution(format!("metadata ilegible: {e}")))?;

        let direct_url = track
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PlayerError::Resolution(format!("sin URL de audio para {source}")))?;

        let headers = track
            .http_headers
            .unwrap_or_default()
            .into_iter()
            .collect();

        info!("🎯 Fuente directa resuelta para: {}", source);
        Ok(ResolvedSource {
            title: track.title,
            direct_url,
            headers,
        })
    }

    async fn resolve_first_match(&self, query: &str) -> Result<Option<String>, PlayerError> {
        if is_http_url(query) {
            return Ok(Some(query.to_string()));
        }

        let mut cmd = self.base_command();
        cmd.args(["--print", "%(webpage_url)s", "--flat-playlist", "--skip-download"]);
        cmd.arg(format!("ytsearch1:{query}"));

        let lines = self.run_lines(cmd).await?;
        Ok(lines.into_iter().next())
    }

    async fn resolve_batch(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let limit = clamp_batch_limit(limit);

        let mut cmd = self.base_command();
        cmd.args([
            "--print",
            "%(webpage_url)s|%(title)s",
            "--flat-playlist",
            "--skip-download",
        ]);

        if is_http_url(query) {
            cmd.args(["--playlist-end", &limit.to_string()]);
            cmd.arg(query);
        } else {
            cmd.arg(format!("ytsearch{limit}:{query}"));
        }

        match self.run_lines(cmd).await {
            Ok(lines) => {
                let hits: Vec<SearchHit> = lines
                    .iter()
                    .take(limit)
                    .filter_map(|line| parse_batch_line(line))
                    .collect();
                info!("🔍 {} resultados para: {}", hits.len(), query);
                hits
            }
            Err(e) => {
                warn!("⚠️ Expansión fallida para '{}': {}", query, e);
                Vec::new()
            }
        }
    }
}

fn clamp_batch_limit(limit: usize) -> usize {
    limit.clamp(1, BATCH_LIMIT_MAX)
}

/// Una línea `url|título` del modo --print. Los títulos pueden contener `|`,
/// así que solo se corta en el primero.
fn parse_batch_line(line: &str) -> Option<SearchHit> {
    let (url, title) = line.split_once('|')?;
    if url.is_empty() {
        return None;
    }

    Some(SearchHit {
        url: url.to_string(),
        title: if title.is_empty() {
            url.to_string()
        } else {
            title.to_string()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_batch_limit_clamp() {
        assert_eq!(clamp_batch_limit(0), 1);
        assert_eq!(clamp_batch_limit(25), 25);
        assert_eq!(clamp_batch_limit(900), 50);
    }

    #[test]
    fn test_parse_batch_line() {
        let hit = parse_batch_line("https://youtu.be/abc|Mi Canción").unwrap();
        assert_eq!(hit.url, "https://youtu.be/abc");
        assert_eq!(hit.title, "Mi Canción");

        // El título puede llevar separadores
        let hit = parse_batch_line("https://youtu.be/abc|Rock | Pop Mix").unwrap();
        assert_eq!(hit.title, "Rock | Pop Mix");

        // Sin título, se usa la URL como display
        let hit = parse_batch_line("https://youtu.be/abc|").unwrap();
        assert_eq!(hit.title, "https://youtu.be/abc");

        assert!(parse_batch_line("línea sin separador").is_none());
        assert!(parse_batch_line("|solo título").is_none());
    }
}
