pub mod ytdlp;

pub use ytdlp::YtDlpResolver;

use async_trait::async_trait;

use crate::error::PlayerError;

/// Fuente directa lista para el pipeline: URL firmada de corta vida más los
/// headers HTTP que el CDN exige. Nunca se cachea; se pide justo antes de
/// reproducir.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub title: Option<String>,
    pub direct_url: String,
    pub headers: Vec<(String, String)>,
}

/// Resultado de búsqueda o de expansión de playlist.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Adaptador sobre la herramienta externa de resolución de medios.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Título para mostrar, best-effort: ante cualquier fallo devuelve la
    /// consulta cruda sin propagar el error.
    async fn resolve_title(&self, query: &str) -> String;

    /// URL directa de audio + headers para una página canónica o consulta.
    async fn resolve_direct_source(&self, source: &str) -> Result<ResolvedSource, PlayerError>;

    /// URL canónica del primer resultado; las URLs bien formadas pasan tal
    /// cual sin tocar la red.
    async fn resolve_first_match(&self, query: &str) -> Result<Option<String>, PlayerError>;

    /// Expande una playlist o busca por palabras clave, acotado a `limit`
    /// (recortado a `[1, 50]`). Los fallos degradan a lista vacía.
    async fn resolve_batch(&self, query: &str, limit: usize) -> Vec<SearchHit>;
}

/// Detecta si la entrada ya es una URL http(s) bien formada.
pub(crate) fn is_http_url(input: &str) -> bool {
    match url::Url::parse(input) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_detection() {
        assert!(is_http_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_http_url("http://example.com/audio.mp3"));
        assert!(!is_http_url("never gonna give you up"));
        assert!(!is_http_url("ftp://example.com/file"));
        assert!(!is_http_url("youtube.com/watch?v=abc"));
    }
}
