use songbird::input::{Input, RawAdapter};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use symphonia::core::io::ReadOnlySource;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PlayerError;
use crate::resolver::ResolvedSource;

/// Salida fija del transcodificador: PCM f32 intercalado, estéreo a 48 kHz,
/// que es lo que el driver de voz espera antes de codificar a Opus.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u32 = 2;

/// Un subproceso ffmpeg por track, nunca reutilizado.
///
/// El handle es el único dueño del proceso: se destruye cuando el track
/// termina, se salta, se reemplaza por un reintento, o el motor se apaga.
/// `destroy()` es idempotente y también corre en `Drop`, así que cualquier
/// camino de salida libera el proceso.
pub struct PipelineHandle {
    child: Child,
    pid: u32,
    destroyed: bool,
}

impl PipelineHandle {
    /// Lanza ffmpeg leyendo `resolved.direct_url` con los headers del
    /// resolvedor y devuelve el handle junto con el stream para el sink.
    pub fn spawn(
        resolved: &ResolvedSource,
        config: &Config,
    ) -> Result<(Self, Input), PlayerError> {
        let args = ffmpeg_args(&resolved.direct_url, &resolved.headers);

        let mut cmd = Command::new(&config.ffmpeg_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if config.ffmpeg_debug {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(PlayerError::PipelineSpawn)?;
        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            // La captura vive en su propio hilo y nunca bloquea el teardown
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("ffmpeg[{}]: {}", pid, line);
                }
            });
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            PlayerError::PipelineSpawn(std::io::Error::other("ffmpeg sin stdout"))
        })?;

        info!("🎛️ Pipeline ffmpeg iniciado (pid {})", pid);

        let input: Input =
            RawAdapter::new(ReadOnlySource::new(stdout), SAMPLE_RATE, CHANNELS).into();

        Ok((
            Self {
                child,
                pid,
                destroyed: false,
            },
            input,
        ))
    }

    /// Termina el subproceso. Idempotente y best-effort: que el otro extremo
    /// del pipe haya cerrado primero no es un error.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Err(e) = self.child.kill() {
            debug!("Pipeline {} ya había terminado: {}", self.pid, e);
        }

        match self.child.wait() {
            Ok(status) => debug!("🎛️ Pipeline {} finalizado: {}", self.pid, status),
            Err(e) => warn!("No se pudo recolectar el pipeline {}: {}", self.pid, e),
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Argumentos fijos del transcodificador: sin video, reconexión del lado de
/// la fuente, timeouts acotados, probing mínimo para arrancar rápido, y PCM
/// f32 estéreo 48 kHz por stdout.
fn ffmpeg_args(direct_url: &str, headers: &[(String, String)]) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
        "-reconnect".into(),
        "1".into(),
        "-reconnect_streamed".into(),
        "1".into(),
        "-reconnect_delay_max".into(),
        "5".into(),
        "-rw_timeout".into(),
        "10000000".into(),
        "-analyzeduration".into(),
        "0".into(),
        "-probesize".into(),
        "32768".into(),
    ];

    if !headers.is_empty() {
        args.push("-headers".into());
        args.push(header_blob(headers));
    }

    args.extend([
        "-i".into(),
        direct_url.to_string(),
        "-vn".into(),
        "-acodec".into(),
        "pcm_f32le".into(),
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        SAMPLE_RATE.to_string(),
        "-ac".into(),
        CHANNELS.to_string(),
        "pipe:1".into(),
    ]);

    args
}

/// ffmpeg espera todos los headers en un solo argumento separado por CRLF.
fn header_blob(headers: &[(String, String)]) -> String {
    let mut blob = String::new();
    for (name, value) in headers {
        blob.push_str(name);
        blob.push_str(": ");
        blob.push_str(value);
        blob.push_str("\r\n");
    }
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ffmpeg_args_shape() {
        let args = ffmpeg_args("https://cdn.example.com/a.webm?sig=xyz", &[]);

        // Reconexión de fuente habilitada antes del input
        let reconnect = args.iter().position(|a| a == "-reconnect").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(reconnect < input);
        assert_eq!(args[input + 1], "https://cdn.example.com/a.webm?sig=xyz");

        // Salida PCM f32 estéreo 48k por stdout
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "f32le"));
        assert!(args.windows(2).any(|w| w[0] == "-ar" && w[1] == "48000"));
        assert!(args.windows(2).any(|w| w[0] == "-ac" && w[1] == "2"));
        assert_eq!(args.last().unwrap(), "pipe:1");

        // Sin headers no se pasa el flag
        assert!(!args.iter().any(|a| a == "-headers"));
    }

    #[test]
    fn test_ffmpeg_args_with_headers() {
        let headers = vec![
            ("User-Agent".to_string(), "Mozilla/5.0".to_string()),
            ("Referer".to_string(), "https://example.com".to_string()),
        ];
        let args = ffmpeg_args("https://cdn.example.com/a", &headers);

        let pos = args.iter().position(|a| a == "-headers").unwrap();
        assert_eq!(
            args[pos + 1],
            "User-Agent: Mozilla/5.0\r\nReferer: https://example.com\r\n"
        );

        // Los headers van antes del -i para aplicar a la entrada
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(pos < input);
    }
}
