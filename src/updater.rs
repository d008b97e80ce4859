//! Auto-actualización diaria del resolvedor externo.
//!
//! yt-dlp se rompe cada vez que las plataformas cambian sus players, así que
//! el bot corre `yt-dlp -U` al arrancar (si hace más de un día de la última
//! vez) y después una vez por día a medianoche del huso configurado. El
//! único estado persistente del proceso es el archivo de timestamp con la
//! última actualización exitosa.

use chrono::{DateTime, Days, Duration, FixedOffset, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;

const STAMP_FILE: &str = "last_update.txt";

pub async fn run(config: Arc<Config>) {
    let stamp_path = config.data_dir.join(STAMP_FILE);

    let last = read_stamp(&stamp_path).await;
    if should_update_on_boot(last, Utc::now()) {
        perform_update(&config, &stamp_path).await;
    } else {
        info!("🛠️ yt-dlp actualizado hace menos de un día, omitiendo");
    }

    loop {
        let wait = seconds_until_next_run(Utc::now(), config.update_tz_offset);
        info!("🛠️ Próxima actualización de yt-dlp en {}s", wait);
        tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
        perform_update(&config, &stamp_path).await;
    }
}

async fn perform_update(config: &Config, stamp_path: &Path) {
    info!("🛠️ Actualizando yt-dlp...");

    let result = Command::new(&config.ytdlp_path).arg("-U").output().await;

    match result {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            info!("✅ yt-dlp actualizado: {}", stdout.trim());
            write_stamp(stamp_path, Utc::now()).await;
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("⚠️ Actualización de yt-dlp falló: {}", stderr.trim());
        }
        Err(e) => {
            warn!("⚠️ No se pudo ejecutar yt-dlp -U: {}", e);
        }
    }
}

async fn read_stamp(path: &Path) -> Option<DateTime<Utc>> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    parse_stamp(&raw)
}

async fn write_stamp(path: &Path, when: DateTime<Utc>) {
    if let Err(e) = tokio::fs::write(path, when.to_rfc3339()).await {
        warn!("⚠️ No se pudo escribir {}: {}", path.display(), e);
    }
}

fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn should_update_on_boot(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last {
        Some(last) => now - last >= Duration::days(1),
        None => true,
    }
}

/// Segundos hasta la próxima medianoche en el huso configurado. Nunca menos
/// de un minuto, para no ciclar si el reloj cae justo en la medianoche.
fn seconds_until_next_run(now: DateTime<Utc>, offset_hours: i8) -> u64 {
    let offset =
        FixedOffset::east_opt(i32::from(offset_hours) * 3600).expect("offset validado en Config");
    let local = now.with_timezone(&offset);

    let next_midnight = (local.date_naive() + Days::new(1))
        .and_hms_opt(0, 0, 0)
        .expect("medianoche siempre existe")
        .and_local_timezone(offset)
        .unwrap();

    (next_midnight - local).num_seconds().max(60) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stamp_roundtrip() {
        let when = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();
        let parsed = parse_stamp(&when.to_rfc3339()).unwrap();
        assert_eq!(parsed, when);

        assert!(parse_stamp("no es una fecha").is_none());
        assert!(parse_stamp("").is_none());
    }

    #[test]
    fn test_should_update_on_boot() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        assert!(should_update_on_boot(None, now));
        assert!(should_update_on_boot(
            Some(now - Duration::days(2)),
            now
        ));
        assert!(!should_update_on_boot(
            Some(now - Duration::hours(3)),
            now
        ));
    }

    #[test]
    fn test_seconds_until_next_run() {
        // 22:00 UTC con offset 0 → 2 horas hasta medianoche
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap();
        assert_eq!(seconds_until_next_run(now, 0), 2 * 3600);

        // 22:00 UTC con offset -3 (19:00 local) → 5 horas hasta medianoche local
        assert_eq!(seconds_until_next_run(now, -3), 5 * 3600);

        // Justo en la medianoche local nunca devuelve menos de un minuto
        let midnight = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(seconds_until_next_run(midnight, 0) >= 60);
    }
}
