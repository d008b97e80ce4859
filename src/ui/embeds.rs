use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use crate::player::queue::{LoopMode, QueueItem};
use crate::player::PlayerView;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Cadencia";

/// Embed de "reproduciendo ahora".
pub fn now_playing(track: &QueueItem) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field("🔗 Fuente", format!("`{}`", track.source), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed para una canción agregada a la cola.
pub fn track_added(track: &QueueItem, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("📊 Posición en cola", position.to_string(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed para una playlist/búsqueda múltiple agregada.
pub fn playlist_added(count: usize, started: bool) -> CreateEmbed {
    let description = if count == 1 {
        "Se agregó **1 canción** a la cola de reproducción".to_string()
    } else {
        format!("Se agregaron **{count} canciones** a la cola de reproducción")
    };

    let footer = if started {
        "▶️ Reproducción iniciada"
    } else {
        "🎵 Se reproducirán cuando llegue su turno"
    };

    CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(footer))
}

/// Embed con el estado completo de la cola.
pub fn queue_list(view: &PlayerView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📜 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    match &view.current {
        Some(current) => {
            let state = if view.paused { "⏸️" } else { "▶️" };
            embed = embed.field(
                format!("{state} Sonando"),
                format!("**{}** (pedida por <@{}>)", current.title, current.requested_by),
                false,
            );
        }
        None => {
            embed = embed.field("💤 Sonando", "Nada por ahora", false);
        }
    }

    if view.upcoming.is_empty() {
        embed = embed.field("📭 En cola", "Vacía", false);
    } else {
        // Las colas largas se recortan para no pasarse del límite de Discord
        let listed: Vec<String> = view
            .upcoming
            .iter()
            .take(10)
            .enumerate()
            .map(|(i, item)| format!("`{}.` {}", i + 1, item.title))
            .collect();

        let mut body = listed.join("\n");
        if view.upcoming.len() > 10 {
            body.push_str(&format!("\n… y {} más", view.upcoming.len() - 10));
        }

        embed = embed.field(format!("📭 En cola ({})", view.upcoming.len()), body, false);
    }

    embed
        .field("🔊 Volumen", view.volume.to_string(), true)
        .field("🔁 Loop", loop_mode_label(view.loop_mode), true)
}

/// Embed de error genérico para respuestas de comandos.
pub fn error(text: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(text.to_string())
        .color(colors::ERROR_RED)
}

pub fn loop_mode_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "➡️ desactivado",
        LoopMode::Track => "🔂 canción",
        LoopMode::Queue => "🔁 cola",
    }
}
