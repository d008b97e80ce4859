use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{application::CommandInteraction, id::ChannelId},
    prelude::Context,
};
use tracing::info;

use crate::{
    bot::CadenciaBot,
    player::{queue::QueueItem, Enqueued},
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "playlist" => handle_playlist(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await?,
        "remove" => handle_remove(ctx, command, bot).await?,
        "shuffle" => handle_shuffle(ctx, command, bot).await?,
        "loop" => handle_loop(ctx, command, bot).await?,
        "volume" => handle_volume(ctx, command, bot).await?,
        _ => {
            respond_ephemeral(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = str_option(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    let Some(voice_channel_id) = user_voice_channel(ctx, &command) else {
        return respond_ephemeral(ctx, &command, "🔇 Debes estar en un canal de voz").await;
    };

    // Defer: la resolución puede tardar
    command.defer(&ctx.http).await?;

    let page_url = match bot.resolver.resolve_first_match(&query).await {
        Ok(Some(url)) => url,
        Ok(None) => {
            return edit_with_embed(ctx, &command, embeds::error("😕 Sin resultados para esa búsqueda")).await;
        }
        Err(e) => {
            return edit_with_embed(ctx, &command, embeds::error(&e.to_string())).await;
        }
    };

    // Título best-effort; si la metadata falla se muestra la consulta cruda
    let title = match bot.resolver.resolve_title(&page_url).await {
        t if t == page_url => query.clone(),
        t => t,
    };

    let item = QueueItem {
        title,
        source: page_url,
        requested_by: command.user.id,
        guild_id,
        voice_channel_id,
        text_channel_id: command.channel_id,
    };

    let player = bot.player_for(ctx, guild_id).await?;
    let reply = match player.enqueue(item.clone()).await {
        Ok(Enqueued::Started { title }) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().content(format!("▶️ Reproduciendo: **{title}**")),
                )
                .await?;
            return Ok(());
        }
        Ok(Enqueued::Queued { position }) => embeds::track_added(&item, position),
        Ok(Enqueued::Failed) => embeds::error(&format!(
            "❌ No se pudo reproducir: **{}**",
            item.title
        )),
        Err(e) => embeds::error(&e.to_string()),
    };

    edit_with_embed(ctx, &command, reply).await
}

async fn handle_playlist(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = str_option(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();
    let limit = int_option(&command, "limit")
        .map(|l| l.max(1) as usize)
        .unwrap_or(bot.config.max_playlist_size);

    let Some(voice_channel_id) = user_voice_channel(ctx, &command) else {
        return respond_ephemeral(ctx, &command, "🔇 Debes estar en un canal de voz").await;
    };

    command.defer(&ctx.http).await?;

    let hits = bot.resolver.resolve_batch(&query, limit).await;
    if hits.is_empty() {
        return edit_with_embed(ctx, &command, embeds::error("😕 Sin resultados para esa búsqueda")).await;
    }

    let items: Vec<QueueItem> = hits
        .into_iter()
        .map(|hit| QueueItem {
            title: hit.title,
            source: hit.url,
            requested_by: command.user.id,
            guild_id,
            voice_channel_id,
            text_channel_id: command.channel_id,
        })
        .collect();

    let player = bot.player_for(ctx, guild_id).await?;
    let batch = player.enqueue_batch(items).await;

    let reply = if batch.accepted == 0 {
        embeds::error("❌ La cola está llena")
    } else {
        embeds::playlist_added(batch.accepted, batch.started)
    };

    edit_with_embed(ctx, &command, reply).await
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let reply = if player.pause().await {
        "⏸️ Reproducción pausada"
    } else {
        "🤷 No hay nada que pausar"
    };
    respond(ctx, &command, reply).await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let reply = if player.resume().await {
        "▶️ Reproducción reanudada"
    } else {
        "🤷 No hay nada que reanudar"
    };
    respond(ctx, &command, reply).await
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;

    // Defer: si la carga estaba en vuelo, el skip arranca la siguiente
    command.defer(&ctx.http).await?;

    let reply = match player.skip().await {
        Some(title) => format!("⏭️ Saltada: **{title}**"),
        None => "📭 No hay nada sonando".to_string(),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
        .await?;
    Ok(())
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    player.stop().await;
    respond(ctx, &command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let view = player.view().await;
    respond_with_embed(ctx, &command, embeds::queue_list(&view)).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let view = player.view().await;

    match view.current {
        Some(current) => respond_with_embed(ctx, &command, embeds::now_playing(&current)).await,
        None => respond(ctx, &command, "💤 No hay nada sonando").await,
    }
}

async fn handle_remove(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let index = int_option(&command, "index")
        .ok_or_else(|| anyhow::anyhow!("Índice no proporcionado"))?;

    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    match player.remove(index.max(0) as usize).await {
        Ok(item) => respond(ctx, &command, &format!("🗑️ Eliminada: **{}**", item.title)).await,
        Err(e) => respond_ephemeral(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let reply = if player.shuffle().await {
        "🔀 Cola mezclada"
    } else {
        "🤏 Se necesitan al menos 2 canciones en cola"
    };
    respond(ctx, &command, reply).await
}

async fn handle_loop(ctx: &Context, command: CommandInteraction, bot: &CadenciaBot) -> Result<()> {
    let mode_raw = str_option(&command, "mode")
        .ok_or_else(|| anyhow::anyhow!("Modo no proporcionado"))?;

    let mode = match mode_raw.parse() {
        Ok(mode) => mode,
        Err(e) => return respond_ephemeral(ctx, &command, &format!("❌ {e}")).await,
    };

    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    player.set_loop(mode).await;
    respond(
        ctx,
        &command,
        &format!("🔁 Modo de repetición: {}", embeds::loop_mode_label(mode)),
    )
    .await
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenciaBot,
) -> Result<()> {
    let level = int_option(&command, "level")
        .ok_or_else(|| anyhow::anyhow!("Nivel no proporcionado"))?;

    // Discord ya acota la opción, pero la validación no depende de eso
    if !(0..=1000).contains(&level) {
        let err = crate::error::PlayerError::InvalidVolume(level);
        return respond_ephemeral(ctx, &command, &format!("❌ {err}")).await;
    }

    let player = bot.player_for(ctx, command.guild_id.unwrap()).await?;
    let applied = player.set_volume(level).await;
    respond(ctx, &command, &format!("🔊 Volumen ajustado a {applied}")).await
}

// Utilidades

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Canal de voz en el que está el usuario que invocó el comando. La
/// referencia al cache no puede cruzar un await, de ahí el scope.
fn user_voice_channel(ctx: &Context, command: &CommandInteraction) -> Option<ChannelId> {
    let guild = ctx.cache.guild(command.guild_id?)?;
    guild
        .voice_states
        .get(&command.user.id)
        .and_then(|vs| vs.channel_id)
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_with_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_with_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}
