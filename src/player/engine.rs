use serenity::async_trait;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    driver::Bitrate, tracks::TrackHandle, Call, Event, EventContext,
    EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::mem;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PlayerError;
use crate::pipeline::PipelineHandle;
use crate::player::queue::{LoopMode, QueueItem, TrackQueue};
use crate::resolver::MediaResolver;
use crate::ui::embeds;

/// Fase explícita del motor. El pipeline solo existe dentro de `Playing`,
/// así que "pipeline vivo sin track actual" es irrepresentable.
enum Phase {
    Idle,
    Loading {
        item: QueueItem,
    },
    Playing {
        item: QueueItem,
        pipeline: PipelineHandle,
        handle: TrackHandle,
        paused: bool,
    },
}

/// Cómo terminó el track vigente. Etiquetado de forma explícita: un abandono
/// tras reintento agotado nunca se confunde con un final natural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackOutcome {
    /// El sink llegó al final del stream.
    Finished,
    /// El sink reportó un error con el pipeline en vivo.
    Errored,
}

/// Decisión del motor tras cerrar un track.
#[derive(Debug)]
enum NextStep {
    /// Volver a cargar el mismo item (loop de canción o reintento).
    Replay { item: QueueItem, retry: bool },
    /// Pasar al siguiente de la cola.
    Advance(QueueItem),
    /// Nada más que reproducir: quedar Idle y soltar la conexión de voz.
    Settle { channel: ChannelId },
}

enum StartResult {
    Playing,
    /// Otra operación tomó el control mientras cargábamos; no avanzar.
    Cancelled,
    Failed(PlayerError),
}

/// Estado mutable de un guild. Todas las mutaciones pasan por el mutex del
/// motor, así que dos comandos del mismo guild nunca corren a la vez.
struct PlayerState {
    queue: TrackQueue,
    phase: Phase,
    loop_mode: LoopMode,
    volume: u16,
    skip_requested: bool,
    restart_attempted: bool,
    /// Se incrementa en cada carga nueva; las continuaciones y los eventos
    /// del sink que traen una generación vieja se descartan. Esto impide el
    /// doble avance cuando un skip/stop interrumpe una carga en vuelo.
    generation: u64,
}

impl PlayerState {
    /// Aplica la política de fin de track. `skip_requested` se lee una sola
    /// vez y se resetea aquí mismo: solo gobierna este cierre.
    fn resolve_outcome(&mut self, item: QueueItem, outcome: TrackOutcome) -> NextStep {
        let skipped = mem::take(&mut self.skip_requested);

        match outcome {
            TrackOutcome::Errored => {
                if !self.restart_attempted {
                    return NextStep::Replay { item, retry: true };
                }
                // Segundo error del mismo track: abandonar y avanzar
                self.advance_or_settle(item)
            }
            TrackOutcome::Finished => {
                if self.loop_mode == LoopMode::Track && !skipped {
                    return NextStep::Replay { item, retry: false };
                }
                if self.loop_mode == LoopMode::Queue {
                    self.queue.requeue(item.clone());
                }
                self.advance_or_settle(item)
            }
        }
    }

    fn advance_or_settle(&mut self, ended: QueueItem) -> NextStep {
        match self.queue.pop_front() {
            Some(next) => NextStep::Advance(next),
            None => NextStep::Settle {
                channel: ended.text_channel_id,
            },
        }
    }

    fn current_item(&self) -> Option<&QueueItem> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Loading { item } => Some(item),
            Phase::Playing { item, .. } => Some(item),
        }
    }
}

/// Resultado de un `enqueue` para la respuesta al usuario.
pub enum Enqueued {
    /// El motor estaba Idle y el track empezó a sonar.
    Started { title: String },
    /// Había algo sonando: quedó en cola en la posición indicada (1-based).
    Queued { position: usize },
    /// El arranque inmediato falló y la cola quedó vacía.
    Failed,
}

pub struct BatchEnqueued {
    pub accepted: usize,
    pub started: bool,
}

/// Vista de solo lectura para `queue` y `nowplaying`.
pub struct PlayerView {
    pub current: Option<QueueItem>,
    pub paused: bool,
    pub upcoming: Vec<QueueItem>,
    pub loop_mode: LoopMode,
    pub volume: u16,
}

/// Motor de reproducción de un guild: dueño de la cola, del track vigente y
/// del subproceso transcodificador. Uno por guild, vive hasta que el proceso
/// termina.
pub struct GuildPlayer {
    guild_id: GuildId,
    http: Arc<Http>,
    songbird: Arc<Songbird>,
    resolver: Arc<dyn MediaResolver>,
    config: Arc<Config>,
    state: Mutex<PlayerState>,
}

impl GuildPlayer {
    pub fn new(
        guild_id: GuildId,
        http: Arc<Http>,
        songbird: Arc<Songbird>,
        resolver: Arc<dyn MediaResolver>,
        config: Arc<Config>,
    ) -> Self {
        let state = PlayerState {
            queue: TrackQueue::new(config.max_queue_size),
            phase: Phase::Idle,
            loop_mode: config.default_loop_mode,
            volume: config.default_volume,
            skip_requested: false,
            restart_attempted: false,
            generation: 0,
        };

        Self {
            guild_id,
            http,
            songbird,
            resolver,
            config,
            state: Mutex::new(state),
        }
    }

    /// Agrega un track. Con el motor Idle y la cola vacía arranca la
    /// reproducción de inmediato; si no, el track espera su turno FIFO.
    /// (Idle con cola no vacía significa que hay un avance en vuelo: el
    /// track nuevo se encola detrás en vez de competir con esa carga.)
    pub async fn enqueue(self: &Arc<Self>, item: QueueItem) -> Result<Enqueued, PlayerError> {
        debug_assert_eq!(item.guild_id, self.guild_id);

        let mut st = self.state.lock().await;
        if matches!(st.phase, Phase::Idle) && st.queue.is_empty() {
            drop(st);
            return Ok(match self.drive(NextStep::Advance(item)).await {
                Some(title) => Enqueued::Started { title },
                None => Enqueued::Failed,
            });
        }

        st.queue.push(item)?;
        Ok(Enqueued::Queued {
            position: st.queue.len(),
        })
    }

    /// Agrega una tanda (playlist o búsqueda múltiple), recortada a la
    /// capacidad restante de la cola.
    pub async fn enqueue_batch(self: &Arc<Self>, items: Vec<QueueItem>) -> BatchEnqueued {
        let (accepted, first) = {
            let mut st = self.state.lock().await;
            let was_idle = matches!(st.phase, Phase::Idle) && st.queue.is_empty();
            let accepted = st.queue.push_batch(items);
            if accepted > 0 && was_idle {
                (accepted, st.queue.pop_front())
            } else {
                (accepted, None)
            }
        };

        let started = match first {
            Some(item) => self.drive(NextStep::Advance(item)).await.is_some(),
            None => false,
        };

        BatchEnqueued { accepted, started }
    }

    /// Salta el track vigente. Durante `Loading` aborta la carga en vuelo;
    /// durante `Playing` fuerza el fin del track en el sink, que dispara el
    /// camino normal de fin con semántica de skip.
    pub async fn skip(self: &Arc<Self>) -> Option<String> {
        let mut st = self.state.lock().await;

        if matches!(st.phase, Phase::Idle) {
            return None;
        }

        if matches!(st.phase, Phase::Loading { .. }) {
            let Phase::Loading { item } = mem::replace(&mut st.phase, Phase::Idle) else {
                unreachable!()
            };
            // Invalida la continuación en vuelo y avanza ya
            st.generation = st.generation.wrapping_add(1);
            st.skip_requested = false;
            let step = st.advance_or_settle(item.clone());
            drop(st);
            self.drive(step).await;
            return Some(item.title);
        }

        st.skip_requested = true;
        if let Phase::Playing {
            item,
            pipeline,
            handle,
            ..
        } = &mut st.phase
        {
            let title = item.title.clone();
            pipeline.destroy();
            let _ = handle.stop();
            return Some(title);
        }

        None
    }

    /// Detiene todo: limpia la cola, resetea el loop, mata el pipeline y
    /// suelta la conexión de voz.
    pub async fn stop(&self) {
        let phase = {
            let mut st = self.state.lock().await;
            st.queue.clear();
            st.loop_mode = LoopMode::Off;
            st.skip_requested = false;
            st.restart_attempted = false;
            st.generation = st.generation.wrapping_add(1);
            mem::replace(&mut st.phase, Phase::Idle)
        };

        if let Phase::Playing {
            mut pipeline,
            handle,
            ..
        } = phase
        {
            pipeline.destroy();
            let _ = handle.stop();
        }

        self.leave_voice().await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    /// Limpieza cuando el bot fue expulsado del canal de voz: como `stop`
    /// pero sin intentar soltar una conexión que ya no existe.
    pub async fn handle_disconnect(&self) {
        let phase = {
            let mut st = self.state.lock().await;
            st.queue.clear();
            st.skip_requested = false;
            st.restart_attempted = false;
            st.generation = st.generation.wrapping_add(1);
            mem::replace(&mut st.phase, Phase::Idle)
        };

        if let Phase::Playing {
            mut pipeline,
            handle,
            ..
        } = phase
        {
            pipeline.destroy();
            let _ = handle.stop();
        }

        info!("🔌 Estado limpiado tras desconexión en guild {}", self.guild_id);
    }

    pub async fn pause(&self) -> bool {
        let mut st = self.state.lock().await;
        if let Phase::Playing { handle, paused, .. } = &mut st.phase {
            if handle.pause().is_ok() {
                *paused = true;
                info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
                return true;
            }
        }
        false
    }

    pub async fn resume(&self) -> bool {
        let mut st = self.state.lock().await;
        if let Phase::Playing { handle, paused, .. } = &mut st.phase {
            if handle.play().is_ok() {
                *paused = false;
                info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
                return true;
            }
        }
        false
    }

    /// Fija el volumen, recortado a `[0, 1000]`. Se aplica con curva
    /// logarítmica al track en vivo; si no hay ninguno queda guardado para
    /// el siguiente.
    pub async fn set_volume(&self, requested: i64) -> u16 {
        let clamped = clamp_volume(requested);
        let mut st = self.state.lock().await;
        st.volume = clamped;
        if let Phase::Playing { handle, .. } = &st.phase {
            let _ = handle.set_volume(volume_gain(clamped));
        }
        info!("🔊 Volumen ajustado a {} en guild {}", clamped, self.guild_id);
        clamped
    }

    pub async fn set_loop(&self, mode: LoopMode) {
        let mut st = self.state.lock().await;
        st.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada en guild {}", self.guild_id),
            LoopMode::Track => info!("🔂 Repetir canción activado en guild {}", self.guild_id),
            LoopMode::Queue => info!("🔁 Repetir cola activado en guild {}", self.guild_id),
        }
    }

    /// Mezcla la cola restante; devuelve false si había menos de dos tracks.
    pub async fn shuffle(&self) -> bool {
        let mut st = self.state.lock().await;
        st.queue.shuffle()
    }

    /// Elimina el track en la posición 1-based indicada.
    pub async fn remove(&self, index: usize) -> Result<QueueItem, PlayerError> {
        let mut st = self.state.lock().await;
        st.queue.remove_at(index)
    }

    pub async fn view(&self) -> PlayerView {
        let st = self.state.lock().await;
        PlayerView {
            current: st.current_item().cloned(),
            paused: matches!(st.phase, Phase::Playing { paused: true, .. }),
            upcoming: st.queue.snapshot(),
            loop_mode: st.loop_mode,
            volume: st.volume,
        }
    }

    /// Bucle de avance: intenta arrancar cada paso y, ante un track
    /// imposible de reproducir, lo abandona y consume el siguiente de la
    /// cola. Termina al sonar un track, al vaciarse la cola, o si otra
    /// operación canceló esta cadena.
    async fn drive(self: &Arc<Self>, mut step: NextStep) -> Option<String> {
        loop {
            let (item, retry) = match step {
                NextStep::Settle { channel } => {
                    self.settle(channel).await;
                    return None;
                }
                NextStep::Replay { item, retry } => (item, retry),
                NextStep::Advance(item) => (item, false),
            };

            match self.try_start(item.clone(), retry).await {
                StartResult::Playing => return Some(item.title),
                StartResult::Cancelled => return None,
                StartResult::Failed(e) => {
                    warn!(
                        "⏭️ Saltando '{}' en guild {}: {}",
                        item.title, self.guild_id, e
                    );
                    self.notify_unplayable(&item).await;
                    let mut st = self.state.lock().await;
                    step = st.advance_or_settle(item);
                }
            }
        }
    }

    /// Una carga completa: resolución tardía, conexión de voz, spawn del
    /// pipeline y entrega al sink. La notificación de "now playing" sale
    /// solo después de que el sink aceptó el track.
    async fn try_start(self: &Arc<Self>, item: QueueItem, retry: bool) -> StartResult {
        let generation = {
            let mut st = self.state.lock().await;
            st.generation = st.generation.wrapping_add(1);
            st.restart_attempted = retry;
            st.phase = Phase::Loading { item: item.clone() };
            st.generation
        };

        // La URL directa caduca: se resuelve siempre justo antes de sonar
        let resolved = match self.resolver.resolve_direct_source(&item.source).await {
            Ok(resolved) => resolved,
            Err(e) => return self.fail_load(generation, e).await,
        };

        let call = match self.join_voice(item.voice_channel_id).await {
            Ok(call) => call,
            Err(e) => return self.fail_load(generation, e).await,
        };

        let (pipeline, input) = match PipelineHandle::spawn(&resolved, &self.config) {
            Ok(pair) => pair,
            Err(e) => return self.fail_load(generation, e).await,
        };

        {
            let mut st = self.state.lock().await;
            if st.generation != generation {
                // Un skip/stop nos ganó mientras resolvíamos
                debug!("Carga obsoleta descartada: {}", item.title);
                let mut pipeline = pipeline;
                pipeline.destroy();
                return StartResult::Cancelled;
            }

            let handle = {
                let mut call_lock = call.lock().await;
                let handle = call_lock.play_input(input);
                let _ = handle.set_volume(volume_gain(st.volume));
                let _ = handle.add_event(
                    Event::Track(TrackEvent::End),
                    TrackEndAdapter {
                        player: self.clone(),
                        generation,
                    },
                );
                let _ = handle.add_event(
                    Event::Track(TrackEvent::Error),
                    TrackErrorAdapter {
                        player: self.clone(),
                        generation,
                    },
                );
                handle
            };

            st.phase = Phase::Playing {
                item: item.clone(),
                pipeline,
                handle,
                paused: false,
            };
        }

        info!("🎵 Reproduciendo: {} en guild {}", item.title, self.guild_id);
        self.notify_now_playing(&item).await;
        StartResult::Playing
    }

    async fn fail_load(&self, generation: u64, err: PlayerError) -> StartResult {
        let mut st = self.state.lock().await;
        if st.generation != generation {
            return StartResult::Cancelled;
        }
        st.phase = Phase::Idle;
        StartResult::Failed(err)
    }

    /// Transición por evento del sink: el track llegó a su fin.
    async fn on_track_end(self: &Arc<Self>, generation: u64) {
        let step = {
            let mut st = self.state.lock().await;
            if st.generation != generation || !matches!(st.phase, Phase::Playing { .. }) {
                return;
            }
            let Phase::Playing {
                item, mut pipeline, ..
            } = mem::replace(&mut st.phase, Phase::Idle)
            else {
                unreachable!()
            };
            pipeline.destroy();
            st.resolve_outcome(item, TrackOutcome::Finished)
        };

        self.drive(step).await;
    }

    /// Transición por evento del sink: error con el track en vivo. Un
    /// reintento automático por instancia de track; al segundo error el
    /// item se abandona.
    async fn on_track_error(self: &Arc<Self>, generation: u64) {
        let (step, item) = {
            let mut st = self.state.lock().await;
            if st.generation != generation || !matches!(st.phase, Phase::Playing { .. }) {
                return;
            }
            let Phase::Playing {
                item,
                mut pipeline,
                handle,
                ..
            } = mem::replace(&mut st.phase, Phase::Idle)
            else {
                unreachable!()
            };
            pipeline.destroy();
            let _ = handle.stop();
            let step = st.resolve_outcome(item.clone(), TrackOutcome::Errored);
            (step, item)
        };

        if matches!(step, NextStep::Replay { retry: true, .. }) {
            warn!(
                "🔄 Error de stream en guild {}, reintentando: {}",
                self.guild_id, item.title
            );
            self.notify(
                item.text_channel_id,
                format!("🔄 Error de stream, reintentando: **{}**", item.title),
            )
            .await;
        } else {
            self.notify_unplayable(&item).await;
        }

        self.drive(step).await;
    }

    /// La cola quedó confirmada vacía: quedar Idle y soltar la voz.
    async fn settle(&self, channel: ChannelId) {
        {
            let mut st = self.state.lock().await;
            st.phase = Phase::Idle;
            st.skip_requested = false;
            st.restart_attempted = false;
        }

        info!("📭 Cola vacía en guild {}", self.guild_id);
        self.leave_voice().await;
        self.notify(channel, "📭 Cola vacía — desconectado del canal de voz".to_string())
            .await;
    }

    /// La conexión de voz se comparte entre todos los tracks del guild; solo
    /// se crea si no existe todavía.
    async fn join_voice(&self, channel: ChannelId) -> Result<Arc<Mutex<Call>>, PlayerError> {
        if let Some(call) = self.songbird.get(self.guild_id) {
            return Ok(call);
        }

        let call = self
            .songbird
            .join(self.guild_id, channel)
            .await
            .map_err(|e| PlayerError::Stream(format!("no se pudo conectar a voz: {e}")))?;

        {
            let mut call_lock = call.lock().await;
            call_lock.set_bitrate(Bitrate::BitsPerSecond(self.config.opus_bitrate as i32));
        }

        info!("🔊 Conectado al canal de voz en guild {}", self.guild_id);
        Ok(call)
    }

    async fn leave_voice(&self) {
        if self.songbird.get(self.guild_id).is_some() {
            if let Err(e) = self.songbird.remove(self.guild_id).await {
                debug!("No se pudo soltar la conexión de voz: {}", e);
            } else {
                info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
            }
        }
    }

    async fn notify_now_playing(&self, item: &QueueItem) {
        let message = CreateMessage::new().embed(embeds::now_playing(item));
        if let Err(e) = item.text_channel_id.send_message(&self.http, message).await {
            warn!("No se pudo enviar 'now playing': {}", e);
        }
    }

    async fn notify_unplayable(&self, item: &QueueItem) {
        self.notify(
            item.text_channel_id,
            format!("⏭️ Saltada, no se pudo reproducir: **{}**", item.title),
        )
        .await;
    }

    async fn notify(&self, channel: ChannelId, text: String) {
        let message = CreateMessage::new().content(text);
        if let Err(e) = channel.send_message(&self.http, message).await {
            warn!("No se pudo notificar al canal {}: {}", channel, e);
        }
    }
}

/// Recorta el volumen pedido al dominio `[0, 1000]`.
fn clamp_volume(requested: i64) -> u16 {
    requested.clamp(0, 1000) as u16
}

/// Curva logarítmica de volumen: 100 ≡ ganancia 1.0.
fn volume_gain(percent: u16) -> f32 {
    (f32::from(percent) / 100.0).powf(1.660_964)
}

/// Adaptadores finos del sink: traducen los callbacks asíncronos del driver
/// a transiciones explícitas del motor, llevando la generación con la que
/// nacieron para que los eventos rezagados se descarten.
struct TrackEndAdapter {
    player: Arc<GuildPlayer>,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndAdapter {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.player.on_track_end(self.generation).await;
        None
    }
}

struct TrackErrorAdapter {
    player: Arc<GuildPlayer>,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorAdapter {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.player.on_track_error(self.generation).await;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn item(title: &str) -> QueueItem {
        QueueItem {
            title: title.to_string(),
            source: format!("https://example.com/{title}"),
            requested_by: UserId::new(1),
            guild_id: GuildId::new(1),
            voice_channel_id: ChannelId::new(2),
            text_channel_id: ChannelId::new(3),
        }
    }

    fn state(loop_mode: LoopMode, queued: &[&str]) -> PlayerState {
        let mut queue = TrackQueue::new(100);
        for title in queued {
            queue.push(item(title)).unwrap();
        }
        PlayerState {
            queue,
            phase: Phase::Idle,
            loop_mode,
            volume: 100,
            skip_requested: false,
            restart_attempted: false,
            generation: 0,
        }
    }

    /// Simula lo que `try_start` hace con los flags al cargar un paso.
    fn apply_load(st: &mut PlayerState, step: &NextStep) {
        if let NextStep::Replay { retry, .. } = step {
            st.restart_attempted = *retry;
        } else {
            st.restart_attempted = false;
        }
    }

    #[test]
    fn test_fifo_advance_order() {
        let mut st = state(LoopMode::Off, &["b", "c"]);

        let step = st.resolve_outcome(item("a"), TrackOutcome::Finished);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "b");

        let step = st.resolve_outcome(next, TrackOutcome::Finished);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "c");

        let step = st.resolve_outcome(next, TrackOutcome::Finished);
        assert!(matches!(step, NextStep::Settle { .. }));
    }

    #[test]
    fn test_retry_once_then_abandon() {
        let mut st = state(LoopMode::Off, &["b"]);
        let mut attempts = 1; // la reproducción original

        // Primer error: un único reintento automático del mismo item
        let step = st.resolve_outcome(item("a"), TrackOutcome::Errored);
        let NextStep::Replay { item: same, retry } = step else {
            panic!("esperaba Replay")
        };
        assert!(retry);
        assert_eq!(same.title, "a");
        attempts += 1;
        apply_load(&mut st, &NextStep::Replay { item: same.clone(), retry });

        // Segundo error: el item se abandona y se avanza
        let step = st.resolve_outcome(same, TrackOutcome::Errored);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "b");
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_retry_flag_resets_on_fresh_load() {
        let mut st = state(LoopMode::Off, &[]);

        let step = st.resolve_outcome(item("a"), TrackOutcome::Errored);
        assert!(matches!(step, NextStep::Replay { retry: true, .. }));
        apply_load(&mut st, &step);
        assert!(st.restart_attempted);

        // Una carga fresca (avance normal) limpia el flag
        apply_load(&mut st, &NextStep::Advance(item("b")));
        assert!(!st.restart_attempted);

        // ...y el siguiente track vuelve a tener su propio reintento
        let step = st.resolve_outcome(item("b"), TrackOutcome::Errored);
        assert!(matches!(step, NextStep::Replay { retry: true, .. }));
    }

    #[test]
    fn test_loop_track_replays_without_touching_queue() {
        let mut st = state(LoopMode::Track, &["b"]);

        for _ in 0..5 {
            let step = st.resolve_outcome(item("a"), TrackOutcome::Finished);
            let NextStep::Replay { item: same, retry } = step else {
                panic!("esperaba Replay")
            };
            assert_eq!(same.title, "a");
            assert!(!retry);
            // La cola no cambia con los replays
            assert_eq!(st.queue.len(), 1);
        }
    }

    #[test]
    fn test_skip_suppresses_track_loop() {
        let mut st = state(LoopMode::Track, &["b"]);
        st.skip_requested = true;

        let step = st.resolve_outcome(item("a"), TrackOutcome::Finished);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "b");

        // El flag solo gobierna ese cierre
        assert!(!st.skip_requested);
        let step = st.resolve_outcome(next, TrackOutcome::Finished);
        assert!(matches!(step, NextStep::Replay { .. }));
    }

    #[test]
    fn test_loop_queue_rotates_without_duplicating() {
        let mut st = state(LoopMode::Queue, &["b"]);

        // Termina a: se reencola al final y avanza b
        let step = st.resolve_outcome(item("a"), TrackOutcome::Finished);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "b");
        assert_eq!(st.queue.len(), 1);

        // Termina b: vuelve a quedar [b] en cola y suena a — rotación, no
        // duplicación
        let step = st.resolve_outcome(next, TrackOutcome::Finished);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "a");
        assert_eq!(st.queue.len(), 1);
        assert_eq!(st.queue.snapshot()[0].title, "b");
    }

    #[test]
    fn test_abandoned_after_retry_is_not_requeued_by_loop_queue() {
        let mut st = state(LoopMode::Queue, &["b"]);
        st.restart_attempted = true;

        let step = st.resolve_outcome(item("a"), TrackOutcome::Errored);
        let NextStep::Advance(next) = step else { panic!("esperaba Advance") };
        assert_eq!(next.title, "b");
        // El item abandonado no vuelve a la cola
        assert!(st.queue.is_empty());
    }

    #[test]
    fn test_volume_clamp() {
        assert_eq!(clamp_volume(-5), 0);
        assert_eq!(clamp_volume(0), 0);
        assert_eq!(clamp_volume(100), 100);
        assert_eq!(clamp_volume(1000), 1000);
        assert_eq!(clamp_volume(5000), 1000);
    }

    #[test]
    fn test_volume_gain_curve() {
        assert_eq!(volume_gain(0), 0.0);
        assert!((volume_gain(100) - 1.0).abs() < 1e-6);
        // Monótona creciente
        assert!(volume_gain(50) < volume_gain(100));
        assert!(volume_gain(100) < volume_gain(1000));
    }
}
