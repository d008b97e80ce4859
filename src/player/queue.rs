use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::PlayerError;

/// Una petición de reproducción.
///
/// `source` guarda la consulta o URL original: la URL directa de streaming
/// caduca, así que se vuelve a resolver cada vez que el track va a sonar.
/// Inmutable una vez creado; el loop de cola lo reencola tal cual.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub title: String,
    pub source: String,
    pub requested_by: UserId,
    pub guild_id: GuildId,
    pub voice_channel_id: ChannelId,
    pub text_channel_id: ChannelId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Off,
    Track,
    Queue,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

impl FromStr for LoopMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "track" => Ok(LoopMode::Track),
            "queue" => Ok(LoopMode::Queue),
            other => Err(PlayerError::InvalidLoopMode(other.to_string())),
        }
    }
}

/// Cola FIFO de un guild: el orden de inserción es el orden de reproducción,
/// salvo que loop/shuffle lo alteren explícitamente.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<QueueItem>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola.
    pub fn push(&mut self, item: QueueItem) -> Result<(), PlayerError> {
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }
        info!("➕ Agregado a la cola: {}", item.title);
        self.items.push_back(item);
        Ok(())
    }

    /// Agrega múltiples tracks (playlist); devuelve cuántos entraron.
    pub fn push_batch(&mut self, items: Vec<QueueItem>) -> usize {
        let available = self.max_size.saturating_sub(self.items.len());
        let to_add = items.len().min(available);

        for item in items.into_iter().take(to_add) {
            self.items.push_back(item);
        }

        info!("➕ Agregadas {} canciones a la cola", to_add);
        to_add
    }

    /// Saca el siguiente track en orden FIFO.
    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// Reencola un item al final (loop de cola).
    pub fn requeue(&mut self, item: QueueItem) {
        info!("🔁 Track reencolado al final: {}", item.title);
        self.items.push_back(item);
    }

    /// Elimina el track en la posición 1-based indicada.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueItem, PlayerError> {
        if index == 0 || index > self.items.len() {
            return Err(PlayerError::InvalidIndex {
                index,
                len: self.items.len(),
            });
        }

        // remove() nunca falla aquí: el índice ya está validado
        let item = self.items.remove(index - 1).expect("índice validado");
        info!("❌ Track eliminado en posición {}: {}", index, item.title);
        Ok(item)
    }

    /// Mezcla la cola restante (Fisher–Yates in situ). Con menos de dos
    /// elementos no hay nada que mezclar.
    pub fn shuffle(&mut self) -> bool {
        if self.items.len() < 2 {
            return false;
        }

        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} canciones)", self.items.len());
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn test_fifo_order() {
        let mut queue = TrackQueue::new(10);
        queue.push(item("a")).unwrap();
        queue.push(item("b")).unwrap();
        queue.push(item("c")).unwrap();

        assert_eq!(queue.pop_front().unwrap().title, "a");
        assert_eq!(queue.pop_front().unwrap().title, "b");
        assert_eq!(queue.pop_front().unwrap().title, "c");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_remove_at_bounds() {
        let mut queue = TrackQueue::new(10);
        queue.push(item("a")).unwrap();
        queue.push(item("b")).unwrap();

        assert!(matches!(
            queue.remove_at(0),
            Err(PlayerError::InvalidIndex { index: 0, len: 2 })
        ));
        assert!(matches!(
            queue.remove_at(3),
            Err(PlayerError::InvalidIndex { index: 3, len: 2 })
        ));
        // La cola queda intacta tras los rechazos
        assert_eq!(queue.len(), 2);

        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.title, "a");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_front().unwrap().title, "b");
    }

    #[test]
    fn test_shuffle_below_two_items_is_noop() {
        let mut queue = TrackQueue::new(10);
        assert!(!queue.shuffle());

        queue.push(item("solo")).unwrap();
        assert!(!queue.shuffle());
        assert_eq!(queue.pop_front().unwrap().title, "solo");
    }

    #[test]
    fn test_shuffle_keeps_all_items() {
        let mut queue = TrackQueue::new(20);
        for i in 0..12 {
            queue.push(item(&format!("t{i}"))).unwrap();
        }

        queue.shuffle();
        assert_eq!(queue.len(), 12);

        let mut titles: Vec<String> = queue.snapshot().into_iter().map(|i| i.title).collect();
        titles.sort();
        let mut expected: Vec<String> = (0..12).map(|i| format!("t{i}")).collect();
        expected.sort();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_queue_capacity() {
        let mut queue = TrackQueue::new(2);
        queue.push(item("a")).unwrap();
        queue.push(item("b")).unwrap();
        assert!(matches!(queue.push(item("c")), Err(PlayerError::QueueFull(2))));

        // push_batch recorta en vez de fallar
        let mut queue = TrackQueue::new(3);
        queue.push(item("a")).unwrap();
        let added = queue.push_batch(vec![item("b"), item("c"), item("d")]);
        assert_eq!(added, 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_loop_mode_parse() {
        assert_eq!("off".parse::<LoopMode>().unwrap(), LoopMode::Off);
        assert_eq!("Track".parse::<LoopMode>().unwrap(), LoopMode::Track);
        assert_eq!(" queue ".parse::<LoopMode>().unwrap(), LoopMode::Queue);
        assert!(matches!(
            "always".parse::<LoopMode>(),
            Err(PlayerError::InvalidLoopMode(_))
        ));
    }
}
