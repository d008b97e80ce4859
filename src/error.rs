use thiserror::Error;

/// Errores del dominio de reproducción.
///
/// Ningún error de resolución o de pipeline escapa del motor: cada variante
/// tiene una recuperación definida (avanzar, reintentar una vez, o rechazo
/// visible para el usuario).
#[derive(Debug, Error)]
pub enum PlayerError {
    /// El resolvedor externo no devolvió una URL reproducible.
    #[error("no se encontró una fuente reproducible: {0}")]
    Resolution(String),

    /// El binario transcodificador no existe o no pudo arrancar.
    #[error("no se pudo iniciar el transcodificador: {0}")]
    PipelineSpawn(#[from] std::io::Error),

    /// El sink reportó un error con el pipeline ya en vivo.
    #[error("error de stream durante la reproducción: {0}")]
    Stream(String),

    /// Índice 1-based fuera de `[1, len]`.
    #[error("índice fuera de rango: {index} (la cola tiene {len} canciones)")]
    InvalidIndex { index: usize, len: usize },

    /// Volumen fuera del dominio permitido.
    #[error("volumen inválido: {0} (permitido 0-1000)")]
    InvalidVolume(i64),

    /// Modo de repetición desconocido.
    #[error("modo de repetición inválido: {0} (usa off, track o queue)")]
    InvalidLoopMode(String),

    /// La cola alcanzó su capacidad máxima.
    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),
}
