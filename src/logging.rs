use tracing::{Level, debug};

/// Настраивает вывод логов в stderr
///
/// Неизвестный уровень превращается в `info`.
pub fn init(level: &str) {
    let level = level.parse().unwrap_or(Level::INFO);
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
    if let Err(e) = installed {
        // в тестах подписчик уже установлен
        debug!("логгер уже настроен: {e}");
    }
}

#[cfg(test)]
mod test_logging {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init("debug");
        init("nonsense");
    }
}
