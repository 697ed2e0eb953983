use std::sync::Once;

use env_logger::{Builder, Env, WriteStyle};
use log::LevelFilter;

/// How the process-wide logger is set up.
///
/// `filter` takes `env_logger` directives such as `"brushwork_evo=debug"` and
/// wins over `RUST_LOG`. With neither set, `level` applies and the wgpu crates
/// are held at `warn`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub level: LevelFilter,
    pub style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: None, level: LevelFilter::Info, style: WriteStyle::Auto }
    }
}

impl LoggingConfig {
    /// Debug output for the brushwork crates only.
    pub fn verbose() -> Self {
        Self { filter: Some("info,brushwork_engine=debug,brushwork_evo=debug".into()), ..Self::default() }
    }

    fn directives(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!("{},wgpu_core=warn,wgpu_hal=warn", self.level.as_str().to_lowercase()),
        }
    }
}

static INSTALLED: Once = Once::new();

/// Installs `env_logger` behind the `log` facade. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INSTALLED.call_once(|| {
        let mut builder = match config.filter {
            Some(_) => {
                let mut b = Builder::new();
                b.parse_filters(&config.directives());
                b
            }
            None => Builder::from_env(Env::default().default_filter_or(config.directives())),
        };
        builder.write_style(config.style).format_timestamp_millis();

        // A test harness may have installed its own logger already.
        if builder.try_init().is_ok() {
            log::debug!("logger installed");
        }
    });
}
