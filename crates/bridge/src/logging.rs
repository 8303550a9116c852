// Logger bootstrap for the native entry points

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install the platform log backend once per process.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(feature = "android")]
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("Nowplay"),
        );

        #[cfg(not(feature = "android"))]
        {
            // Another logger may already be installed by the embedding app
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(log::LevelFilter::Info)
                .parse_default_env()
                .try_init();
        }
    });
}
