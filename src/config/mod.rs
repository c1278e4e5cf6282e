mod settings;

pub use settings::{
    DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS, NotificationConfig, Notifications, Settings,
    SlackConfig, load_settings, load_settings_from,
};
