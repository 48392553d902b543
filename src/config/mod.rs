//! Configuration module for ytaudio.
//!
//! Settings are loaded once into an immutable value and passed down by reference.

mod settings;

pub use settings::{
    ApiSettings, DownloadSettings, GeneralSettings, NetworkSettings, Settings,
    ValidatedSettings, API_KEY_ENV,
};
