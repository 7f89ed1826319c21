#[cfg(feature = "native-audio")]
pub mod audio_cpal;
pub mod cloud_speech;
pub mod config_store;
pub mod privacy_guard;

#[cfg(feature = "native-audio")]
pub use audio_cpal::CpalAudioCapture;
pub use cloud_speech::CloudSpeechClient;
pub use config_store::TomlConfigStore;
pub use privacy_guard::PrivacyGuard;
