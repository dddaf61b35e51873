pub mod hub;
pub mod settings;

pub use hub::HubError;
pub use settings::SettingsError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Hub(#[from] hub::HubError),

    #[error(transparent)]
    Settings(#[from] settings::SettingsError),
}
