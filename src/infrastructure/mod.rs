// Adapters: tools run as child processes, files on disk, and the models
// backing the active-model selector.

pub mod config_file;
pub mod dynamic_model;
pub mod models;
pub mod nm_runner;
pub mod settings;

pub use dynamic_model::DynamicModel;
pub use models::{BaseModel, StaticModel, TracerModelFactory};
pub use nm_runner::NmSymbolExtractor;
pub use settings::Settings;
