pub mod component;
pub mod config;
pub mod nn;
mod output;
pub mod ppo;

pub use config::{ActionSpace, LstmPpoModule, MlpPpoModule, PpoModuleConfig};
pub use output::{ForwardMode, ModuleOutput};
pub use ppo::PpoModule;
