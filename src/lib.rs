// Базовые модули
pub mod consts;
pub mod error;
pub mod config;
pub mod metrics;
pub mod util;   // src/util/mod.rs

// Хранилище: метаданные + файлы меток
pub mod meta;
pub mod persistence; // src/persistence/{mod,disk_state,writer}.rs

// Вычисление меток
pub mod difficulty;
pub mod oracle; // src/oracle/{mod,cpu}.rs

// Оркестратор
pub mod cancel;
pub mod lock;
pub mod init;   // src/init/{mod,core,run,verify,reset}.rs

pub mod cli;

// Удобные реэкспорты
pub use cancel::CancelToken;
pub use config::{InitOpts, InitOptsBuilder, PostConfig};
pub use difficulty::{difficulty, Difficulty};
pub use error::{InitError, Result};
pub use init::{Initializer, Status};
pub use meta::Metadata;
pub use oracle::{
    cpu_provider_id, providers, ComputeProvider, CpuProvider, ProviderInfo, ProviderKind,
    ProviderRegistry, WorkOutput, WorkRequest, CPU_PROVIDER_ID,
};
