//! oracle - compute providers that produce label bytes for a position range.
//!
//! The initializer only sees the `ComputeProvider` trait; backends are
//! registered in a `ProviderRegistry` and looked up by id. The CPU backend is
//! always present under `CPU_PROVIDER_ID`.

use std::fmt;
use std::sync::Arc;

use crate::difficulty::Difficulty;
use crate::error::{InitError, Result};

pub mod cpu;

pub use cpu::CpuProvider;

pub const CPU_PROVIDER_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Cpu,
    Gpu,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Cpu => write!(f, "cpu"),
            ProviderKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// One oracle call: labels for positions `start..=end`.
#[derive(Debug, Clone, Copy)]
pub struct WorkRequest<'a> {
    pub commitment: &'a [u8; 32],
    pub start: u64,
    pub end: u64,
    pub bits_per_label: u32,
    pub difficulty: &'a Difficulty,
}

impl WorkRequest<'_> {
    /// Positions in `start..=end`. Errors on an empty or unrepresentable range.
    pub fn num_labels(&self) -> Result<u64> {
        self.end
            .checked_sub(self.start)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| {
                InitError::Oracle(format!(
                    "invalid position range {}..={}",
                    self.start, self.end
                ))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkOutput {
    /// Labels packed LSB-first, `ceil(n * bits_per_label / 8)` bytes.
    pub output: Vec<u8>,
    /// First position in range whose PoW value meets the difficulty.
    pub nonce: Option<u64>,
}

pub trait ComputeProvider: Send + Sync {
    fn id(&self) -> u32;
    fn model(&self) -> &str;
    fn kind(&self) -> ProviderKind;

    fn compute(&self, req: &WorkRequest<'_>) -> Result<WorkOutput>;

    /// Abort an in-flight `compute` as soon as possible.
    fn stop(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: u32,
    pub model: String,
    pub kind: ProviderKind,
}

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ComputeProvider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register(Arc::new(CpuProvider::new()));
        r
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider; one with the same id is replaced.
    pub fn register(&mut self, p: Arc<dyn ComputeProvider>) {
        self.providers.retain(|x| x.id() != p.id());
        self.providers.push(p);
        self.providers.sort_by_key(|x| x.id());
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.id(),
                model: p.model().to_string(),
                kind: p.kind(),
            })
            .collect()
    }

    pub fn cpu_provider_id(&self) -> Option<u32> {
        self.providers
            .iter()
            .find(|p| p.kind() == ProviderKind::Cpu)
            .map(|p| p.id())
    }

    /// None resolves to the CPU provider.
    pub fn resolve(&self, id: Option<u32>) -> Result<Arc<dyn ComputeProvider>> {
        let id = match id {
            Some(id) => id,
            None => self
                .cpu_provider_id()
                .ok_or(InitError::UnknownProvider(CPU_PROVIDER_ID))?,
        };
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or(InitError::UnknownProvider(id))
    }
}

/// Providers available in this build.
pub fn providers() -> Vec<ProviderInfo> {
    ProviderRegistry::default().providers()
}

/// Id of the CPU provider, if present.
pub fn cpu_provider_id() -> Option<u32> {
    ProviderRegistry::default().cpu_provider_id()
}
