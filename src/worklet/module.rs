use std::{future::Future, path::PathBuf, sync::Arc};

use crate::error::{Result, SynthError};

/// Name under which the envelope processor is registered.
pub const ENVELOPE_PROCESSOR: &str = "saavy-envelope-generator";

const BUILTIN_PAYLOAD: &[u8] = b"saavy-envelope-generator/1";

/// Where the envelope processor module and its payload come from.
///
/// Initialization awaits `load_module` first and `fetch_payload` second; both
/// happen once per signal chain, not once per voice.
pub trait ModuleSource {
    fn load_module(&self, name: &str) -> impl Future<Output = Result<()>>;

    fn fetch_payload(&self) -> impl Future<Output = Result<Arc<[u8]>>>;
}

/// Payload held in memory.
#[derive(Debug, Clone)]
pub struct StaticModuleSource {
    payload: Arc<[u8]>,
}

impl StaticModuleSource {
    pub fn new(payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The payload shipped with the crate.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PAYLOAD)
    }
}

impl Default for StaticModuleSource {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModuleSource for StaticModuleSource {
    async fn load_module(&self, name: &str) -> Result<()> {
        check_name(name)
    }

    async fn fetch_payload(&self) -> Result<Arc<[u8]>> {
        Ok(self.payload.clone())
    }
}

/// Payload read from `<dir>/<processor name>.bin`.
#[derive(Debug, Clone)]
pub struct FsModuleSource {
    dir: PathBuf,
}

impl FsModuleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn payload_path(&self) -> PathBuf {
        self.dir.join(format!("{ENVELOPE_PROCESSOR}.bin"))
    }
}

impl ModuleSource for FsModuleSource {
    async fn load_module(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let path = self.payload_path();
        tokio::fs::metadata(&path)
            .await
            .map_err(|err| SynthError::ModuleLoad {
                name: name.to_string(),
                reason: format!("{}: {err}", path.display()),
            })?;
        Ok(())
    }

    async fn fetch_payload(&self) -> Result<Arc<[u8]>> {
        let path = self.payload_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| SynthError::PayloadFetch(format!("{}: {err}", path.display())))?;
        log::debug!("fetched {} byte payload from {}", bytes.len(), path.display());
        Ok(Arc::from(bytes))
    }
}

fn check_name(name: &str) -> Result<()> {
    if name == ENVELOPE_PROCESSOR {
        Ok(())
    } else {
        Err(SynthError::ModuleLoad {
            name: name.to_string(),
            reason: "no such processor".into(),
        })
    }
}
