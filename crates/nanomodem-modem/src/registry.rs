use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ModemError, Result};
use crate::simulated::{SimulatedConfig, SimulatedModem};
use crate::traits::{DynModem, SatelliteModem};

/// Known modem models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModemModel {
    Simulated,
    QuectelCc200a,
    SkywaveSt2Ogx,
    Unknown,
}

impl ModemModel {
    pub const ALL: [ModemModel; 4] = [
        ModemModel::Simulated,
        ModemModel::QuectelCc200a,
        ModemModel::SkywaveSt2Ogx,
        ModemModel::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModemModel::Simulated => "simulated",
            ModemModel::QuectelCc200a => "quectel-cc200a",
            ModemModel::SkywaveSt2Ogx => "skywave-st2-ogx",
            ModemModel::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ModemModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical link parameters handed to vendor factories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Serial device path.
    pub port: String,
    pub baudrate: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
        }
    }
}

/// Builds a vendor capability for a link.
pub type ModemFactory = Box<dyn Fn(&LinkSettings) -> Result<DynModem> + Send + Sync>;

/// Model-keyed table of vendor implementations.
///
/// Vendors are registered statically at startup; nothing is discovered or
/// loaded at runtime.
pub struct ModemRegistry {
    factories: BTreeMap<ModemModel, ModemFactory>,
}

impl ModemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the implementations that ship with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ModemModel::Simulated, |_settings| {
            Ok(Box::new(SimulatedModem::new(SimulatedConfig::default())) as DynModem)
        });
        registry
    }

    /// Register (or replace) the factory for a model.
    pub fn register<F>(&mut self, model: ModemModel, factory: F)
    where
        F: Fn(&LinkSettings) -> Result<DynModem> + Send + Sync + 'static,
    {
        if self.factories.insert(model, Box::new(factory)).is_some() {
            debug!(%model, "replaced modem factory");
        }
    }

    pub fn contains(&self, model: ModemModel) -> bool {
        self.factories.contains_key(&model)
    }

    /// Registered models, in declaration order.
    pub fn models(&self) -> Vec<ModemModel> {
        self.factories.keys().copied().collect()
    }

    /// Build the capability for a model.
    pub fn create(&self, model: ModemModel, settings: &LinkSettings) -> Result<DynModem> {
        let factory = self
            .factories
            .get(&model)
            .ok_or_else(|| ModemError::UnknownModel(model.to_string()))?;
        factory(settings)
    }

    /// Identify the attached modem with a generic probe and build the matching
    /// vendor implementation.
    ///
    /// The probe is connected only long enough to read the model. When no
    /// vendor is registered for the reported model, the probe itself is
    /// returned so callers can fall back to generic behaviour.
    pub fn detect(&self, mut probe: DynModem, settings: &LinkSettings) -> Result<DynModem> {
        probe.connect()?;
        let model = probe.get_model();
        if let Err(err) = probe.disconnect() {
            debug!(error = %err, "probe disconnect failed");
        }
        let model = model?;

        if self.contains(model) {
            info!(%model, port = %settings.port, "detected modem model");
            self.create(model, settings)
        } else {
            info!(%model, "no vendor implementation registered, using generic modem");
            Ok(probe)
        }
    }
}

impl Default for ModemRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for ModemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModemRegistry")
            .field("models", &self.models())
            .finish()
    }
}
