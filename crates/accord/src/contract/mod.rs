//! Contracts and their on-disk store.

mod wire;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Error;
use crate::interaction::Interaction;

/// The contract specification version written into new files.
pub const SPECIFICATION_VERSION: &str = "2.0.0";

/// Everything one consumer expects of one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub consumer: String,
    pub provider: String,
    pub specification_version: String,
    interactions: Vec<Interaction>,
}

impl Contract {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Contract {
            consumer: consumer.into(),
            provider: provider.into(),
            specification_version: SPECIFICATION_VERSION.to_string(),
            interactions: Vec::new(),
        }
    }

    /// Adds an interaction, replacing any existing one with the same
    /// identity so re-registering an expectation updates it in place.
    pub fn add_interaction(&mut self, interaction: Interaction) {
        match self
            .interactions
            .iter_mut()
            .find(|existing| existing.id() == interaction.id())
        {
            Some(existing) => *existing = interaction,
            None => self.interactions.push(interaction),
        }
    }

    /// Interactions in registration order.
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.consumer, self.provider)
    }
}

/// Reads and writes contracts in a directory, one JSON file per
/// consumer/provider pair named `{consumer}-{provider}.json`.
#[derive(Debug, Clone)]
pub struct ContractStore {
    dir: PathBuf,
}

impl ContractStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ContractStore { dir: dir.into() }
    }

    pub fn path_for(&self, consumer: &str, provider: &str) -> PathBuf {
        self.dir.join(format!("{consumer}-{provider}.json"))
    }

    /// Serializes the contract, creating the store directory on first
    /// use and overwriting any previous file for the same pair.
    pub fn save(&self, contract: &Contract) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(contract.file_name());
        let file = wire::ContractFile::from(contract);
        let json = serde_json::to_string_pretty(&file).map_err(|err| Error::ContractFormat {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        fs::write(&path, json)?;
        info!(
            "saved contract between '{}' and '{}' ({} interactions) to {}",
            contract.consumer,
            contract.provider,
            contract.interactions.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn load(&self, consumer: &str, provider: &str) -> Result<Contract, Error> {
        Self::load_file(self.path_for(consumer, provider))
    }

    /// Loads a contract from an explicit path, validating rules (regex
    /// patterns included) so that matching stays total afterwards.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Contract, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ContractNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = fs::read_to_string(path)?;
        let file: wire::ContractFile =
            serde_json::from_str(&json).map_err(|err| Error::ContractFormat {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let contract = Contract::try_from(file).map_err(|reason| Error::ContractFormat {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(
            "loaded contract between '{}' and '{}' ({} interactions) from {}",
            contract.consumer,
            contract.provider,
            contract.interactions.len(),
            path.display()
        );
        Ok(contract)
    }
}
