//! # Key Vault Ops
//!
//! Typed Azure Key Vault operations built on the Azure CLI.
//!
//! Every operation validates its identifiers, builds an [`AzCommand`]
//! (`-o json`), runs it through a [`CommandRunner`] and decodes the output
//! into the records in [`types`]. Failures come back as [`KeyVaultError`],
//! classified from the CLI's stderr. A validation failure never reaches the
//! CLI.
//!
//! [`AzCommand`]: az_cli_runner::AzCommand

mod account;
mod certificates;
mod error;
mod exec;
mod keys;
mod resource_id;
mod secrets;
mod status;
pub mod timestamp;
pub mod types;
pub mod validation;
mod vaults;
mod wire;

use az_cli_runner::CommandRunner;
use std::sync::Arc;

pub use account::AccountService;
pub use certificates::CertificateService;
pub use error::{classify_failure, KeyVaultError};
pub use keys::KeyService;
pub use resource_id::ResourceId;
pub use secrets::SecretService;
pub use status::ResourceStatus;
pub use types::{
    AccountInfo, AccountUser, AttributesUpdate, CertificateCreateInput, CertificateEncoding,
    CertificateImportInput, CertificateInfo, CertificateOperation, DeletedCertificateInfo,
    DeletedKeyInfo, DeletedSecretInfo, DeletionInfo, KeyCreateInput, KeyCurve, KeyInfo, KeyType,
    ResourceAttributes, RoleAssignment, SecretInfo, SecretSetInput, SignedInUser, Tags,
    VaultCreateInput, VaultInfo, VaultSku,
};
pub use validation::ValidationError;
pub use vaults::VaultService;

/// All services over one shared runner.
#[derive(Clone)]
pub struct KeyVaultClient {
    pub vaults: VaultService,
    pub secrets: SecretService,
    pub keys: KeyService,
    pub certificates: CertificateService,
    pub account: AccountService,
}

impl KeyVaultClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            vaults: VaultService::new(runner.clone()),
            secrets: SecretService::new(runner.clone()),
            keys: KeyService::new(runner.clone()),
            certificates: CertificateService::new(runner.clone()),
            account: AccountService::new(runner),
        }
    }
}
