//! Configuration module for the provisioning system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `osac.yaml`
//! - Validation of declarations
//! - Computing declaration hashes for change detection

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::{ConfigHasher, DeclarationHash};
pub use parser::{find_config_file, ConfigParser, ENDPOINT_ENV, STATE_PATH_ENV, TOKEN_ENV};
pub use spec::{
    ClusterDeclaration, ComputeInstanceDeclaration, HostDeclaration, HostPoolDeclaration,
    OsacConfig, ProviderConfig, SetDeclaration, StateConfig, TimeoutsConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
