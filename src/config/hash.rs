//! Declaration hashing for change detection.
//!
//! Every declared resource gets two hashes: a spec hash covering all declared
//! fields, and a replace hash covering only the fields the fulfillment API
//! cannot change in place. A changed spec hash plans an update; a changed
//! replace hash plans a replacement.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use super::spec::{
    ClusterDeclaration, ComputeInstanceDeclaration, HostDeclaration, HostPoolDeclaration,
    OsacConfig, SetDeclaration,
};
use crate::resources::ResourceType;

/// Spec and replace hashes of one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationHash {
    /// Hash of every declared field.
    pub spec: String,
    /// Hash of the fields that force a replacement.
    pub replace: String,
}

/// Hasher for computing declaration hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire configuration.
    ///
    /// This hash changes when any declaration changes.
    #[must_use]
    pub fn hash_config(&self, config: &OsacConfig) -> String {
        let mut hasher = Sha256::new();

        update_str(&mut hasher, &config.provider.endpoint);

        for (key, cluster) in &config.clusters {
            update_str(&mut hasher, key);
            update_str(&mut hasher, &self.hash_cluster(cluster).spec);
        }
        for (key, instance) in &config.compute_instances {
            update_str(&mut hasher, key);
            update_str(&mut hasher, &self.hash_compute_instance(instance).spec);
        }
        for (key, host) in &config.hosts {
            update_str(&mut hasher, key);
            update_str(&mut hasher, &self.hash_host(host).spec);
        }
        for (key, pool) in &config.host_pools {
            update_str(&mut hasher, key);
            update_str(&mut hasher, &self.hash_host_pool(pool).spec);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes the hashes of a declared resource, if it is declared.
    #[must_use]
    pub fn hash_resource(
        &self,
        config: &OsacConfig,
        kind: ResourceType,
        key: &str,
    ) -> Option<DeclarationHash> {
        match kind {
            ResourceType::Cluster => config.clusters.get(key).map(|d| self.hash_cluster(d)),
            ResourceType::ComputeInstance => config
                .compute_instances
                .get(key)
                .map(|d| self.hash_compute_instance(d)),
            ResourceType::Host => config.hosts.get(key).map(|d| self.hash_host(d)),
            ResourceType::HostPool => config.host_pools.get(key).map(|d| self.hash_host_pool(d)),
        }
    }

    /// Computes the hashes of a cluster declaration.
    #[must_use]
    pub fn hash_cluster(&self, cluster: &ClusterDeclaration) -> DeclarationHash {
        let replace = template_hash(
            "cluster",
            &cluster.template,
            cluster.template_parameters.as_ref(),
        );

        let mut hasher = Sha256::new();
        update_str(&mut hasher, &replace);
        update_opt(&mut hasher, cluster.name.as_deref());
        update_sets(&mut hasher, cluster.node_sets.as_ref());

        DeclarationHash {
            spec: hex::encode(hasher.finalize()),
            replace,
        }
    }

    /// Computes the hashes of a compute instance declaration.
    #[must_use]
    pub fn hash_compute_instance(&self, instance: &ComputeInstanceDeclaration) -> DeclarationHash {
        let replace = template_hash(
            "compute_instance",
            &instance.template,
            instance.template_parameters.as_ref(),
        );

        let mut hasher = Sha256::new();
        update_str(&mut hasher, &replace);
        update_opt(&mut hasher, instance.name.as_deref());

        DeclarationHash {
            spec: hex::encode(hasher.finalize()),
            replace,
        }
    }

    /// Computes the hashes of a host declaration.
    ///
    /// Every host field can be changed in place.
    #[must_use]
    pub fn hash_host(&self, host: &HostDeclaration) -> DeclarationHash {
        let mut hasher = Sha256::new();
        update_str(&mut hasher, "host");
        update_opt(&mut hasher, host.name.as_deref());
        update_opt(&mut hasher, host.power_state.as_deref());

        DeclarationHash {
            spec: hex::encode(hasher.finalize()),
            replace: fixed_hash("host"),
        }
    }

    /// Computes the hashes of a host pool declaration.
    ///
    /// Every host pool field can be changed in place.
    #[must_use]
    pub fn hash_host_pool(&self, pool: &HostPoolDeclaration) -> DeclarationHash {
        let mut hasher = Sha256::new();
        update_str(&mut hasher, "host_pool");
        update_opt(&mut hasher, pool.name.as_deref());
        update_sets(&mut hasher, pool.host_sets.as_ref());

        DeclarationHash {
            spec: hex::encode(hasher.finalize()),
            replace: fixed_hash("host_pool"),
        }
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

/// Feeds a length-prefixed string so adjacent fields cannot run together.
fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn update_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([1u8]);
            update_str(hasher, value);
        }
        None => hasher.update([0u8]),
    }
}

fn update_sets(hasher: &mut Sha256, sets: Option<&BTreeMap<String, SetDeclaration>>) {
    let Some(sets) = sets else {
        hasher.update([0u8]);
        return;
    };

    hasher.update([1u8]);
    for (name, set) in sets {
        update_str(hasher, name);
        update_str(hasher, &set.host_class);
        hasher.update(set.size.to_be_bytes());
    }
}

fn template_hash(
    kind: &str,
    template: &str,
    parameters: Option<&BTreeMap<String, String>>,
) -> String {
    let mut hasher = Sha256::new();
    update_str(&mut hasher, kind);
    update_str(&mut hasher, template);

    // An absent map and an empty one encode the same way on the wire.
    for (name, value) in parameters.into_iter().flatten() {
        update_str(&mut hasher, name);
        update_str(&mut hasher, value);
    }

    hex::encode(hasher.finalize())
}

fn fixed_hash(kind: &str) -> String {
    let mut hasher = Sha256::new();
    update_str(&mut hasher, kind);
    hex::encode(hasher.finalize())
}
