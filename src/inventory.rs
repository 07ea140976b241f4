//! Local repository inventory
//!
//! The storage root holds exactly two partitions, `public/` and `private/`,
//! each containing one directory per repository named after the remote.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Visibility partition under the storage root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Public,
    Private,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Public, Partition::Private];

    pub fn for_visibility(is_private: bool) -> Self {
        if is_private {
            Partition::Private
        } else {
            Partition::Public
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Public => "public",
            Partition::Private => "private",
        }
    }

    /// `storage_root/<partition>`
    pub fn path(&self, storage_root: &Path) -> PathBuf {
        storage_root.join(self.dir_name())
    }

    /// `storage_root/<partition>/<name>`
    pub fn repo_path(&self, storage_root: &Path, name: &str) -> PathBuf {
        self.path(storage_root).join(name)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Repository directory names found in each partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInventory {
    partitions: BTreeMap<Partition, BTreeSet<String>>,
}

impl LocalInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only scan of both partitions; a missing partition is empty
    pub fn scan(storage_root: &Path) -> io::Result<Self> {
        let mut inventory = Self::new();

        for partition in Partition::ALL {
            let dir = partition.path(storage_root);
            if !dir.exists() {
                debug!("Partition {} not present yet", dir.display());
                continue;
            }

            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    inventory.insert(partition, name);
                } else {
                    debug!("Skipping non UTF-8 directory name in {}", dir.display());
                }
            }
        }

        debug!(
            "Local inventory: {} public, {} private",
            inventory.names(Partition::Public).count(),
            inventory.names(Partition::Private).count()
        );

        Ok(inventory)
    }

    pub fn insert(&mut self, partition: Partition, name: impl Into<String>) {
        self.partitions.entry(partition).or_default().insert(name.into());
    }

    pub fn remove(&mut self, partition: Partition, name: &str) -> bool {
        self.partitions
            .get_mut(&partition)
            .is_some_and(|names| names.remove(name))
    }

    pub fn contains(&self, partition: Partition, name: &str) -> bool {
        self.partitions
            .get(&partition)
            .is_some_and(|names| names.contains(name))
    }

    pub fn names(&self, partition: Partition) -> impl Iterator<Item = &str> {
        self.partitions
            .get(&partition)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Partitions holding a directory called `name`
    pub fn partitions_of(&self, name: &str) -> Vec<Partition> {
        Partition::ALL
            .into_iter()
            .filter(|partition| self.contains(*partition, name))
            .collect()
    }

    /// Every distinct name across both partitions, sorted
    pub fn all_names(&self) -> BTreeSet<&str> {
        Partition::ALL
            .iter()
            .flat_map(|partition| self.names(*partition))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.values().all(BTreeSet::is_empty)
    }
}

/// Whether `name` stays inside its partition when joined onto it
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(&['/', '\\', '\0'][..])
}

/// Create the storage root and both partitions if missing
pub fn ensure_layout(storage_root: &Path) -> io::Result<()> {
    for partition in Partition::ALL {
        std::fs::create_dir_all(partition.path(storage_root))?;
    }
    Ok(())
}
