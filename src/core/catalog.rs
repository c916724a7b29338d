//! Every mount known on this host, tracked or not.

use crate::core::context::MountContext;
use crate::core::error::Result;
use crate::core::reconciler::{self, status_of};
use crate::core::unit_dir::UnitKind;
use crate::models::status::MountStatus;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// A definition file exists in the store.
    Defined,
    /// Only the installed unit exists.
    SystemOnly,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Defined => "defined",
            Provenance::SystemOnly => "system-only",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub provenance: Provenance,
    pub status: MountStatus,
}

/// Names from both directories, deduplicated and sorted. An installed
/// unit that belongs to a definition is listed under the definition's name.
pub struct Catalog<'c, 'a> {
    ctx: &'c MountContext<'a>,
    names: BTreeMap<String, Provenance>,
}

impl<'c, 'a> Catalog<'c, 'a> {
    pub fn scan(ctx: &'c MountContext<'a>) -> Result<Self> {
        let defined = ctx.definitions.names()?;
        let mut owned = BTreeSet::new();
        for name in &defined {
            let content = ctx.definitions.read(name, UnitKind::Mount)?;
            owned.insert(reconciler::unit_stem(name, content.as_deref()));
        }

        let mut names: BTreeMap<String, Provenance> = ctx
            .installed
            .names()?
            .into_iter()
            .filter(|stem| !owned.contains(stem))
            .map(|stem| (stem, Provenance::SystemOnly))
            .collect();
        for name in defined {
            names.insert(name, Provenance::Defined);
        }
        Ok(Self { ctx, names })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Status is computed as each entry is pulled; call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = Result<CatalogEntry>> + '_ {
        self.names.iter().map(move |(name, provenance)| {
            let resolved = reconciler::resolve(self.ctx, name)?;
            Ok(CatalogEntry {
                name: name.clone(),
                provenance: *provenance,
                status: status_of(self.ctx, &resolved),
            })
        })
    }
}

pub fn list_all(ctx: &MountContext<'_>) -> Result<Vec<CatalogEntry>> {
    Catalog::scan(ctx)?.iter().collect()
}
