use crate::lease::Lease;
use crate::material::MaterialRecord;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_materials: u32,
    #[serde(default)]
    pub num_leases: u32,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn now(num_materials: usize, num_leases: usize) -> Self {
        Self {
            num_materials: num_materials as u32,
            num_leases: num_leases as u32,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: CATALOG_VERSION,
        }
    }
}

/// On-disk layout of a catalog snapshot directory.
pub struct CatalogPaths {
    pub root: PathBuf,
}

impl CatalogPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn materials(&self) -> PathBuf { self.root.join("materials.bin") }
    fn leases(&self) -> PathBuf { self.root.join("leases.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn write_bin<T: Serialize + ?Sized>(root: &Path, target: &Path, value: &T) -> Result<()> {
    create_dir_all(root)?;
    // write-then-rename so a crashed write never leaves a truncated snapshot
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut f = File::create(&tmp)?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    std::fs::rename(&tmp, target)?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    bincode::deserialize(&buf).with_context(|| format!("decoding {}", path.display()))
}

pub fn save_materials(paths: &CatalogPaths, materials: &[MaterialRecord]) -> Result<()> {
    write_bin(&paths.root, &paths.materials(), materials)
}

pub fn load_materials(paths: &CatalogPaths) -> Result<Vec<MaterialRecord>> {
    read_bin(&paths.materials())
}

pub fn save_leases(paths: &CatalogPaths, leases: &[Lease]) -> Result<()> {
    write_bin(&paths.root, &paths.leases(), leases)
}

/// Catalogs written before leases existed have no ledger; that reads as empty.
pub fn load_leases(paths: &CatalogPaths) -> Result<Vec<Lease>> {
    if !paths.leases().exists() {
        return Ok(Vec::new());
    }
    read_bin(&paths.leases())
}

pub fn save_meta(paths: &CatalogPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &CatalogPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())
        .with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Everything stored in a catalog directory.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub materials: Vec<MaterialRecord>,
    pub leases: Vec<Lease>,
    pub meta: Option<MetaFile>,
}

/// Persist materials, leases and a fresh meta file together.
pub fn save_catalog(paths: &CatalogPaths, materials: &[MaterialRecord], leases: &[Lease]) -> Result<MetaFile> {
    save_materials(paths, materials)?;
    save_leases(paths, leases)?;
    let meta = MetaFile::now(materials.len(), leases.len());
    save_meta(paths, &meta)?;
    Ok(meta)
}

/// Load the whole snapshot. A missing directory is treated as an empty catalog.
pub fn load_catalog(paths: &CatalogPaths) -> Result<CatalogSnapshot> {
    if !paths.materials().exists() {
        tracing::warn!(root = %paths.root.display(), "no catalog snapshot found, starting empty");
        return Ok(CatalogSnapshot::default());
    }
    Ok(CatalogSnapshot {
        materials: load_materials(paths)?,
        leases: load_leases(paths)?,
        meta: load_meta(paths).ok(),
    })
}
