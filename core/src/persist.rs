use crate::classifier::ChainModel;
use crate::index::{Document, SearchIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Build metadata written beside the index artifact.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

/// Layout of one store directory: crawled documents, the index and model
/// artifacts, build metadata and the durable visited-URL-hash set.
pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn documents(&self) -> PathBuf {
        self.root.join("documents.jsonl")
    }
    fn index(&self) -> PathBuf {
        self.root.join("index.bin")
    }
    fn model(&self) -> PathBuf {
        self.root.join("model.bin")
    }
    fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }
    fn visited(&self) -> PathBuf {
        self.root.join("visited")
    }
}

/// Write bytes to `<path>.tmp` then rename over `path`, so readers only ever
/// observe the previous complete artifact or the new one.
fn swap_in(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path).with_context(|| format!("swap in {}", path.display()))?;
    Ok(())
}

pub fn save_documents(paths: &StorePaths, documents: &[Document]) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut buf = Vec::new();
    for doc in documents {
        serde_json::to_writer(&mut buf, doc)?;
        buf.write_all(b"\n")?;
    }
    swap_in(&paths.documents(), &buf)
}

pub fn documents_exist(paths: &StorePaths) -> bool {
    paths.documents().exists()
}

pub fn load_documents(paths: &StorePaths) -> Result<Vec<Document>> {
    let f = File::open(paths.documents())
        .with_context(|| format!("open {}", paths.documents().display()))?;
    let mut documents = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(serde_json::from_str(&line)?);
    }
    Ok(documents)
}

pub fn save_index(paths: &StorePaths, index: &SearchIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    swap_in(&paths.index(), &bincode::serialize(index)?)
}

pub fn load_index(paths: &StorePaths) -> Result<SearchIndex> {
    let mut buf = Vec::new();
    File::open(paths.index())
        .with_context(|| format!("open {}", paths.index().display()))?
        .read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_model(paths: &StorePaths, model: &ChainModel) -> Result<()> {
    create_dir_all(&paths.root)?;
    swap_in(&paths.model(), &bincode::serialize(model)?)
}

pub fn load_model(paths: &StorePaths) -> Result<ChainModel> {
    let mut buf = Vec::new();
    File::open(paths.model())
        .with_context(|| format!("open {}", paths.model().display()))?
        .read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_meta(paths: &StorePaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    swap_in(&paths.meta(), serde_json::to_string_pretty(meta)?.as_bytes())
}

pub fn load_meta(paths: &StorePaths) -> Result<MetaFile> {
    let f = File::open(paths.meta())?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

/// Durable set of visited URL hashes. Survives across crawl runs, which is
/// what turns "no redundant refetch" into a cross-run invariant; sled makes
/// concurrent inserts from multiple fetch workers safe.
pub struct VisitedSet {
    db: sled::Db,
}

impl VisitedSet {
    pub fn open(paths: &StorePaths) -> Result<Self> {
        create_dir_all(&paths.root)?;
        let db = sled::open(paths.visited())
            .with_context(|| format!("open visited set at {}", paths.visited().display()))?;
        Ok(Self { db })
    }

    pub fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.db.contains_key(hash.as_bytes())?)
    }

    pub fn insert(&self, hash: &str) -> Result<()> {
        self.db.insert(hash.as_bytes(), &[] as &[u8])?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    fn sample_doc(id: &str) -> Document {
        Document {
            id: id.into(),
            title: "Advances in Gas Turbine Design".into(),
            authors: vec!["Jane Doe".into()],
            keywords: vec!["turbine".into()],
            year: Some("2022".into()),
            abstract_text: "A study of turbine efficiency.".into(),
            url: format!("https://example.org/{id}"),
            fetched_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn documents_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        let docs = vec![sample_doc("a"), sample_doc("b")];
        save_documents(&paths, &docs).unwrap();
        let loaded = load_documents(&paths).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, docs[0].title);
    }

    #[test]
    fn index_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        let index = build_index(&[sample_doc("a")]).unwrap();
        save_index(&paths, &index).unwrap();
        let loaded = load_index(&paths).unwrap();
        assert_eq!(loaded.num_docs, 1);
    }

    #[test]
    fn visited_set_is_durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        {
            let visited = VisitedSet::open(&paths).unwrap();
            visited.insert("abc123").unwrap();
            visited.flush().unwrap();
        }
        let visited = VisitedSet::open(&paths).unwrap();
        assert!(visited.contains("abc123").unwrap());
        assert!(!visited.contains("def456").unwrap());
    }
}
