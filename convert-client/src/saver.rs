use std::path::{Path, PathBuf};

use anyhow::Context;

/// Where downloaded files end up.
pub trait FileSaver {
    fn save(&self, file_name: &str, data: &[u8]) -> anyhow::Result<PathBuf>;
}

/// Saves into a fixed directory, overwriting files of the same name.
#[derive(Debug, Clone)]
pub struct DirSaver {
    dir: PathBuf,
}

impl DirSaver {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating output dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirSaver {
    fn save(&self, file_name: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        // never let a server-influenced name escape the output dir
        let name = Path::new(file_name)
            .file_name()
            .with_context(|| format!("invalid file name {:?}", file_name))?;
        let path = self.dir.join(name);
        std::fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "saver_test.rs"]
mod saver_test;
