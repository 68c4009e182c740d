use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    file_name: String,
}

impl TempArtifact {
    pub fn write_text(file_name: &str, content: &str) -> io::Result<Self> {
        Self::write_text_in(&std::env::temp_dir(), file_name, content)
    }

    pub fn write_text_in(dir: &Path, file_name: &str, content: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("opsbot-{}-{}", uuid::Uuid::new_v4(), file_name));
        let artifact = Self {
            path,
            file_name: file_name.to_string(),
        };
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&artifact.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&artifact.path, fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::TempArtifact;

    #[test]
    fn artifact_is_removed_on_drop() {
        let artifact = TempArtifact::write_text("apt_list.txt", "ii  bash").expect("write artifact");
        let path = artifact.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).expect("read artifact"), "ii  bash");
        assert_eq!(artifact.file_name(), "apt_list.txt");
        drop(artifact);
        assert!(!path.exists());
    }
}
