use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

const NAME_PREFIX: &str = "IMG_";
const NAME_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NAME_RANDOM_LEN: usize = 10;

/// Returns the lowercased extension when the filename passes the allow-list.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Generates a store key: `IMG_` + 10 random characters from A-Z0-9 + the
/// lowercased extension. Collision resistance is probabilistic (36^10 keys);
/// the UNIQUE constraint on image_path catches the pathological case.
pub fn generate_image_name(ext: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut name = String::with_capacity(NAME_PREFIX.len() + NAME_RANDOM_LEN + 1 + ext.len());
    name.push_str(NAME_PREFIX);
    for _ in 0..NAME_RANDOM_LEN {
        let idx = rng.gen_range(0..NAME_ALPHABET.len());
        name.push(NAME_ALPHABET[idx] as char);
    }
    name.push('.');
    name.push_str(&ext.to_ascii_lowercase());
    name
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn write(&self, key: &str, body: Bytes) -> io::Result<()>;

    /// Removes the file behind `key`. Returns `false` when the file was
    /// already absent; any other failure is surfaced to the caller.
    async fn remove(&self, key: &str) -> io::Result<bool>;
}

/// Filesystem-backed image store rooted at the configured upload directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub async fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are generated file names; reject anything path-like outright.
        debug_assert!(!key.contains('/') && !key.contains('\\'));
        self.root.join(Path::new(key).file_name().unwrap_or_default())
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn write(&self, key: &str, body: Bytes) -> io::Result<()> {
        tokio::fs::write(self.path_for(key), &body).await
    }

    async fn remove(&self, key: &str) -> io::Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn extension_allow_list() {
        assert_eq!(allowed_extension("soup.png"), Some("png".into()));
        assert_eq!(allowed_extension("soup.JPG"), Some("jpg".into()));
        assert_eq!(allowed_extension("soup.JpEg"), Some("jpeg".into()));
        assert_eq!(allowed_extension("cat.gif"), Some("gif".into()));
        assert_eq!(allowed_extension("photo.exe"), None);
        assert_eq!(allowed_extension("photo.png.exe"), None);
        assert_eq!(allowed_extension("no_extension"), None);
        assert_eq!(allowed_extension(""), None);
    }

    #[test]
    fn generated_name_shape() {
        let name = generate_image_name("PNG");
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".png"));
        let random = &name["IMG_".len()..name.len() - ".png".len() - 1];
        assert_eq!(random.len(), 10);
        assert!(random
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn generated_names_do_not_collide_in_practice() {
        let mut seen = HashSet::new();
        for _ in 0..5000 {
            assert!(seen.insert(generate_image_name("jpg")));
        }
    }

    #[tokio::test]
    async fn fs_store_write_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path()).await.unwrap();

        store
            .write("IMG_TESTTESTTE.png", Bytes::from_static(b"fake png"))
            .await
            .unwrap();
        assert!(dir.path().join("IMG_TESTTESTTE.png").exists());

        assert!(store.remove("IMG_TESTTESTTE.png").await.unwrap());
        assert!(!dir.path().join("IMG_TESTTESTTE.png").exists());

        // Absent file is tolerated, reported as false.
        assert!(!store.remove("IMG_TESTTESTTE.png").await.unwrap());
    }
}
