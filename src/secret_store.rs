use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Name of the board API key in the store and the environment
pub const BOARD_API_KEY: &str = "BOARD_API_KEY";

/// Storage for API keys, kept in a JSON file under the user's home directory.
///
/// Lookups consult the environment first, then the file.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretStore {
    /// Map of secret keys to their values
    secrets: HashMap<String, String>,
    /// Path to the secrets file
    file_path: PathBuf,
    /// Whether environment variables take part in lookups
    #[serde(skip)]
    use_env: bool,
}

impl SecretStore {
    /// Opens the store at `~/.boardchat/secrets.json`, creating the directory if needed.
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find home directory")
        })?;
        Self::with_path(home_dir.join(".boardchat").join("secrets.json"))
    }

    /// Opens the store backed by `file_path`.
    pub fn with_path(file_path: impl Into<PathBuf>) -> io::Result<Self> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store = SecretStore {
            secrets: HashMap::new(),
            file_path,
            use_env: true,
        };

        store.load()?;
        Ok(store)
    }

    /// Ignores environment variables in lookups.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    fn load(&mut self) -> io::Result<()> {
        match File::open(&self.file_path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                self.secrets = serde_json::from_str(&contents).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{}: {e}", self.file_path.display()),
                    )
                })?;
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn save(&self) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.secrets)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Sets a secret value for the given key and persists the store.
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.secrets.insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Retrieves a secret stored in the file.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.secrets.get(key)
    }

    /// Deletes a secret and persists the store.
    pub fn delete(&mut self, key: &str) -> io::Result<()> {
        self.secrets.remove(key);
        self.save()
    }

    /// Looks `name` up in the environment, then in the file. Blank values count as unset.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let from_env = if self.use_env {
            std::env::var(name).ok()
        } else {
            None
        };
        from_env
            .or_else(|| self.secrets.get(name).cloned())
            .filter(|v| !v.trim().is_empty())
    }

    /// All API keys configured under `name`, in rotation order.
    ///
    /// Numbered keys `NAME_1`, `NAME_2`, ... are read until the first gap; when
    /// there are none, the plain `NAME` key is used.
    pub fn keys(&self, name: &str) -> Vec<String> {
        let numbered: Vec<String> = (1..)
            .map(|i| self.lookup(&format!("{name}_{i}")))
            .take_while(Option::is_some)
            .flatten()
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }
        self.lookup(name).into_iter().collect()
    }
}
