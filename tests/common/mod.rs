//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use model_fetcher::app::{Catalog, InstallLayout, Operator, RemoteLocation, RemoteStore};
use model_fetcher::auth::{Credential, CredentialProvider};
use model_fetcher::errors::{AuthResult, FetchError, StoreResult};

pub const CATALOG: &str = r#"
[[artifacts]]
name = "base"
description = "Base model"
repo_id = "org/base"
file = "base.ckpt"
kind = "model"
inference_config = "v1-inference.yaml"
recommended = true
width = 512
height = 512

[[artifacts]]
name = "inpaint"
description = "Inpainting model"
repo_id = "org/inpaint"
file = "inpaint.ckpt"
kind = "model"
inference_config = "v1-inpainting-inference.yaml"
recommended = true
width = 512
height = 512

[[artifacts]]
name = "stable-diffusion-1.4"
description = "Original model"
repo_id = "org/original"
file = "sd-v1-4.ckpt"
kind = "model"
inference_config = "v1-inference.yaml"
recommended = false
width = 512
height = 512

[[artifacts]]
name = "vae"
description = "Improved decoder"
repo_id = "org/vae"
file = "vae.ckpt"
kind = "auxiliary_decoder"
recommended = true
width = 512
height = 512
"#;

pub fn catalog() -> Catalog {
    Catalog::from_toml_str(CATALOG).unwrap()
}

/// Temporary install tree
pub struct Sandbox {
    pub dir: TempDir,
    pub layout: InstallLayout,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let layout = InstallLayout {
            models_dir: root.join("models"),
            model_config_file: root.join("configs").join("models.yaml"),
            inference_configs_dir: root.join("configs").join("stable-diffusion"),
            install_root: root.to_path_buf(),
        };
        std::fs::create_dir_all(root.join("configs")).unwrap();
        std::fs::create_dir_all(root.join("blobs")).unwrap();
        Self { dir, layout }
    }

    pub fn blobs(&self) -> PathBuf {
        self.dir.path().join("blobs")
    }

    pub fn model(&self, file: &str) -> PathBuf {
        self.layout.models_dir.join(file)
    }
}

/// Remote store writing fake objects into a blob directory
pub struct FakeStore {
    root: PathBuf,
    failing: HashSet<String>,
    calls: AtomicUsize,
    retrieved: Mutex<Vec<String>>,
    credentials_seen: AtomicUsize,
}

impl FakeStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            retrieved: Mutex::new(Vec::new()),
            credentials_seen: AtomicUsize::new(0),
        }
    }

    /// Fail every retrieval whose location contains `needle`
    pub fn failing(mut self, needle: &str) -> Self {
        self.failing.insert(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials_seen(&self) -> usize {
        self.credentials_seen.load(Ordering::SeqCst)
    }

    pub fn retrieved(&self) -> Vec<String> {
        self.retrieved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn retrieve(
        &self,
        location: &RemoteLocation,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if credential.is_some() {
            self.credentials_seen.fetch_add(1, Ordering::SeqCst);
        }
        let text = location.to_string();
        self.retrieved.lock().unwrap().push(text.clone());

        if self.failing.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(FetchError::AuthFailure {
                location: text,
                status: 403,
            });
        }

        let blob = self.root.join(text.replace(['/', ':'], "_"));
        std::fs::write(&blob, format!("remote {}", text))?;
        Ok(blob)
    }
}

/// Credential provider held in memory
#[derive(Default)]
pub struct MemoryTokens {
    token: Mutex<Option<Credential>>,
}

impl MemoryTokens {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(Credential::new(token))),
        }
    }
}

impl CredentialProvider for MemoryTokens {
    fn get(&self) -> AuthResult<Option<Credential>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn save(&self, credential: &Credential) -> AuthResult<()> {
        *self.token.lock().unwrap() = Some(credential.clone());
        Ok(())
    }
}

/// Operator answering yes/no prompts from per-prompt scripts
///
/// A prompt takes the next answer of the first rule whose text it contains;
/// without a rule (or once the rule's answers run out) it takes its default.
#[derive(Default)]
pub struct ScriptedOperator {
    rules: Vec<(String, VecDeque<bool>)>,
    secrets: VecDeque<String>,
    pub transcript: Vec<String>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, prompt: &str, answers: &[bool]) -> Self {
        self.rules
            .push((prompt.to_string(), answers.iter().copied().collect()));
        self
    }

    pub fn secret_answer(mut self, secret: &str) -> Self {
        self.secrets.push_back(secret.to_string());
        self
    }

    pub fn saw(&self, text: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(text))
    }
}

impl Operator for ScriptedOperator {
    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }

    fn confirm(&mut self, prompt: &str, default_yes: bool) -> io::Result<bool> {
        self.transcript.push(prompt.to_string());
        let answer = self
            .rules
            .iter_mut()
            .find(|(text, _)| prompt.contains(text.as_str()))
            .and_then(|(_, answers)| answers.pop_front());
        Ok(answer.unwrap_or(default_yes))
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        self.transcript.push(prompt.to_string());
        Ok(String::new())
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        self.transcript.push(prompt.to_string());
        self.secrets
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted secret"))
    }
}
