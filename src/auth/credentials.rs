//! Access token storage and the interactive token flow
//!
//! The remote store authorizes downloads of gated weights with a bearer token.
//! Tokens are looked up in the `HF_TOKEN` environment variable first (which may
//! come from a `.env` file) and then in the token file shared with the other
//! Hugging Face tools. Tokens entered interactively are saved to the token file
//! with owner-only permissions.

use std::env;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::app::operator::Operator;
use crate::constants::{auth, env as env_constants};
use crate::errors::{AuthError, AuthResult};

/// Opaque bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token string without validation
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Capability for loading and saving the access token
pub trait CredentialProvider {
    /// Current token, if one is configured anywhere
    fn get(&self) -> AuthResult<Option<Credential>>;

    /// Persist a token for future runs
    fn save(&self, credential: &Credential) -> AuthResult<()>;
}

/// Where the active token was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    TokenFile(PathBuf),
}

/// Authentication status information
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether the token environment variable is set
    pub env_token_set: bool,
    /// Location of the token file
    pub token_file: PathBuf,
    /// Whether the token file exists and is non-empty
    pub token_file_present: bool,
    /// Whether a .env file exists in the current directory
    pub dotenv_file_exists: bool,
}

impl AuthStatus {
    /// Check whether any token source is available
    pub fn has_credential(&self) -> bool {
        self.env_token_set || self.token_file_present
    }

    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.env_token_set, self.token_file_present) {
            (true, _) => format!("Token configured via {}", env_constants::TOKEN),
            (false, true) => format!("Token configured in {}", self.token_file.display()),
            (false, false) => "Missing token - run 'auth setup' to configure".to_string(),
        }
    }
}

/// Token store backed by the environment and a token file
#[derive(Debug, Clone)]
pub struct TokenStore {
    token_file: PathBuf,
    read_env: bool,
}

impl TokenStore {
    /// Store that checks the environment before `token_file`
    pub fn new(token_file: PathBuf) -> Self {
        Self {
            token_file,
            read_env: true,
        }
    }

    /// Store that only consults `token_file`
    pub fn file_only(token_file: PathBuf) -> Self {
        Self {
            token_file,
            read_env: false,
        }
    }

    /// Build a store from an optional configured token path
    ///
    /// Without a configured path the token file lives under the user's home
    /// directory where other Hugging Face tools look for it.
    pub fn from_settings(token_file: Option<&Path>) -> AuthResult<Self> {
        let path = match token_file {
            Some(path) => path.to_path_buf(),
            None => Self::default_token_file()?,
        };
        Ok(Self::new(path))
    }

    fn default_token_file() -> AuthResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(auth::TOKEN_FILE_RELATIVE))
            .ok_or_else(|| AuthError::TokenPathUnavailable {
                reason: "no home directory".to_string(),
            })
    }

    /// Location of the token file
    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    fn env_token(&self) -> Option<Credential> {
        if !self.read_env {
            return None;
        }
        env::var(env_constants::TOKEN)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Credential)
    }

    fn file_token(&self) -> AuthResult<Option<Credential>> {
        if !self.token_file.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.token_file)?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Credential(token.to_string())))
        }
    }

    /// Which source would supply the token right now
    pub fn source(&self) -> AuthResult<Option<CredentialSource>> {
        if self.env_token().is_some() {
            return Ok(Some(CredentialSource::Environment));
        }
        Ok(self
            .file_token()?
            .map(|_| CredentialSource::TokenFile(self.token_file.clone())))
    }

    /// Check current authentication status
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            env_token_set: self.env_token().is_some(),
            token_file: self.token_file.clone(),
            token_file_present: matches!(self.file_token(), Ok(Some(_))),
            dotenv_file_exists: Path::new(".env").exists(),
        }
    }

    /// Remove the token file; returns whether anything was removed
    pub fn clear(&self) -> AuthResult<bool> {
        if !self.token_file.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.token_file)?;
        info!("Removed token file {}", self.token_file.display());
        Ok(true)
    }
}

impl CredentialProvider for TokenStore {
    fn get(&self) -> AuthResult<Option<Credential>> {
        if let Some(credential) = self.env_token() {
            debug!("Using token from {}", env_constants::TOKEN);
            return Ok(Some(credential));
        }
        self.file_token()
    }

    fn save(&self, credential: &Credential) -> AuthResult<()> {
        if let Some(parent) = self.token_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner-only from creation, never readable with the umask default
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(auth::TOKEN_FILE_PERMISSIONS);
        }
        let mut file = options.open(&self.token_file)?;

        // `mode` only applies to new files; tighten an existing one before writing
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(auth::TOKEN_FILE_PERMISSIONS);
            file.set_permissions(perms)?;
        }

        file.write_all(credential.expose().as_bytes())?;

        info!("Saved access token to {}", self.token_file.display());
        Ok(())
    }
}

/// Validate a token typed by the operator
pub fn validate_token(raw: &str) -> AuthResult<Credential> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken {
            reason: "Token cannot be empty".to_string(),
        });
    }
    if token.len() < auth::MIN_TOKEN_LENGTH {
        return Err(AuthError::InvalidToken {
            reason: format!("Token must be at least {} characters", auth::MIN_TOKEN_LENGTH),
        });
    }
    if token.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidToken {
            reason: "Token cannot contain whitespace".to_string(),
        });
    }
    Ok(Credential(token.to_string()))
}

fn licence_walkthrough() -> String {
    format!(
        "
To download the Stable Diffusion weight files from the official Hugging Face
repository, you need to read and accept the CreativeML Responsible AI license.

This involves a few easy steps.

1. If you have not already done so, create an account on Hugging Face's web site
   using the \"Sign Up\" button:

   {signup}

   You will need to verify your email address as part of the HuggingFace
   registration process.

2. Log into your account Hugging Face:

   {login}

3. Accept the license terms located here:

   {licence}
",
        signup = auth::SIGNUP_URL,
        login = auth::LOGIN_URL,
        licence = auth::LICENSE_URL,
    )
}

fn token_instructions() -> String {
    format!(
        "
4. Thank you! The last step is to enter your HuggingFace access token so that
   this installer is authorized to initiate the download. Go to the access tokens
   page of your Hugging Face account and create a token by clicking the
   \"New token\" button:

   {tokens}

   (You can enter anything you like in the token creation field marked \"Name\".
   \"Role\" should be \"read\").

   Now copy the token to your clipboard and paste it here:",
        tokens = auth::TOKENS_URL,
    )
}

/// Ask the operator for a token and save it
fn prompt_and_save(
    provider: &dyn CredentialProvider,
    operator: &mut dyn Operator,
) -> AuthResult<Credential> {
    operator.say(&token_instructions());
    let raw = operator.secret("Token: ")?;
    let credential = validate_token(&raw)?;
    provider.save(&credential)?;
    Ok(credential)
}

/// Walk the operator through licence acceptance and return a usable token
///
/// An already configured token is reused; otherwise the operator is asked to
/// paste one, which is saved for future runs.
pub fn obtain_credential(
    provider: &dyn CredentialProvider,
    operator: &mut dyn Operator,
) -> AuthResult<Credential> {
    operator.say(&licence_walkthrough());
    operator.input("Press <enter> when you are ready to continue:")?;

    if let Some(credential) = provider.get()? {
        return Ok(credential);
    }
    prompt_and_save(provider, operator)
}

/// Interactive token setup workflow for `auth setup`
///
/// Returns `false` when the operator keeps an existing token.
pub fn setup_credentials(
    provider: &dyn CredentialProvider,
    operator: &mut dyn Operator,
) -> AuthResult<bool> {
    if provider.get()?.is_some()
        && !operator.confirm("A token is already configured. Replace it?", false)?
    {
        operator.say("Setup cancelled.");
        return Ok(false);
    }

    operator.say(&licence_walkthrough());
    prompt_and_save(provider, operator)?;
    operator.say("Token saved.");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Scripted {
        secrets: VecDeque<String>,
        confirms: VecDeque<bool>,
        said: Vec<String>,
    }

    impl Operator for Scripted {
        fn say(&mut self, message: &str) {
            self.said.push(message.to_string());
        }

        fn confirm(&mut self, _prompt: &str, default_yes: bool) -> io::Result<bool> {
            Ok(self.confirms.pop_front().unwrap_or(default_yes))
        }

        fn input(&mut self, _prompt: &str) -> io::Result<String> {
            Ok(String::new())
        }

        fn secret(&mut self, _prompt: &str) -> io::Result<String> {
            self.secrets
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no secret"))
        }
    }

    fn store(temp_dir: &TempDir) -> TokenStore {
        TokenStore::file_only(temp_dir.path().join("hf").join("token"))
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("hf_abcdefghijkl").is_ok());
        assert_eq!(
            validate_token("  hf_abcdefghijkl\n").unwrap().expose(),
            "hf_abcdefghijkl"
        );
        assert!(matches!(
            validate_token(""),
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(validate_token("short").is_err());
        assert!(validate_token("hf_abc defghij").is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("hf_secret_token");
        assert!(!format!("{:?}", credential).contains("secret"));
    }

    #[test]
    fn test_save_and_get_roundtrip_with_permissions() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        assert!(store.get()?.is_none());

        store.save(&Credential::new("hf_abcdefghijkl"))?;
        assert_eq!(store.get()?.unwrap().expose(), "hf_abcdefghijkl");
        assert_eq!(
            store.source()?,
            Some(CredentialSource::TokenFile(store.token_file().to_path_buf()))
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.token_file())?.permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(store.clear()?);
        assert!(!store.clear()?);
        assert!(store.get()?.is_none());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_existing_readable_file() -> Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        std::fs::create_dir_all(temp_dir.path().join("hf"))?;
        std::fs::write(store.token_file(), "hf_old_token_value")?;
        std::fs::set_permissions(store.token_file(), std::fs::Permissions::from_mode(0o644))?;

        store.save(&Credential::new("hf_abcdefghijkl"))?;

        let mode = std::fs::metadata(store.token_file())?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(store.token_file())?, "hf_abcdefghijkl");
        Ok(())
    }

    #[test]
    fn test_blank_token_file_is_absent() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        std::fs::create_dir_all(store.token_file().parent().unwrap())?;
        std::fs::write(store.token_file(), "\n")?;
        assert!(store.get()?.is_none());
        assert!(!store.status().token_file_present);
        Ok(())
    }

    #[test]
    fn test_obtain_credential_prompts_when_missing() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        let mut operator = Scripted::default();
        operator.secrets.push_back("hf_pastedtoken".to_string());

        let credential = obtain_credential(&store, &mut operator)?;
        assert_eq!(credential.expose(), "hf_pastedtoken");
        assert_eq!(store.get()?.unwrap().expose(), "hf_pastedtoken");
        assert!(operator.said.iter().any(|m| m.contains(auth::LICENSE_URL)));
        Ok(())
    }

    #[test]
    fn test_obtain_credential_reuses_saved_token() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&Credential::new("hf_existingtoken"))?;

        // No secret scripted: prompting would fail
        let mut operator = Scripted::default();
        let credential = obtain_credential(&store, &mut operator)?;
        assert_eq!(credential.expose(), "hf_existingtoken");
        Ok(())
    }

    #[test]
    fn test_setup_keeps_existing_token_when_declined() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let store = store(&temp_dir);
        store.save(&Credential::new("hf_existingtoken"))?;

        let mut operator = Scripted::default();
        operator.confirms.push_back(false);
        assert!(!setup_credentials(&store, &mut operator)?);
        assert_eq!(store.get()?.unwrap().expose(), "hf_existingtoken");
        Ok(())
    }

    #[test]
    fn test_auth_status_messages() {
        let mut status = AuthStatus {
            env_token_set: false,
            token_file: PathBuf::from("/home/user/.cache/huggingface/token"),
            token_file_present: false,
            dotenv_file_exists: false,
        };
        assert!(!status.has_credential());
        assert!(status.status_message().contains("Missing token"));

        status.token_file_present = true;
        assert!(status.status_message().contains("huggingface/token"));

        status.env_token_set = true;
        assert!(status.status_message().contains(env_constants::TOKEN));
    }
}
