use crate::traits::Publisher;
use crate::types::{PipelineError, PublishOutcome, PublishRequest, PublishTarget, PublisherConfig, Result};
use crate::utils::url::redact_credentials;
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Child-process variable the credential helper reads the token from.
const TOKEN_ENV_VAR: &str = "BLOGENETES_GIT_TOKEN";

/// Answers `get` requests with the token from [`TOKEN_ENV_VAR`].
const CREDENTIAL_HELPER: &str = r#"!f() { if [ "$1" = get ]; then printf 'username=x-access-token\npassword=%s\n' "$BLOGENETES_GIT_TOKEN"; fi; }; f"#;

/// Environment that hands `token` to git without putting it in argv or
/// `.git/config`. The empty helper entry drops any inherited helpers.
pub fn credential_env(token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("GIT_CONFIG_COUNT", "2".to_string()),
        ("GIT_CONFIG_KEY_0", "credential.helper".to_string()),
        ("GIT_CONFIG_VALUE_0", String::new()),
        ("GIT_CONFIG_KEY_1", "credential.helper".to_string()),
        ("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER.to_string()),
        (TOKEN_ENV_VAR, token.to_string()),
    ]
}

fn ls_remote_args(url: &str, branch: &str) -> Vec<String> {
    vec![
        "ls-remote".to_string(),
        "--heads".to_string(),
        url.to_string(),
        format!("refs/heads/{}", branch),
    ]
}

fn clone_args(url: &str, branch: &str, workdir: &Path) -> Vec<String> {
    ["clone", "--depth", "1", "--single-branch", "--branch", branch, url]
        .iter()
        .map(|arg| arg.to_string())
        .chain(std::iter::once(workdir.to_string_lossy().into_owned()))
        .collect()
}

/// Check that `path` stays inside the working tree.
pub fn validate_path(path: &str) -> Result<&Path> {
    let invalid = || PipelineError::InvalidPublishPath { path: path.to_string() };

    if path.trim().is_empty() {
        return Err(invalid());
    }

    let candidate = Path::new(path);
    let mut has_file_component = false;
    for component in candidate.components() {
        match component {
            Component::Normal(_) => has_file_component = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return Err(invalid()),
        }
    }

    if !has_file_component || path.ends_with('/') {
        return Err(invalid());
    }

    Ok(candidate)
}

/// Captured result of one git invocation.
#[derive(Debug)]
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Publishes by cloning the target branch, committing the file and pushing
/// it back with the `git` CLI.
///
/// Every publish uses a fresh shallow clone in a scratch directory that is
/// removed afterwards. Nothing reaches the remote until the final push, and
/// the push is never forced, so a concurrent writer makes it fail with
/// [`PipelineError::PushRejected`] instead of being overwritten.
pub struct GitPublisher {
    config: PublisherConfig,
}

impl GitPublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self { config }
    }

    /// Remote URL without credentials; the token travels in [`credential_env`].
    pub fn remote_url(&self, target: &PublishTarget) -> String {
        let base = self.config.remote_base.trim_end_matches('/');
        format!("{}/{}/{}.git", base, target.owner, target.repo)
    }

    async fn git<S: AsRef<str>>(
        &self,
        workdir: Option<&Path>,
        args: &[S],
        env: &[(&'static str, String)],
    ) -> Result<GitOutput> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let mut command = Command::new("git");
        command
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(env.iter().map(|(key, value)| (*key, value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        debug!("git {}", redact_credentials(&args.join(" ")));

        let output = command.output().await.map_err(|e| {
            PipelineError::Io(io::Error::new(e.kind(), format!("failed to run git: {}. Is git installed?", e)))
        })?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: redact_credentials(String::from_utf8_lossy(&output.stderr).trim()),
        })
    }

    /// Run a local git command whose failure is not a remote problem.
    async fn git_local(&self, workdir: &Path, args: &[&str]) -> Result<String> {
        let output = self.git(Some(workdir), args, &[]).await?;
        if !output.success {
            return Err(PipelineError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("git {} failed: {}", args.join(" "), output.stderr),
            )));
        }
        Ok(output.stdout)
    }

    async fn checkout(&self, url: &str, branch: &str, workdir: &Path, env: &[(&'static str, String)]) -> Result<()> {
        let listing = self.git(None, &ls_remote_args(url, branch), env).await?;
        if !listing.success {
            return Err(PipelineError::RepoUnreachable(listing.stderr));
        }
        if listing.stdout.is_empty() {
            return Err(PipelineError::BranchNotFound {
                branch: branch.to_string(),
            });
        }

        let clone = self.git(None, &clone_args(url, branch, workdir), env).await?;
        if !clone.success {
            return Err(PipelineError::RepoUnreachable(clone.stderr));
        }

        Ok(())
    }

    async fn commit(&self, workdir: &Path, path: &Path, message: &str) -> Result<String> {
        let path_str = path.to_string_lossy();
        self.git_local(workdir, &["add", "--", &*path_str]).await?;

        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        // --allow-empty: unchanged content still leaves a commit behind
        self.git_local(
            workdir,
            &["-c", &name, "-c", &email, "-c", "commit.gpgsign=false", "commit", "--allow-empty", "-m", message],
        )
        .await?;

        self.git_local(workdir, &["rev-parse", "HEAD"]).await
    }

    async fn push(&self, workdir: &Path, branch: &str, env: &[(&'static str, String)]) -> Result<()> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let push = self.git(Some(workdir), &["push", "origin", refspec.as_str()], env).await?;
        if push.success {
            Ok(())
        } else {
            Err(classify_push_failure(push.stderr))
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("blogenetes-");
        let dir = match &self.config.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Rejections (non-fast-forward, hook declined) versus everything else.
fn classify_push_failure(stderr: String) -> PipelineError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("rejected") || lowered.contains("non-fast-forward") || lowered.contains("fetch first") {
        PipelineError::PushRejected(stderr)
    } else {
        PipelineError::RepoUnreachable(stderr)
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    fn publisher_name(&self) -> String {
        format!("git ({})", self.config.remote_base)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let token = request
            .credential
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| PipelineError::auth_missing(GITHUB_TOKEN_VAR))?;

        let target = &request.target;
        if target.owner.trim().is_empty() || target.repo.trim().is_empty() {
            return Err(PipelineError::Config("repository owner and name are required".to_string()));
        }
        let path = validate_path(&target.path)?;
        let branch = target.effective_branch();
        let url = self.remote_url(target);
        let env = credential_env(token);

        info!("Publishing {} to {}/{}@{}", target.path, target.owner, target.repo, branch);

        let scratch = self.scratch_dir()?;
        let workdir = scratch.path().join("repo");

        self.checkout(&url, branch, &workdir, &env).await?;

        let destination: PathBuf = workdir.join(path);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&destination, &request.content).await?;

        let commit = self.commit(&workdir, path, &target.message).await?;

        if let Err(e) = self.push(&workdir, branch, &env).await {
            warn!("Push of {} to {} failed", commit, branch);
            return Err(e);
        }

        info!("Pushed commit {} to {}/{}@{}", commit, target.owner, target.repo, branch);
        Ok(PublishOutcome::Committed { commit })
    }
}

/// Writes documents under a local directory instead of a repository.
pub struct LocalPublisher {
    output_dir: PathBuf,
}

impl LocalPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    fn publisher_name(&self) -> String {
        format!("local ({})", self.output_dir.display())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let path = validate_path(&request.target.path)?;
        let destination = self.output_dir.join(path);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a failed write never leaves a half file behind
        let staging = destination.with_extension("partial");
        tokio::fs::write(&staging, &request.content).await?;
        tokio::fs::rename(&staging, &destination).await?;

        let location = destination.display().to_string();
        info!("Wrote {} bytes to {}", request.content.len(), location);
        Ok(PublishOutcome::Written { location })
    }
}
