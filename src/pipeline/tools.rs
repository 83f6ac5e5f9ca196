// Tool discovery and provisioning for yt-dlp and ffmpeg

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{PipelineError, Result};
use super::models::{HostEnvironment, ToolInvocation};
use super::platform::{DistroFamily, Platform};
use super::traits::{BinaryFetcher, CommandRunner, CommandSpec, ToolProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolType {
    /// Stream downloader (yt-dlp)
    Downloader,
    /// Transcoder used for the final merge (ffmpeg)
    Transcoder,
}

impl ToolType {
    pub fn spec(&self) -> &'static ToolSpec {
        match self {
            ToolType::Downloader => &DOWNLOADER,
            ToolType::Transcoder => &TRANSCODER,
        }
    }
}

/// Static description of an external tool.
#[derive(Debug)]
pub struct ToolSpec {
    pub logical_name: &'static str,
    /// Name on the search path when installed system-wide.
    pub system_name: &'static str,
    /// Harmless flag used to check the tool runs.
    pub probe_flag: &'static str,
    /// Per-platform release asset, for tools fetched directly.
    pub platform_filenames: Option<PlatformFilenames>,
    /// Package name for package-manager installs.
    pub package_name: Option<&'static str>,
    pub requires_execute_bit: bool,
}

#[derive(Debug)]
pub struct PlatformFilenames {
    pub windows: &'static str,
    pub macos: &'static str,
    pub linux: &'static str,
}

impl PlatformFilenames {
    pub fn for_platform(&self, platform: Platform) -> &'static str {
        match platform {
            Platform::Windows => self.windows,
            Platform::MacOs => self.macos,
            Platform::Linux => self.linux,
        }
    }
}

pub static DOWNLOADER: ToolSpec = ToolSpec {
    logical_name: "downloader",
    system_name: "yt-dlp",
    probe_flag: "--version",
    platform_filenames: Some(PlatformFilenames {
        windows: "yt-dlp.exe",
        macos: "yt-dlp_macos",
        linux: "yt-dlp_linux",
    }),
    package_name: None,
    requires_execute_bit: true,
};

pub static TRANSCODER: ToolSpec = ToolSpec {
    logical_name: "transcoder",
    system_name: "ffmpeg",
    probe_flag: "-version",
    platform_filenames: None,
    package_name: Some("ffmpeg"),
    requires_execute_bit: false,
};

/// Where the downloader binary is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    pub base_url: String,
    pub version: String,
}

impl ReleaseSource {
    pub fn new(base_url: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            version: version.into(),
        }
    }

    /// `<base>/<version>/<filename>`
    pub fn asset_url(&self, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version,
            filename
        )
    }
}

/// Runs `<program> <probe_flag>` and reports whether it exited zero.
async fn probe_with_flag(
    runner: &dyn CommandRunner,
    program: &str,
    flag: &str,
    env: &HostEnvironment,
) -> bool {
    match runner.run(&CommandSpec::new(program).arg(flag), env).await {
        Ok(output) => output.success(),
        Err(e) => {
            tracing::debug!(program, error = %e, "probe could not start tool");
            false
        }
    }
}

/// yt-dlp answers `--version`.
pub struct DownloaderProbe {
    runner: Arc<dyn CommandRunner>,
}

impl DownloaderProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolProbe for DownloaderProbe {
    fn name(&self) -> &'static str {
        DOWNLOADER.system_name
    }

    async fn is_present(&self, program: &str, env: &HostEnvironment) -> bool {
        probe_with_flag(self.runner.as_ref(), program, DOWNLOADER.probe_flag, env).await
    }
}

/// ffmpeg only knows the single-dash `-version`.
pub struct TranscoderProbe {
    runner: Arc<dyn CommandRunner>,
}

impl TranscoderProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolProbe for TranscoderProbe {
    fn name(&self) -> &'static str {
        TRANSCODER.system_name
    }

    async fn is_present(&self, program: &str, env: &HostEnvironment) -> bool {
        probe_with_flag(self.runner.as_ref(), program, TRANSCODER.probe_flag, env).await
    }
}

/// Package managers we can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Brew,
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Apk,
}

impl PackageManager {
    pub fn for_distro(family: DistroFamily) -> Option<Self> {
        match family {
            DistroFamily::Debian => Some(Self::Apt),
            DistroFamily::Rhel => Some(Self::Dnf),
            DistroFamily::Arch => Some(Self::Pacman),
            DistroFamily::Suse => Some(Self::Zypper),
            DistroFamily::Alpine => Some(Self::Apk),
            DistroFamily::Unknown => None,
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Self::Brew => "brew",
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Apk => "apk",
        }
    }

    fn refresh_args(&self) -> &'static [&'static str] {
        match self {
            Self::Brew => &["update"],
            Self::Apt => &["update"],
            Self::Dnf => &["makecache"],
            Self::Pacman => &["-Sy", "--noconfirm"],
            Self::Zypper => &["--non-interactive", "refresh"],
            Self::Apk => &["update"],
        }
    }

    fn install_args(&self) -> &'static [&'static str] {
        match self {
            Self::Brew => &["install"],
            Self::Apt => &["install", "-y"],
            Self::Dnf => &["install", "-y"],
            Self::Pacman => &["-S", "--noconfirm"],
            Self::Zypper => &["--non-interactive", "install"],
            Self::Apk => &["add"],
        }
    }
}

/// A package-manager install: refresh the index, then install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstall {
    pub manager: PackageManager,
    pub package: &'static str,
    /// Run through `sudo`. Homebrew refuses to run as root, Linux managers need it.
    pub privileged: bool,
}

impl PackageInstall {
    pub fn commands(&self) -> Vec<CommandSpec> {
        let build = |args: &[&str]| {
            let cmd = if self.privileged {
                CommandSpec::new("sudo").arg(self.manager.program())
            } else {
                CommandSpec::new(self.manager.program())
            };
            cmd.args(args.iter().copied()).attached()
        };

        let mut install_args = self.manager.install_args().to_vec();
        install_args.push(self.package);

        vec![build(self.manager.refresh_args()), build(&install_args)]
    }
}

/// How a missing tool gets onto the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioning {
    /// Download the release asset into the working directory.
    Fetch { url: String, target: PathBuf },
    PackageManager(PackageInstall),
    /// Nothing we can automate; tell the user what to do.
    Manual { guidance: String },
}

impl Provisioning {
    /// Only package installs on Linux depend on the distribution family.
    pub fn needs_distro(tool: ToolType, platform: Platform) -> bool {
        tool.spec().platform_filenames.is_none() && platform == Platform::Linux
    }

    /// Pick the strategy for `tool` on this host.
    pub fn plan(
        tool: ToolType,
        env: &HostEnvironment,
        release: &ReleaseSource,
        distro: DistroFamily,
    ) -> Self {
        let spec = tool.spec();

        if let Some(filenames) = &spec.platform_filenames {
            let filename = filenames.for_platform(env.platform);
            return Self::Fetch {
                url: release.asset_url(filename),
                target: env.working_dir.join(filename),
            };
        }

        let package = spec.package_name.unwrap_or(spec.system_name);
        match env.platform {
            Platform::Windows => Self::Manual {
                guidance: format!(
                    "Download a {} build from https://ffmpeg.org/download.html, \
                     extract it and add its bin directory to PATH, then run again.",
                    spec.system_name
                ),
            },
            Platform::MacOs => Self::PackageManager(PackageInstall {
                manager: PackageManager::Brew,
                package,
                privileged: false,
            }),
            Platform::Linux => {
                match PackageManager::for_distro(distro) {
                    Some(manager) => Self::PackageManager(PackageInstall {
                        manager,
                        package,
                        privileged: true,
                    }),
                    None => Self::Manual {
                        guidance: format!(
                            "Could not determine the Linux distribution family. \
                             Install {} with your package manager, then run again.",
                            package
                        ),
                    },
                }
            }
        }
    }
}

/// A tool ready to use, plus the environment to use it in.
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub invocation: ToolInvocation,
    pub env: HostEnvironment,
    /// Provisioning ran during this call.
    pub provisioned: bool,
}

/// Makes sure a tool is runnable, provisioning it when it is not.
pub struct ToolResolver {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn BinaryFetcher>,
    release: ReleaseSource,
    distro_root: PathBuf,
}

impl ToolResolver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn BinaryFetcher>,
        release: ReleaseSource,
    ) -> Self {
        Self {
            runner,
            fetcher,
            release,
            distro_root: PathBuf::from("/"),
        }
    }

    /// Read the distribution family below `root` instead of `/`.
    pub fn with_distro_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.distro_root = root.into();
        self
    }

    pub async fn ensure_available(
        &self,
        tool: ToolType,
        probe: &dyn ToolProbe,
        env: HostEnvironment,
    ) -> Result<ResolvedTool> {
        let spec = tool.spec();

        if probe.is_present(spec.system_name, &env).await {
            tracing::info!(tool = probe.name(), "found on search path");
            return Ok(ResolvedTool {
                invocation: ToolInvocation::SystemWide(spec.system_name.to_string()),
                env,
                provisioned: false,
            });
        }

        // A binary left by an earlier run only needs the working directory on the path.
        if let Some(filenames) = &spec.platform_filenames {
            let local = filenames.for_platform(env.platform);
            if is_file(&env.working_dir.join(local)).await {
                let mut env = env;
                Self::expose_working_dir(&mut env);
                if probe.is_present(local, &env).await {
                    tracing::info!(
                        tool = probe.name(),
                        binary = local,
                        "using previously provisioned binary"
                    );
                    return Ok(ResolvedTool {
                        invocation: ToolInvocation::Local(local.to_string()),
                        env,
                        provisioned: false,
                    });
                }
                tracing::warn!(
                    binary = local,
                    "local binary present but not runnable, fetching again"
                );
                return self.provision(tool, env).await;
            }
        }

        tracing::info!(
            tool = probe.name(),
            role = spec.logical_name,
            "not found, provisioning"
        );
        self.provision(tool, env).await
    }

    async fn provision(&self, tool: ToolType, mut env: HostEnvironment) -> Result<ResolvedTool> {
        let spec = tool.spec();
        let distro = if Provisioning::needs_distro(tool, env.platform) {
            DistroFamily::detect_in(&self.distro_root).await
        } else {
            DistroFamily::Unknown
        };
        tracing::debug!(?distro, "planning provisioning");
        let plan = Provisioning::plan(tool, &env, &self.release, distro);

        let invocation = match plan {
            Provisioning::Fetch { url, target } => {
                self.fetch_binary(&url, &target, spec.requires_execute_bit).await?;
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| spec.system_name.to_string());
                ToolInvocation::Local(name)
            }
            Provisioning::PackageManager(install) => {
                self.install_package(&install, &env).await?;
                ToolInvocation::SystemWide(spec.system_name.to_string())
            }
            Provisioning::Manual { guidance } => {
                tracing::warn!(
                    tool = spec.system_name,
                    "automatic install not possible on this host"
                );
                return Err(PipelineError::manual_install(spec.system_name, guidance));
            }
        };

        Self::expose_working_dir(&mut env);

        Ok(ResolvedTool {
            invocation,
            env,
            provisioned: true,
        })
    }

    async fn fetch_binary(&self, url: &str, target: &Path, executable: bool) -> Result<()> {
        tracing::info!(url, target = %target.display(), "downloading tool binary");
        let bytes = self.fetcher.fetch(url).await?;
        tokio::fs::write(target, &bytes).await?;

        if executable {
            make_executable(target).await?;
        }

        tracing::info!(bytes = bytes.len(), target = %target.display(), "tool binary saved");
        Ok(())
    }

    async fn install_package(&self, install: &PackageInstall, env: &HostEnvironment) -> Result<()> {
        for cmd in install.commands() {
            tracing::info!(command = %cmd, "running package manager");
            let output = self.runner.run(&cmd, env).await?;
            if !output.success() {
                return Err(PipelineError::PackageInstall {
                    command: cmd.to_string(),
                    code: output.code,
                });
            }
        }
        Ok(())
    }

    fn expose_working_dir(env: &mut HostEnvironment) {
        let dir = env.working_dir.clone();
        if env.prepend_dir(&dir) {
            tracing::debug!(dir = %dir.display(), "added working directory to search path");
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
