// End-to-end runs of the orchestrator against scripted yt-dlp / ffmpeg stand-ins

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use yt_merge::pipeline::{
    BinaryFetcher, CommandRunner, CommandSpec, HostEnvironment, Orchestrator, Platform,
    ProcessOutput, ReleaseSource, Result, RunRequest, ToolResolver,
};

const LISTING: &str = "\
[youtube] Extracting URL: https://youtu.be/abc
[youtube] abc: Downloading webpage
[info] Available formats for abc:
ID  EXT   RESOLUTION FPS |   FILESIZE
140 m4a   audio only     |    3.2MiB
137 mp4   1920x1080   30 |   40.1MiB
";

/// Pretends to be yt-dlp and ffmpeg, writing the files they would write.
struct FakeTools {
    /// Programs that answer their version flag.
    installed: Vec<&'static str>,
    /// Format id -> stderr for downloads that should fail.
    failing_formats: HashMap<&'static str, &'static str>,
    merge_stderr: Option<&'static str>,
    printed_filename: &'static str,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeTools {
    fn new() -> Self {
        Self {
            installed: vec!["yt-dlp", "ffmpeg"],
            failing_formats: HashMap::new(),
            merge_stderr: None,
            printed_filename: "My Video.webm\n",
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    fn merge_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == "ffmpeg" && c.has_arg("-i"))
            .count()
    }

    fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeTools {
    async fn run(
        &self,
        cmd: &CommandSpec,
        env: &HostEnvironment,
    ) -> std::io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(cmd.clone());

        if cmd.has_arg("--version") || cmd.has_arg("-version") {
            let local = env.working_dir.join(&cmd.program);
            let runnable = self.installed.contains(&cmd.program.as_str())
                || (env.contains_dir(&env.working_dir) && local.is_file());
            return if runnable {
                Ok(Self::ok("1.0"))
            } else {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
            };
        }

        if cmd.program == "sudo" {
            return Ok(Self::ok(""));
        }

        if cmd.program == "ffmpeg" {
            // Like the real tool, the output is created before a failure is detected.
            let output = cmd.args.last().expect("output path");
            std::fs::write(output, b"merged")?;
            return Ok(match self.merge_stderr {
                Some(stderr) => Self::failed(stderr),
                None => Self::ok(""),
            });
        }

        if cmd.has_arg("-F") {
            return Ok(Self::ok(LISTING));
        }
        if cmd.has_arg("--print") {
            return Ok(Self::ok(self.printed_filename));
        }

        let format = cmd.arg_after("-f").expect("format flag");
        if let Some(stderr) = self.failing_formats.get(format) {
            return Ok(Self::failed(stderr));
        }
        let output = cmd.arg_after("-o").expect("output flag");
        std::fs::write(env.working_dir.join(output), b"stream")?;
        Ok(Self::ok(""))
    }
}

#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl BinaryFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"#!/bin/sh\n".to_vec())
    }
}

fn request() -> RunRequest {
    RunRequest {
        source_url: "https://youtu.be/abc".to_string(),
        audio_format: "140".to_string(),
        video_format: "137".to_string(),
    }
}

fn env(dir: &Path) -> HostEnvironment {
    HostEnvironment::new(Platform::Linux, vec![PathBuf::from("/usr/bin")], dir)
}

fn orchestrator(tools: Arc<FakeTools>, fetcher: Arc<FakeFetcher>) -> Orchestrator {
    Orchestrator::new(
        tools,
        fetcher,
        ReleaseSource::new("https://releases.example", "2024.08.06"),
    )
}

#[tokio::test]
async fn default_formats_download_merge_and_clean_up() {
    let dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(FakeTools::new());

    let summary = orchestrator(tools.clone(), Arc::new(FakeFetcher::default()))
        .run(&request(), env(dir.path()))
        .await;

    assert!(summary.is_success(), "{:?}", summary.error);
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.output, Some(dir.path().join("My_Video.mp4")));
    assert!(dir.path().join("My_Video.mp4").is_file());
    assert!(!dir.path().join("my_audio.m4a").exists());
    assert!(!dir.path().join("my_video.mp4").exists());
    assert_eq!(summary.cleanup.removed_count, 2);
    assert_eq!(summary.cleanup.error_count, 0);

    let rendered: Vec<String> = tools.calls().iter().map(ToString::to_string).collect();
    assert!(rendered.contains(&"yt-dlp -f 140 https://youtu.be/abc -o my_audio.m4a".to_string()));
    assert!(rendered.contains(&"yt-dlp -f 137 https://youtu.be/abc -o my_video.mp4".to_string()));
    assert!(rendered.contains(&"yt-dlp --print filename https://youtu.be/abc".to_string()));
    assert_eq!(tools.merge_calls(), 1);
}

#[tokio::test]
async fn unavailable_video_format_prints_listing_and_skips_merge() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = FakeTools::new();
    tools.failing_formats.insert(
        "137",
        "ERROR: [youtube] abc: Requested format is not available. Use --list-formats for a list of available formats",
    );
    let tools = Arc::new(tools);

    let summary = orchestrator(tools.clone(), Arc::new(FakeFetcher::default()))
        .run(&request(), env(dir.path()))
        .await;

    assert_eq!(summary.exit_code, 1);
    assert!(summary.output.is_none());

    let listing = summary.format_listing.as_deref().expect("format table");
    assert!(listing.starts_with("ID  EXT"));
    assert!(listing.contains("137 mp4"));
    assert!(!listing.contains("[youtube]"));

    assert_eq!(tools.merge_calls(), 0);
    assert!(!dir.path().join("My_Video.mp4").exists());
    // The audio stream had already landed and is cleaned up.
    assert!(!dir.path().join("my_audio.m4a").exists());
    assert_eq!(summary.cleanup.removed_count, 1);
    assert_eq!(summary.cleanup.not_found_count, 1);
}

#[tokio::test]
async fn audio_failure_never_attempts_video() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = FakeTools::new();
    tools
        .failing_formats
        .insert("140", "ERROR: [youtube] abc: Video unavailable");
    let tools = Arc::new(tools);

    let summary = orchestrator(tools.clone(), Arc::new(FakeFetcher::default()))
        .run(&request(), env(dir.path()))
        .await;

    assert_eq!(summary.exit_code, 1);
    assert!(summary.format_listing.is_none());
    assert!(summary.error.as_deref().unwrap().contains("Video unavailable"));
    assert!(!tools.calls().iter().any(|c| c.arg_after("-f") == Some("137")));
    assert!(!tools.calls().iter().any(|c| c.has_arg("-F")));
    assert_eq!(summary.cleanup.not_found_count, 2);
}

#[tokio::test]
async fn merge_failure_still_removes_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = FakeTools::new();
    tools.merge_stderr = Some("my_video.mp4: Invalid data found when processing input");
    let tools = Arc::new(tools);

    let summary = orchestrator(tools.clone(), Arc::new(FakeFetcher::default()))
        .run(&request(), env(dir.path()))
        .await;

    assert_eq!(summary.exit_code, 1);
    assert!(summary.output.is_none());
    assert!(summary.error.as_deref().unwrap().contains("Invalid data found"));
    assert!(!dir.path().join("my_audio.m4a").exists());
    assert!(!dir.path().join("my_video.mp4").exists());

    // The partial output is kept for inspection; only the temp streams are removed.
    assert!(dir.path().join("My_Video.mp4").is_file());
    assert_eq!(summary.cleanup.removed_count, 2);
    assert_eq!(summary.cleanup.entries.len(), 2);
    assert!(summary
        .cleanup
        .entries
        .iter()
        .all(|e| e.path != dir.path().join("My_Video.mp4")));
}

#[tokio::test]
async fn invalid_identifier_fails_before_downloading() {
    let dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(FakeTools::new());
    let mut req = request();
    req.video_format = "18".to_string();

    let summary = orchestrator(tools.clone(), Arc::new(FakeFetcher::default()))
        .run(&req, env(dir.path()))
        .await;

    assert_eq!(summary.exit_code, 1);
    let error = summary.error.unwrap();
    assert!(error.contains("invalid format identifier '18'"));
    assert!(!tools.calls().iter().any(|c| c.has_arg("-f")));
}

#[tokio::test]
async fn missing_downloader_is_provisioned_and_used_locally() {
    let dir = tempfile::tempdir().unwrap();
    let mut tools = FakeTools::new();
    tools.installed = vec!["ffmpeg"];
    let tools = Arc::new(tools);
    let fetcher = Arc::new(FakeFetcher::default());

    let summary = orchestrator(tools.clone(), fetcher.clone())
        .run(&request(), env(dir.path()))
        .await;

    assert!(summary.is_success(), "{:?}", summary.error);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("yt-dlp_linux").is_file());
    assert!(tools
        .calls()
        .iter()
        .filter(|c| c.has_arg("-f"))
        .all(|c| c.program == "yt-dlp_linux"));

    // A second run finds the binary from the first one.
    let again = orchestrator(tools.clone(), fetcher.clone())
        .run(&request(), env(dir.path()))
        .await;
    assert!(again.is_success(), "{:?}", again.error);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_transcoder_is_installed_with_distro_package_manager() {
    let dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("etc")).unwrap();
    std::fs::write(root.path().join("etc/os-release"), "ID=ubuntu\nID_LIKE=debian\n").unwrap();

    let mut tools = FakeTools::new();
    tools.installed = vec!["yt-dlp"];
    let tools = Arc::new(tools);
    let fetcher = Arc::new(FakeFetcher::default());
    let release = ReleaseSource::new("https://releases.example", "2024.08.06");

    let summary = orchestrator(tools.clone(), fetcher.clone())
        .with_resolver(
            ToolResolver::new(tools.clone(), fetcher.clone(), release)
                .with_distro_root(root.path()),
        )
        .run(&request(), env(dir.path()))
        .await;

    assert!(summary.is_success(), "{:?}", summary.error);
    let installs: Vec<String> = tools
        .calls()
        .iter()
        .filter(|c| c.program == "sudo")
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        installs,
        vec!["sudo apt-get update", "sudo apt-get install -y ffmpeg"]
    );
    assert!(tools.calls().iter().filter(|c| c.program == "sudo").all(|c| c.attached));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(tools.merge_calls(), 1);
}

#[tokio::test]
async fn summary_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let summary = orchestrator(Arc::new(FakeTools::new()), Arc::new(FakeFetcher::default()))
        .run(&request(), env(dir.path()))
        .await;

    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["cleanup"]["removed_count"], 2);
    assert_eq!(json["cleanup"]["entries"][0]["status"]["status"], "removed");
    assert!(json.get("format_listing").is_none());
}
