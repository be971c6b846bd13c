// DownloadController - owns the single download session
//
// Flow of a monitored download:
// 1. resolve the quality snapshot (fetching info when none is cached)
// 2. spawn yt-dlp with the option's selector token
// 3. pump its merged stdout/stderr lines through the progress parser
// 4. reap the process, clear the handle, reset the session to idle

use std::collections::VecDeque;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use super::config::DownloaderConfig;
use super::diagnostics::describe_failure;
use super::errors::DownloadError;
use super::extractor::YtDlpExtractor;
use super::format_selector::{FormatSelector, QualityPreset};
use super::formatting::format_size;
use super::models::{DownloadRequest, QualityCategory, QualityOption, QualitySnapshot};
use super::process::{platform_factory, ProcessControl, ProcessFactory};
use super::progress::parse_progress_line;
use super::session::{SessionPhase, SessionState};
use super::tools::{ToolInfo, ToolManager};
use super::traits::{InfoExtractor, ProgressReporter};
use super::utils::{network_args, spawn_error};
use super::validation::{filename_from_url, is_valid_save_path, safe_title, sanitize_filename, validate_url};

const OUTPUT_TAIL_LINES: usize = 20;
/// How long to keep reading buffered output after the process exited
const DRAIN_GRACE: Duration = Duration::from_millis(500);

enum RunEnd {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut(Duration),
}

pub struct DownloadController {
    config: DownloaderConfig,
    tools: Arc<ToolManager>,
    extractor: Arc<dyn InfoExtractor>,
    reporter: Arc<dyn ProgressReporter>,
    state: SessionState,
    process: Mutex<Option<Arc<dyn ProcessControl>>>,
    process_factory: ProcessFactory,
    snapshot: Mutex<Option<Arc<QualitySnapshot>>>,
    generation: AtomicU64,
    http: reqwest::Client,
}

impl DownloadController {
    pub fn new(
        config: DownloaderConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self, DownloadError> {
        let tools = Arc::new(ToolManager::new(config.clone()));
        let extractor: Arc<dyn InfoExtractor> =
            Arc::new(YtDlpExtractor::new(config.clone(), Arc::clone(&tools)));
        let http = build_http_client(&config)?;

        Ok(Self {
            config,
            tools,
            extractor,
            reporter,
            state: SessionState::new(),
            process: Mutex::new(None),
            process_factory: platform_factory(),
            snapshot: Mutex::new(None),
            generation: AtomicU64::new(0),
            http,
        })
    }

    /// Replace the metadata source
    pub fn with_extractor(mut self, extractor: Arc<dyn InfoExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the process-control backend picked for this platform
    pub fn with_process_factory(mut self, factory: ProcessFactory) -> Self {
        self.process_factory = factory;
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub async fn tool_info(&self) -> ToolInfo {
        self.tools.tool_info().await
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub async fn has_active_process(&self) -> bool {
        self.process.lock().await.is_some()
    }

    /// Most recent snapshot, if any info was fetched
    pub async fn latest_snapshot(&self) -> Option<Arc<QualitySnapshot>> {
        self.snapshot.lock().await.clone()
    }

    /// Ranked options of the latest snapshot; empty before the first fetch
    pub async fn quality_options(&self) -> Vec<QualityOption> {
        self.latest_snapshot()
            .await
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    /// Fetch metadata and rank its formats into a new snapshot
    pub async fn fetch_info(&self, url: &str) -> Result<Arc<QualitySnapshot>, DownloadError> {
        let result = self.refresh_snapshot(url).await;
        match &result {
            Ok(snapshot) => {
                self.reporter.status(&format!(
                    "Found {} quality options for '{}'",
                    snapshot.options.len(),
                    snapshot.info.title
                ));
            }
            Err(e) => {
                warn!("[Controller] Info fetch failed: {}", e);
                self.reporter
                    .status(&format!("Failed to fetch media info: {}", e));
            }
        }
        result
    }

    async fn refresh_snapshot(&self, url: &str) -> Result<Arc<QualitySnapshot>, DownloadError> {
        let url = url.trim();
        if !validate_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        self.reporter.status("Fetching media info...");
        info!("[Controller] Fetching info with {}", self.extractor.name());
        let info = self.extractor.extract(url).await?;
        let options = FormatSelector::build_quality_options(&info.formats);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "[Controller] Snapshot {}: '{}' with {} options",
            generation,
            info.title,
            options.len()
        );

        let snapshot = Arc::new(QualitySnapshot {
            generation,
            url: url.to_string(),
            info,
            options,
        });
        *self.snapshot.lock().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Monitored download of one ranked option. Returns once yt-dlp has
    /// exited or the session was cancelled.
    pub async fn start_download(&self, request: &DownloadRequest) -> Result<(), DownloadError> {
        if !self.state.try_start() {
            return self.reject_busy();
        }

        let result = self.run_download(request).await;
        self.state.reset();
        self.report_outcome(&result, "Download completed successfully");
        result
    }

    async fn run_download(&self, request: &DownloadRequest) -> Result<(), DownloadError> {
        let url = request.url.trim();
        if !validate_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }
        check_destination(&request.destination)?;

        let snapshot = self.resolve_snapshot(request).await?;
        if snapshot.options.is_empty() {
            return Err(DownloadError::NoQualityAvailable);
        }
        let option = snapshot.options.get(request.quality_index).ok_or(
            DownloadError::InvalidQualityIndex {
                index: request.quality_index,
                len: snapshot.options.len(),
            },
        )?;

        let tool = self.tools.resolve().await?;
        let args = self.download_args(&snapshot, option, &request.destination, url);

        if self.state.is_cancelled() {
            return Err(DownloadError::UserCancelled);
        }

        info!("[Controller] Downloading '{}' as {}", snapshot.info.title, option.selector);
        self.reporter.progress(0.0);
        self.reporter.status(&format!("Starting download: {}", option.label));
        self.run_tool(&tool, &args, None, true).await
    }

    /// Cached snapshot for the request, or a fresh one when nothing is cached.
    ///
    /// A snapshot built for another URL, or a request pinned to another
    /// generation, is rejected instead of being reused.
    async fn resolve_snapshot(&self, request: &DownloadRequest) -> Result<Arc<QualitySnapshot>, DownloadError> {
        let cached = self.latest_snapshot().await;
        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => {
                info!("[Controller] No cached info, fetching for {}", request.url.trim());
                self.refresh_snapshot(&request.url).await?
            }
        };

        let generation_mismatch = request
            .generation
            .map_or(false, |g| g != snapshot.generation);
        if !snapshot.matches(&request.url) || generation_mismatch {
            return Err(DownloadError::StaleSnapshot {
                snapshot_url: snapshot.url.clone(),
                requested_url: request.url.trim().to_string(),
                generation: snapshot.generation,
            });
        }

        Ok(snapshot)
    }

    fn download_args(
        &self,
        snapshot: &QualitySnapshot,
        option: &QualityOption,
        destination: &Path,
        url: &str,
    ) -> Vec<String> {
        let name = safe_title(&snapshot.info.title, self.config.max_title_len);
        let template = destination.join(format!("{}.%(ext)s", name));

        let mut args = vec![
            "-f".to_string(),
            option.selector.clone(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
        ];
        args.extend(network_args(&self.config));

        if option.category == QualityCategory::SeparatePair {
            args.push("--merge-output-format".to_string());
            args.push(self.config.merge_output_format.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Download with a raw selector token, bounded by `selector_timeout`,
    /// without progress reporting.
    pub async fn download_with_selector(
        &self,
        url: &str,
        selector: &str,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        if !self.state.try_start() {
            return self.reject_busy();
        }

        let result = self.run_selector_download(url, selector, destination).await;
        self.state.reset();
        self.report_outcome(&result, "Download completed successfully");
        result
    }

    /// Download one of the fallback presets
    pub async fn download_preset(
        &self,
        url: &str,
        preset: QualityPreset,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        self.download_with_selector(url, preset.selector(), destination)
            .await
    }

    async fn run_selector_download(
        &self,
        url: &str,
        selector: &str,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        let url = url.trim();
        if !validate_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }
        check_destination(destination)?;

        let tool = self.tools.resolve().await?;
        let template = destination.join("%(title)s.%(ext)s");
        let mut args = vec![
            "-f".to_string(),
            selector.to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--no-playlist".to_string(),
        ];
        args.extend(network_args(&self.config));
        if selector.contains('+') {
            args.push("--merge-output-format".to_string());
            args.push(self.config.merge_output_format.clone());
        }
        args.push(url.to_string());

        self.reporter.status(&format!("Downloading ({})...", selector));
        self.run_tool(&tool, &args, Some(self.config.selector_timeout), false)
            .await
    }

    /// Spawn yt-dlp, register its control handle and pump its output until
    /// it exits, the session is cancelled or `limit` runs out.
    async fn run_tool(
        &self,
        tool: &Path,
        args: &[String],
        limit: Option<Duration>,
        report_progress: bool,
    ) -> Result<(), DownloadError> {
        debug!("[Controller] {} {}", tool.display(), args.join(" "));

        // One pipe behind both streams keeps lines in the order they were written
        let (output, output_writer) = os_pipe::pipe()?;
        let error_writer = output_writer.try_clone()?;
        let mut child = TokioCommand::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(output_writer)
            .stderr(error_writer)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(tool.as_os_str(), e))?;

        let pid = child
            .id()
            .ok_or_else(|| DownloadError::Io("Process exited before it could be tracked".to_string()))?;

        let (exited_tx, exited_rx) = watch::channel(false);
        let control = (self.process_factory)(pid, exited_rx);
        *self.process.lock().await = Some(Arc::clone(&control));
        info!("[Controller] yt-dlp running (pid {})", pid);

        // A cancel that landed before the handle was visible found nothing to stop
        if self.state.is_cancelled() {
            if let Err(e) = control.terminate() {
                warn!("[Controller] Terminate failed: {}", e);
            }
        }

        let (line_tx, mut lines) = mpsc::unbounded_channel();
        // Ends at EOF, once every holder of the write end is gone
        tokio::task::spawn_blocking(move || forward_lines(output, line_tx));

        let mut output_tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let pump = async {
            loop {
                tokio::select! {
                    biased;
                    line = lines.recv() => match line {
                        Some(line) => {
                            self.observe_line(&line, &mut output_tail, report_progress);
                            if self.state.is_cancelled() {
                                return RunEnd::Cancelled;
                            }
                        }
                        None => return RunEnd::Exited(child.wait().await),
                    },
                    status = child.wait() => return RunEnd::Exited(status),
                }
            }
        };

        let end = match limit {
            Some(limit) => tokio::time::timeout(limit, pump)
                .await
                .unwrap_or(RunEnd::TimedOut(limit)),
            None => pump.await,
        };

        match &end {
            RunEnd::Exited(_) => {
                let _ = exited_tx.send(true);
                let _ = tokio::time::timeout(DRAIN_GRACE, async {
                    while let Some(line) = lines.recv().await {
                        self.observe_line(&line, &mut output_tail, report_progress);
                    }
                })
                .await;
            }
            RunEnd::Cancelled => {
                // cancel() is terminating it; make sure it is gone either way
                if tokio::time::timeout(self.config.cancel_grace * 2, child.wait())
                    .await
                    .is_err()
                {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                let _ = exited_tx.send(true);
            }
            RunEnd::TimedOut(limit) => {
                warn!("[Controller] yt-dlp exceeded {}s, killing", limit.as_secs());
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = exited_tx.send(true);
            }
        }

        self.process.lock().await.take();

        if self.state.is_cancelled() {
            return Err(DownloadError::UserCancelled);
        }

        match end {
            RunEnd::Exited(Ok(status)) if status.success() => Ok(()),
            RunEnd::Exited(Ok(status)) => Err(exit_failure(status, &output_tail)),
            RunEnd::Exited(Err(e)) => Err(DownloadError::Io(format!("Process error: {}", e))),
            RunEnd::Cancelled => Err(DownloadError::UserCancelled),
            RunEnd::TimedOut(limit) => Err(DownloadError::Timeout(limit)),
        }
    }

    fn observe_line(&self, line: &str, output_tail: &mut VecDeque<String>, report_progress: bool) {
        if output_tail.len() == OUTPUT_TAIL_LINES {
            output_tail.pop_front();
        }
        output_tail.push_back(line.to_string());

        if !report_progress {
            return;
        }

        match parse_progress_line(line) {
            Some(event) => match event.to_progress() {
                Some(update) => self.reporter.emit(&update),
                None => self.reporter.status(&event.status_text()),
            },
            None => {
                if !line.trim().is_empty() {
                    debug!("[yt-dlp] {}", line);
                }
            }
        }
    }

    /// Suspend the running download. When suspending fails the download is
    /// cancelled instead. Returns whether the session is now paused.
    pub async fn pause(&self) -> bool {
        let control = match self.process.lock().await.clone() {
            Some(control) => control,
            None => return false,
        };
        if !self.state.mark_paused() {
            return false;
        }

        match control.suspend() {
            Ok(()) => {
                info!("[Controller] Paused pid {}", control.pid());
                self.reporter.status("Download paused");
                true
            }
            Err(e) => {
                warn!("[Controller] Pause failed ({}), cancelling instead", e);
                self.cancel().await;
                false
            }
        }
    }

    /// Continue a paused download. Signal failures are logged and ignored.
    pub async fn resume(&self) -> bool {
        if !self.state.is_paused() {
            return false;
        }
        let control = self.process.lock().await.clone();
        if !self.state.mark_resumed() {
            return false;
        }

        if let Some(control) = control {
            match control.resume() {
                Ok(()) => info!("[Controller] Resumed pid {}", control.pid()),
                Err(e) => warn!("[Controller] Resume failed: {}", e),
            }
        }
        self.reporter.status("Download resumed");
        true
    }

    /// Stop the active download: graceful terminate, `cancel_grace`, then kill.
    /// Does nothing when no download is active.
    pub async fn cancel(&self) {
        let previous = match self.state.request_cancel() {
            Some(phase) => phase,
            None => {
                debug!("[Controller] Nothing to cancel");
                return;
            }
        };

        info!("[Controller] Cancelling download");
        self.reporter.status("Cancelling download...");

        let control = self.process.lock().await.take();
        let control = match control {
            Some(control) => control,
            // Plain-file transfers and not-yet-spawned downloads watch the flag
            None => return,
        };

        // A stopped process would never act on SIGTERM
        if previous == SessionPhase::Paused {
            if let Err(e) = control.resume() {
                debug!("[Controller] Resume before terminate failed: {}", e);
            }
        }

        if let Err(e) = control.terminate() {
            warn!("[Controller] Terminate failed: {}", e);
        }

        if !control.wait(self.config.cancel_grace).await {
            warn!(
                "[Controller] pid {} still alive after {}s, killing",
                control.pid(),
                self.config.cancel_grace.as_secs()
            );
            if let Err(e) = control.kill() {
                warn!("[Controller] Kill failed: {}", e);
            }
        }
    }

    /// Stream a non-media URL straight to disk. The partial file is removed
    /// when the transfer is cancelled.
    pub async fn download_plain_file(
        &self,
        url: &str,
        destination: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        if !self.state.try_start() {
            return self.reject_busy();
        }

        let result = self.fetch_plain_file(url, destination, filename).await;
        self.state.reset();
        self.report_outcome(&result, "File downloaded successfully");
        result
    }

    async fn fetch_plain_file(
        &self,
        url: &str,
        destination: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let url = url.trim();
        if !validate_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }
        check_destination(destination)?;

        let name = match filename.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => sanitize_filename(name),
            None => filename_from_url(url),
        };
        let path = destination.join(&name);

        self.reporter.status(&format!("Downloading {}...", name));
        let mut response = self.http.get(url).send().await?.error_for_status()?;
        let total = response.content_length().filter(|len| *len > 0);
        info!(
            "[Controller] GET {} -> {} ({})",
            url,
            path.display(),
            total.map(format_size).unwrap_or_else(|| "unknown size".to_string())
        );

        let file = tokio::fs::File::create(&path).await?;
        let mut writer = BufWriter::with_capacity(self.config.chunk_size.max(1), file);

        match self.stream_body(&mut response, &mut writer, total).await {
            Ok(true) => {
                writer.flush().await?;
                Ok(path)
            }
            Ok(false) => {
                drop(writer);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("[Controller] Could not remove partial {}: {}", path.display(), e);
                }
                Err(DownloadError::UserCancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// Copy the body chunk by chunk; `Ok(false)` when cancelled
    async fn stream_body<W>(
        &self,
        response: &mut reqwest::Response,
        writer: &mut W,
        total: Option<u64>,
    ) -> Result<bool, DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut downloaded: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            if self.state.is_cancelled() {
                return Ok(false);
            }

            writer.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            match total {
                Some(total) => {
                    let percent = ((downloaded as f64 / total as f64) * 100.0).min(100.0) as f32;
                    self.reporter.progress(percent);
                    self.reporter.status(&format!(
                        "{:.1}% - {:.1}/{:.1} MB",
                        percent,
                        downloaded as f64 / 1_048_576.0,
                        total as f64 / 1_048_576.0
                    ));
                }
                None => {
                    self.reporter
                        .status(&format!("{} downloaded", format_size(downloaded)));
                }
            }
        }

        Ok(!self.state.is_cancelled())
    }

    fn reject_busy<T>(&self) -> Result<T, DownloadError> {
        warn!("[Controller] Rejected: a download is already in progress");
        self.reporter.status("Another download is already in progress");
        Err(DownloadError::SessionBusy)
    }

    fn report_outcome<T>(&self, result: &Result<T, DownloadError>, success: &str) {
        match result {
            Ok(_) => {
                info!("[Controller] ✓ {}", success);
                self.reporter.status(success);
            }
            Err(DownloadError::UserCancelled) => {
                info!("[Controller] Download cancelled");
                self.reporter.status("Download cancelled");
            }
            Err(e) => {
                warn!("[Controller] ✗ {} ({})", e, e.kind());
                self.reporter.status(&format!("Download failed: {}", e));
            }
        }
    }
}

fn build_http_client(config: &DownloaderConfig) -> Result<reqwest::Client, DownloadError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("video-downloader/", env!("CARGO_PKG_VERSION")));

    if let Some(seconds) = config.socket_timeout {
        builder = builder.connect_timeout(Duration::from_secs(u64::from(seconds)));
    }

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| DownloadError::Http(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    } else if !config.use_system_proxy {
        builder = builder.no_proxy();
    }

    Ok(builder.build()?)
}

fn check_destination(destination: &Path) -> Result<(), DownloadError> {
    if is_valid_save_path(destination) {
        Ok(())
    } else {
        Err(DownloadError::Io(format!(
            "{} is not a writable directory",
            destination.display()
        )))
    }
}

fn exit_failure(status: ExitStatus, output_tail: &VecDeque<String>) -> DownloadError {
    let output = output_tail
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    if output.trim().is_empty() {
        DownloadError::ToolError(format!("yt-dlp exited with {}", status))
    } else {
        DownloadError::ToolError(describe_failure(&output))
    }
}

/// Forward the merged output line by line; invalid UTF-8 is replaced, never fatal
fn forward_lines<R: Read>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut reader = std::io::BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                if tx.send(text).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("[Controller] Output read failed: {}", e);
                break;
            }
        }
    }
}
