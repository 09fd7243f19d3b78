use clap::{ArgAction, Args, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use std::time::Duration;
use thiserror::Error;

use crate::bands::BandMode;
use crate::constants::*;
use crate::spectrum::LevelMode;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// On-disk configuration. Every field is optional so the YAML file, the
/// environment and the command line can be layered over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    pub spectrum: Option<SpectrumSection>,
    pub metadata: Option<MetadataSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpectrumSection {
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u16>,
    pub fft_size: Option<usize>,
    pub hop_size: Option<usize>,
    pub target_fps: Option<u32>,
    pub band_mode: Option<BandMode>,
    pub band_centers: Option<Vec<f32>>,
    pub noise_floor_db: Option<f32>,
    pub attack_rate: Option<f32>,
    pub decay_rate: Option<f32>,
    pub level_mode: Option<LevelMode>,
    pub power_epsilon: Option<f32>,
    pub source: Option<PathBuf>,
    pub ws_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataSection {
    pub snapserver_host: Option<String>,
    pub snapserver_port: Option<u16>,
    pub mpd_port: Option<u16>,
    pub client_id: Option<String>,
    pub output: Option<PathBuf>,
    pub ws_port: Option<u16>,
    pub poll_secs: Option<u64>,
}

/// Resolved analyzer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub fft_size: usize,
    /// samples advanced per tick; `None` means sample_rate / target_fps
    pub hop_size: Option<usize>,
    pub target_fps: u32,
    pub band_mode: BandMode,
    pub band_centers: Option<Vec<f32>>,
    pub noise_floor: f32,
    pub attack_rate: f32,
    pub decay_rate: f32,
    pub level_mode: LevelMode,
    pub power_epsilon: f32,
    pub source: PathBuf,
    pub ws_port: u16,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            fft_size: DEFAULT_FFT_SIZE,
            hop_size: None,
            target_fps: DEFAULT_TARGET_FPS,
            band_mode: BandMode::default(),
            band_centers: None,
            noise_floor: NOISE_FLOOR_DB,
            attack_rate: DEFAULT_ATTACK_RATE,
            decay_rate: DEFAULT_DECAY_RATE,
            level_mode: LevelMode::default(),
            power_epsilon: DEFAULT_POWER_EPSILON,
            source: PathBuf::from(DEFAULT_PCM_SOURCE),
            ws_port: DEFAULT_VISUALIZER_WS_PORT,
        }
    }
}

impl SpectrumConfig {
    pub fn hop_size(&self) -> usize {
        self.hop_size
            .unwrap_or_else(|| (self.sample_rate / self.target_fps.max(1)) as usize)
            .max(1)
    }

    /// Bytes the PCM source must deliver per tick.
    pub fn chunk_bytes(&self) -> usize {
        self.hop_size() * self.channels as usize * BYTES_PER_SAMPLE
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Validation(msg));
        if self.sample_rate == 0 {
            return fail("sample rate must be > 0".into());
        }
        if !(1..=2).contains(&self.channels) {
            return fail(format!("channels must be 1 or 2, got {}", self.channels));
        }
        if !self.fft_size.is_power_of_two() || !(FFT_SIZE_MIN..=FFT_SIZE_MAX).contains(&self.fft_size) {
            return fail(format!(
                "fft size must be a power of two in {FFT_SIZE_MIN}..={FFT_SIZE_MAX}, got {}",
                self.fft_size
            ));
        }
        if !(1..=TARGET_FPS_MAX).contains(&self.target_fps) {
            return fail(format!("target fps must be 1..={TARGET_FPS_MAX}, got {}", self.target_fps));
        }
        if let Some(hop) = self.hop_size {
            if hop == 0 || hop > self.fft_size {
                return fail(format!("hop size must be 1..={}, got {hop}", self.fft_size));
            }
        } else if self.hop_size() > self.fft_size {
            return fail(format!(
                "derived hop size {} exceeds fft size {}, raise fps or fft size",
                self.hop_size(),
                self.fft_size
            ));
        }
        if !self.noise_floor.is_finite() || self.noise_floor >= 0.0 {
            return fail(format!("noise floor must be negative dB, got {}", self.noise_floor));
        }
        if !(self.decay_rate > 0.0 && self.decay_rate < self.attack_rate && self.attack_rate <= 1.0) {
            return fail(format!(
                "smoothing rates need 0 < decay < attack <= 1, got attack {} decay {}",
                self.attack_rate, self.decay_rate
            ));
        }
        if !(self.power_epsilon > 0.0) {
            return fail("power epsilon must be > 0".into());
        }
        if let Some(centers) = self.band_centers.as_ref() {
            let nyq = self.sample_rate as f32 / 2.0;
            if centers.is_empty() {
                return fail("band centre list is empty".into());
            }
            if centers.iter().any(|c| !c.is_finite() || *c <= 0.0 || *c >= nyq) {
                return fail(format!("band centres must lie in (0, {nyq}) Hz"));
            }
            if centers.windows(2).any(|w| w[1] <= w[0]) {
                return fail("band centres must be strictly increasing".into());
            }
        }
        Ok(())
    }
}

/// Resolved metadata poller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub snapserver_host: String,
    pub snapserver_port: u16,
    pub mpd_port: u16,
    pub client_id: String,
    pub output: PathBuf,
    pub ws_port: u16,
    pub poll_interval: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            snapserver_host: DEFAULT_SNAPSERVER_HOST.to_string(),
            snapserver_port: DEFAULT_SNAPSERVER_PORT,
            mpd_port: DEFAULT_MPD_PORT,
            client_id: String::new(),
            output: PathBuf::from(DEFAULT_METADATA_OUTPUT),
            ws_port: DEFAULT_METADATA_WS_PORT,
            poll_interval: DEFAULT_METADATA_POLL,
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Validation("CLIENT_ID is required".into()));
        }
        if self.snapserver_host.trim().is_empty() {
            return Err(ConfigError::Validation("snapserver host must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Validation("poll interval must be > 0".into()));
        }
        Ok(())
    }
}

/// Options shared by both binaries.
#[derive(Debug, Args, Clone, Default)]
pub struct CommonArgs {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// CLI overrides for the analyzer; each also reads its environment variable.
#[derive(Debug, Parser, Clone)]
#[command(name = "snapviz", version, about = "Octave-band spectrum analyzer for snapclient PCM")]
pub struct SpectrumCli {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, env = "SAMPLE_RATE")]
    pub sample_rate: Option<u32>,
    #[arg(long, env = "CHANNELS")]
    pub channels: Option<u16>,
    #[arg(long, env = "FFT_SIZE")]
    pub fft_size: Option<usize>,
    #[arg(long, env = "HOP_SIZE")]
    pub hop_size: Option<usize>,
    #[arg(long, env = "TARGET_FPS")]
    pub target_fps: Option<u32>,
    /// half-octave | third-octave
    #[arg(long, env = "BAND_MODE")]
    pub band_mode: Option<BandMode>,
    /// Comma separated centre frequencies in Hz
    #[arg(long, env = "BAND_CENTERS")]
    pub band_centers: Option<String>,
    #[arg(long, env = "NOISE_FLOOR", allow_hyphen_values = true)]
    pub noise_floor: Option<f32>,
    #[arg(long, env = "ATTACK_RATE")]
    pub attack_rate: Option<f32>,
    #[arg(long, env = "DECAY_RATE")]
    pub decay_rate: Option<f32>,
    /// absolute | normalized
    #[arg(long, env = "LEVEL_MODE")]
    pub level_mode: Option<LevelMode>,
    #[arg(long, env = "POWER_EPSILON")]
    pub power_epsilon: Option<f32>,
    /// FIFO or device node delivering s16le PCM
    #[arg(long, env = "PCM_SOURCE", value_hint = ValueHint::FilePath)]
    pub source: Option<PathBuf>,
    #[arg(long, env = "VISUALIZER_WS_PORT")]
    pub ws_port: Option<u16>,
}

/// CLI overrides for the metadata poller.
#[derive(Debug, Parser, Clone)]
#[command(name = "snapviz-meta", version, about = "Snapcast / MPD metadata and artwork poller")]
pub struct MetadataCli {
    #[command(flatten)]
    pub common: CommonArgs,
    #[arg(long, env = "SNAPSERVER_HOST")]
    pub snapserver_host: Option<String>,
    #[arg(long, env = "SNAPSERVER_PORT")]
    pub snapserver_port: Option<u16>,
    #[arg(long, env = "MPD_PORT")]
    pub mpd_port: Option<u16>,
    /// Snapclient host name whose stream is followed
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,
    #[arg(long, env = "METADATA_OUTPUT", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
    #[arg(long, env = "METADATA_WS_PORT")]
    pub ws_port: Option<u16>,
    #[arg(long, env = "METADATA_POLL_SECS")]
    pub poll_secs: Option<u64>,
}

/// Effective settings for one service plus the log filter to start with.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub log_level: String,
    pub service: T,
}

/// Public entry point for the analyzer: parse CLI, read YAML, merge, validate.
pub fn load_spectrum() -> Result<Loaded<SpectrumConfig>, ConfigError> {
    let cli = SpectrumCli::parse();
    let mut cfg = load_file(&cli.common)?;
    apply_spectrum_cli(&mut cfg, &cli)?;
    let service = resolve_spectrum(&cfg)?;

    if cli.common.dump_config {
        dump(&cfg)?;
    }
    Ok(Loaded { log_level: log_filter(&cli.common, &cfg), service })
}

/// Public entry point for the metadata poller.
pub fn load_metadata() -> Result<Loaded<MetadataConfig>, ConfigError> {
    let cli = MetadataCli::parse();
    let mut cfg = load_file(&cli.common)?;
    apply_metadata_cli(&mut cfg, &cli);
    let service = resolve_metadata(&cfg)?;

    if cli.common.dump_config {
        dump(&cfg)?;
    }
    Ok(Loaded { log_level: log_filter(&cli.common, &cfg), service })
}

fn dump(cfg: &Config) -> Result<(), ConfigError> {
    // Pretty YAML of effective config (nice for debugging)
    let s = serde_yaml::to_string(cfg)?;
    println!("{s}");
    std::process::exit(0);
}

fn log_filter(common: &CommonArgs, cfg: &Config) -> String {
    if common.debug {
        return "debug".to_string();
    }
    cfg.log_level.clone().unwrap_or_else(|| "info".to_string())
}

/// 1) defaults, 2) YAML file (explicit path or search)
fn load_file(common: &CommonArgs) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    if let Some(p) = common.config.as_ref() {
        if p.exists() {
            merge(&mut cfg, read_yaml(p)?);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        merge(&mut cfg, read_yaml(&p)?);
    }
    if common.log_level.is_some() {
        cfg.log_level = common.log_level.clone();
    }
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/snapviz/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/snapviz/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/snapviz.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["snapviz.yaml", "config.yaml", "config/snapviz.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
pub fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    match (&mut dst.spectrum, src.spectrum) {
        (None, Some(s)) => dst.spectrum = Some(s),
        (Some(d), Some(s)) => merge_spectrum(d, s),
        _ => {}
    }
    match (&mut dst.metadata, src.metadata) {
        (None, Some(s)) => dst.metadata = Some(s),
        (Some(d), Some(s)) => merge_metadata(d, s),
        _ => {}
    }
}

fn merge_spectrum(dst: &mut SpectrumSection, src: SpectrumSection) {
    if src.sample_rate_hz.is_some() { dst.sample_rate_hz = src.sample_rate_hz; }
    if src.channels.is_some()       { dst.channels = src.channels; }
    if src.fft_size.is_some()       { dst.fft_size = src.fft_size; }
    if src.hop_size.is_some()       { dst.hop_size = src.hop_size; }
    if src.target_fps.is_some()     { dst.target_fps = src.target_fps; }
    if src.band_mode.is_some()      { dst.band_mode = src.band_mode; }
    if src.band_centers.is_some()   { dst.band_centers = src.band_centers; }
    if src.noise_floor_db.is_some() { dst.noise_floor_db = src.noise_floor_db; }
    if src.attack_rate.is_some()    { dst.attack_rate = src.attack_rate; }
    if src.decay_rate.is_some()     { dst.decay_rate = src.decay_rate; }
    if src.level_mode.is_some()     { dst.level_mode = src.level_mode; }
    if src.power_epsilon.is_some()  { dst.power_epsilon = src.power_epsilon; }
    if src.source.is_some()         { dst.source = src.source; }
    if src.ws_port.is_some()        { dst.ws_port = src.ws_port; }
}

fn merge_metadata(dst: &mut MetadataSection, src: MetadataSection) {
    if src.snapserver_host.is_some() { dst.snapserver_host = src.snapserver_host; }
    if src.snapserver_port.is_some() { dst.snapserver_port = src.snapserver_port; }
    if src.mpd_port.is_some()        { dst.mpd_port = src.mpd_port; }
    if src.client_id.is_some()       { dst.client_id = src.client_id; }
    if src.output.is_some()          { dst.output = src.output; }
    if src.ws_port.is_some()         { dst.ws_port = src.ws_port; }
    if src.poll_secs.is_some()       { dst.poll_secs = src.poll_secs; }
}

/// Parse `"20, 40, 80"` into centre frequencies.
pub fn parse_centers(list: &str) -> Result<Vec<f32>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .map_err(|_| ConfigError::Validation(format!("bad band centre '{s}'")))
        })
        .collect()
}

/// 3) CLI / environment overrides (highest precedence)
pub fn apply_spectrum_cli(cfg: &mut Config, cli: &SpectrumCli) -> Result<(), ConfigError> {
    let s = cfg.spectrum.get_or_insert_with(SpectrumSection::default);
    if cli.sample_rate.is_some()   { s.sample_rate_hz = cli.sample_rate; }
    if cli.channels.is_some()      { s.channels = cli.channels; }
    if cli.fft_size.is_some()      { s.fft_size = cli.fft_size; }
    if cli.hop_size.is_some()      { s.hop_size = cli.hop_size; }
    if cli.target_fps.is_some()    { s.target_fps = cli.target_fps; }
    if cli.band_mode.is_some()     { s.band_mode = cli.band_mode; }
    if let Some(list) = cli.band_centers.as_deref() {
        s.band_centers = Some(parse_centers(list)?);
    }
    if cli.noise_floor.is_some()   { s.noise_floor_db = cli.noise_floor; }
    if cli.attack_rate.is_some()   { s.attack_rate = cli.attack_rate; }
    if cli.decay_rate.is_some()    { s.decay_rate = cli.decay_rate; }
    if cli.level_mode.is_some()    { s.level_mode = cli.level_mode; }
    if cli.power_epsilon.is_some() { s.power_epsilon = cli.power_epsilon; }
    if cli.source.is_some()        { s.source = cli.source.clone(); }
    if cli.ws_port.is_some()       { s.ws_port = cli.ws_port; }
    Ok(())
}

pub fn apply_metadata_cli(cfg: &mut Config, cli: &MetadataCli) {
    let m = cfg.metadata.get_or_insert_with(MetadataSection::default);
    if cli.snapserver_host.is_some() { m.snapserver_host = cli.snapserver_host.clone(); }
    if cli.snapserver_port.is_some() { m.snapserver_port = cli.snapserver_port; }
    if cli.mpd_port.is_some()        { m.mpd_port = cli.mpd_port; }
    if cli.client_id.is_some()       { m.client_id = cli.client_id.clone(); }
    if cli.output.is_some()          { m.output = cli.output.clone(); }
    if cli.ws_port.is_some()         { m.ws_port = cli.ws_port; }
    if cli.poll_secs.is_some()       { m.poll_secs = cli.poll_secs; }
}

/// 4) Fill remaining gaps from defaults and validate.
pub fn resolve_spectrum(cfg: &Config) -> Result<SpectrumConfig, ConfigError> {
    let d = SpectrumConfig::default();
    let s = cfg.spectrum.clone().unwrap_or_default();
    let out = SpectrumConfig {
        sample_rate: s.sample_rate_hz.unwrap_or(d.sample_rate),
        channels: s.channels.unwrap_or(d.channels),
        fft_size: s.fft_size.unwrap_or(d.fft_size),
        hop_size: s.hop_size.or(d.hop_size),
        target_fps: s.target_fps.unwrap_or(d.target_fps),
        band_mode: s.band_mode.unwrap_or(d.band_mode),
        band_centers: s.band_centers.or(d.band_centers),
        noise_floor: s.noise_floor_db.unwrap_or(d.noise_floor),
        attack_rate: s.attack_rate.unwrap_or(d.attack_rate),
        decay_rate: s.decay_rate.unwrap_or(d.decay_rate),
        level_mode: s.level_mode.unwrap_or(d.level_mode),
        power_epsilon: s.power_epsilon.unwrap_or(d.power_epsilon),
        source: s.source.unwrap_or(d.source),
        ws_port: s.ws_port.unwrap_or(d.ws_port),
    };
    out.validate()?;
    Ok(out)
}

pub fn resolve_metadata(cfg: &Config) -> Result<MetadataConfig, ConfigError> {
    let d = MetadataConfig::default();
    let m = cfg.metadata.clone().unwrap_or_default();
    let out = MetadataConfig {
        snapserver_host: m.snapserver_host.unwrap_or(d.snapserver_host),
        snapserver_port: m.snapserver_port.unwrap_or(d.snapserver_port),
        mpd_port: m.mpd_port.unwrap_or(d.mpd_port),
        client_id: m.client_id.unwrap_or(d.client_id),
        output: m.output.unwrap_or(d.output),
        ws_port: m.ws_port.unwrap_or(d.ws_port),
        poll_interval: m.poll_secs.map(Duration::from_secs).unwrap_or(d.poll_interval),
    };
    out.validate()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = SpectrumConfig::default();
        s.validate().unwrap();
        assert_eq!(s.hop_size(), 1470);
        assert_eq!(s.chunk_bytes(), 1470 * 2 * 2);
    }

    #[test]
    fn yaml_then_cli_precedence() {
        let mut cfg = parse_yaml(
            "log_level: warn\nspectrum:\n  fft_size: 4096\n  band_mode: third-octave\n  sample_rate_hz: 48000\n",
        )
        .unwrap();
        let cli = SpectrumCli::try_parse_from(["snapviz", "--fft-size", "8192", "--level-mode", "normalized"]).unwrap();
        apply_spectrum_cli(&mut cfg, &cli).unwrap();
        let s = resolve_spectrum(&cfg).unwrap();
        assert_eq!(s.fft_size, 8192);
        assert_eq!(s.sample_rate, 48_000);
        assert_eq!(s.band_mode, BandMode::ThirdOctave);
        assert_eq!(s.level_mode, LevelMode::Normalized);
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut base = parse_yaml("spectrum:\n  fft_size: 4096\n  channels: 1\n").unwrap();
        let over = parse_yaml("spectrum:\n  fft_size: 1024\n").unwrap();
        merge(&mut base, over);
        let s = base.spectrum.unwrap();
        assert_eq!(s.fft_size, Some(1024));
        assert_eq!(s.channels, Some(1));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad: [fn(&mut SpectrumConfig); 13] = [
            |s| s.sample_rate = 0,
            |s| s.channels = 3,
            |s| s.fft_size = 3000,
            |s| s.fft_size = 128,
            |s| s.hop_size = Some(0),
            |s| s.hop_size = Some(4096),
            |s| s.target_fps = 0,
            |s| s.noise_floor = 3.0,
            |s| {
                s.attack_rate = 0.1;
                s.decay_rate = 0.5;
            },
            |s| s.power_epsilon = 0.0,
            |s| s.band_centers = Some(vec![]),
            |s| s.band_centers = Some(vec![100.0, 50.0]),
            |s| s.band_centers = Some(vec![100.0, 30_000.0]),
        ];
        for (i, tweak) in bad.iter().enumerate() {
            let mut s = SpectrumConfig::default();
            tweak(&mut s);
            assert!(s.validate().is_err(), "case {i} should fail");
        }
    }

    #[test]
    fn centre_list_parsing() {
        assert_eq!(parse_centers("20, 40,80 ,").unwrap(), vec![20.0, 40.0, 80.0]);
        assert!(parse_centers("20,abc").is_err());
    }

    #[test]
    fn metadata_requires_client_id() {
        assert!(resolve_metadata(&Config::default()).is_err());
        let cfg = parse_yaml("metadata:\n  client_id: kitchen\n  poll_secs: 5\n").unwrap();
        let m = resolve_metadata(&cfg).unwrap();
        assert_eq!(m.client_id, "kitchen");
        assert_eq!(m.poll_interval, Duration::from_secs(5));
        assert_eq!(m.snapserver_port, DEFAULT_SNAPSERVER_PORT);
    }
}
