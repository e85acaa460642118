use rollcall_client::{ClientOptions, Endpoints, RetryPolicy, Url};
use rollcall_core::{AttemptPolicy, Confidence, TranscodeOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backend endpoint URLs (`[endpoints]` table).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub recognize: String,
    pub enroll: String,
    pub create_collection: String,
    pub list_faces: String,
    pub mark_attendance: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            recognize: "http://127.0.0.1:8080/recognize".into(),
            enroll: "http://127.0.0.1:8080/enroll".into(),
            create_collection: "http://127.0.0.1:8080/collection".into(),
            list_faces: "http://127.0.0.1:8080/faces".into(),
            mark_attendance: "http://127.0.0.1:8081/api/attendance.php".into(),
        }
    }
}

/// Client configuration: defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: EndpointConfig,
    /// Minimum recognition confidence (percent) before attendance is marked.
    pub confidence_threshold: f32,
    pub request_timeout_ms: u64,
    /// JPEG compression factor, 0.0–1.0.
    pub image_quality: f32,
    pub max_image_width: u32,
    pub max_image_bytes: usize,
    pub institute_id: String,
    /// Total recognition attempts, including the first.
    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
    /// Camera devices the switch-camera action cycles through.
    pub camera_devices: Vec<String>,
    /// Frames read per capture before giving up on dark frames.
    pub capture_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            confidence_threshold: 95.0,
            request_timeout_ms: 30_000,
            image_quality: 0.7,
            max_image_width: 800,
            max_image_bytes: 1024 * 1024,
            institute_id: "INST001".into(),
            retry_attempts: 3,
            retry_initial_delay_ms: 1000,
            camera_devices: vec!["/dev/video0".into()],
            capture_attempts: 10,
        }
    }
}

impl Config {
    /// Load from `path` (or `ROLLCALL_CONFIG`), apply env overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ROLLCALL_CONFIG").ok().map(PathBuf::from));

        let mut config = match &path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "loaded config file");
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `ROLLCALL_*` variables. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let urls = [
            ("ROLLCALL_RECOGNIZE_URL", &mut self.endpoints.recognize),
            ("ROLLCALL_ENROLL_URL", &mut self.endpoints.enroll),
            ("ROLLCALL_CREATE_COLLECTION_URL", &mut self.endpoints.create_collection),
            ("ROLLCALL_LIST_FACES_URL", &mut self.endpoints.list_faces),
            ("ROLLCALL_ATTENDANCE_URL", &mut self.endpoints.mark_attendance),
        ];
        for (key, field) in urls {
            if let Some(v) = lookup(key) {
                *field = v;
            }
        }

        if let Some(v) = lookup("ROLLCALL_INSTITUTE_ID") {
            self.institute_id = v;
        }
        if let Some(v) = lookup("ROLLCALL_CAMERA_DEVICE") {
            self.camera_devices = v.split(',').map(|d| d.trim().to_string()).filter(|d| !d.is_empty()).collect();
        }

        env_parse(&lookup, "ROLLCALL_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);
        env_parse(&lookup, "ROLLCALL_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms);
        env_parse(&lookup, "ROLLCALL_IMAGE_QUALITY", &mut self.image_quality);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Confidence::new(self.confidence_threshold).is_none() {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 100], got {}",
                self.confidence_threshold
            )));
        }
        if !(self.image_quality > 0.0 && self.image_quality <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "image_quality must be within (0, 1], got {}",
                self.image_quality
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.max_image_width == 0 || self.max_image_bytes == 0 {
            return Err(ConfigError::Invalid("image limits must be positive".into()));
        }
        for (name, url) in [
            ("recognize", &self.endpoints.recognize),
            ("enroll", &self.endpoints.enroll),
            ("create_collection", &self.endpoints.create_collection),
            ("list_faces", &self.endpoints.list_faces),
            ("mark_attendance", &self.endpoints.mark_attendance),
        ] {
            let parsed = Url::parse(url).map_err(|e| {
                ConfigError::Invalid(format!("endpoint {name} is not a valid URL ({e}): {url:?}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {name} must be an http(s) URL with a host, got {url:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            recognize: self.endpoints.recognize.clone(),
            enroll: self.endpoints.enroll.clone(),
            create_collection: self.endpoints.create_collection.clone(),
            list_faces: self.endpoints.list_faces.clone(),
            mark_attendance: self.endpoints.mark_attendance.clone(),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_millis(self.request_timeout_ms),
            ..ClientOptions::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
        }
    }

    pub fn institute(&self) -> Option<String> {
        let id = self.institute_id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    pub fn attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            threshold: Confidence::new(self.confidence_threshold).unwrap_or(Confidence::MAX),
            transcode: TranscodeOptions {
                max_width: self.max_image_width,
                max_payload_bytes: self.max_image_bytes,
                ..TranscodeOptions::default()
            }
            .with_quality_factor(self.image_quality),
        }
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *field = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}
