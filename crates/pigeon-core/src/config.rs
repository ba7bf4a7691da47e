//! SDK instance configuration consumed by the ingestion core.

/// Per-instance configuration.
///
/// The ingestion core is constructed once per logged-in user; everything here
/// is fixed for the lifetime of the pipeline.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// User id of the locally logged-in account.
    pub login_user_id: String,
    /// Platform identifier of this device (used to suppress self-echo
    /// reaction callbacks).
    pub platform_id: i32,
    /// Data directory for the local store.
    pub data_dir: String,
    /// Optional symmetric key for encrypted plain-text bodies.
    /// When unset, encrypted text is stored as received.
    pub encryption_key: Option<String>,
    /// Whether reaction extensions are managed by an external service.
    pub is_external_extensions: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            login_user_id: String::new(),
            platform_id: 0,
            data_dir: ".".to_string(),
            encryption_key: None,
            is_external_extensions: false,
        }
    }
}
