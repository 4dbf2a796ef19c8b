use std::collections::HashMap;
use std::fmt;

/// Credentials and endpoint of an S3 compatible object store.
#[derive(Clone)]
pub struct S3StorageOptions {
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub allow_http: bool,
    /// Commit without a locking provider. Only safe with a single writer.
    pub allow_unsafe_rename: bool,
}

impl S3StorageOptions {
    /// Storage options in the form `deltalake` expects.
    pub fn to_storage_options(&self) -> HashMap<String, String> {
        let mut options = HashMap::from([
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key_id.clone()),
            (
                "AWS_SECRET_ACCESS_KEY".to_string(),
                self.secret_access_key.clone(),
            ),
            ("AWS_REGION".to_string(), self.region.clone()),
            ("AWS_ALLOW_HTTP".to_string(), self.allow_http.to_string()),
            (
                "AWS_S3_ALLOW_UNSAFE_RENAME".to_string(),
                self.allow_unsafe_rename.to_string(),
            ),
        ]);

        if let Some(endpoint) = &self.endpoint_url {
            options.insert("AWS_ENDPOINT_URL".to_string(), endpoint.clone());
        }

        options
    }
}

impl fmt::Debug for S3StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3StorageOptions")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("allow_http", &self.allow_http)
            .field("allow_unsafe_rename", &self.allow_unsafe_rename)
            .finish()
    }
}
