use battle_core::protocol::PlayerProfile;

use crate::error::ClientError;

/// Read-only client for the user profile service.
///
/// Queried once after a match concludes: the rating it returns is the
/// ground truth for display, while the locally computed delta is only an
/// instantaneous hint.
pub struct ProfileClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProfileClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn fetch(&self, player_id: &str) -> Result<PlayerProfile, ClientError> {
        let url = format!("{}/profile/{}", self.base_url, player_id);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        Ok(resp.json::<PlayerProfile>().await?)
    }
}
