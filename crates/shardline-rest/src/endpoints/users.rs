use shardline_core::User;

use crate::client::RestClient;
use crate::error::RestResult;
use crate::request::Request;
use crate::route::Route;

impl RestClient {
    /// The user the token belongs to
    pub async fn current_user(&self) -> RestResult<User> {
        self.request(Request::new(Route::get("/users/@me"))).await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::tests::{client, json, ScriptedTransport};
    use shardline_core::Snowflake;

    #[tokio::test(start_paused = true)]
    async fn test_current_user() {
        let transport = ScriptedTransport::new(vec![json(
            200,
            &serde_json::json!({"id": "42", "username": "shardline", "bot": true}),
        )]);

        let user = client(&transport).current_user().await.unwrap();
        assert_eq!(user.id, Snowflake::new(42));
        assert!(user.bot);
    }
}
