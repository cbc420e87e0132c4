//! Channel and message endpoints

use serde::Serialize;
use shardline_core::{Channel, ChannelPayload, Message, MessagePayload, Snowflake};

use crate::client::RestClient;
use crate::error::RestResult;
use crate::request::Request;
use crate::route::Route;
use crate::transport::FileAttachment;

/// Reply target for a new message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageReferenceBody {
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_if_not_exists: Option<bool>,
}

/// Body of a message create
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReferenceBody>,
    /// Uploaded as multipart parts, not in the JSON body
    #[serde(skip)]
    pub files: Vec<FileAttachment>,
}

impl CreateMessage {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reply_to(mut self, message_id: Snowflake) -> Self {
        self.message_reference = Some(MessageReferenceBody {
            message_id,
            fail_if_not_exists: None,
        });
        self
    }

    #[must_use]
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }
}

/// Body of a message edit; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl RestClient {
    pub async fn get_channel(&self, channel_id: Snowflake) -> RestResult<Channel> {
        let payload: ChannelPayload = self
            .request(Request::new(Route::get(format!("/channels/{channel_id}"))))
            .await?;
        Ok(payload.to_channel(None))
    }

    /// Post a message; attachments switch the body to multipart
    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: &CreateMessage,
    ) -> RestResult<Message> {
        let route = Route::post(format!("/channels/{channel_id}/messages"));
        let request = if message.files.is_empty() {
            Request::new(route).json(message)?
        } else {
            Request::new(route).multipart(Some(message), message.files.clone())?
        };
        let payload: MessagePayload = self.request(request).await?;
        Ok(payload.to_message())
    }

    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        edit: &EditMessage,
    ) -> RestResult<Message> {
        let route = Route::patch(format!("/channels/{channel_id}/messages/{message_id}"));
        let payload: MessagePayload = self.request(Request::new(route).json(edit)?).await?;
        Ok(payload.to_message())
    }

    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> RestResult<()> {
        let route = Route::delete(format!("/channels/{channel_id}/messages/{message_id}"));
        self.request_empty(Request::new(route)).await
    }
}
