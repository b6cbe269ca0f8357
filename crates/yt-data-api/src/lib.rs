//! Minimal REST client for the YouTube Data API v3.
//!
//! Covers exactly the provider calls the sweeper needs: channel video
//! search, top-level comment listing, and comment deletion. The API base
//! address is injectable so tests can point the client at a local mock
//! server.

use serde_json::Value;
use thiserror::Error;

/// Production Data API address.
pub const DEFAULT_API_ADDRESS: &str = "https://www.googleapis.com";

/// Videos requested per search page, the API maximum.
const SEARCH_PAGE_SIZE: u32 = 50;

/// Comment threads requested per video (single page, no pagination).
const COMMENT_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A top-level comment as returned by the commentThreads endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    /// Thread id, which is also the id accepted by comments.delete.
    pub id: String,
    /// Display text of the top-level comment.
    pub text: String,
}

/// One page of channel video search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        YouTubeClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Fetch one page of the channel's videos, newest first.
    pub async fn search_videos(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, ApiError> {
        let mut url = format!(
            "{}/youtube/v3/search?part=id&channelId={}&maxResults={}&order=date&type=video",
            self.base_url,
            urlencoding::encode(channel_id),
            SEARCH_PAGE_SIZE
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let body = self.get_json(&url, "search").await?;
        Ok(SearchPage {
            video_ids: page_video_ids(&body),
            next_page_token: next_page_token(&body),
        })
    }

    /// Collect every video id of the channel, following continuation tokens
    /// until the API reports none remaining. Any page failure propagates;
    /// there is no partial result.
    pub async fn list_video_ids(&self, channel_id: &str) -> Result<Vec<String>, ApiError> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.search_videos(channel_id, page_token.as_deref()).await?;
            video_ids.extend(page.video_ids);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(video_ids)
    }

    /// Fetch up to 100 top-level comment threads for a video.
    pub async fn list_top_level_comments(
        &self,
        video_id: &str,
    ) -> Result<Vec<CommentRecord>, ApiError> {
        let url = format!(
            "{}/youtube/v3/commentThreads?part=snippet&videoId={}&maxResults={}",
            self.base_url,
            urlencoding::encode(video_id),
            COMMENT_PAGE_SIZE
        );

        let body = self.get_json(&url, "commentThreads").await?;
        Ok(page_comments(&body))
    }

    /// Delete a single comment by id.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/youtube/v3/comments?id={}",
            self.base_url,
            urlencoding::encode(comment_id)
        );

        let response = self
            .http
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(ApiError::Status {
                endpoint: "comments.delete",
                status,
                body,
            });
        }

        Ok(())
    }

    async fn get_json(&self, url: &str, endpoint: &'static str) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(ApiError::Status {
                endpoint,
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Video ids on one search page. Entries without a video id (channel or
/// playlist results slipping through the type filter) are skipped.
fn page_video_ids(page: &Value) -> Vec<String> {
    page.get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("id")
                        .and_then(|id| id.get("videoId"))
                        .and_then(|id| id.as_str())
                })
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn next_page_token(page: &Value) -> Option<String> {
    page.get("nextPageToken")
        .and_then(|v| v.as_str())
        .map(|token| token.to_string())
}

/// Comment id and display text per thread. Malformed entries are skipped.
fn page_comments(body: &Value) -> Vec<CommentRecord> {
    body.get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(|id| id.as_str())?;
                    let text = item
                        .get("snippet")
                        .and_then(|s| s.get("topLevelComment"))
                        .and_then(|c| c.get("snippet"))
                        .and_then(|s| s.get("textDisplay"))
                        .and_then(|t| t.as_str())?;
                    Some(CommentRecord {
                        id: id.to_string(),
                        text: text.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_ids_skip_entries_without_a_video_id() {
        let page = json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "vid-1"}},
                {"id": {"kind": "youtube#channel", "channelId": "chan-1"}},
                {"id": {"kind": "youtube#video", "videoId": "vid-2"}},
                {"kind": "youtube#searchResult"}
            ],
            "nextPageToken": "CAUQAA"
        });

        assert_eq!(page_video_ids(&page), vec!["vid-1", "vid-2"]);
        assert_eq!(next_page_token(&page), Some("CAUQAA".to_string()));
    }

    #[test]
    fn last_page_has_no_continuation_token() {
        let page = json!({"items": [{"id": {"videoId": "vid-9"}}]});
        assert_eq!(page_video_ids(&page), vec!["vid-9"]);
        assert_eq!(next_page_token(&page), None);
    }

    #[test]
    fn empty_body_yields_no_ids() {
        assert!(page_video_ids(&json!({})).is_empty());
        assert!(page_comments(&json!({})).is_empty());
    }

    #[test]
    fn comments_extract_id_and_display_text() {
        let body = json!({
            "items": [
                {
                    "id": "thread-1",
                    "snippet": {
                        "topLevelComment": {
                            "snippet": {"textDisplay": "nice video"}
                        }
                    }
                },
                {
                    "id": "thread-2",
                    "snippet": {
                        "topLevelComment": {
                            "snippet": {"textDisplay": "ｓｌｏｔ ｇａｃｏｒ"}
                        }
                    }
                }
            ]
        });

        let comments = page_comments(&body);
        assert_eq!(
            comments,
            vec![
                CommentRecord {
                    id: "thread-1".to_string(),
                    text: "nice video".to_string(),
                },
                CommentRecord {
                    id: "thread-2".to_string(),
                    text: "ｓｌｏｔ ｇａｃｏｒ".to_string(),
                },
            ]
        );
    }

    #[test]
    fn malformed_comment_entries_are_skipped() {
        let body = json!({
            "items": [
                {"id": "no-snippet"},
                {
                    "snippet": {
                        "topLevelComment": {"snippet": {"textDisplay": "no id"}}
                    }
                },
                {
                    "id": "thread-ok",
                    "snippet": {
                        "topLevelComment": {"snippet": {"textDisplay": "fine"}}
                    }
                }
            ]
        });

        let comments = page_comments(&body);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "thread-ok");
    }
}
