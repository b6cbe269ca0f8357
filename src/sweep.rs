//! Per-video scan and delete steps.

use yt_data_api::YouTubeClient;

use crate::spam;

/// Ids of spam comments on one video, in encounter order.
///
/// A fetch error is logged and yields an empty list so one broken video
/// cannot end the run.
pub async fn fetch_spam_comments(client: &YouTubeClient, video_id: &str) -> Vec<String> {
    let comments = match client.list_top_level_comments(video_id).await {
        Ok(comments) => comments,
        Err(err) => {
            log::warn!("Error fetching comments for video {}: {}", video_id, err);
            return Vec::new();
        }
    };

    let mut spam_ids = Vec::new();
    for comment in comments {
        log::debug!("Checking comment {}: {:?}", comment.id, comment.text);
        if spam::is_spam(&comment.text) {
            log::info!("Spam detected: {:?}", comment.text);
            spam_ids.push(comment.id);
        }
    }
    spam_ids
}

/// Delete the given comments one at a time, best effort: a failed delete is
/// logged and the loop moves on to the next id.
pub async fn delete_comments(client: &YouTubeClient, comment_ids: &[String]) {
    for comment_id in comment_ids {
        match client.delete_comment(comment_id).await {
            Ok(()) => log::info!("Deleted comment {}", comment_id),
            Err(err) => log::warn!("Failed to delete comment {}: {}", comment_id, err),
        }
    }
}
