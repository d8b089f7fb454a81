//! Search hits and their reconciliation with local video records.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::video::VideoRecord;

const PLACEHOLDER_PREFIX_LEN: usize = 8;

/// A matching time range inside one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    /// Remote relevance score, 0-100
    pub score: f64,
    /// Remote confidence label ("high", "medium", "low")
    #[serde(default)]
    pub confidence: Option<String>,
}

/// All matches for one remote video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub remote_content_id: String,
    pub segments: Vec<Segment>,
}

/// A single search match joined with the local record, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSearchResult {
    pub remote_content_id: String,
    pub local_id: Option<String>,
    pub title: String,
    /// `score / 100`
    pub confidence: f64,
    pub start_time: u64,
    pub end_time: u64,
    pub snippet: String,
}

/// Find the local record for a remote content identifier.
///
/// Exact matches win. Otherwise the first record whose content id contains,
/// or is contained in, `remote_content_id` is returned. The substring rule
/// is a heuristic and can pick the wrong record when ids share a prefix.
pub fn resolve_record<'a>(
    remote_content_id: &str,
    records: &'a [VideoRecord],
) -> Option<&'a VideoRecord> {
    records
        .iter()
        .find(|r| r.remote_content_id.as_deref() == Some(remote_content_id))
        .or_else(|| {
            records.iter().find(|r| match r.remote_content_id.as_deref() {
                Some(id) => remote_content_id.contains(id) || id.contains(remote_content_id),
                None => false,
            })
        })
}

/// Display title for a hit with no local record.
pub fn placeholder_title(remote_content_id: &str) -> String {
    let prefix: String = remote_content_id
        .chars()
        .take(PLACEHOLDER_PREFIX_LEN)
        .collect();
    format!("Video_{}", prefix)
}

/// Flatten hits into per-segment results with resolved titles.
pub fn build_results(hits: &[SearchHit], records: &[VideoRecord]) -> Vec<VideoSearchResult> {
    let mut results = Vec::new();
    for hit in hits {
        let record = resolve_record(&hit.remote_content_id, records);
        let title = record
            .map(|r| r.title.clone())
            .unwrap_or_else(|| placeholder_title(&hit.remote_content_id));

        for segment in &hit.segments {
            let snippet = match &segment.confidence {
                Some(label) => format!("{} confidence - Score: {:.1}", label, segment.score),
                None => format!("Score: {:.1}", segment.score),
            };
            results.push(VideoSearchResult {
                remote_content_id: hit.remote_content_id.clone(),
                local_id: record.map(|r| r.local_id.clone()),
                title: title.clone(),
                confidence: segment.score / 100.0,
                start_time: segment.start_time.max(0.0).floor() as u64,
                end_time: segment.end_time.max(0.0).floor() as u64,
                snippet,
            });
        }
    }
    results
}

/// Human-readable summary of search results.
pub fn format_search_results(results: &[VideoSearchResult]) -> String {
    if results.is_empty() {
        return "No relevant videos found for your query.".to_string();
    }

    let mut out = format!("Found {} relevant video(s):\n\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            out,
            "{}. **{}**\n   - Time: {} - {}\n   - Confidence: {}%\n   - Content: {}\n\n",
            i + 1,
            result.title,
            format_time(result.start_time),
            format_time(result.end_time),
            (result.confidence * 100.0).round() as i64,
            result.snippet,
        );
    }
    out
}

fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskMetadata;

    fn ready(title: &str, content_id: &str) -> VideoRecord {
        let mut record = VideoRecord::new(title);
        record.mark_indexing("task").unwrap();
        record
            .mark_ready(TaskMetadata {
                duration_seconds: Some(10.0),
                summary: None,
                remote_content_id: content_id.to_string(),
            })
            .unwrap();
        record
    }

    #[test]
    fn exact_match_beats_substring() {
        let records = vec![ready("short", "abc"), ready("long", "abc123")];
        let found = resolve_record("abc123", &records).unwrap();
        assert_eq!(found.title, "long");
    }

    #[test]
    fn substring_match_in_either_direction() {
        let records = vec![ready("a", "abc123")];
        assert_eq!(resolve_record("abc", &records).unwrap().title, "a");
        assert_eq!(resolve_record("xx-abc123-yy", &records).unwrap().title, "a");
    }

    #[test]
    fn miss_returns_none() {
        let records = vec![ready("a", "abc"), VideoRecord::new("pending")];
        assert!(resolve_record("xyz999", &records).is_none());
    }

    #[test]
    fn records_without_content_id_never_match() {
        let records = vec![VideoRecord::new("pending")];
        assert!(resolve_record("anything", &records).is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let records = vec![ready("a", "abc"), ready("b", "abcd")];
        let first = resolve_record("abcde", &records).map(|r| r.local_id.clone());
        let second = resolve_record("abcde", &records).map(|r| r.local_id.clone());
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn placeholder_uses_id_prefix() {
        assert_eq!(placeholder_title("6650f0e1c2d3"), "Video_6650f0e1");
        assert_eq!(placeholder_title("abc"), "Video_abc");
    }

    #[test]
    fn build_results_falls_back_to_placeholder() {
        let records = vec![ready("Keynote", "vid-1")];
        let hits = vec![
            SearchHit {
                remote_content_id: "vid-1".to_string(),
                segments: vec![Segment {
                    start_time: 12.7,
                    end_time: 30.2,
                    score: 84.0,
                    confidence: Some("high".to_string()),
                }],
            },
            SearchHit {
                remote_content_id: "zzz99999999".to_string(),
                segments: vec![Segment {
                    start_time: 0.0,
                    end_time: 5.0,
                    score: 40.0,
                    confidence: None,
                }],
            },
        ];

        let results = build_results(&hits, &records);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Keynote");
        assert_eq!(results[0].start_time, 12);
        assert_eq!(results[0].end_time, 30);
        assert_eq!(results[0].snippet, "high confidence - Score: 84.0");
        assert!(results[0].local_id.is_some());
        assert_eq!(results[1].title, "Video_zzz99999");
        assert!(results[1].local_id.is_none());
    }

    #[test]
    fn formats_results() {
        let results = vec![VideoSearchResult {
            remote_content_id: "vid-1".to_string(),
            local_id: None,
            title: "Keynote".to_string(),
            confidence: 0.85,
            start_time: 65,
            end_time: 130,
            snippet: "Score: 84.5".to_string(),
        }];
        let text = format_search_results(&results);
        assert!(text.starts_with("Found 1 relevant video(s):"));
        assert!(text.contains("1. **Keynote**"));
        assert!(text.contains("Time: 1:05 - 2:10"));
        assert!(text.contains("Confidence: 85%"));
    }

    #[test]
    fn formats_empty_results() {
        assert_eq!(
            format_search_results(&[]),
            "No relevant videos found for your query."
        );
    }
}
