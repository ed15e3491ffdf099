//! 从原始文本中提取题目编号

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn digit_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn solved_section() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)(Решен|Решён|Решенные|Решённые|решен|решё)(.*?)</(?:p|td|div|li)>")
            .expect("valid regex")
    })
}

fn numeric_anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<a[^>]*>\s*([0-9]{1,6})\s*</a>").expect("valid regex"))
}

/// 提取文本中所有数字串，返回去重、升序、严格为正的编号
///
/// 超出 `u32` 范围的数字串会被忽略
pub fn parse_solved_ids(text: &str) -> BTreeSet<u32> {
    digit_runs()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .collect()
}

/// 从原始 HTML 中提取已解决列表的数字文本
///
/// 依次尝试：关键字段落内的数字 → 纯数字链接 → 全文所有数字。
/// 全部失败时返回 `None`。
pub fn extract_from_document(body: &str) -> Option<String> {
    let body = body.replace('\u{00A0}', " ");

    if let Some(section) = solved_section()
        .captures(&body)
        .and_then(|caps| caps.get(2))
    {
        let found: Vec<&str> = digit_runs()
            .find_iter(section.as_str())
            .map(|m| m.as_str())
            .collect();
        if !found.is_empty() {
            return Some(found.join(" "));
        }
    }

    let anchors: Vec<&str> = numeric_anchor()
        .captures_iter(&body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if !anchors.is_empty() {
        return Some(anchors.join(" "));
    }

    let all: Vec<&str> = digit_runs().find_iter(&body).map(|m| m.as_str()).collect();
    if all.is_empty() {
        None
    } else {
        Some(all.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dedups_sorts_and_drops_zero() {
        let ids = parse_solved_ids("Решено: 3, 12, 107, 0, 3");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![3, 12, 107]);
    }

    #[test]
    fn test_parse_handles_leading_zeros_and_overflow() {
        let ids = parse_solved_ids("007 99999999999999 42");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![7, 42]);
    }

    #[test]
    fn test_parse_without_digits_is_empty() {
        assert!(parse_solved_ids("").is_empty());
        assert!(parse_solved_ids("нет решённых задач").is_empty());
    }

    #[test]
    fn test_extract_prefers_keyword_section() {
        let html = "<html><body><p>Рейтинг: 55</p>\
                    <p>Решенные задачи:&nbsp;<a href='/t'>1</a> 17\u{00A0}<a>250</a></p>\
                    <a href='/x'>999</a></body></html>";
        assert_eq!(extract_from_document(html).as_deref(), Some("1 17 250"));
    }

    #[test]
    fn test_extract_section_stops_at_closing_tag() {
        let html = "<td>решённые: 4 8</td><td>ещё 15</td>";
        assert_eq!(extract_from_document(html).as_deref(), Some("4 8"));
    }

    #[test]
    fn test_extract_falls_back_to_numeric_anchors() {
        let html = "<div>Profile 2024</div><a href='t?1'> 12 </a><a href='t?2'>1234567</a><a>x</a><a>34</a>";
        assert_eq!(extract_from_document(html).as_deref(), Some("12 34"));
    }

    #[test]
    fn test_extract_last_resort_takes_every_digit_run() {
        let html = "<span>user 77 rank 5</span>";
        assert_eq!(extract_from_document(html).as_deref(), Some("77 5"));
    }

    #[test]
    fn test_extract_empty_document() {
        assert_eq!(extract_from_document(""), None);
        assert_eq!(extract_from_document("<html><body>nothing</body></html>"), None);
    }
}
